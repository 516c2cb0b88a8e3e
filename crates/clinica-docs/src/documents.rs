//! Printable clinic documents.
//!
//! Each payload is the JSON body of its route. Rendering is synchronous and
//! returns the PDF bytes.

use serde::{Deserialize, Serialize};
use tracing::debug;

use clinica_core::models::{AttendanceSummary, ExamRequest, PrescriptionItem, Triage, YesNo};
use clinica_core::reports::ConsolidatedReport;

use crate::error::DocumentError;
use crate::pdf::PdfWriter;

/// Patient identification printed at the top of a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PatientHeader {
    pub name: String,
    #[serde(default)]
    pub record_number: Option<String>,
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub cpf: Option<String>,
}

/// Body of `POST /api/documents/prescricao`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrescriptionDocument {
    pub patient: PatientHeader,
    pub professional: String,
    pub items: Vec<PrescriptionItem>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Body of `POST /api/documents/exames`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExamRequestDocument {
    pub patient: PatientHeader,
    pub professional: String,
    pub exams: Vec<ExamRequest>,
    /// Clinical indication
    #[serde(default)]
    pub indication: Option<String>,
}

/// Body of `POST /api/documents/atendimento`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttendanceDocument {
    pub patient: PatientHeader,
    pub attendance: AttendanceSummary,
}

/// Kinds of document, used in titles and download file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Prescription,
    ExamRequest,
    TriageSheet,
    AttendanceSummary,
    ConsolidatedReport,
}

impl DocumentKind {
    /// File name prefix.
    pub fn slug(&self) -> &'static str {
        match self {
            DocumentKind::Prescription => "prescricao",
            DocumentKind::ExamRequest => "exames",
            DocumentKind::TriageSheet => "triagem",
            DocumentKind::AttendanceSummary => "atendimento",
            DocumentKind::ConsolidatedReport => "consolidado",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            DocumentKind::Prescription => "Receituário",
            DocumentKind::ExamRequest => "Solicitação de Exames",
            DocumentKind::TriageSheet => "Ficha de Triagem",
            DocumentKind::AttendanceSummary => "Resumo de Atendimento",
            DocumentKind::ConsolidatedReport => "Relatório Consolidado",
        }
    }

    /// Download name, e.g. `prescricao-20240301-143000.pdf`.
    pub fn file_name(&self, at: chrono::DateTime<chrono::Local>, extension: &str) -> String {
        format!("{}-{}.{}", self.slug(), at.format("%Y%m%d-%H%M%S"), extension)
    }
}

fn start(clinic: &str, kind: DocumentKind) -> Result<PdfWriter, DocumentError> {
    let mut writer = PdfWriter::new(kind.title())?;
    writer.title(clinic);
    writer.title(kind.title());
    Ok(writer)
}

fn patient_block(writer: &mut PdfWriter, patient: &PatientHeader) {
    writer.heading("Paciente");
    writer.field("Nome", &patient.name);
    writer.field("Prontuário", patient.record_number.as_deref().unwrap_or_default());
    writer.field("Nascimento", patient.birth_date.as_deref().unwrap_or_default());
    writer.field("CPF", patient.cpf.as_deref().unwrap_or_default());
}

fn footer(writer: &mut PdfWriter, professional: &str) {
    writer.space(6.0);
    writer.paragraph(&format!(
        "Emitido em {}",
        chrono::Local::now().format("%d/%m/%Y %H:%M")
    ));
    writer.signature(professional);
}

fn yes_no(answer: YesNo, details: Option<&str>) -> String {
    match (answer, details.map(str::trim).filter(|d| !d.is_empty())) {
        (YesNo::Yes, Some(details)) => format!("Sim ({})", details),
        (YesNo::Yes, None) => "Sim".to_string(),
        (YesNo::No, _) => "Não".to_string(),
    }
}

/// Render a prescription.
pub fn render_prescription(clinic: &str, doc: &PrescriptionDocument) -> Result<Vec<u8>, DocumentError> {
    if doc.items.is_empty() {
        return Err(DocumentError::Incomplete("a receita não tem itens"));
    }

    let mut writer = start(clinic, DocumentKind::Prescription)?;
    patient_block(&mut writer, &doc.patient);

    writer.heading("Prescrição");
    for (i, item) in doc.items.iter().enumerate() {
        writer.paragraph(&format!("{}. {}", i + 1, item.describe()));
    }
    if let Some(notes) = &doc.notes {
        writer.heading("Orientações");
        writer.paragraph(notes);
    }

    footer(&mut writer, &doc.professional);
    debug!(items = doc.items.len(), "Prescription rendered");
    writer.finish()
}

/// Render an exam request.
pub fn render_exam_request(clinic: &str, doc: &ExamRequestDocument) -> Result<Vec<u8>, DocumentError> {
    if doc.exams.is_empty() {
        return Err(DocumentError::Incomplete("nenhum exame solicitado"));
    }

    let mut writer = start(clinic, DocumentKind::ExamRequest)?;
    patient_block(&mut writer, &doc.patient);

    writer.heading("Exames");
    for exam in &doc.exams {
        match exam.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            Some(notes) => writer.bullet(&format!("{} - {}", exam.name, notes)),
            None => writer.bullet(&exam.name),
        }
    }
    if let Some(indication) = &doc.indication {
        writer.heading("Indicação clínica");
        writer.paragraph(indication);
    }

    footer(&mut writer, &doc.professional);
    writer.finish()
}

/// Render the triage sheet. Incomplete triages are printed with a warning.
pub fn render_triage(clinic: &str, triage: &Triage) -> Result<Vec<u8>, DocumentError> {
    let mut writer = start(clinic, DocumentKind::TriageSheet)?;

    writer.heading("Paciente");
    writer.field("Nome", &triage.patient_name);
    writer.field("Prontuário", &triage.record_number);
    if let Some(age) = triage.age {
        writer.field("Idade", &format!("{} anos", age));
    }

    let vitals = &triage.vitals;
    writer.heading("Sinais vitais");
    let measured = [
        ("Peso", vitals.weight_kg.map(|v| format!("{:.1} kg", v))),
        ("Temperatura", vitals.temperature_c.map(|v| format!("{:.1} °C", v))),
        ("PA", vitals.blood_pressure.clone()),
        ("FC", vitals.heart_rate.map(|v| format!("{} bpm", v))),
        ("FR", vitals.respiratory_rate.map(|v| format!("{} irpm", v))),
        ("SatO2", vitals.oxygen_saturation.map(|v| format!("{}%", v))),
    ];
    for (label, value) in measured {
        writer.field(label, value.as_deref().unwrap_or("-"));
    }

    writer.heading("Anamnese");
    writer.field("Situação", &triage.situation);
    writer.field(
        "Comorbidades",
        &yes_no(triage.comorbidity, triage.comorbidity_details.as_deref()),
    );
    writer.field(
        "Alergias",
        &yes_no(triage.allergy, triage.allergy_details.as_deref()),
    );
    writer.field("Medicação nas últimas 24h", &triage.medication_24h);

    let specialties: Vec<&str> = triage.specialties.iter().map(|s| s.name.as_str()).collect();
    writer.field("Encaminhado para", &specialties.join(", "));

    let issues = triage.issues();
    if !issues.is_empty() {
        writer.heading("Pendências");
        for issue in &issues {
            writer.bullet(&issue.to_string());
        }
    }

    footer(&mut writer, &triage.collected_by);
    writer.finish()
}

/// Render the summary of a finished attendance.
pub fn render_attendance(clinic: &str, doc: &AttendanceDocument) -> Result<Vec<u8>, DocumentError> {
    let attendance = &doc.attendance;
    let mut writer = start(clinic, DocumentKind::AttendanceSummary)?;
    patient_block(&mut writer, &doc.patient);

    writer.heading("Atendimento");
    writer.field("Especialidade", &attendance.specialty_name);
    writer.field("Profissional", &attendance.professional);
    writer.field("Início", &attendance.started_at);
    writer.field("Término", &attendance.finished_at);

    if !attendance.evolution.trim().is_empty() {
        writer.heading("Evolução");
        writer.paragraph(&attendance.evolution);
    }
    if !attendance.procedures.is_empty() {
        writer.heading("Procedimentos");
        for procedure in &attendance.procedures {
            writer.bullet(procedure);
        }
    }
    if !attendance.prescriptions.is_empty() {
        writer.heading("Prescrição");
        for item in &attendance.prescriptions {
            writer.bullet(&item.describe());
        }
    }
    if !attendance.exam_requests.is_empty() {
        writer.heading("Exames solicitados");
        for exam in &attendance.exam_requests {
            writer.bullet(&exam.name);
        }
    }

    footer(&mut writer, &attendance.professional);
    writer.finish()
}

/// Render the consolidated report.
pub fn render_consolidated(clinic: &str, report: &ConsolidatedReport) -> Result<Vec<u8>, DocumentError> {
    let mut writer = start(clinic, DocumentKind::ConsolidatedReport)?;
    writer.paragraph(&format!("Período: {} a {}", report.from, report.to));
    writer.paragraph(&format!(
        "{} atendimentos, {} pacientes",
        report.lines.len(),
        report.patients
    ));

    writer.heading("Por especialidade");
    for total in &report.totals {
        writer.bullet(&format!("{}: {}", total.specialty_name, total.attendances));
    }

    writer.heading("Atendimentos");
    for line in &report.lines {
        let date = line.finished_at.get(..10).unwrap_or(&line.finished_at);
        writer.bullet(&format!(
            "{} | {} | {} | {}",
            date, line.patient_name, line.specialty_name, line.professional
        ));
        if !line.procedures.is_empty() {
            writer.paragraph(&format!("   {}", line.procedures.join("; ")));
        }
    }

    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use clinica_core::models::Medication;

    fn header() -> PatientHeader {
        PatientHeader {
            name: "Maria da Conceição".into(),
            record_number: Some("000042".into()),
            ..PatientHeader::default()
        }
    }

    #[test]
    fn test_file_name() {
        let at = chrono::Local.with_ymd_and_hms(2024, 3, 1, 14, 30, 5).unwrap();
        assert_eq!(
            DocumentKind::Prescription.file_name(at, "pdf"),
            "prescricao-20240301-143005.pdf"
        );
        assert_eq!(
            DocumentKind::ConsolidatedReport.file_name(at, "csv"),
            "consolidado-20240301-143005.csv"
        );
    }

    #[test]
    fn test_prescription_requires_items() {
        let doc = PrescriptionDocument {
            patient: header(),
            professional: "Dra. Lima".into(),
            items: Vec::new(),
            notes: None,
        };
        assert!(matches!(
            render_prescription("Clínica", &doc),
            Err(DocumentError::Incomplete(_))
        ));
    }

    #[test]
    fn test_prescription_renders() {
        let doc = PrescriptionDocument {
            patient: header(),
            professional: "Dra. Lima".into(),
            items: vec![PrescriptionItem {
                medication: Medication::Catalog {
                    id: 3,
                    name: "Amoxicilina 500mg".into(),
                },
                quantity: "21".into(),
                unit: "cápsulas".into(),
                frequency: "8/8h por 7 dias".into(),
            }],
            notes: Some("Tomar após as refeições".into()),
        };
        let bytes = render_prescription("Clínica", &doc).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_incomplete_triage_still_prints() {
        let mut triage = Triage::new(1, "Ana".into(), "Enf. Carla".into());
        triage.allergy = YesNo::Yes;
        assert!(!triage.issues().is_empty());
        assert!(!render_triage("Clínica", &triage).unwrap().is_empty());
    }

    #[test]
    fn test_yes_no_details() {
        assert_eq!(yes_no(YesNo::Yes, Some(" Dipirona ")), "Sim (Dipirona)");
        assert_eq!(yes_no(YesNo::Yes, Some("  ")), "Sim");
        assert_eq!(yes_no(YesNo::No, Some("ignorado")), "Não");
    }
}
