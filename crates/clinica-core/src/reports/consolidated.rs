//! Consolidated attendance report for a date range.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::{parse_day, ReportError, ReportResult};
use crate::db::Database;

/// One finished attendance in the report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportLine {
    pub attendance_id: i64,
    pub finished_at: String,
    pub patient_id: i64,
    pub patient_name: String,
    pub specialty_name: String,
    pub professional: String,
    /// Procedures, including per-tooth ones
    pub procedures: Vec<String>,
    pub prescriptions: usize,
    pub exam_requests: usize,
}

/// Attendance count of one specialty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpecialtyTotal {
    pub specialty_name: String,
    pub attendances: usize,
}

/// Finished attendances between two days, inclusive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsolidatedReport {
    pub from: String,
    pub to: String,
    pub generated_at: String,
    pub lines: Vec<ReportLine>,
    pub totals: Vec<SpecialtyTotal>,
    /// Distinct patients seen
    pub patients: usize,
}

impl ConsolidatedReport {
    /// Build the report for `[from, to]` (`YYYY-MM-DD`).
    pub fn build(db: &Database, from: &str, to: &str) -> ReportResult<Self> {
        let from_day = parse_day(from)?;
        let to_day = parse_day(to)?;
        if from_day > to_day {
            return Err(ReportError::InvalidRange {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        let from = from_day.format("%Y-%m-%d").to_string();
        let to = to_day.format("%Y-%m-%d").to_string();

        let specialties: HashMap<i64, String> = db
            .list_specialties()?
            .into_iter()
            .map(|s| (s.id, s.name))
            .collect();

        let mut names: HashMap<i64, String> = HashMap::new();
        let mut lines = Vec::new();
        for attendance in db.list_finished_attendances(&from, &to)? {
            let patient_name = match names.get(&attendance.patient_id) {
                Some(name) => name.clone(),
                None => {
                    let name = db
                        .get_patient(attendance.patient_id)?
                        .map(|p| p.name)
                        .unwrap_or_default();
                    names.insert(attendance.patient_id, name.clone());
                    name
                }
            };

            lines.push(ReportLine {
                attendance_id: attendance.id,
                finished_at: attendance.finished_at.clone().unwrap_or_default(),
                patient_id: attendance.patient_id,
                patient_name,
                specialty_name: specialties
                    .get(&attendance.specialty_id)
                    .cloned()
                    .unwrap_or_else(|| attendance.specialty_id.to_string()),
                professional: attendance.professional.clone(),
                procedures: attendance.all_procedures(),
                prescriptions: attendance.prescriptions.len(),
                exam_requests: attendance.exam_requests.len(),
            });
        }

        let mut by_specialty: BTreeMap<&str, usize> = BTreeMap::new();
        for line in &lines {
            *by_specialty.entry(line.specialty_name.as_str()).or_default() += 1;
        }
        let totals = by_specialty
            .into_iter()
            .map(|(name, attendances)| SpecialtyTotal {
                specialty_name: name.to_string(),
                attendances,
            })
            .collect();

        Ok(Self {
            from,
            to,
            generated_at: chrono::Utc::now().to_rfc3339(),
            patients: names.len(),
            totals,
            lines,
        })
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV, one row per attendance.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        // Header
        csv.push_str("atendimento,data,paciente_id,paciente,especialidade,profissional,procedimentos,prescricoes,exames\n");

        for line in &self.lines {
            csv.push_str(&format!(
                "{},{},{},{},{},{},{},{},{}\n",
                line.attendance_id,
                escape_csv(&line.finished_at),
                line.patient_id,
                escape_csv(&line.patient_name),
                escape_csv(&line.specialty_name),
                escape_csv(&line.professional),
                escape_csv(&line.procedures.join("; ")),
                line.prescriptions,
                line.exam_requests,
            ));
        }

        csv
    }
}

/// Escape a CSV field.
pub fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Attendance, Medication, Patient, PatientFlow, PrescriptionItem, Queue, Specialty,
    };

    fn finished(db: &Database, patient_id: i64, specialty_id: i64, finished_at: &str) -> i64 {
        let queue = db.get_queue(specialty_id).unwrap().unwrap();
        let mut flow =
            PatientFlow::open(patient_id, String::new(), None, &[queue], finished_at).unwrap();
        db.insert_flow(&mut flow).unwrap();

        let mut attendance = Attendance::new(
            flow.id,
            flow.memberships[0].id,
            patient_id,
            specialty_id,
            "Dr. Reis".into(),
        );
        attendance.procedures = vec!["Profilaxia".into(), "Raspagem, supragengival".into()];
        attendance.prescriptions = vec![PrescriptionItem {
            medication: Medication::FreeText { name: "Dipirona".into() },
            quantity: "1".into(),
            unit: "comprimido".into(),
            frequency: "6/6h".into(),
        }];
        attendance.finished_at = Some(finished_at.into());
        db.insert_attendance(&attendance).unwrap()
    }

    fn setup_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        for (id, name) in [(1, "Odontologia"), (2, "Clínica Geral")] {
            db.upsert_specialty(&Specialty { id, name: name.into() }).unwrap();
            db.upsert_queue(&Queue {
                id,
                name: name.into(),
                active: true,
                specialty_id: id,
            })
            .unwrap();
        }
        db.insert_patient(&Patient::new("Maria \"Preta\" Silva".into()))
            .unwrap();
        db.insert_patient(&Patient::new("José".into())).unwrap();
        db
    }

    #[test]
    fn test_build_range() {
        let db = setup_db();
        finished(&db, 1, 1, "2024-03-01T10:00:00+00:00");
        finished(&db, 1, 2, "2024-03-02T10:00:00+00:00");
        finished(&db, 2, 1, "2024-03-05T10:00:00+00:00");

        let report = ConsolidatedReport::build(&db, "2024-03-01", "2024-03-02").unwrap();
        assert_eq!(report.lines.len(), 2);
        assert_eq!(report.patients, 1);
        assert_eq!(
            report.totals,
            vec![
                SpecialtyTotal { specialty_name: "Clínica Geral".into(), attendances: 1 },
                SpecialtyTotal { specialty_name: "Odontologia".into(), attendances: 1 },
            ]
        );
    }

    #[test]
    fn test_csv_escaping() {
        let db = setup_db();
        finished(&db, 1, 1, "2024-03-01T10:00:00+00:00");

        let csv = ConsolidatedReport::build(&db, "2024-03-01", "2024-03-01")
            .unwrap()
            .to_csv();
        let mut rows = csv.lines();
        assert!(rows.next().unwrap().starts_with("atendimento,data"));
        let row = rows.next().unwrap();
        assert!(row.contains("\"Maria \"\"Preta\"\" Silva\""));
        assert!(row.contains("\"Profilaxia; Raspagem, supragengival\""));
        assert!(row.ends_with(",1,0"));
    }

    #[test]
    fn test_invalid_range() {
        let db = setup_db();
        assert!(matches!(
            ConsolidatedReport::build(&db, "2024-03-05", "2024-03-01"),
            Err(ReportError::InvalidRange { .. })
        ));
        assert!(matches!(
            ConsolidatedReport::build(&db, "ontem", "2024-03-01"),
            Err(ReportError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("simple"), "simple");
        assert_eq!(escape_csv("with,comma"), "\"with,comma\"");
        assert_eq!(escape_csv("with\"quote"), "\"with\"\"quote\"");
    }
}
