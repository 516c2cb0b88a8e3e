//! Triage (intake and vitals) models.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::specialty::Specialty;

/// Yes/no answers as the intake form records them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum YesNo {
    #[serde(rename = "sim")]
    Yes,
    #[default]
    #[serde(rename = "não", alias = "nao")]
    No,
}

impl YesNo {
    pub fn is_yes(&self) -> bool {
        matches!(self, YesNo::Yes)
    }
}

/// Vital signs collected at triage. All optional: the nurse records what was measured.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VitalSigns {
    /// Weight in kg
    pub weight_kg: Option<f64>,
    /// Axillary temperature in °C
    pub temperature_c: Option<f64>,
    /// Respiratory rate (FR), breaths per minute
    pub respiratory_rate: Option<u32>,
    /// Oxygen saturation (SatO2), percent
    pub oxygen_saturation: Option<u32>,
    /// Blood pressure (PA) as typed, e.g. "120/80"
    pub blood_pressure: Option<String>,
    /// Heart rate (FC), beats per minute
    pub heart_rate: Option<u32>,
}

impl VitalSigns {
    /// Parse blood pressure into (systolic, diastolic).
    pub fn blood_pressure_parts(&self) -> Option<(u32, u32)> {
        let raw = self.blood_pressure.as_deref()?;
        let (sys, dia) = raw.split_once(['/', 'x', 'X'])?;
        let sys: u32 = sys.trim().parse().ok()?;
        let dia: u32 = dia.trim().parse().ok()?;
        Some((sys, dia))
    }
}

/// A triage record (triagem) linked to a patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Triage {
    /// Store-assigned ID (0 until inserted)
    pub id: i64,
    pub patient_id: i64,
    /// Patient name as shown on the intake sheet
    pub patient_name: String,
    pub age: Option<u32>,
    /// Medical record number (prontuário)
    pub record_number: String,
    /// Specialties the patient should be queued for
    pub specialties: Vec<Specialty>,
    /// Situation / priority label chosen by the nurse
    pub situation: String,
    pub vitals: VitalSigns,
    pub comorbidity: YesNo,
    pub comorbidity_details: Option<String>,
    /// Medication taken in the last 24h
    pub medication_24h: String,
    pub allergy: YesNo,
    pub allergy_details: Option<String>,
    /// Professional who collected the data
    pub collected_by: String,
    /// Collection timestamp
    pub collected_at: String,
}

/// A single problem found when validating a triage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriageIssue {
    /// Allergy answered "sim" but no allergen listed
    AllergyDetailsMissing,
    /// Comorbidity answered "sim" but no description given
    ComorbidityDetailsMissing,
    /// No specialty selected, so the patient cannot be queued
    NoSpecialty,
    /// Blood pressure present but not in "sys/dia" form
    InvalidBloodPressure,
    /// SatO2 above 100%
    OxygenSaturationOutOfRange,
    /// Temperature outside a physiologically possible range
    TemperatureOutOfRange,
    MissingCollector,
}

impl std::fmt::Display for TriageIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            TriageIssue::AllergyDetailsMissing => "allergy marked but allergens not listed",
            TriageIssue::ComorbidityDetailsMissing => "comorbidity marked but not described",
            TriageIssue::NoSpecialty => "no specialty selected",
            TriageIssue::InvalidBloodPressure => "blood pressure must look like 120/80",
            TriageIssue::OxygenSaturationOutOfRange => "oxygen saturation above 100%",
            TriageIssue::TemperatureOutOfRange => "temperature outside 25-45 °C",
            TriageIssue::MissingCollector => "collecting professional not informed",
        };
        f.write_str(msg)
    }
}

/// Triage validation error.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid triage: {}", format_issues(.0))]
pub struct TriageError(pub Vec<TriageIssue>);

fn format_issues(issues: &[TriageIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn is_blank(text: &Option<String>) -> bool {
    text.as_deref().map_or(true, |t| t.trim().is_empty())
}

impl Triage {
    /// Create an empty triage for a patient.
    pub fn new(patient_id: i64, patient_name: String, collected_by: String) -> Self {
        Self {
            id: 0,
            patient_id,
            patient_name,
            age: None,
            record_number: String::new(),
            specialties: Vec::new(),
            situation: String::new(),
            vitals: VitalSigns::default(),
            comorbidity: YesNo::No,
            comorbidity_details: None,
            medication_24h: String::new(),
            allergy: YesNo::No,
            allergy_details: None,
            collected_by,
            collected_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// List every validation problem.
    pub fn issues(&self) -> Vec<TriageIssue> {
        let mut issues = Vec::new();

        if self.allergy.is_yes() && is_blank(&self.allergy_details) {
            issues.push(TriageIssue::AllergyDetailsMissing);
        }
        if self.comorbidity.is_yes() && is_blank(&self.comorbidity_details) {
            issues.push(TriageIssue::ComorbidityDetailsMissing);
        }
        if self.specialties.is_empty() {
            issues.push(TriageIssue::NoSpecialty);
        }
        if self.vitals.blood_pressure.is_some() && self.vitals.blood_pressure_parts().is_none() {
            issues.push(TriageIssue::InvalidBloodPressure);
        }
        if self.vitals.oxygen_saturation.is_some_and(|s| s > 100) {
            issues.push(TriageIssue::OxygenSaturationOutOfRange);
        }
        if self
            .vitals
            .temperature_c
            .is_some_and(|t| !(25.0..=45.0).contains(&t))
        {
            issues.push(TriageIssue::TemperatureOutOfRange);
        }
        if self.collected_by.trim().is_empty() {
            issues.push(TriageIssue::MissingCollector);
        }

        issues
    }

    /// Validate before storing or queueing.
    pub fn validate(&self) -> Result<(), TriageError> {
        let issues = self.issues();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(TriageError(issues))
        }
    }

    /// IDs of the selected specialties, in selection order.
    pub fn specialty_ids(&self) -> Vec<i64> {
        self.specialties.iter().map(|s| s.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_triage() -> Triage {
        let mut triage = Triage::new(1, "João da Silva".into(), "Enf. Ana".into());
        triage.specialties.push(Specialty {
            id: 1,
            name: "Clínica Geral".into(),
        });
        triage.vitals.blood_pressure = Some("120/80".into());
        triage.vitals.oxygen_saturation = Some(98);
        triage.vitals.temperature_c = Some(36.5);
        triage
    }

    #[test]
    fn test_valid_triage() {
        assert!(make_triage().validate().is_ok());
    }

    #[test]
    fn test_allergy_without_details_is_invalid() {
        let mut triage = make_triage();
        triage.allergy = YesNo::Yes;
        triage.allergy_details = Some("   ".into());

        let err = triage.validate().unwrap_err();
        assert_eq!(err.0, vec![TriageIssue::AllergyDetailsMissing]);

        triage.allergy_details = Some("dipirona".into());
        assert!(triage.validate().is_ok());
    }

    #[test]
    fn test_multiple_issues_reported() {
        let mut triage = make_triage();
        triage.specialties.clear();
        triage.vitals.blood_pressure = Some("alta".into());
        triage.vitals.oxygen_saturation = Some(130);

        let issues = triage.issues();
        assert!(issues.contains(&TriageIssue::NoSpecialty));
        assert!(issues.contains(&TriageIssue::InvalidBloodPressure));
        assert!(issues.contains(&TriageIssue::OxygenSaturationOutOfRange));
    }

    #[test]
    fn test_blood_pressure_parts() {
        let mut vitals = VitalSigns::default();
        vitals.blood_pressure = Some("130 x 85".into());
        assert_eq!(vitals.blood_pressure_parts(), Some((130, 85)));
    }

    #[test]
    fn test_yes_no_wire_format() {
        assert_eq!(serde_json::to_string(&YesNo::Yes).unwrap(), "\"sim\"");
        assert_eq!(serde_json::to_string(&YesNo::No).unwrap(), "\"não\"");
        let parsed: YesNo = serde_json::from_str("\"nao\"").unwrap();
        assert_eq!(parsed, YesNo::No);
    }
}
