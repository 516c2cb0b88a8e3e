//! Attendance (clinical encounter) models.

use serde::{Deserialize, Serialize};

use super::odontogram::ToothSelectionsMap;

/// Legacy clients tagged hand-typed medications with a millisecond timestamp
/// instead of a catalog ID. Anything at or above this value is such a tag.
pub const LEGACY_FREE_TEXT_ID_FLOOR: i64 = 1_000_000_000_000;

/// Medication referenced by a prescription line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Medication {
    /// Entry from the medication catalog
    Catalog { id: i64, name: String },
    /// Medication typed by the professional
    FreeText { name: String },
}

impl Medication {
    /// Interpret the legacy `{id, nome}` shape.
    pub fn from_legacy(id: i64, name: String) -> Self {
        if id >= LEGACY_FREE_TEXT_ID_FLOOR || id <= 0 {
            Medication::FreeText { name }
        } else {
            Medication::Catalog { id, name }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Medication::Catalog { name, .. } | Medication::FreeText { name } => name,
        }
    }

    pub fn catalog_id(&self) -> Option<i64> {
        match self {
            Medication::Catalog { id, .. } => Some(*id),
            Medication::FreeText { .. } => None,
        }
    }
}

/// One prescription line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrescriptionItem {
    pub medication: Medication,
    /// Quantity (qtd), as typed, e.g. "1" or "20 gotas"
    pub quantity: String,
    /// Unit of measure (um), e.g. "comprimido"
    pub unit: String,
    /// Frequency (freq), e.g. "8/8h por 7 dias"
    pub frequency: String,
}

impl PrescriptionItem {
    /// One-line rendering used in printed prescriptions.
    pub fn describe(&self) -> String {
        format!(
            "{} - {} {} - {}",
            self.medication.name(),
            self.quantity,
            self.unit,
            self.frequency
        )
    }
}

/// Requested exam.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExamRequest {
    pub name: String,
    pub notes: Option<String>,
}

/// A clinical encounter against one queue membership.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attendance {
    /// Store-assigned ID (0 until inserted)
    pub id: i64,
    pub flow_id: i64,
    pub membership_id: i64,
    pub patient_id: i64,
    pub specialty_id: i64,
    /// Attending professional
    pub professional: String,
    /// Evolution notes (evolução)
    pub evolution: String,
    pub prescriptions: Vec<PrescriptionItem>,
    pub procedures: Vec<String>,
    pub exam_requests: Vec<ExamRequest>,
    pub odontogram: ToothSelectionsMap,
    pub started_at: String,
    pub finished_at: Option<String>,
}

impl Attendance {
    /// Start a blank attendance.
    pub fn new(
        flow_id: i64,
        membership_id: i64,
        patient_id: i64,
        specialty_id: i64,
        professional: String,
    ) -> Self {
        Self {
            id: 0,
            flow_id,
            membership_id,
            patient_id,
            specialty_id,
            professional,
            evolution: String::new(),
            prescriptions: Vec::new(),
            procedures: Vec::new(),
            exam_requests: Vec::new(),
            odontogram: ToothSelectionsMap::new(),
            started_at: chrono::Utc::now().to_rfc3339(),
            finished_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Procedures performed, including those recorded per tooth.
    pub fn all_procedures(&self) -> Vec<String> {
        let mut all = self.procedures.clone();
        for (tooth, procedure) in self.odontogram.procedures() {
            all.push(format!("{} (dente {})", procedure, tooth));
        }
        all
    }
}
