//! Per-patient attendance history (read-only rollup).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::attendance::{Attendance, ExamRequest, PrescriptionItem};
use super::patient::Patient;
use super::specialty::Specialty;

/// One past attendance as listed in the history screen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttendanceSummary {
    pub attendance_id: i64,
    pub flow_id: i64,
    pub specialty_id: i64,
    pub specialty_name: String,
    pub professional: String,
    pub started_at: String,
    pub finished_at: String,
    pub evolution: String,
    pub prescriptions: Vec<PrescriptionItem>,
    pub procedures: Vec<String>,
    pub exam_requests: Vec<ExamRequest>,
}

/// History of a patient: finished attendances, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct History {
    pub patient: Patient,
    pub total_attendances: usize,
    pub attendances: Vec<AttendanceSummary>,
}

impl History {
    /// Build the rollup from a patient's attendances.
    ///
    /// Unfinished attendances and attendances of other patients are skipped.
    pub fn build(patient: Patient, attendances: &[Attendance], specialties: &[Specialty]) -> Self {
        let names: HashMap<i64, &str> = specialties
            .iter()
            .map(|s| (s.id, s.name.as_str()))
            .collect();

        let mut summaries: Vec<AttendanceSummary> = attendances
            .iter()
            .filter(|a| a.patient_id == patient.id)
            .filter_map(|a| {
                let finished_at = a.finished_at.clone()?;
                Some(AttendanceSummary {
                    attendance_id: a.id,
                    flow_id: a.flow_id,
                    specialty_id: a.specialty_id,
                    specialty_name: names
                        .get(&a.specialty_id)
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| format!("Especialidade {}", a.specialty_id)),
                    professional: a.professional.clone(),
                    started_at: a.started_at.clone(),
                    finished_at,
                    evolution: a.evolution.clone(),
                    prescriptions: a.prescriptions.clone(),
                    procedures: a.all_procedures(),
                    exam_requests: a.exam_requests.clone(),
                })
            })
            .collect();

        // RFC 3339 strings in UTC sort chronologically
        summaries.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));

        Self {
            patient,
            total_attendances: summaries.len(),
            attendances: summaries,
        }
    }

    /// Most recent attendance, if any.
    pub fn latest(&self) -> Option<&AttendanceSummary> {
        self.attendances.first()
    }

    /// Attendances for one specialty.
    pub fn for_specialty(&self, specialty_id: i64) -> impl Iterator<Item = &AttendanceSummary> {
        self.attendances
            .iter()
            .filter(move |a| a.specialty_id == specialty_id)
    }
}
