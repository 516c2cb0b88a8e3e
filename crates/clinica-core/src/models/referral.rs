//! Referral (encaminhamento) models.

use serde::{Deserialize, Serialize};

/// Request to place a patient in another specialty's queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Referral {
    /// Store-assigned ID (0 until inserted)
    pub id: i64,
    /// Flow the referral extends (atendimentoId)
    pub flow_id: i64,
    pub patient_id: i64,
    /// Target specialty
    pub specialty_id: i64,
    /// Membership being attended when the referral was made
    pub from_membership_id: Option<i64>,
    pub reason: Option<String>,
    pub created_at: String,
}

impl Referral {
    pub fn new(flow_id: i64, patient_id: i64, specialty_id: i64) -> Self {
        Self {
            id: 0,
            flow_id,
            patient_id,
            specialty_id,
            from_membership_id: None,
            reason: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
