//! Specialty and queue lookup models.

use serde::{Deserialize, Serialize};

/// A medical specialty (especialidade). Read-only reference data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Specialty {
    pub id: i64,
    pub name: String,
}

/// A named waiting line (fila) bound to exactly one specialty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Queue {
    pub id: i64,
    pub name: String,
    /// Inactive queues accept no new patients
    pub active: bool,
    pub specialty_id: i64,
}

impl Queue {
    /// Check whether this queue can receive the given specialty's patients.
    pub fn serves(&self, specialty_id: i64) -> bool {
        self.active && self.specialty_id == specialty_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_serves_only_when_active() {
        let mut queue = Queue {
            id: 1,
            name: "Odontologia".into(),
            active: true,
            specialty_id: 7,
        };
        assert!(queue.serves(7));
        assert!(!queue.serves(8));

        queue.active = false;
        assert!(!queue.serves(7));
    }
}
