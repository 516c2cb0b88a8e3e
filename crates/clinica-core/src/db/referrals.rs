//! Referral database operations.

use rusqlite::params;

use super::{Database, DbResult};
use crate::models::Referral;

impl Database {
    /// Insert a referral and return the assigned ID.
    pub fn insert_referral(&self, referral: &Referral) -> DbResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO referrals (
                flow_id, patient_id, specialty_id, from_membership_id, reason, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                referral.flow_id,
                referral.patient_id,
                referral.specialty_id,
                referral.from_membership_id,
                referral.reason,
                referral.created_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Referrals made within a flow, oldest first.
    pub fn list_referrals_for_flow(&self, flow_id: i64) -> DbResult<Vec<Referral>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, flow_id, patient_id, specialty_id, from_membership_id, reason, created_at
            FROM referrals
            WHERE flow_id = ?
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map([flow_id], |row| {
            Ok(Referral {
                id: row.get(0)?,
                flow_id: row.get(1)?,
                patient_id: row.get(2)?,
                specialty_id: row.get(3)?,
                from_membership_id: row.get(4)?,
                reason: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Patient, PatientFlow, Queue, Specialty};

    #[test]
    fn test_insert_and_list() {
        let db = Database::open_in_memory().unwrap();
        let patient_id = db.insert_patient(&Patient::new("Bia".into())).unwrap();
        for id in [1, 2] {
            db.upsert_specialty(&Specialty {
                id,
                name: format!("Especialidade {}", id),
            })
            .unwrap();
        }
        let queue = Queue {
            id: 1,
            name: "Fila".into(),
            active: true,
            specialty_id: 1,
        };
        db.upsert_queue(&queue).unwrap();
        let mut flow = PatientFlow::open(patient_id, "Bia".into(), None, &[queue], "now").unwrap();
        db.insert_flow(&mut flow).unwrap();

        let mut referral = Referral::new(flow.id, patient_id, 2);
        referral.reason = Some("Avaliação nutricional".into());
        referral.from_membership_id = Some(flow.memberships[0].id);
        let id = db.insert_referral(&referral).unwrap();

        let listed = db.list_referrals_for_flow(flow.id).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
        assert_eq!(listed[0].reason.as_deref(), Some("Avaliação nutricional"));
    }
}
