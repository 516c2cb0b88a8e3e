//! Triage database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult};
use crate::models::Triage;

impl Database {
    /// Insert a triage and return the assigned ID.
    pub fn insert_triage(&self, triage: &Triage) -> DbResult<i64> {
        let payload = serde_json::to_string(triage)?;
        self.conn.execute(
            r#"
            INSERT INTO triages (patient_id, payload, collected_at, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            "#,
            params![triage.patient_id, payload, triage.collected_at],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Replace a stored triage.
    pub fn update_triage(&self, triage: &Triage) -> DbResult<bool> {
        let payload = serde_json::to_string(triage)?;
        let rows_affected = self.conn.execute(
            r#"
            UPDATE triages SET
                patient_id = ?2,
                payload = ?3,
                collected_at = ?4,
                updated_at = datetime('now')
            WHERE id = ?1
            "#,
            params![triage.id, triage.patient_id, payload, triage.collected_at],
        )?;
        Ok(rows_affected > 0)
    }

    pub fn get_triage(&self, id: i64) -> DbResult<Option<Triage>> {
        let row: Option<(i64, String)> = self
            .conn
            .query_row(
                "SELECT id, payload FROM triages WHERE id = ?",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        row.map(|(id, payload)| decode_triage(id, &payload))
            .transpose()
    }

    /// Triages of a patient, newest first.
    pub fn list_triages_for_patient(&self, patient_id: i64) -> DbResult<Vec<Triage>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, payload FROM triages
            WHERE patient_id = ?
            ORDER BY collected_at DESC, id DESC
            "#,
        )?;
        let rows = stmt.query_map([patient_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut triages = Vec::new();
        for row in rows {
            let (id, payload) = row?;
            triages.push(decode_triage(id, &payload)?);
        }
        Ok(triages)
    }

    /// Count triages collected on a day (`YYYY-MM-DD`).
    pub fn count_triages_on(&self, day: &str) -> DbResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM triages WHERE substr(collected_at, 1, 10) = ?",
            [day],
            |row| row.get(0),
        )?)
    }
}

/// The payload's own `id` is 0 for freshly inserted triages; the row ID wins.
fn decode_triage(id: i64, payload: &str) -> DbResult<Triage> {
    let mut triage: Triage = serde_json::from_str(payload)?;
    triage.id = id;
    Ok(triage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Patient, Specialty, YesNo};

    fn setup() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let patient_id = db.insert_patient(&Patient::new("Rita".into())).unwrap();
        (db, patient_id)
    }

    #[test]
    fn test_insert_and_get() {
        let (db, patient_id) = setup();

        let mut triage = Triage::new(patient_id, "Rita".into(), "Enf. Carla".into());
        triage.specialties = vec![Specialty {
            id: 1,
            name: "Odontologia".into(),
        }];
        triage.vitals.blood_pressure = Some("120/80".into());

        let id = db.insert_triage(&triage).unwrap();
        let stored = db.get_triage(id).unwrap().unwrap();
        assert_eq!(stored.id, id);
        assert_eq!(stored.specialty_ids(), vec![1]);
        assert_eq!(stored.vitals.blood_pressure_parts(), Some((120, 80)));
    }

    #[test]
    fn test_update_triage() {
        let (db, patient_id) = setup();

        let mut triage = Triage::new(patient_id, "Rita".into(), "Enf. Carla".into());
        triage.id = db.insert_triage(&triage).unwrap();

        triage.allergy = YesNo::Yes;
        triage.allergy_details = Some("Dipirona".into());
        assert!(db.update_triage(&triage).unwrap());

        let stored = db.get_triage(triage.id).unwrap().unwrap();
        assert_eq!(stored.allergy, YesNo::Yes);
        assert_eq!(stored.allergy_details.as_deref(), Some("Dipirona"));
        assert_eq!(db.list_triages_for_patient(patient_id).unwrap().len(), 1);
    }

    #[test]
    fn test_count_on_day() {
        let (db, patient_id) = setup();

        let mut triage = Triage::new(patient_id, "Rita".into(), "Enf. Carla".into());
        triage.collected_at = "2024-05-02T08:00:00+00:00".into();
        db.insert_triage(&triage).unwrap();

        assert_eq!(db.count_triages_on("2024-05-02").unwrap(), 1);
        assert_eq!(db.count_triages_on("2024-05-03").unwrap(), 0);
    }
}
