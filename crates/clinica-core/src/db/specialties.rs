//! Specialty and queue reference data.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbResult};
use crate::models::{Queue, Specialty};

impl Database {
    /// Insert or update a specialty.
    pub fn upsert_specialty(&self, specialty: &Specialty) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO specialties (id, name) VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name
            "#,
            params![specialty.id, specialty.name],
        )?;
        Ok(())
    }

    pub fn get_specialty(&self, id: i64) -> DbResult<Option<Specialty>> {
        self.conn
            .query_row(
                "SELECT id, name FROM specialties WHERE id = ?",
                [id],
                |row| {
                    Ok(Specialty {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    /// List all specialties by name.
    pub fn list_specialties(&self) -> DbResult<Vec<Specialty>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM specialties ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(Specialty {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Insert or update a queue.
    pub fn upsert_queue(&self, queue: &Queue) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO queues (id, name, active, specialty_id) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                active = excluded.active,
                specialty_id = excluded.specialty_id
            "#,
            params![queue.id, queue.name, queue.active, queue.specialty_id],
        )?;
        Ok(())
    }

    pub fn get_queue(&self, id: i64) -> DbResult<Option<Queue>> {
        self.conn
            .query_row(
                "SELECT id, name, active, specialty_id FROM queues WHERE id = ?",
                [id],
                queue_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List queues, optionally only active ones.
    pub fn list_queues(&self, active_only: bool) -> DbResult<Vec<Queue>> {
        let sql = if active_only {
            "SELECT id, name, active, specialty_id FROM queues WHERE active = 1 ORDER BY name"
        } else {
            "SELECT id, name, active, specialty_id FROM queues ORDER BY name"
        };
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], queue_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Active queue serving a specialty (lowest ID when several exist).
    pub fn active_queue_for_specialty(&self, specialty_id: i64) -> DbResult<Option<Queue>> {
        self.conn
            .query_row(
                r#"
                SELECT id, name, active, specialty_id FROM queues
                WHERE specialty_id = ? AND active = 1
                ORDER BY id
                LIMIT 1
                "#,
                [specialty_id],
                queue_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Deactivate a queue. Patients already waiting stay in it.
    pub fn deactivate_queue(&self, id: i64) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("UPDATE queues SET active = 0 WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

fn queue_from_row(row: &Row<'_>) -> rusqlite::Result<Queue> {
    Ok(Queue {
        id: row.get(0)?,
        name: row.get(1)?,
        active: row.get(2)?,
        specialty_id: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.upsert_specialty(&Specialty {
            id: 1,
            name: "Odontologia".into(),
        })
        .unwrap();
        db.upsert_specialty(&Specialty {
            id: 2,
            name: "Clínica Geral".into(),
        })
        .unwrap();
        db
    }

    #[test]
    fn test_specialties() {
        let db = setup_db();
        let all = db.list_specialties().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "Clínica Geral");
        assert_eq!(db.get_specialty(1).unwrap().unwrap().name, "Odontologia");
        assert!(db.get_specialty(3).unwrap().is_none());
    }

    #[test]
    fn test_active_queue_lookup() {
        let db = setup_db();
        db.upsert_queue(&Queue {
            id: 10,
            name: "Odonto manhã".into(),
            active: false,
            specialty_id: 1,
        })
        .unwrap();
        db.upsert_queue(&Queue {
            id: 11,
            name: "Odonto tarde".into(),
            active: true,
            specialty_id: 1,
        })
        .unwrap();

        assert_eq!(db.active_queue_for_specialty(1).unwrap().unwrap().id, 11);
        assert!(db.active_queue_for_specialty(2).unwrap().is_none());
        assert_eq!(db.list_queues(true).unwrap().len(), 1);
        assert_eq!(db.list_queues(false).unwrap().len(), 2);

        db.deactivate_queue(11).unwrap();
        assert!(db.active_queue_for_specialty(1).unwrap().is_none());
        assert!(!db.get_queue(11).unwrap().unwrap().active);
    }
}
