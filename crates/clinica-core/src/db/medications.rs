//! Medication catalog database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::CatalogMedication;
use crate::search::fold;

impl Database {
    /// Insert or update a catalog medication.
    pub fn upsert_medication(&self, item: &CatalogMedication) -> DbResult<()> {
        let aliases_json = serde_json::to_string(&item.aliases)?;

        self.conn.execute(
            r#"
            INSERT INTO medication_catalog (
                id, name, presentation, aliases, search_text, active, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                presentation = excluded.presentation,
                aliases = excluded.aliases,
                search_text = excluded.search_text,
                active = excluded.active,
                updated_at = datetime('now')
            "#,
            params![
                item.id,
                item.name,
                item.presentation,
                aliases_json,
                search_text(item),
                item.active,
            ],
        )?;
        Ok(())
    }

    /// Get a catalog medication by ID.
    pub fn get_medication(&self, id: i64) -> DbResult<Option<CatalogMedication>> {
        self.conn
            .query_row(
                r#"
                SELECT id, name, presentation, aliases, active
                FROM medication_catalog
                WHERE id = ?
                "#,
                [id],
                MedicationRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Search the catalog using FTS5 (BM25 ranking). Accents are ignored.
    pub fn search_medications(&self, query: &str, limit: usize) -> DbResult<Vec<CatalogMedication>> {
        let escaped_query = escape_fts_query(&fold(query));
        if escaped_query.is_empty() {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT c.id, c.name, c.presentation, c.aliases, c.active,
                   bm25(medication_catalog_fts) as rank
            FROM medication_catalog c
            JOIN medication_catalog_fts fts ON c.id = fts.rowid
            WHERE medication_catalog_fts MATCH ?
            AND c.active = 1
            ORDER BY rank
            LIMIT ?
            "#,
        )?;

        let rows = stmt.query_map(params![escaped_query, limit as i64], MedicationRow::from_row)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?.try_into()?);
        }
        Ok(items)
    }

    /// List catalog medications by name.
    pub fn list_medications(&self, active_only: bool) -> DbResult<Vec<CatalogMedication>> {
        let sql = if active_only {
            r#"
            SELECT id, name, presentation, aliases, active
            FROM medication_catalog
            WHERE active = 1
            ORDER BY name
            "#
        } else {
            r#"
            SELECT id, name, presentation, aliases, active
            FROM medication_catalog
            ORDER BY name
            "#
        };

        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], MedicationRow::from_row)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?.try_into()?);
        }
        Ok(items)
    }

    /// Mark a medication as no longer prescribable (soft delete).
    pub fn deactivate_medication(&self, id: i64) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE medication_catalog SET active = 0, updated_at = datetime('now') WHERE id = ?",
            [id],
        )?;
        Ok(rows_affected > 0)
    }
}

/// Folded text indexed for full-text search.
fn search_text(item: &CatalogMedication) -> String {
    let mut parts = vec![item.name.as_str()];
    if let Some(presentation) = &item.presentation {
        parts.push(presentation);
    }
    parts.extend(item.aliases.iter().map(String::as_str));
    fold(&parts.join(" "))
}

/// Intermediate row struct for database mapping.
struct MedicationRow {
    id: i64,
    name: String,
    presentation: Option<String>,
    aliases: String,
    active: bool,
}

impl MedicationRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            presentation: row.get(2)?,
            aliases: row.get(3)?,
            active: row.get(4)?,
        })
    }
}

impl TryFrom<MedicationRow> for CatalogMedication {
    type Error = DbError;

    fn try_from(row: MedicationRow) -> Result<Self, Self::Error> {
        Ok(CatalogMedication {
            id: row.id,
            name: row.name,
            presentation: row.presentation,
            aliases: serde_json::from_str(&row.aliases)?,
            active: row.active,
        })
    }
}

/// Escape special FTS5 characters and prepare query for prefix matching.
fn escape_fts_query(query: &str) -> String {
    // Remove special FTS5 operators and add wildcard for prefix matching
    let cleaned: String = query
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    cleaned
        .split_whitespace()
        .map(|word| format!("{}*", word))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        let db = Database::open_in_memory().unwrap();

        let mut dipirona = CatalogMedication::new(1, "Dipirona Sódica".into());
        dipirona.presentation = Some("500mg comprimido".into());
        dipirona.aliases = vec!["novalgina".into()];
        db.upsert_medication(&dipirona).unwrap();

        let mut amoxi = CatalogMedication::new(2, "Amoxicilina".into());
        amoxi.presentation = Some("500mg cápsula".into());
        db.upsert_medication(&amoxi).unwrap();

        db
    }

    #[test]
    fn test_upsert_and_get() {
        let db = setup_db();
        let item = db.get_medication(1).unwrap().unwrap();
        assert_eq!(item.name, "Dipirona Sódica");
        assert_eq!(item.aliases, vec!["novalgina"]);
        assert!(item.active);
    }

    #[test]
    fn test_upsert_updates() {
        let db = setup_db();
        let mut item = db.get_medication(2).unwrap().unwrap();
        item.name = "Amoxicilina Tri-hidratada".into();
        db.upsert_medication(&item).unwrap();

        assert_eq!(
            db.get_medication(2).unwrap().unwrap().name,
            "Amoxicilina Tri-hidratada"
        );
    }

    #[test]
    fn test_search_accent_insensitive() {
        let db = setup_db();

        // Name without accent
        let results = db.search_medications("sodica", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 1);

        // Alias
        let results = db.search_medications("Novalgina", 10).unwrap();
        assert_eq!(results[0].id, 1);

        // Prefix with accent
        let results = db.search_medications("cáps", 10).unwrap();
        assert_eq!(results[0].id, 2);

        assert!(db.search_medications("  ", 10).unwrap().is_empty());
    }

    #[test]
    fn test_deactivate() {
        let db = setup_db();
        db.deactivate_medication(1).unwrap();

        assert!(db.search_medications("dipirona", 10).unwrap().is_empty());
        assert!(!db.get_medication(1).unwrap().unwrap().active);
        assert_eq!(db.list_medications(true).unwrap().len(), 1);
        assert_eq!(db.list_medications(false).unwrap().len(), 2);
    }

    #[test]
    fn test_escape_fts_query() {
        assert_eq!(escape_fts_query("amox \"500\""), "amox* 500*");
        assert_eq!(escape_fts_query("a-b"), "ab*");
    }
}
