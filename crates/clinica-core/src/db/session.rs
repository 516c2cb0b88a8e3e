//! Persisted session keys.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult};

/// Key holding the bearer token.
pub const AUTH_TOKEN_KEY: &str = "authToken";
/// Key holding the logged-in user's profile as JSON.
pub const USER_DATA_KEY: &str = "userData";

impl Database {
    /// Get a session value.
    pub fn get_session_value(&self, key: &str) -> DbResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM session_state WHERE key = ?",
                [key],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Set a session value.
    pub fn set_session_value(&self, key: &str, value: &str) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO session_state (key, value, updated_at)
            VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = datetime('now')
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    /// Remove a session value. Returns `true` if it existed.
    pub fn delete_session_value(&self, key: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM session_state WHERE key = ?", [key])?;
        Ok(rows_affected > 0)
    }
}
