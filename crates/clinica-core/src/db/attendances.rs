//! Attendance database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::Attendance;

const ATTENDANCE_COLUMNS: &str = r#"
    id, flow_id, membership_id, patient_id, specialty_id, professional, evolution,
    prescriptions, procedures, exam_requests, odontogram, started_at, finished_at
"#;

impl Database {
    /// Insert an attendance and return the assigned ID.
    pub fn insert_attendance(&self, attendance: &Attendance) -> DbResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO attendances (
                flow_id, membership_id, patient_id, specialty_id, professional, evolution,
                prescriptions, procedures, exam_requests, odontogram, started_at, finished_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                attendance.flow_id,
                attendance.membership_id,
                attendance.patient_id,
                attendance.specialty_id,
                attendance.professional,
                attendance.evolution,
                serde_json::to_string(&attendance.prescriptions)?,
                serde_json::to_string(&attendance.procedures)?,
                serde_json::to_string(&attendance.exam_requests)?,
                serde_json::to_string(&attendance.odontogram)?,
                attendance.started_at,
                attendance.finished_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Update the clinical content of an attendance.
    ///
    /// Finished attendances are not modified; returns `false` for them.
    pub fn update_attendance(&self, attendance: &Attendance) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE attendances SET
                professional = ?2,
                evolution = ?3,
                prescriptions = ?4,
                procedures = ?5,
                exam_requests = ?6,
                odontogram = ?7,
                finished_at = ?8
            WHERE id = ?1 AND finished_at IS NULL
            "#,
            params![
                attendance.id,
                attendance.professional,
                attendance.evolution,
                serde_json::to_string(&attendance.prescriptions)?,
                serde_json::to_string(&attendance.procedures)?,
                serde_json::to_string(&attendance.exam_requests)?,
                serde_json::to_string(&attendance.odontogram)?,
                attendance.finished_at,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    pub fn get_attendance(&self, id: i64) -> DbResult<Option<Attendance>> {
        let sql = format!("SELECT {} FROM attendances WHERE id = ?", ATTENDANCE_COLUMNS);
        self.conn
            .query_row(&sql, [id], AttendanceRow::from_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Unfinished attendance opened against a membership.
    pub fn open_attendance_for_membership(
        &self,
        membership_id: i64,
    ) -> DbResult<Option<Attendance>> {
        let sql = format!(
            "SELECT {} FROM attendances WHERE membership_id = ? AND finished_at IS NULL ORDER BY id DESC LIMIT 1",
            ATTENDANCE_COLUMNS
        );
        self.conn
            .query_row(&sql, [membership_id], AttendanceRow::from_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// All attendances of a patient, newest first.
    pub fn list_attendances_for_patient(&self, patient_id: i64) -> DbResult<Vec<Attendance>> {
        let sql = format!(
            "SELECT {} FROM attendances WHERE patient_id = ? ORDER BY started_at DESC, id DESC",
            ATTENDANCE_COLUMNS
        );
        self.query_attendances(&sql, params![patient_id])
    }

    /// Finished attendances whose finish date falls in `[from, to]` (`YYYY-MM-DD`).
    pub fn list_finished_attendances(&self, from: &str, to: &str) -> DbResult<Vec<Attendance>> {
        let sql = format!(
            r#"
            SELECT {} FROM attendances
            WHERE finished_at IS NOT NULL
              AND substr(finished_at, 1, 10) BETWEEN ?1 AND ?2
            ORDER BY finished_at, id
            "#,
            ATTENDANCE_COLUMNS
        );
        self.query_attendances(&sql, params![from, to])
    }

    fn query_attendances(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> DbResult<Vec<Attendance>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, AttendanceRow::from_row)?;

        let mut attendances = Vec::new();
        for row in rows {
            attendances.push(row?.try_into()?);
        }
        Ok(attendances)
    }
}

/// Intermediate row struct for database mapping.
struct AttendanceRow {
    id: i64,
    flow_id: i64,
    membership_id: i64,
    patient_id: i64,
    specialty_id: i64,
    professional: String,
    evolution: String,
    prescriptions: String,
    procedures: String,
    exam_requests: String,
    odontogram: String,
    started_at: String,
    finished_at: Option<String>,
}

impl AttendanceRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            flow_id: row.get(1)?,
            membership_id: row.get(2)?,
            patient_id: row.get(3)?,
            specialty_id: row.get(4)?,
            professional: row.get(5)?,
            evolution: row.get(6)?,
            prescriptions: row.get(7)?,
            procedures: row.get(8)?,
            exam_requests: row.get(9)?,
            odontogram: row.get(10)?,
            started_at: row.get(11)?,
            finished_at: row.get(12)?,
        })
    }
}

impl TryFrom<AttendanceRow> for Attendance {
    type Error = DbError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        Ok(Attendance {
            id: row.id,
            flow_id: row.flow_id,
            membership_id: row.membership_id,
            patient_id: row.patient_id,
            specialty_id: row.specialty_id,
            professional: row.professional,
            evolution: row.evolution,
            prescriptions: serde_json::from_str(&row.prescriptions)?,
            procedures: serde_json::from_str(&row.procedures)?,
            exam_requests: serde_json::from_str(&row.exam_requests)?,
            odontogram: serde_json::from_str(&row.odontogram)?,
            started_at: row.started_at,
            finished_at: row.finished_at,
        })
    }
}
