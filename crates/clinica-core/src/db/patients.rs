//! Patient database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{only_digits, Patient, Sex};
use crate::search::fold;

const PATIENT_COLUMNS: &str = r#"
    id, name, cpf, birth_date, sex, blood_type, parent1, parent2,
    address, reference_farm, created_at, updated_at
"#;

impl Database {
    /// Insert a new patient and return the assigned ID.
    pub fn insert_patient(&self, patient: &Patient) -> DbResult<i64> {
        let address_json = serde_json::to_string(&patient.address)?;
        let cpf_digits = patient.cpf_digits().filter(|d| !d.is_empty());

        self.conn
            .execute(
                r#"
                INSERT INTO patients (
                    name, name_folded, cpf, cpf_digits, birth_date, sex, blood_type,
                    parent1, parent2, address, state, reference_farm, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                "#,
                params![
                    patient.name,
                    fold(&patient.name),
                    patient.cpf,
                    cpf_digits,
                    patient.birth_date,
                    patient.sex.map(|s| s.code()),
                    patient.blood_type,
                    patient.parent1,
                    patient.parent2,
                    address_json,
                    patient.address.state,
                    patient.reference_farm,
                    patient.created_at,
                    patient.updated_at,
                ],
            )
            .map_err(duplicate_cpf)?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Update an existing patient.
    pub fn update_patient(&self, patient: &Patient) -> DbResult<bool> {
        let address_json = serde_json::to_string(&patient.address)?;
        let cpf_digits = patient.cpf_digits().filter(|d| !d.is_empty());

        let rows_affected = self
            .conn
            .execute(
                r#"
                UPDATE patients SET
                    name = ?2,
                    name_folded = ?3,
                    cpf = ?4,
                    cpf_digits = ?5,
                    birth_date = ?6,
                    sex = ?7,
                    blood_type = ?8,
                    parent1 = ?9,
                    parent2 = ?10,
                    address = ?11,
                    state = ?12,
                    reference_farm = ?13,
                    updated_at = datetime('now')
                WHERE id = ?1
                "#,
                params![
                    patient.id,
                    patient.name,
                    fold(&patient.name),
                    patient.cpf,
                    cpf_digits,
                    patient.birth_date,
                    patient.sex.map(|s| s.code()),
                    patient.blood_type,
                    patient.parent1,
                    patient.parent2,
                    address_json,
                    patient.address.state,
                    patient.reference_farm,
                ],
            )
            .map_err(duplicate_cpf)?;
        Ok(rows_affected > 0)
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, id: i64) -> DbResult<Option<Patient>> {
        let sql = format!("SELECT {} FROM patients WHERE id = ?", PATIENT_COLUMNS);
        self.conn
            .query_row(&sql, [id], PatientRow::from_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Get a patient by CPF (mask ignored).
    pub fn get_patient_by_cpf(&self, cpf: &str) -> DbResult<Option<Patient>> {
        let sql = format!("SELECT {} FROM patients WHERE cpf_digits = ?", PATIENT_COLUMNS);
        self.conn
            .query_row(&sql, [only_digits(cpf)], PatientRow::from_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Search patients by name, record number or CPF.
    ///
    /// Name matching ignores case and diacritics; CPF matches with or without mask.
    pub fn search_patients(&self, query: &str, limit: usize) -> DbResult<Vec<Patient>> {
        let folded = fold(query);
        if folded.is_empty() {
            return self.list_patients(Some(limit));
        }
        let digits = only_digits(query);

        let sql = format!(
            r#"
            SELECT {}
            FROM patients
            WHERE instr(name_folded, ?1) > 0
               OR instr(CAST(id AS TEXT), ?1) > 0
               OR instr(lower(coalesce(cpf, '')), ?1) > 0
               OR (?2 <> '' AND instr(coalesce(cpf_digits, ''), ?2) > 0)
            ORDER BY name_folded
            LIMIT ?3
            "#,
            PATIENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![folded, digits, limit as i64], PatientRow::from_row)?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }
        Ok(patients)
    }

    /// List patients ordered by name.
    pub fn list_patients(&self, limit: Option<usize>) -> DbResult<Vec<Patient>> {
        let sql = format!(
            "SELECT {} FROM patients ORDER BY name_folded LIMIT ?",
            PATIENT_COLUMNS
        );
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([limit], PatientRow::from_row)?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }
        Ok(patients)
    }

    /// Count registered patients.
    pub fn count_patients(&self) -> DbResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))?)
    }
}

fn duplicate_cpf(err: rusqlite::Error) -> DbError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DbError::Constraint("CPF already registered".into())
        }
        _ => DbError::Sqlite(err),
    }
}

/// Intermediate row struct for database mapping.
struct PatientRow {
    id: i64,
    name: String,
    cpf: Option<String>,
    birth_date: Option<String>,
    sex: Option<String>,
    blood_type: Option<String>,
    parent1: Option<String>,
    parent2: Option<String>,
    address: String,
    reference_farm: Option<String>,
    created_at: String,
    updated_at: String,
}

impl PatientRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            cpf: row.get(2)?,
            birth_date: row.get(3)?,
            sex: row.get(4)?,
            blood_type: row.get(5)?,
            parent1: row.get(6)?,
            parent2: row.get(7)?,
            address: row.get(8)?,
            reference_farm: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

impl TryFrom<PatientRow> for Patient {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        Ok(Patient {
            id: row.id,
            name: row.name,
            cpf: row.cpf,
            birth_date: row.birth_date,
            sex: row.sex.as_deref().and_then(Sex::from_code),
            blood_type: row.blood_type,
            parent1: row.parent1,
            parent2: row.parent2,
            address: serde_json::from_str(&row.address)?,
            reference_farm: row.reference_farm,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
