//! SQLite schema definition.

/// Complete database schema for the clinic store.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    name_folded TEXT NOT NULL,                   -- lowercase, diacritics removed
    cpf TEXT,
    cpf_digits TEXT,
    birth_date TEXT,
    sex TEXT CHECK (sex IS NULL OR sex IN ('F', 'M', 'O')),
    blood_type TEXT,
    parent1 TEXT,
    parent2 TEXT,
    address TEXT NOT NULL DEFAULT '{}',          -- JSON object (Address)
    state TEXT,                                  -- copy of address.state for filtering
    reference_farm TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_patients_name_folded ON patients(name_folded);
CREATE UNIQUE INDEX IF NOT EXISTS idx_patients_cpf ON patients(cpf_digits)
    WHERE cpf_digits IS NOT NULL AND cpf_digits <> '';

-- ============================================================================
-- Specialties and Queues (reference data)
-- ============================================================================

CREATE TABLE IF NOT EXISTS specialties (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS queues (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    specialty_id INTEGER NOT NULL REFERENCES specialties(id)
);

CREATE INDEX IF NOT EXISTS idx_queues_specialty ON queues(specialty_id);

-- ============================================================================
-- Triages
-- ============================================================================

CREATE TABLE IF NOT EXISTS triages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id INTEGER NOT NULL REFERENCES patients(id),
    payload TEXT NOT NULL,                       -- JSON Triage
    collected_at TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_triages_patient ON triages(patient_id);
CREATE INDEX IF NOT EXISTS idx_triages_collected ON triages(collected_at);

-- ============================================================================
-- Patient Flows and Queue Memberships
-- ============================================================================

CREATE TABLE IF NOT EXISTS patient_flows (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id INTEGER NOT NULL REFERENCES patients(id),
    patient_name TEXT NOT NULL,
    triage_id INTEGER REFERENCES triages(id),
    office TEXT,
    entered_at TEXT NOT NULL,
    exited_at TEXT,                              -- NULL while open
    in_attendance INTEGER,                       -- membership being attended
    closure_digest TEXT                          -- SHA-256 of the closed flow
);

CREATE INDEX IF NOT EXISTS idx_flows_patient ON patient_flows(patient_id);
CREATE INDEX IF NOT EXISTS idx_flows_open ON patient_flows(exited_at);

CREATE TABLE IF NOT EXISTS queue_memberships (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    flow_id INTEGER NOT NULL REFERENCES patient_flows(id),
    queue_id INTEGER NOT NULL REFERENCES queues(id),
    specialty_id INTEGER NOT NULL REFERENCES specialties(id),
    state TEXT NOT NULL DEFAULT 'waiting'
        CHECK (state IN ('waiting', 'attended', 'abandoned')),
    entered_at TEXT NOT NULL,
    resolved_at TEXT,
    referred_from INTEGER REFERENCES queue_memberships(id)
);

CREATE INDEX IF NOT EXISTS idx_memberships_flow ON queue_memberships(flow_id);
CREATE INDEX IF NOT EXISTS idx_memberships_queue_state ON queue_memberships(queue_id, state);

-- Closed flows are immutable
CREATE TRIGGER IF NOT EXISTS patient_flows_closed_guard BEFORE UPDATE ON patient_flows
WHEN old.exited_at IS NOT NULL
BEGIN
    SELECT RAISE(ABORT, 'Closed flows cannot be modified');
END;

CREATE TRIGGER IF NOT EXISTS queue_memberships_closed_guard BEFORE UPDATE ON queue_memberships
WHEN (SELECT exited_at FROM patient_flows WHERE id = old.flow_id) IS NOT NULL
BEGIN
    SELECT RAISE(ABORT, 'Closed flows cannot be modified');
END;

CREATE TRIGGER IF NOT EXISTS queue_memberships_closed_insert_guard BEFORE INSERT ON queue_memberships
WHEN (SELECT exited_at FROM patient_flows WHERE id = new.flow_id) IS NOT NULL
BEGIN
    SELECT RAISE(ABORT, 'Closed flows cannot be modified');
END;

-- ============================================================================
-- Attendances and Referrals
-- ============================================================================

CREATE TABLE IF NOT EXISTS attendances (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    flow_id INTEGER NOT NULL REFERENCES patient_flows(id),
    membership_id INTEGER NOT NULL REFERENCES queue_memberships(id),
    patient_id INTEGER NOT NULL REFERENCES patients(id),
    specialty_id INTEGER NOT NULL REFERENCES specialties(id),
    professional TEXT NOT NULL,
    evolution TEXT NOT NULL DEFAULT '',
    prescriptions TEXT NOT NULL DEFAULT '[]',    -- JSON array of PrescriptionItem
    procedures TEXT NOT NULL DEFAULT '[]',       -- JSON array of strings
    exam_requests TEXT NOT NULL DEFAULT '[]',    -- JSON array of ExamRequest
    odontogram TEXT NOT NULL DEFAULT '{}',       -- JSON ToothSelectionsMap
    started_at TEXT NOT NULL,
    finished_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_attendances_patient ON attendances(patient_id);
CREATE INDEX IF NOT EXISTS idx_attendances_finished ON attendances(finished_at);

CREATE TABLE IF NOT EXISTS referrals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    flow_id INTEGER NOT NULL REFERENCES patient_flows(id),
    patient_id INTEGER NOT NULL REFERENCES patients(id),
    specialty_id INTEGER NOT NULL REFERENCES specialties(id),
    from_membership_id INTEGER REFERENCES queue_memberships(id),
    reason TEXT,
    created_at TEXT NOT NULL
);

-- ============================================================================
-- Medication Catalog
-- ============================================================================

CREATE TABLE IF NOT EXISTS medication_catalog (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    presentation TEXT,
    aliases TEXT NOT NULL DEFAULT '[]',          -- JSON array of strings
    search_text TEXT NOT NULL DEFAULT '',        -- folded name + aliases
    active INTEGER NOT NULL DEFAULT 1,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- FTS5 virtual table for full-text search
CREATE VIRTUAL TABLE IF NOT EXISTS medication_catalog_fts USING fts5(
    search_text,
    content='medication_catalog',
    content_rowid='id'
);

-- Triggers to keep FTS5 in sync with main table
CREATE TRIGGER IF NOT EXISTS medication_catalog_ai AFTER INSERT ON medication_catalog BEGIN
    INSERT INTO medication_catalog_fts(rowid, search_text)
    VALUES (new.id, new.search_text);
END;

CREATE TRIGGER IF NOT EXISTS medication_catalog_ad AFTER DELETE ON medication_catalog BEGIN
    INSERT INTO medication_catalog_fts(medication_catalog_fts, rowid, search_text)
    VALUES ('delete', old.id, old.search_text);
END;

CREATE TRIGGER IF NOT EXISTS medication_catalog_au AFTER UPDATE ON medication_catalog BEGIN
    INSERT INTO medication_catalog_fts(medication_catalog_fts, rowid, search_text)
    VALUES ('delete', old.id, old.search_text);
    INSERT INTO medication_catalog_fts(rowid, search_text)
    VALUES (new.id, new.search_text);
END;

-- ============================================================================
-- Session State
-- ============================================================================

CREATE TABLE IF NOT EXISTS session_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        assert!(conn.execute_batch(SCHEMA).is_ok());
    }

    #[test]
    fn test_fts_trigger() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute(
            "INSERT INTO medication_catalog (id, name, search_text) VALUES (?, ?, ?)",
            rusqlite::params![1, "Dipirona", "dipirona novalgina"],
        )
        .unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM medication_catalog_fts WHERE medication_catalog_fts MATCH 'novalgina'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_closed_flow_guard() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute(
            "INSERT INTO patients (id, name, name_folded) VALUES (1, 'Ana', 'ana')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO patient_flows (id, patient_id, patient_name, entered_at, exited_at)
             VALUES (1, 1, 'Ana', '2024-01-01', '2024-01-02')",
            [],
        )
        .unwrap();

        let result = conn.execute("UPDATE patient_flows SET office = 'X' WHERE id = 1", []);
        assert!(result.is_err());
    }

    #[test]
    fn test_membership_state_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn.execute_batch(
            "INSERT INTO patients (id, name, name_folded) VALUES (1, 'Ana', 'ana');
             INSERT INTO specialties (id, name) VALUES (1, 'Clínica');
             INSERT INTO queues (id, name, specialty_id) VALUES (1, 'Fila', 1);
             INSERT INTO patient_flows (id, patient_id, patient_name, entered_at) VALUES (1, 1, 'Ana', 'now');",
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO queue_memberships (flow_id, queue_id, specialty_id, state, entered_at)
             VALUES (1, 1, 1, 'lost', 'now')",
            [],
        );
        assert!(result.is_err());
    }
}
