//! Patient flow and queue membership operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::integrity::{hash_data, ClosureCheck};
use crate::models::{MembershipState, PatientFlow, QueueMembership};

const FLOW_COLUMNS: &str =
    "id, patient_id, patient_name, triage_id, office, entered_at, exited_at, in_attendance";

impl Database {
    /// Insert a new flow with its memberships. Assigns IDs in place.
    pub fn insert_flow(&self, flow: &mut PatientFlow) -> DbResult<i64> {
        self.in_transaction(|db| {
            db.conn.execute(
                r#"
                INSERT INTO patient_flows (
                    patient_id, patient_name, triage_id, office, entered_at, exited_at, in_attendance
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    flow.patient_id,
                    flow.patient_name,
                    flow.triage_id,
                    flow.office,
                    flow.entered_at,
                    flow.exited_at,
                    flow.in_attendance,
                ],
            )?;
            flow.id = db.conn.last_insert_rowid();

            for membership in flow.memberships.iter_mut() {
                membership.id = db.insert_membership(flow.id, membership)?;
            }
            Ok(flow.id)
        })
    }

    /// Persist a flow after a transition.
    ///
    /// New memberships (ID 0) are inserted and get their IDs assigned. When the
    /// flow is closed its closure digest is written in the same transaction.
    pub fn save_flow(&self, flow: &mut PatientFlow) -> DbResult<()> {
        self.in_transaction(|db| {
            for membership in flow.memberships.iter_mut() {
                if membership.id == 0 {
                    membership.id = db.insert_membership(flow.id, membership)?;
                } else {
                    db.conn.execute(
                        r#"
                        UPDATE queue_memberships SET state = ?2, resolved_at = ?3
                        WHERE id = ?1 AND flow_id = ?4
                        "#,
                        params![
                            membership.id,
                            state_to_string(membership.state),
                            membership.resolved_at,
                            flow.id,
                        ],
                    )?;
                }
            }

            let digest = if flow.is_closed() {
                Some(hash_data(flow.to_canonical_json()?.as_bytes()))
            } else {
                None
            };

            let rows_affected = db.conn.execute(
                r#"
                UPDATE patient_flows SET
                    office = ?2,
                    exited_at = ?3,
                    in_attendance = ?4,
                    closure_digest = ?5
                WHERE id = ?1
                "#,
                params![
                    flow.id,
                    flow.office,
                    flow.exited_at,
                    flow.in_attendance,
                    digest,
                ],
            )?;
            if rows_affected == 0 {
                return Err(DbError::NotFound(format!("flow {}", flow.id)));
            }
            Ok(())
        })
    }

    fn insert_membership(&self, flow_id: i64, membership: &QueueMembership) -> DbResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO queue_memberships (
                flow_id, queue_id, specialty_id, state, entered_at, resolved_at, referred_from
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                flow_id,
                membership.queue_id,
                membership.specialty_id,
                state_to_string(membership.state),
                membership.entered_at,
                membership.resolved_at,
                membership.referred_from,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Get a flow with its memberships.
    pub fn get_flow(&self, id: i64) -> DbResult<Option<PatientFlow>> {
        let sql = format!("SELECT {} FROM patient_flows WHERE id = ?", FLOW_COLUMNS);
        let flow = self.conn.query_row(&sql, [id], flow_from_row).optional()?;
        match flow {
            Some(mut flow) => {
                flow.memberships = self.list_memberships(flow.id)?;
                Ok(Some(flow))
            }
            None => Ok(None),
        }
    }

    /// Open flows in arrival order.
    pub fn list_open_flows(&self) -> DbResult<Vec<PatientFlow>> {
        let sql = format!(
            "SELECT {} FROM patient_flows WHERE exited_at IS NULL ORDER BY entered_at, id",
            FLOW_COLUMNS
        );
        self.query_flows(&sql, [])
    }

    /// Every flow of a patient, newest first.
    pub fn list_flows_for_patient(&self, patient_id: i64) -> DbResult<Vec<PatientFlow>> {
        let sql = format!(
            "SELECT {} FROM patient_flows WHERE patient_id = ? ORDER BY entered_at DESC, id DESC",
            FLOW_COLUMNS
        );
        self.query_flows(&sql, [patient_id])
    }

    /// The patient's open flow, if any.
    pub fn open_flow_for_patient(&self, patient_id: i64) -> DbResult<Option<PatientFlow>> {
        let sql = format!(
            "SELECT {} FROM patient_flows WHERE patient_id = ? AND exited_at IS NULL ORDER BY id LIMIT 1",
            FLOW_COLUMNS
        );
        Ok(self.query_flows(&sql, [patient_id])?.into_iter().next())
    }

    fn query_flows<P: rusqlite::Params>(&self, sql: &str, params: P) -> DbResult<Vec<PatientFlow>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, flow_from_row)?;

        let mut flows = Vec::new();
        for row in rows {
            let mut flow = row?;
            flow.memberships = self.list_memberships(flow.id)?;
            flows.push(flow);
        }
        Ok(flows)
    }

    fn list_memberships(&self, flow_id: i64) -> DbResult<Vec<QueueMembership>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, queue_id, specialty_id, state, entered_at, resolved_at, referred_from
            FROM queue_memberships
            WHERE flow_id = ?
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map([flow_id], |row| {
            Ok(MembershipRow {
                id: row.get(0)?,
                queue_id: row.get(1)?,
                specialty_id: row.get(2)?,
                state: row.get(3)?,
                entered_at: row.get(4)?,
                resolved_at: row.get(5)?,
                referred_from: row.get(6)?,
            })
        })?;

        let mut memberships = Vec::new();
        for row in rows {
            memberships.push(row?.try_into()?);
        }
        Ok(memberships)
    }

    /// Stored closure digest of a flow.
    pub fn closure_digest(&self, flow_id: i64) -> DbResult<Option<String>> {
        let digest: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT closure_digest FROM patient_flows WHERE id = ?",
                [flow_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(digest.flatten())
    }

    /// Recompute a closed flow's digest and compare it with the stored one.
    pub fn verify_closed_flow(&self, flow_id: i64) -> DbResult<ClosureCheck> {
        let flow = self
            .get_flow(flow_id)?
            .ok_or_else(|| DbError::NotFound(format!("flow {}", flow_id)))?;
        let stored = self
            .closure_digest(flow_id)?
            .ok_or_else(|| DbError::NotFound(format!("closure digest of flow {}", flow_id)))?;

        Ok(ClosureCheck {
            flow_id,
            stored,
            computed: hash_data(flow.to_canonical_json()?.as_bytes()),
        })
    }

    /// Count memberships attended on a day (`YYYY-MM-DD`).
    pub fn count_attended_on(&self, day: &str) -> DbResult<i64> {
        Ok(self.conn.query_row(
            r#"
            SELECT COUNT(*) FROM queue_memberships
            WHERE state = 'attended' AND substr(resolved_at, 1, 10) = ?
            "#,
            [day],
            |row| row.get(0),
        )?)
    }
}

fn flow_from_row(row: &Row<'_>) -> rusqlite::Result<PatientFlow> {
    Ok(PatientFlow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        patient_name: row.get(2)?,
        triage_id: row.get(3)?,
        office: row.get(4)?,
        entered_at: row.get(5)?,
        exited_at: row.get(6)?,
        in_attendance: row.get(7)?,
        memberships: Vec::new(),
    })
}

/// Intermediate row struct for database mapping.
struct MembershipRow {
    id: i64,
    queue_id: i64,
    specialty_id: i64,
    state: String,
    entered_at: String,
    resolved_at: Option<String>,
    referred_from: Option<i64>,
}

impl TryFrom<MembershipRow> for QueueMembership {
    type Error = DbError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        Ok(QueueMembership {
            id: row.id,
            queue_id: row.queue_id,
            specialty_id: row.specialty_id,
            state: string_to_state(&row.state)?,
            entered_at: row.entered_at,
            resolved_at: row.resolved_at,
            referred_from: row.referred_from,
        })
    }
}

fn state_to_string(state: MembershipState) -> &'static str {
    match state {
        MembershipState::Waiting => "waiting",
        MembershipState::Attended => "attended",
        MembershipState::Abandoned => "abandoned",
    }
}

fn string_to_state(s: &str) -> DbResult<MembershipState> {
    match s {
        "waiting" => Ok(MembershipState::Waiting),
        "attended" => Ok(MembershipState::Attended),
        "abandoned" => Ok(MembershipState::Abandoned),
        _ => Err(DbError::Constraint(format!("Invalid membership state: {}", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Patient, Queue, Specialty};

    const NOW: &str = "2024-03-01T10:00:00+00:00";
    const LATER: &str = "2024-03-01T11:00:00+00:00";

    fn setup() -> (Database, i64, Vec<Queue>) {
        let db = Database::open_in_memory().unwrap();
        let patient_id = db.insert_patient(&Patient::new("Maria".into())).unwrap();

        let mut queues = Vec::new();
        for (id, name) in [(1, "Odontologia"), (2, "Clínica Geral"), (3, "Nutrição")] {
            db.upsert_specialty(&Specialty {
                id,
                name: name.into(),
            })
            .unwrap();
            let queue = Queue {
                id: id * 10,
                name: format!("Fila {}", name),
                active: true,
                specialty_id: id,
            };
            db.upsert_queue(&queue).unwrap();
            queues.push(queue);
        }
        (db, patient_id, queues)
    }

    fn open_flow(db: &Database, patient_id: i64, queues: &[Queue]) -> PatientFlow {
        let mut flow =
            PatientFlow::open(patient_id, "Maria".into(), None, &queues[..2], NOW).unwrap();
        db.insert_flow(&mut flow).unwrap();
        flow
    }

    #[test]
    fn test_insert_assigns_ids() {
        let (db, patient_id, queues) = setup();
        let flow = open_flow(&db, patient_id, &queues);

        assert!(flow.id > 0);
        assert!(flow.memberships.iter().all(|m| m.id > 0));

        let stored = db.get_flow(flow.id).unwrap().unwrap();
        assert_eq!(stored, flow);
        assert_eq!(db.list_open_flows().unwrap().len(), 1);
    }

    #[test]
    fn test_save_after_finalize_and_refer() {
        let (db, patient_id, queues) = setup();
        let mut flow = open_flow(&db, patient_id, &queues);
        let first = flow.memberships[0].id;

        flow.begin(first, Some("Sala 3".into())).unwrap();
        flow.refer(&queues[2], Some(first), NOW).unwrap();
        flow.finalize(first, LATER).unwrap();
        db.save_flow(&mut flow).unwrap();

        let stored = db.get_flow(flow.id).unwrap().unwrap();
        assert_eq!(stored.memberships.len(), 3);
        assert_eq!(stored.memberships[0].state, MembershipState::Attended);
        assert_eq!(stored.memberships[2].referred_from, Some(first));
        assert_eq!(stored.office.as_deref(), Some("Sala 3"));
        assert!(stored.exited_at.is_none());
        assert_eq!(db.count_attended_on("2024-03-01").unwrap(), 1);
    }

    #[test]
    fn test_closed_flow_gets_digest_and_is_frozen() {
        let (db, patient_id, queues) = setup();
        let mut flow = open_flow(&db, patient_id, &queues);

        flow.cancel(LATER).unwrap();
        db.save_flow(&mut flow).unwrap();

        assert!(db.closure_digest(flow.id).unwrap().is_some());
        assert!(db.verify_closed_flow(flow.id).unwrap().is_intact());
        assert!(db.list_open_flows().unwrap().is_empty());

        // Storage refuses further writes
        assert!(db.save_flow(&mut flow).is_err());
    }

    #[test]
    fn test_tampering_detected() {
        let (db, patient_id, queues) = setup();
        let mut flow = open_flow(&db, patient_id, &queues);
        let ids: Vec<i64> = flow.memberships.iter().map(|m| m.id).collect();
        flow.finalize(ids[0], NOW).unwrap();
        flow.finalize(ids[1], LATER).unwrap();
        db.save_flow(&mut flow).unwrap();

        db.conn()
            .execute_batch(
                "DROP TRIGGER queue_memberships_closed_guard;
                 UPDATE queue_memberships SET state = 'abandoned';",
            )
            .unwrap();

        let check = db.verify_closed_flow(flow.id).unwrap();
        assert!(!check.is_intact());
    }

    #[test]
    fn test_verify_open_flow_not_found() {
        let (db, patient_id, queues) = setup();
        let flow = open_flow(&db, patient_id, &queues);
        assert!(matches!(
            db.verify_closed_flow(flow.id),
            Err(DbError::NotFound(_))
        ));
    }

    #[test]
    fn test_open_flow_for_patient() {
        let (db, patient_id, queues) = setup();
        assert!(db.open_flow_for_patient(patient_id).unwrap().is_none());
        let flow = open_flow(&db, patient_id, &queues);
        assert_eq!(
            db.open_flow_for_patient(patient_id).unwrap().unwrap().id,
            flow.id
        );
        assert_eq!(db.list_flows_for_patient(patient_id).unwrap().len(), 1);
    }
}
