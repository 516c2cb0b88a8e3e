//! Patient flow service.
//!
//! Pipeline: Registration → Triage → Queues → Attendance → Referral → History
//!
//! The service loads a flow, applies one transition from
//! [`PatientFlow`](crate::models::PatientFlow) and persists the result in a
//! single transaction.

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::db::{Database, DbError};
use crate::integrity::ClosureCheck;
use crate::models::{
    is_valid_cpf, Attendance, History, OdontogramError, Patient, PatientFlow, Queue, Referral,
    ToothSelectionsMap, TransitionError, Triage, TriageError,
};
use crate::search::{SearchFilter, WaitingEntry};

/// Flow service errors.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Triage(#[from] TriageError),

    #[error(transparent)]
    Odontogram(#[from] OdontogramError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid patient: {0}")]
    InvalidPatient(String),

    #[error("No active queue for specialties {0:?}")]
    NoActiveQueue(Vec<i64>),

    #[error("Patient {0} already has an open flow")]
    AlreadyQueued(i64),

    #[error("Attendance {0} is already finished")]
    AttendanceFinished(i64),
}

pub type FlowResult<T> = Result<T, FlowError>;

/// Result of finalizing an attendance.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizeOutcome {
    pub flow: PatientFlow,
    pub attendance: Attendance,
    /// Whether this was the last waiting queue and the flow closed
    pub flow_closed: bool,
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Coordinates registry, triage, queues and attendances over one store.
pub struct FlowService<'a> {
    db: &'a Database,
}

impl<'a> FlowService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    // ------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------

    fn check_patient(patient: &Patient) -> FlowResult<()> {
        if patient.name.trim().is_empty() {
            return Err(FlowError::InvalidPatient("name is required".into()));
        }
        if let Some(cpf) = patient.cpf.as_deref().filter(|c| !c.trim().is_empty()) {
            if !is_valid_cpf(cpf) {
                return Err(FlowError::InvalidPatient(format!("invalid CPF {}", cpf)));
            }
        }
        Ok(())
    }

    /// Register a patient and return it with its assigned ID.
    pub fn register_patient(&self, mut patient: Patient) -> FlowResult<Patient> {
        Self::check_patient(&patient)?;
        patient.id = self.db.insert_patient(&patient)?;
        info!(patient_id = patient.id, "Patient registered");
        Ok(patient)
    }

    pub fn update_patient(&self, patient: &Patient) -> FlowResult<()> {
        Self::check_patient(patient)?;
        if !self.db.update_patient(patient)? {
            return Err(FlowError::NotFound(format!("patient {}", patient.id)));
        }
        debug!(patient_id = patient.id, "Patient updated");
        Ok(())
    }

    fn patient(&self, id: i64) -> FlowResult<Patient> {
        self.db
            .get_patient(id)?
            .ok_or_else(|| FlowError::NotFound(format!("patient {}", id)))
    }

    // ------------------------------------------------------------------
    // Triage
    // ------------------------------------------------------------------

    /// Fill the patient-derived fields the form leaves blank.
    fn complete_triage(&self, triage: &mut Triage) -> FlowResult<()> {
        let patient = self.patient(triage.patient_id)?;
        if triage.patient_name.trim().is_empty() {
            triage.patient_name = patient.name.clone();
        }
        if triage.record_number.is_empty() {
            triage.record_number = patient.record_number();
        }
        if triage.age.is_none() {
            triage.age = patient.age_on(Utc::now().date_naive());
        }
        Ok(())
    }

    /// Validate and store a triage.
    pub fn record_triage(&self, mut triage: Triage) -> FlowResult<Triage> {
        self.complete_triage(&mut triage)?;
        triage.validate()?;
        triage.id = self.db.insert_triage(&triage)?;
        info!(
            triage_id = triage.id,
            patient_id = triage.patient_id,
            specialties = ?triage.specialty_ids(),
            "Triage recorded"
        );
        Ok(triage)
    }

    /// Validate and replace a stored triage.
    pub fn update_triage(&self, mut triage: Triage) -> FlowResult<Triage> {
        self.complete_triage(&mut triage)?;
        triage.validate()?;
        if !self.db.update_triage(&triage)? {
            return Err(FlowError::NotFound(format!("triage {}", triage.id)));
        }
        debug!(triage_id = triage.id, "Triage updated");
        Ok(triage)
    }

    // ------------------------------------------------------------------
    // Queues
    // ------------------------------------------------------------------

    fn flow(&self, id: i64) -> FlowResult<PatientFlow> {
        self.db
            .get_flow(id)?
            .ok_or_else(|| FlowError::NotFound(format!("flow {}", id)))
    }

    /// Put the triaged patient in the queue of every selected specialty.
    ///
    /// Specialties without an active queue are skipped; at least one must remain.
    pub fn enter_queues(&self, triage_id: i64) -> FlowResult<PatientFlow> {
        let triage = self
            .db
            .get_triage(triage_id)?
            .ok_or_else(|| FlowError::NotFound(format!("triage {}", triage_id)))?;
        triage.validate()?;

        if self.db.open_flow_for_patient(triage.patient_id)?.is_some() {
            return Err(FlowError::AlreadyQueued(triage.patient_id));
        }

        let mut queues: Vec<Queue> = Vec::new();
        for specialty_id in triage.specialty_ids() {
            match self.db.active_queue_for_specialty(specialty_id)? {
                Some(queue) => queues.push(queue),
                None => warn!(specialty_id, "No active queue for specialty"),
            }
        }
        if queues.is_empty() {
            return Err(FlowError::NoActiveQueue(triage.specialty_ids()));
        }

        let mut flow = PatientFlow::open(
            triage.patient_id,
            triage.patient_name.clone(),
            Some(triage.id),
            &queues,
            &now(),
        )?;
        self.db.insert_flow(&mut flow)?;

        info!(
            flow_id = flow.id,
            patient_id = flow.patient_id,
            queues = flow.memberships.len(),
            "Patient entered queues"
        );
        Ok(flow)
    }

    /// Start attending a waiting membership.
    ///
    /// Calling it again for the membership already being attended returns the
    /// open attendance.
    pub fn begin_attendance(
        &self,
        flow_id: i64,
        membership_id: i64,
        professional: &str,
        office: Option<String>,
    ) -> FlowResult<Attendance> {
        self.db.in_transaction(|db| {
            let mut flow = self.flow(flow_id)?;
            flow.begin(membership_id, office)?;

            if let Some(open) = db.open_attendance_for_membership(membership_id)? {
                db.save_flow(&mut flow)?;
                debug!(flow_id, membership_id, attendance_id = open.id, "Attendance resumed");
                return Ok(open);
            }

            let specialty_id = flow
                .membership(membership_id)
                .map(|m| m.specialty_id)
                .ok_or(TransitionError::UnknownMembership(membership_id))?;

            let mut attendance = Attendance::new(
                flow.id,
                membership_id,
                flow.patient_id,
                specialty_id,
                professional.to_string(),
            );
            attendance.id = db.insert_attendance(&attendance)?;
            db.save_flow(&mut flow)?;

            info!(
                flow_id,
                membership_id,
                attendance_id = attendance.id,
                "Attendance started"
            );
            Ok(attendance)
        })
    }

    /// Save the clinical content of an open attendance.
    pub fn save_attendance(&self, attendance: &Attendance) -> FlowResult<()> {
        if attendance.is_finished() || !self.db.update_attendance(attendance)? {
            return Err(FlowError::AttendanceFinished(attendance.id));
        }
        debug!(attendance_id = attendance.id, "Attendance saved");
        Ok(())
    }

    /// Apply an odontogram edit to an open attendance and save it.
    pub fn edit_odontogram<F>(&self, attendance_id: i64, edit: F) -> FlowResult<Attendance>
    where
        F: FnOnce(&mut ToothSelectionsMap) -> Result<(), OdontogramError>,
    {
        let mut attendance = self
            .db
            .get_attendance(attendance_id)?
            .ok_or_else(|| FlowError::NotFound(format!("attendance {}", attendance_id)))?;
        edit(&mut attendance.odontogram)?;
        self.save_attendance(&attendance)?;
        Ok(attendance)
    }

    /// Finish an attendance and mark its membership attended.
    ///
    /// Other queues of the flow stay waiting; the flow closes once none remain.
    pub fn finalize(&self, mut attendance: Attendance) -> FlowResult<FinalizeOutcome> {
        self.db.in_transaction(|db| {
            let stored = db
                .get_attendance(attendance.id)?
                .ok_or_else(|| FlowError::NotFound(format!("attendance {}", attendance.id)))?;
            if stored.is_finished() {
                return Err(FlowError::AttendanceFinished(attendance.id));
            }

            let mut flow = self.flow(stored.flow_id)?;
            let finished_at = now();
            let flow_closed = flow.finalize(stored.membership_id, &finished_at)?;

            // Identity fields come from the store
            attendance.flow_id = stored.flow_id;
            attendance.membership_id = stored.membership_id;
            attendance.patient_id = stored.patient_id;
            attendance.specialty_id = stored.specialty_id;
            attendance.started_at = stored.started_at;
            attendance.finished_at = Some(finished_at);

            db.update_attendance(&attendance)?;
            db.save_flow(&mut flow)?;

            info!(
                flow_id = flow.id,
                membership_id = attendance.membership_id,
                attendance_id = attendance.id,
                flow_closed,
                "Attendance finalized"
            );
            Ok(FinalizeOutcome {
                flow,
                attendance,
                flow_closed,
            })
        })
    }

    /// Refer the patient to another specialty within the same flow.
    pub fn refer(&self, mut referral: Referral) -> FlowResult<PatientFlow> {
        self.db.in_transaction(|db| {
            let mut flow = self.flow(referral.flow_id)?;
            let queue = db
                .active_queue_for_specialty(referral.specialty_id)?
                .ok_or_else(|| FlowError::NoActiveQueue(vec![referral.specialty_id]))?;

            let from = referral.from_membership_id.or(flow.in_attendance);
            flow.refer(&queue, from, &now())?;
            db.save_flow(&mut flow)?;

            referral.patient_id = flow.patient_id;
            referral.from_membership_id = from;
            referral.id = db.insert_referral(&referral)?;

            info!(
                flow_id = flow.id,
                referral_id = referral.id,
                specialty_id = referral.specialty_id,
                "Patient referred"
            );
            Ok(flow)
        })
    }

    /// Close a flow without attending its remaining queues.
    pub fn cancel(&self, flow_id: i64) -> FlowResult<PatientFlow> {
        let mut flow = self.flow(flow_id)?;
        flow.cancel(&now())?;
        self.db.save_flow(&mut flow)?;
        info!(flow_id, status = flow.status().label(), "Flow cancelled");
        Ok(flow)
    }

    /// Waiting memberships of open flows that pass the filter, oldest first.
    pub fn waiting_entries(&self, filter: &SearchFilter) -> FlowResult<Vec<WaitingEntry>> {
        let mut entries = Vec::new();
        for flow in self.db.list_open_flows()? {
            let patient = self.db.get_patient(flow.patient_id)?;
            for membership in flow.waiting() {
                entries.push(WaitingEntry::new(&flow, membership, patient.as_ref()));
            }
        }
        Ok(filter.apply(&entries).into_iter().cloned().collect())
    }

    /// Waiting entries of a single queue.
    pub fn queue_entries(&self, queue_id: i64, filter: &SearchFilter) -> FlowResult<Vec<WaitingEntry>> {
        let mut entries = self.waiting_entries(filter)?;
        entries.retain(|e| e.queue_id == queue_id);
        Ok(entries)
    }

    /// Past attendances of a patient.
    pub fn history(&self, patient_id: i64) -> FlowResult<History> {
        let patient = self.patient(patient_id)?;
        let attendances = self.db.list_attendances_for_patient(patient_id)?;
        let specialties = self.db.list_specialties()?;
        Ok(History::build(patient, &attendances, &specialties))
    }

    /// Check a closed flow against the digest stored when it closed.
    pub fn verify_closed_flow(&self, flow_id: i64) -> FlowResult<ClosureCheck> {
        let check = self.db.verify_closed_flow(flow_id)?;
        if !check.is_intact() {
            warn!(flow_id, "Closed flow digest mismatch");
        }
        Ok(check)
    }
}
