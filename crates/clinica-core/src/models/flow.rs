//! Patient flow (queue entry) models and their state transitions.
//!
//! A flow is one patient's journey through one or more specialty queues.
//! Each queue membership moves independently:
//!
//! ```text
//! Waiting ──finalize──► Attended
//!    │
//!    └──cancel──► Abandoned
//! ```
//!
//! The flow's overall status is derived from its memberships and never stored.
//! Once `exited_at` is set the flow is closed and every transition is rejected.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::specialty::Queue;

/// Transition errors for a single flow.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransitionError {
    #[error("Flow {0} is closed")]
    Closed(i64),

    #[error("Membership {0} does not belong to this flow")]
    UnknownMembership(i64),

    #[error("Membership {0} is not waiting")]
    NotWaiting(i64),

    #[error("Membership {busy} is already being attended")]
    AttendanceInProgress { busy: i64 },

    #[error("Specialty {0} already has a waiting membership in this flow")]
    AlreadyWaiting(i64),

    #[error("Cannot refer to the specialty currently being attended ({0})")]
    SameSpecialty(i64),

    #[error("Queue {0} is inactive")]
    InactiveQueue(i64),

    #[error("A flow needs at least one queue")]
    NoQueues,
}

/// State of one queue membership.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MembershipState {
    /// Waiting in the queue (`atendido = 0`)
    Waiting,
    /// Seen by the queue's specialty (`atendido = 1`)
    Attended,
    /// Left without being seen (flow cancelled)
    Abandoned,
}

impl MembershipState {
    /// Legacy `atendido` flag.
    pub fn attended_flag(&self) -> u8 {
        match self {
            MembershipState::Attended => 1,
            MembershipState::Waiting | MembershipState::Abandoned => 0,
        }
    }
}

/// A patient's place in one specialty queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueMembership {
    /// Store-assigned ID (0 until inserted)
    pub id: i64,
    pub queue_id: i64,
    pub specialty_id: i64,
    pub state: MembershipState,
    pub entered_at: String,
    pub resolved_at: Option<String>,
    /// Membership whose attendance produced this referral
    pub referred_from: Option<i64>,
}

impl QueueMembership {
    fn waiting(queue: &Queue, now: &str, referred_from: Option<i64>) -> Self {
        Self {
            id: 0,
            queue_id: queue.id,
            specialty_id: queue.specialty_id,
            state: MembershipState::Waiting,
            entered_at: now.to_string(),
            resolved_at: None,
            referred_from,
        }
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self.state, MembershipState::Waiting)
    }
}

/// Coarse flow status shown on queue screens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FlowStatus {
    /// At least one queue still waiting ("Aguardando")
    Waiting,
    /// An attendance is open ("Em andamento")
    InProgress,
    /// Nothing left waiting
    Completed,
    /// Closed without any queue attended
    Cancelled,
}

impl FlowStatus {
    /// Label used on screens and printed documents.
    pub fn label(&self) -> &'static str {
        match self {
            FlowStatus::Waiting => "Aguardando",
            FlowStatus::InProgress => "Em andamento",
            FlowStatus::Completed => "Concluído",
            FlowStatus::Cancelled => "Cancelado",
        }
    }
}

/// A patient flow (atendimento fluxo).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientFlow {
    /// Store-assigned ID (0 until inserted)
    pub id: i64,
    pub patient_id: i64,
    pub patient_name: String,
    pub triage_id: Option<i64>,
    /// Consulting room (consultório) of the current attendance
    pub office: Option<String>,
    pub entered_at: String,
    /// Set when the flow closes; closed flows are immutable
    pub exited_at: Option<String>,
    pub memberships: Vec<QueueMembership>,
    /// Membership currently being attended
    pub in_attendance: Option<i64>,
}

impl PatientFlow {
    /// Open a flow with one waiting membership per queue.
    pub fn open(
        patient_id: i64,
        patient_name: String,
        triage_id: Option<i64>,
        queues: &[Queue],
        now: &str,
    ) -> Result<Self, TransitionError> {
        if queues.is_empty() {
            return Err(TransitionError::NoQueues);
        }
        if let Some(inactive) = queues.iter().find(|q| !q.active) {
            return Err(TransitionError::InactiveQueue(inactive.id));
        }

        let mut memberships: Vec<QueueMembership> = Vec::with_capacity(queues.len());
        for queue in queues {
            // One membership per specialty even if several queues were passed
            if memberships.iter().any(|m| m.specialty_id == queue.specialty_id) {
                continue;
            }
            memberships.push(QueueMembership::waiting(queue, now, None));
        }

        Ok(Self {
            id: 0,
            patient_id,
            patient_name,
            triage_id,
            office: None,
            entered_at: now.to_string(),
            exited_at: None,
            memberships,
            in_attendance: None,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.exited_at.is_some()
    }

    /// Derived overall status.
    pub fn status(&self) -> FlowStatus {
        let any_attended = self
            .memberships
            .iter()
            .any(|m| m.state == MembershipState::Attended);

        if self.is_closed() {
            return if any_attended {
                FlowStatus::Completed
            } else {
                FlowStatus::Cancelled
            };
        }
        if self.in_attendance.is_some() {
            FlowStatus::InProgress
        } else if self.memberships.iter().any(QueueMembership::is_waiting) {
            FlowStatus::Waiting
        } else {
            FlowStatus::Completed
        }
    }

    /// Memberships still waiting.
    pub fn waiting(&self) -> impl Iterator<Item = &QueueMembership> {
        self.memberships.iter().filter(|m| m.is_waiting())
    }

    /// Check if the patient is still waiting in the given queue.
    pub fn is_waiting_in(&self, queue_id: i64) -> bool {
        self.waiting().any(|m| m.queue_id == queue_id)
    }

    pub fn membership(&self, membership_id: i64) -> Option<&QueueMembership> {
        self.memberships.iter().find(|m| m.id == membership_id)
    }

    fn ensure_open(&self) -> Result<(), TransitionError> {
        if self.is_closed() {
            Err(TransitionError::Closed(self.id))
        } else {
            Ok(())
        }
    }

    fn waiting_membership_mut(
        &mut self,
        membership_id: i64,
    ) -> Result<&mut QueueMembership, TransitionError> {
        let membership = self
            .memberships
            .iter_mut()
            .find(|m| m.id == membership_id)
            .ok_or(TransitionError::UnknownMembership(membership_id))?;
        if !membership.is_waiting() {
            return Err(TransitionError::NotWaiting(membership_id));
        }
        Ok(membership)
    }

    /// Start attending a waiting membership.
    pub fn begin(&mut self, membership_id: i64, office: Option<String>) -> Result<(), TransitionError> {
        self.ensure_open()?;
        if let Some(busy) = self.in_attendance {
            if busy != membership_id {
                return Err(TransitionError::AttendanceInProgress { busy });
            }
        }
        self.waiting_membership_mut(membership_id)?;
        self.in_attendance = Some(membership_id);
        if office.is_some() {
            self.office = office;
        }
        Ok(())
    }

    /// Mark a membership attended. Closes the flow when nothing else is waiting.
    ///
    /// Returns `true` if the flow closed.
    pub fn finalize(&mut self, membership_id: i64, now: &str) -> Result<bool, TransitionError> {
        self.ensure_open()?;
        let membership = self.waiting_membership_mut(membership_id)?;
        membership.state = MembershipState::Attended;
        membership.resolved_at = Some(now.to_string());

        if self.in_attendance == Some(membership_id) {
            self.in_attendance = None;
        }

        if self.waiting().next().is_none() {
            self.exited_at = Some(now.to_string());
            return Ok(true);
        }
        Ok(false)
    }

    /// Add a waiting membership in another specialty's queue.
    ///
    /// Existing memberships are left untouched.
    pub fn refer(
        &mut self,
        target: &Queue,
        from_membership: Option<i64>,
        now: &str,
    ) -> Result<&QueueMembership, TransitionError> {
        self.ensure_open()?;
        if !target.active {
            return Err(TransitionError::InactiveQueue(target.id));
        }
        if let Some(from_id) = from_membership {
            let from = self
                .membership(from_id)
                .ok_or(TransitionError::UnknownMembership(from_id))?;
            if from.specialty_id == target.specialty_id {
                return Err(TransitionError::SameSpecialty(target.specialty_id));
            }
        }
        if self.waiting().any(|m| m.specialty_id == target.specialty_id) {
            return Err(TransitionError::AlreadyWaiting(target.specialty_id));
        }

        self.memberships
            .push(QueueMembership::waiting(target, now, from_membership));
        let index = self.memberships.len() - 1;
        Ok(&self.memberships[index])
    }

    /// Close the flow without attending the remaining queues.
    pub fn cancel(&mut self, now: &str) -> Result<(), TransitionError> {
        self.ensure_open()?;
        for membership in self.memberships.iter_mut().filter(|m| m.is_waiting()) {
            membership.state = MembershipState::Abandoned;
            membership.resolved_at = Some(now.to_string());
        }
        self.in_attendance = None;
        self.exited_at = Some(now.to_string());
        Ok(())
    }

    /// Serialize to canonical JSON for the closing digest.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
