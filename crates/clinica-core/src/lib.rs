//! Clinica Core Library
//!
//! Local-first patient flow for a community clinic.
//!
//! # Architecture
//!
//! ```text
//! Registration → Triage → Queues ──────────────┐
//!                           │                  │
//!                  ┌────────▼────────┐         │
//!                  │   Attendance    │◄── Referral (new queue, same flow)
//!                  │  evolution, Rx, │
//!                  │ exams, odontogram│
//!                  └────────┬────────┘
//!                           │ finalize
//!                           ▼
//!          last waiting queue? ── yes ──► flow closed + SHA-256 digest
//!                           │
//!                           no ──► other queues keep waiting
//!                           │
//!                           ▼
//!                        History ──► Reports / Documents
//! ```
//!
//! # Modules
//!
//! - [`db`]: SQLite store with FTS5 medication search
//! - [`models`]: Domain types (Patient, Triage, PatientFlow, Attendance, ...)
//! - [`flow`]: Flow service applying state transitions transactionally
//! - [`search`]: Accent-insensitive filters, medication suggestions, latest-wins search
//! - [`session`]: Login session lifecycle
//! - [`reports`]: Dashboard counters and consolidated report
//! - [`config`]: Runtime configuration
//! - [`integrity`]: Closed-flow digests

pub mod config;
pub mod db;
pub mod flow;
pub mod integrity;
pub mod models;
pub mod remote;
pub mod reports;
pub mod search;
pub mod session;

// Re-export commonly used types
pub use config::CoreConfig;
pub use db::Database;
pub use flow::{FlowError, FlowService};
pub use models::{
    Attendance, Patient, PatientFlow, Referral, ToothDraft, ToothSelectionsMap, Triage,
};
pub use remote::RemoteFailure;
pub use reports::{ConsolidatedReport, DashboardSummary};
pub use search::{MedicationSuggester, SearchFilter, WaitingEntry};
pub use session::{SessionManager, TokenValidator, UserProfile};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use models::{Address, CatalogMedication, Face, MembershipState, Queue, Sex, Specialty};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ClinicaError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Rejected queue/attendance transition
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Session error: {0}")]
    SessionError(String),

    /// Remote API failure, already formatted for display
    #[error("{message}")]
    RemoteError { status: u16, message: String },
}

impl From<db::DbError> for ClinicaError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound(what) => ClinicaError::NotFound(what),
            db::DbError::Constraint(msg) => ClinicaError::InvalidInput(msg),
            other => ClinicaError::DatabaseError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ClinicaError {
    fn from(e: serde_json::Error) -> Self {
        ClinicaError::SerializationError(e.to_string())
    }
}

impl From<FlowError> for ClinicaError {
    fn from(e: FlowError) -> Self {
        match e {
            FlowError::Database(db) => db.into(),
            FlowError::NotFound(what) => ClinicaError::NotFound(what),
            FlowError::Transition(_)
            | FlowError::AlreadyQueued(_)
            | FlowError::AttendanceFinished(_)
            | FlowError::NoActiveQueue(_) => ClinicaError::InvalidTransition(e.to_string()),
            FlowError::Triage(_) | FlowError::Odontogram(_) | FlowError::InvalidPatient(_) => {
                ClinicaError::InvalidInput(e.to_string())
            }
        }
    }
}

impl From<RemoteFailure> for ClinicaError {
    fn from(e: RemoteFailure) -> Self {
        ClinicaError::RemoteError {
            status: e.status,
            message: e.to_string(),
        }
    }
}

impl From<session::SessionError> for ClinicaError {
    fn from(e: session::SessionError) -> Self {
        match e {
            session::SessionError::Database(db) => db.into(),
            session::SessionError::Remote(failure) => failure.into(),
            other => ClinicaError::SessionError(other.to_string()),
        }
    }
}

impl From<reports::ReportError> for ClinicaError {
    fn from(e: reports::ReportError) -> Self {
        match e {
            reports::ReportError::Database(db) => db.into(),
            reports::ReportError::Json(json) => json.into(),
            other => ClinicaError::InvalidInput(other.to_string()),
        }
    }
}

impl From<config::ConfigError> for ClinicaError {
    fn from(e: config::ConfigError) -> Self {
        ClinicaError::InvalidInput(e.to_string())
    }
}

impl From<models::OdontogramError> for ClinicaError {
    fn from(e: models::OdontogramError) -> Self {
        ClinicaError::InvalidInput(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for ClinicaError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ClinicaError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path with default settings.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<ClinicaCore>, ClinicaError> {
    let config = CoreConfig::from_lookup(|key| {
        (key == config::DB_PATH_VAR).then(|| path.clone())
    })?;
    ClinicaCore::open(config)
}

/// Open the database configured through `CLINICA_*` environment variables.
#[uniffi::export]
pub fn open_from_env() -> Result<Arc<ClinicaCore>, ClinicaError> {
    ClinicaCore::open(CoreConfig::from_env()?)
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<ClinicaCore>, ClinicaError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(ClinicaCore::with_database(db, CoreConfig::default())))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe core wrapper for FFI.
#[derive(uniffi::Object)]
pub struct ClinicaCore {
    db: Arc<Mutex<Database>>,
    sessions: Mutex<SessionManager>,
    config: CoreConfig,
}

impl ClinicaCore {
    fn open(config: CoreConfig) -> Result<Arc<Self>, ClinicaError> {
        let db = Database::open(config.db_path())?;
        tracing::info!(path = %config.db_path().display(), "Database opened");
        Ok(Arc::new(Self::with_database(db, config)))
    }

    fn with_database(db: Database, config: CoreConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            sessions: Mutex::new(SessionManager::new()),
            config,
        }
    }

    /// Run an odontogram edit and return the resulting chart.
    fn edit_chart<F>(&self, attendance_id: i64, edit: F) -> Result<Vec<FfiToothSelection>, ClinicaError>
    where
        F: FnOnce(&mut ToothSelectionsMap) -> Result<(), models::OdontogramError>,
    {
        let db = self.db.lock()?;
        let attendance = FlowService::new(&db).edit_odontogram(attendance_id, edit)?;
        Ok(chart_records(&attendance.odontogram))
    }
}

#[uniffi::export]
impl ClinicaCore {
    // =========================================================================
    // Configuration
    // =========================================================================

    /// Debounce applied to search boxes, in milliseconds.
    pub fn search_debounce_ms(&self) -> u64 {
        self.config.search_debounce().as_millis() as u64
    }

    /// Full URL of a remote API endpoint.
    pub fn api_endpoint(&self, path: String) -> String {
        self.config.endpoint(&path)
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Start a session after login.
    pub fn begin_session(&self, token: String, user: FfiUser) -> Result<(), ClinicaError> {
        let db = self.db.lock()?;
        let mut sessions = self.sessions.lock()?;
        sessions.begin(&db, &token, user.into())?;
        Ok(())
    }

    /// Log out.
    pub fn end_session(&self) -> Result<(), ClinicaError> {
        let db = self.db.lock()?;
        self.sessions.lock()?.end(&db)?;
        Ok(())
    }

    /// Restore the persisted session, revalidating its token.
    pub fn restore_session(
        &self,
        validator: Box<dyn FfiTokenValidator>,
    ) -> Result<Option<FfiUser>, ClinicaError> {
        let db = self.db.lock()?;
        let mut sessions = self.sessions.lock()?;
        let restored = sessions.restore(&db, &CallbackValidator(validator))?;
        Ok(restored.map(|s| s.user.clone().into()))
    }

    /// Value for the `Authorization` header of remote calls.
    pub fn bearer_header(&self) -> Result<Option<String>, ClinicaError> {
        Ok(self.sessions.lock()?.bearer_header())
    }

    // =========================================================================
    // Reference data
    // =========================================================================

    pub fn upsert_specialty(&self, specialty: FfiSpecialty) -> Result<(), ClinicaError> {
        let db = self.db.lock()?;
        db.upsert_specialty(&specialty.into())?;
        Ok(())
    }

    pub fn list_specialties(&self) -> Result<Vec<FfiSpecialty>, ClinicaError> {
        let db = self.db.lock()?;
        Ok(db.list_specialties()?.into_iter().map(Into::into).collect())
    }

    pub fn upsert_queue(&self, queue: FfiQueue) -> Result<(), ClinicaError> {
        let db = self.db.lock()?;
        db.upsert_queue(&queue.into())?;
        Ok(())
    }

    pub fn list_queues(&self, active_only: bool) -> Result<Vec<FfiQueue>, ClinicaError> {
        let db = self.db.lock()?;
        Ok(db.list_queues(active_only)?.into_iter().map(Into::into).collect())
    }

    // =========================================================================
    // Medication catalog
    // =========================================================================

    pub fn upsert_medication(&self, item: FfiMedication) -> Result<(), ClinicaError> {
        let db = self.db.lock()?;
        db.upsert_medication(&item.into())?;
        Ok(())
    }

    /// Ranked suggestions for the prescription form.
    pub fn suggest_medications(
        &self,
        query: String,
        limit: u32,
    ) -> Result<Vec<FfiSuggestion>, ClinicaError> {
        let db = self.db.lock()?;
        let suggestions = MedicationSuggester::new(&db).suggest(&query, limit as usize)?;
        Ok(suggestions
            .into_iter()
            .map(|s| FfiSuggestion {
                medication: s.medication.into(),
                score: s.score,
            })
            .collect())
    }

    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// Register a new patient.
    pub fn register_patient(&self, patient: FfiPatient) -> Result<FfiPatient, ClinicaError> {
        let db = self.db.lock()?;
        let patient = FlowService::new(&db).register_patient(patient.try_into()?)?;
        Ok(patient.into())
    }

    pub fn update_patient(&self, patient: FfiPatient) -> Result<(), ClinicaError> {
        let db = self.db.lock()?;
        let mut patient: Patient = patient.try_into()?;
        patient.touch();
        FlowService::new(&db).update_patient(&patient)?;
        Ok(())
    }

    pub fn get_patient(&self, id: i64) -> Result<Option<FfiPatient>, ClinicaError> {
        let db = self.db.lock()?;
        Ok(db.get_patient(id)?.map(Into::into))
    }

    /// Search patients by name, record number or CPF, narrowed by the filter.
    pub fn search_patients(
        &self,
        filter: FfiFilter,
        limit: u32,
    ) -> Result<Vec<FfiPatient>, ClinicaError> {
        let db = self.db.lock()?;
        let filter: SearchFilter = filter.try_into()?;
        let candidates = db.search_patients(&filter.query, limit as usize)?;
        let matches = filter.apply(&candidates);
        Ok(matches.into_iter().cloned().map(Into::into).collect())
    }

    // =========================================================================
    // Triage Operations (JSON payloads)
    // =========================================================================

    /// Validation problems of a triage form, empty when it can be saved.
    pub fn triage_issues(&self, triage_json: String) -> Result<Vec<String>, ClinicaError> {
        let triage: Triage = serde_json::from_str(&triage_json)?;
        Ok(triage.issues().iter().map(ToString::to_string).collect())
    }

    pub fn record_triage(&self, triage_json: String) -> Result<String, ClinicaError> {
        let db = self.db.lock()?;
        let triage = FlowService::new(&db).record_triage(serde_json::from_str(&triage_json)?)?;
        Ok(serde_json::to_string(&triage)?)
    }

    pub fn update_triage(&self, triage_json: String) -> Result<String, ClinicaError> {
        let db = self.db.lock()?;
        let triage = FlowService::new(&db).update_triage(serde_json::from_str(&triage_json)?)?;
        Ok(serde_json::to_string(&triage)?)
    }

    pub fn get_triage(&self, id: i64) -> Result<Option<String>, ClinicaError> {
        let db = self.db.lock()?;
        match db.get_triage(id)? {
            Some(triage) => Ok(Some(serde_json::to_string(&triage)?)),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Queue Operations
    // =========================================================================

    /// Queue a triaged patient in every selected specialty.
    pub fn enter_queues(&self, triage_id: i64) -> Result<FfiFlow, ClinicaError> {
        let db = self.db.lock()?;
        Ok(FlowService::new(&db).enter_queues(triage_id)?.into())
    }

    pub fn get_flow(&self, flow_id: i64) -> Result<Option<FfiFlow>, ClinicaError> {
        let db = self.db.lock()?;
        Ok(db.get_flow(flow_id)?.map(Into::into))
    }

    /// Waiting entries across all queues.
    pub fn waiting_entries(&self, filter: FfiFilter) -> Result<Vec<FfiWaitingEntry>, ClinicaError> {
        let db = self.db.lock()?;
        let entries = FlowService::new(&db).waiting_entries(&filter.try_into()?)?;
        Ok(entries.into_iter().map(Into::into).collect())
    }

    /// Waiting entries of one queue.
    pub fn queue_entries(
        &self,
        queue_id: i64,
        filter: FfiFilter,
    ) -> Result<Vec<FfiWaitingEntry>, ClinicaError> {
        let db = self.db.lock()?;
        let entries = FlowService::new(&db).queue_entries(queue_id, &filter.try_into()?)?;
        Ok(entries.into_iter().map(Into::into).collect())
    }

    /// Close a flow without attending its remaining queues.
    pub fn cancel_flow(&self, flow_id: i64) -> Result<FfiFlow, ClinicaError> {
        let db = self.db.lock()?;
        Ok(FlowService::new(&db).cancel(flow_id)?.into())
    }

    /// Refer the patient of a flow to another specialty.
    pub fn refer(
        &self,
        flow_id: i64,
        specialty_id: i64,
        reason: Option<String>,
    ) -> Result<FfiFlow, ClinicaError> {
        let db = self.db.lock()?;
        let mut referral = Referral::new(flow_id, 0, specialty_id);
        referral.reason = reason;
        Ok(FlowService::new(&db).refer(referral)?.into())
    }

    /// Whether a closed flow still matches the digest stored at closing.
    pub fn verify_closed_flow(&self, flow_id: i64) -> Result<bool, ClinicaError> {
        let db = self.db.lock()?;
        Ok(FlowService::new(&db).verify_closed_flow(flow_id)?.is_intact())
    }

    // =========================================================================
    // Attendance Operations (JSON payloads)
    // =========================================================================

    /// Start (or resume) attending a membership. Returns the attendance JSON.
    pub fn begin_attendance(
        &self,
        flow_id: i64,
        membership_id: i64,
        professional: String,
        office: Option<String>,
    ) -> Result<String, ClinicaError> {
        let db = self.db.lock()?;
        let attendance =
            FlowService::new(&db).begin_attendance(flow_id, membership_id, &professional, office)?;
        Ok(serde_json::to_string(&attendance)?)
    }

    pub fn save_attendance(&self, attendance_json: String) -> Result<(), ClinicaError> {
        let db = self.db.lock()?;
        let attendance: Attendance = serde_json::from_str(&attendance_json)?;
        FlowService::new(&db).save_attendance(&attendance)?;
        Ok(())
    }

    pub fn finalize_attendance(
        &self,
        attendance_json: String,
    ) -> Result<FfiFinalizeOutcome, ClinicaError> {
        let db = self.db.lock()?;
        let outcome = FlowService::new(&db).finalize(serde_json::from_str(&attendance_json)?)?;
        Ok(FfiFinalizeOutcome {
            attendance_json: serde_json::to_string(&outcome.attendance)?,
            flow: outcome.flow.into(),
            flow_closed: outcome.flow_closed,
        })
    }

    /// Past attendances of a patient, as JSON.
    pub fn history(&self, patient_id: i64) -> Result<String, ClinicaError> {
        let db = self.db.lock()?;
        let history = FlowService::new(&db).history(patient_id)?;
        Ok(serde_json::to_string(&history)?)
    }

    // =========================================================================
    // Odontogram Operations
    // =========================================================================

    /// Replace (or, with `merge`, combine into) the entry of a tooth.
    pub fn set_tooth(
        &self,
        attendance_id: i64,
        tooth: u8,
        draft: FfiToothDraft,
        merge: bool,
    ) -> Result<Vec<FfiToothSelection>, ClinicaError> {
        let draft = draft.try_into()?;
        self.edit_chart(attendance_id, |chart| {
            if merge {
                chart.merge(tooth, draft)
            } else {
                chart.replace(tooth, draft)
            }
        })
    }

    pub fn remove_tooth_procedure(
        &self,
        attendance_id: i64,
        tooth: u8,
        procedure: String,
    ) -> Result<Vec<FfiToothSelection>, ClinicaError> {
        self.edit_chart(attendance_id, |chart| {
            chart.remove_procedure(tooth, &procedure);
            Ok(())
        })
    }

    pub fn clear_tooth(
        &self,
        attendance_id: i64,
        tooth: u8,
    ) -> Result<Vec<FfiToothSelection>, ClinicaError> {
        self.edit_chart(attendance_id, |chart| {
            chart.clear(tooth);
            Ok(())
        })
    }

    // =========================================================================
    // Reports
    // =========================================================================

    /// Home screen counters for a day (`YYYY-MM-DD`), as JSON.
    pub fn dashboard_json(&self, day: String) -> Result<String, ClinicaError> {
        let db = self.db.lock()?;
        Ok(serde_json::to_string(&DashboardSummary::collect(&db, &day)?)?)
    }

    pub fn consolidated_report_json(&self, from: String, to: String) -> Result<String, ClinicaError> {
        let db = self.db.lock()?;
        Ok(ConsolidatedReport::build(&db, &from, &to)?.to_json()?)
    }

    pub fn consolidated_report_csv(&self, from: String, to: String) -> Result<String, ClinicaError> {
        let db = self.db.lock()?;
        Ok(ConsolidatedReport::build(&db, &from, &to)?.to_csv())
    }
}

// =========================================================================
// Token validation callback
// =========================================================================

/// Outcome of checking a token against the remote API.
#[derive(Debug, Clone, uniffi::Enum)]
pub enum FfiTokenCheck {
    Valid,
    Rejected,
    Failed { status: u16, body: String },
}

/// Implemented by the native client, which owns the HTTP stack.
#[uniffi::export(callback_interface)]
pub trait FfiTokenValidator: Send + Sync {
    fn validate(&self, token: String) -> FfiTokenCheck;
}

struct CallbackValidator(Box<dyn FfiTokenValidator>);

impl TokenValidator for CallbackValidator {
    fn validate(&self, token: &str) -> Result<bool, RemoteFailure> {
        match self.0.validate(token.to_string()) {
            FfiTokenCheck::Valid => Ok(true),
            FfiTokenCheck::Rejected => Ok(false),
            FfiTokenCheck::Failed { status, body } => {
                Err(RemoteFailure::new(status, "validar token", body))
            }
        }
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe logged-in user.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiUser {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl From<FfiUser> for UserProfile {
    fn from(user: FfiUser) -> Self {
        UserProfile {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

impl From<UserProfile> for FfiUser {
    fn from(user: UserProfile) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

/// FFI-safe specialty.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSpecialty {
    pub id: i64,
    pub name: String,
}

impl From<Specialty> for FfiSpecialty {
    fn from(s: Specialty) -> Self {
        Self { id: s.id, name: s.name }
    }
}

impl From<FfiSpecialty> for Specialty {
    fn from(s: FfiSpecialty) -> Self {
        Specialty { id: s.id, name: s.name }
    }
}

/// FFI-safe queue.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiQueue {
    pub id: i64,
    pub name: String,
    pub active: bool,
    pub specialty_id: i64,
}

impl From<Queue> for FfiQueue {
    fn from(q: Queue) -> Self {
        Self {
            id: q.id,
            name: q.name,
            active: q.active,
            specialty_id: q.specialty_id,
        }
    }
}

impl From<FfiQueue> for Queue {
    fn from(q: FfiQueue) -> Self {
        Queue {
            id: q.id,
            name: q.name,
            active: q.active,
            specialty_id: q.specialty_id,
        }
    }
}

/// FFI-safe catalog medication.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMedication {
    pub id: i64,
    pub name: String,
    pub presentation: Option<String>,
    pub aliases: Vec<String>,
    pub active: bool,
}

impl From<CatalogMedication> for FfiMedication {
    fn from(m: CatalogMedication) -> Self {
        Self {
            id: m.id,
            name: m.name,
            presentation: m.presentation,
            aliases: m.aliases,
            active: m.active,
        }
    }
}

impl From<FfiMedication> for CatalogMedication {
    fn from(m: FfiMedication) -> Self {
        CatalogMedication {
            id: m.id,
            name: m.name,
            presentation: m.presentation,
            aliases: m.aliases,
            active: m.active,
        }
    }
}

/// FFI-safe medication suggestion.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSuggestion {
    pub medication: FfiMedication,
    pub score: f64,
}

/// FFI-safe address.
#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct FfiAddress {
    pub street: Option<String>,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub cep: Option<String>,
}

/// FFI-safe patient. `sex` is the single-letter code.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: i64,
    pub name: String,
    pub cpf: Option<String>,
    pub birth_date: Option<String>,
    pub sex: Option<String>,
    pub blood_type: Option<String>,
    pub parent1: Option<String>,
    pub parent2: Option<String>,
    pub address: FfiAddress,
    pub reference_farm: Option<String>,
    pub record_number: String,
    pub created_at: String,
}

impl From<Patient> for FfiPatient {
    fn from(p: Patient) -> Self {
        Self {
            record_number: p.record_number(),
            id: p.id,
            name: p.name,
            cpf: p.cpf,
            birth_date: p.birth_date,
            sex: p.sex.map(|s| s.code().to_string()),
            blood_type: p.blood_type,
            parent1: p.parent1,
            parent2: p.parent2,
            address: FfiAddress {
                street: p.address.street,
                number: p.address.number,
                complement: p.address.complement,
                district: p.address.district,
                city: p.address.city,
                state: p.address.state,
                cep: p.address.cep,
            },
            reference_farm: p.reference_farm,
            created_at: p.created_at,
        }
    }
}

impl TryFrom<FfiPatient> for Patient {
    type Error = ClinicaError;

    fn try_from(p: FfiPatient) -> Result<Self, Self::Error> {
        let sex = parse_sex(p.sex.as_deref())?;
        let mut patient = Patient::new(p.name);
        patient.id = p.id;
        patient.cpf = p.cpf;
        patient.birth_date = p.birth_date;
        patient.sex = sex;
        patient.blood_type = p.blood_type;
        patient.parent1 = p.parent1;
        patient.parent2 = p.parent2;
        patient.address = Address {
            street: p.address.street,
            number: p.address.number,
            complement: p.address.complement,
            district: p.address.district,
            city: p.address.city,
            state: p.address.state,
            cep: p.address.cep,
        };
        patient.reference_farm = p.reference_farm;
        if !p.created_at.is_empty() {
            patient.created_at = p.created_at;
        }
        Ok(patient)
    }
}

fn parse_sex(code: Option<&str>) -> Result<Option<Sex>, ClinicaError> {
    match code.map(str::trim).filter(|c| !c.is_empty()) {
        None => Ok(None),
        Some(code) => Sex::from_code(code)
            .map(Some)
            .ok_or_else(|| ClinicaError::InvalidInput(format!("unknown sex code {:?}", code))),
    }
}

/// FFI-safe list filter.
#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct FfiFilter {
    pub query: String,
    pub specialties: Vec<i64>,
    /// Sex codes ("F", "M", "O")
    pub sexes: Vec<String>,
    /// State (UF) codes
    pub states: Vec<String>,
}

impl TryFrom<FfiFilter> for SearchFilter {
    type Error = ClinicaError;

    fn try_from(f: FfiFilter) -> Result<Self, Self::Error> {
        let mut filter = SearchFilter::new().with_query(f.query);
        for id in f.specialties {
            filter = filter.with_specialty(id);
        }
        for code in f.sexes {
            if let Some(sex) = parse_sex(Some(&code))? {
                filter = filter.with_sex(sex);
            }
        }
        for state in f.states {
            filter = filter.with_state(&state);
        }
        Ok(filter)
    }
}

/// FFI-safe queue membership.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMembership {
    pub id: i64,
    pub queue_id: i64,
    pub specialty_id: i64,
    /// "waiting", "attended" or "abandoned"
    pub state: String,
    pub entered_at: String,
    pub resolved_at: Option<String>,
    pub referred_from: Option<i64>,
}

/// FFI-safe patient flow.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiFlow {
    pub id: i64,
    pub patient_id: i64,
    pub patient_name: String,
    pub triage_id: Option<i64>,
    /// Display label, e.g. "Aguardando"
    pub status: String,
    pub office: Option<String>,
    pub entered_at: String,
    pub exited_at: Option<String>,
    pub in_attendance: Option<i64>,
    pub memberships: Vec<FfiMembership>,
}

impl From<PatientFlow> for FfiFlow {
    fn from(flow: PatientFlow) -> Self {
        Self {
            status: flow.status().label().to_string(),
            id: flow.id,
            patient_id: flow.patient_id,
            patient_name: flow.patient_name,
            triage_id: flow.triage_id,
            office: flow.office,
            entered_at: flow.entered_at,
            exited_at: flow.exited_at,
            in_attendance: flow.in_attendance,
            memberships: flow
                .memberships
                .into_iter()
                .map(|m| FfiMembership {
                    id: m.id,
                    queue_id: m.queue_id,
                    specialty_id: m.specialty_id,
                    state: match m.state {
                        MembershipState::Waiting => "waiting",
                        MembershipState::Attended => "attended",
                        MembershipState::Abandoned => "abandoned",
                    }
                    .to_string(),
                    entered_at: m.entered_at,
                    resolved_at: m.resolved_at,
                    referred_from: m.referred_from,
                })
                .collect(),
        }
    }
}

/// FFI-safe queue screen row.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiWaitingEntry {
    pub flow_id: i64,
    pub membership_id: i64,
    pub queue_id: i64,
    pub specialty_id: i64,
    pub patient_id: i64,
    pub patient_name: String,
    pub cpf: Option<String>,
    pub triage_id: Option<i64>,
    pub status: String,
    pub in_attendance: bool,
    pub entered_at: String,
}

impl From<WaitingEntry> for FfiWaitingEntry {
    fn from(e: WaitingEntry) -> Self {
        Self {
            status: e.status.label().to_string(),
            flow_id: e.flow_id,
            membership_id: e.membership_id,
            queue_id: e.queue_id,
            specialty_id: e.specialty_id,
            patient_id: e.patient_id,
            patient_name: e.patient_name,
            cpf: e.cpf,
            triage_id: e.triage_id,
            in_attendance: e.in_attendance,
            entered_at: e.created_at,
        }
    }
}

/// FFI-safe finalize result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiFinalizeOutcome {
    pub flow: FfiFlow,
    pub attendance_json: String,
    pub flow_closed: bool,
}

/// FFI-safe tooth dialog contents. Faces are letters "V", "M", "D", "L", "O".
#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct FfiToothDraft {
    pub faces: Vec<String>,
    pub procedures: Vec<String>,
    pub notes: String,
}

impl TryFrom<FfiToothDraft> for ToothDraft {
    type Error = ClinicaError;

    fn try_from(d: FfiToothDraft) -> Result<Self, Self::Error> {
        let faces = d
            .faces
            .iter()
            .map(|f| parse_face(f))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ToothDraft {
            faces,
            procedures: d.procedures,
            notes: d.notes,
        })
    }
}

fn parse_face(code: &str) -> Result<Face, ClinicaError> {
    Face::ALL
        .into_iter()
        .find(|f| format!("{:?}", f).eq_ignore_ascii_case(code.trim()))
        .ok_or_else(|| ClinicaError::InvalidInput(format!("unknown tooth face {:?}", code)))
}

/// FFI-safe tooth selection.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiToothSelection {
    pub tooth: u8,
    pub quadrant: u8,
    pub faces: Vec<String>,
    pub procedures: Vec<String>,
    pub notes: String,
}

fn chart_records(chart: &ToothSelectionsMap) -> Vec<FfiToothSelection> {
    chart
        .selected()
        .map(|s| FfiToothSelection {
            tooth: s.tooth(),
            quadrant: s.quadrant(),
            faces: s.faces().iter().map(|f| format!("{:?}", f)).collect(),
            procedures: s.procedures().to_vec(),
            notes: s.notes().to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core_with_queues() -> Arc<ClinicaCore> {
        let core = open_database_in_memory().unwrap();
        for (id, name) in [(1, "Odontologia"), (2, "Clínica Geral")] {
            core.upsert_specialty(FfiSpecialty { id, name: name.into() })
                .unwrap();
            core.upsert_queue(FfiQueue {
                id,
                name: format!("Fila {}", name),
                active: true,
                specialty_id: id,
            })
            .unwrap();
        }
        core
    }

    fn patient(name: &str) -> FfiPatient {
        FfiPatient {
            id: 0,
            name: name.into(),
            cpf: None,
            birth_date: Some("1990-05-10".into()),
            sex: Some("F".into()),
            blood_type: None,
            parent1: None,
            parent2: None,
            address: FfiAddress {
                state: Some("mg".into()),
                ..FfiAddress::default()
            },
            reference_farm: None,
            record_number: String::new(),
            created_at: String::new(),
        }
    }

    struct Accept;

    impl FfiTokenValidator for Accept {
        fn validate(&self, _token: String) -> FfiTokenCheck {
            FfiTokenCheck::Valid
        }
    }

    struct Unreachable;

    impl FfiTokenValidator for Unreachable {
        fn validate(&self, _token: String) -> FfiTokenCheck {
            FfiTokenCheck::Failed {
                status: 502,
                body: "bad gateway".into(),
            }
        }
    }

    #[test]
    fn test_full_flow_over_ffi() {
        let core = core_with_queues();
        let registered = core.register_patient(patient("João da Silva")).unwrap();
        assert_eq!(registered.record_number, format!("{:06}", registered.id));

        let mut triage = Triage::new(registered.id, String::new(), "Enf. Carla".into());
        triage.specialties = vec![
            Specialty { id: 1, name: "Odontologia".into() },
            Specialty { id: 2, name: "Clínica Geral".into() },
        ];
        let triage: Triage =
            serde_json::from_str(&core.record_triage(serde_json::to_string(&triage).unwrap()).unwrap())
                .unwrap();

        let flow = core.enter_queues(triage.id).unwrap();
        assert_eq!(flow.status, "Aguardando");

        let filter = FfiFilter {
            query: "JOAO".into(),
            ..FfiFilter::default()
        };
        assert_eq!(core.waiting_entries(filter).unwrap().len(), 2);

        let attendance: Attendance = serde_json::from_str(
            &core
                .begin_attendance(flow.id, flow.memberships[0].id, "Dra. Lima".into(), None)
                .unwrap(),
        )
        .unwrap();

        let chart = core
            .set_tooth(
                attendance.id,
                36,
                FfiToothDraft {
                    faces: vec!["o".into(), "M".into()],
                    procedures: vec!["Restauração".into()],
                    notes: String::new(),
                },
                false,
            )
            .unwrap();
        assert_eq!(chart[0].quadrant, 3);
        assert_eq!(chart[0].faces, vec!["M", "O"]);

        let chart = core
            .remove_tooth_procedure(attendance.id, 36, "Restauração".into())
            .unwrap();
        assert_eq!(chart.len(), 1, "faces keep the tooth selected");

        let stored = core.db.lock().unwrap().get_attendance(attendance.id).unwrap().unwrap();
        let outcome = core
            .finalize_attendance(serde_json::to_string(&stored).unwrap())
            .unwrap();
        assert!(!outcome.flow_closed);
        assert_eq!(outcome.flow.memberships[1].state, "waiting");

        let rest = core.queue_entries(2, FfiFilter::default()).unwrap();
        assert_eq!(rest.len(), 1);
    }

    #[test]
    fn test_error_mapping() {
        let core = core_with_queues();
        assert!(matches!(
            core.enter_queues(99),
            Err(ClinicaError::NotFound(_))
        ));
        assert!(matches!(
            core.register_patient(FfiPatient {
                sex: Some("X".into()),
                ..patient("Ana")
            }),
            Err(ClinicaError::InvalidInput(_))
        ));
        assert!(matches!(
            core.dashboard_json("hoje".into()),
            Err(ClinicaError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_session_over_ffi() {
        let core = open_database_in_memory().unwrap();
        let user = FfiUser {
            id: 1,
            name: "Dra. Lima".into(),
            email: None,
            role: None,
        };
        core.begin_session("tok".into(), user).unwrap();
        assert_eq!(core.bearer_header().unwrap().as_deref(), Some("Bearer tok"));

        let restored = core.restore_session(Box::new(Accept)).unwrap();
        assert_eq!(restored.unwrap().name, "Dra. Lima");

        match core.restore_session(Box::new(Unreachable)) {
            Err(ClinicaError::RemoteError { status, message }) => {
                assert_eq!(status, 502);
                assert_eq!(message, "Erro 502 ao validar token: bad gateway");
            }
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
        assert!(core.bearer_header().unwrap().is_none());
    }

    #[test]
    fn test_parse_face() {
        assert_eq!(parse_face(" v ").unwrap(), Face::V);
        assert!(parse_face("X").is_err());
    }
}
