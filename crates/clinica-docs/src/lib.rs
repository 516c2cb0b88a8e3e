//! Printable documents for the clinic.
//!
//! Renders prescriptions, exam requests, triage sheets, attendance summaries
//! and the consolidated report as PDF, and serves them over HTTP.

pub mod config;
pub mod documents;
pub mod error;
pub mod pdf;
pub mod routes;

pub use config::DocsConfig;
pub use documents::{
    render_attendance, render_consolidated, render_exam_request, render_prescription,
    render_triage, AttendanceDocument, DocumentKind, ExamRequestDocument, PatientHeader,
    PrescriptionDocument,
};
pub use error::{ApiError, DocumentError};
pub use routes::{documents_router, AppState};
