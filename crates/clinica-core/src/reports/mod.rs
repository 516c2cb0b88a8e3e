//! Operational reports: dashboard counters and the consolidated attendance report.

mod consolidated;
mod dashboard;

pub use consolidated::*;
pub use dashboard::*;

use thiserror::Error;

use crate::db::DbError;

/// Report errors.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Invalid range: {from} is after {to}")]
    InvalidRange { from: String, to: String },
}

pub type ReportResult<T> = Result<T, ReportError>;

/// Parse a `YYYY-MM-DD` day.
pub(crate) fn parse_day(day: &str) -> ReportResult<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(day.trim(), "%Y-%m-%d")
        .map_err(|_| ReportError::InvalidDate(day.to_string()))
}
