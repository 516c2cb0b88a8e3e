//! HTTP routes of the document service.
//!
//! Every route takes its payload as JSON and answers with the rendered file
//! as an attachment.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use clinica_core::models::Triage;
use clinica_core::reports::ConsolidatedReport;

use crate::config::DocsConfig;
use crate::documents::{
    render_attendance, render_consolidated, render_exam_request, render_prescription,
    render_triage, AttendanceDocument, DocumentKind, ExamRequestDocument, PrescriptionDocument,
};
use crate::error::ApiError;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    config: Arc<DocsConfig>,
}

impl AppState {
    pub fn new(config: DocsConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    fn clinic(&self) -> &str {
        self.config.clinic_name()
    }
}

/// Build the router with every document route under `/api/`.
pub fn documents_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/documents/prescricao", post(prescription))
        .route("/api/documents/exames", post(exam_request))
        .route("/api/documents/triagem", post(triage_sheet))
        .route("/api/documents/atendimento", post(attendance_summary))
        .route("/api/reports/consolidado", post(consolidated))
        .with_state(state)
}

fn payload<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

fn attachment(kind: DocumentKind, content_type: &'static str, extension: &str, bytes: Vec<u8>) -> Response {
    let file_name = kind.file_name(chrono::Local::now(), extension);
    info!(document = kind.slug(), bytes = bytes.len(), "Document generated");
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response()
}

fn pdf(kind: DocumentKind, bytes: Vec<u8>) -> Response {
    attachment(kind, "application/pdf", "pdf", bytes)
}

async fn health() -> &'static str {
    "ok"
}

async fn prescription(
    State(state): State<AppState>,
    body: Result<Json<PrescriptionDocument>, JsonRejection>,
) -> Result<Response, ApiError> {
    let doc = payload(body)?;
    let bytes = render_prescription(state.clinic(), &doc)?;
    Ok(pdf(DocumentKind::Prescription, bytes))
}

async fn exam_request(
    State(state): State<AppState>,
    body: Result<Json<ExamRequestDocument>, JsonRejection>,
) -> Result<Response, ApiError> {
    let doc = payload(body)?;
    let bytes = render_exam_request(state.clinic(), &doc)?;
    Ok(pdf(DocumentKind::ExamRequest, bytes))
}

async fn triage_sheet(
    State(state): State<AppState>,
    body: Result<Json<Triage>, JsonRejection>,
) -> Result<Response, ApiError> {
    let triage = payload(body)?;
    let bytes = render_triage(state.clinic(), &triage)?;
    Ok(pdf(DocumentKind::TriageSheet, bytes))
}

async fn attendance_summary(
    State(state): State<AppState>,
    body: Result<Json<AttendanceDocument>, JsonRejection>,
) -> Result<Response, ApiError> {
    let doc = payload(body)?;
    let bytes = render_attendance(state.clinic(), &doc)?;
    Ok(pdf(DocumentKind::AttendanceSummary, bytes))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    /// `pdf` (default) or `csv`
    #[serde(default)]
    pub format: Option<String>,
}

async fn consolidated(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
    body: Result<Json<ConsolidatedReport>, JsonRejection>,
) -> Result<Response, ApiError> {
    let report = payload(body)?;
    match query.format.as_deref().unwrap_or("pdf") {
        "pdf" => {
            let bytes = render_consolidated(state.clinic(), &report)?;
            Ok(pdf(DocumentKind::ConsolidatedReport, bytes))
        }
        "csv" => Ok(attachment(
            DocumentKind::ConsolidatedReport,
            "text/csv; charset=utf-8",
            "csv",
            report.to_csv().into_bytes(),
        )),
        other => Err(ApiError::BadRequest(format!("Formato desconhecido: {}", other))),
    }
}
