//! HTTP-level tests of the document routes.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use clinica_docs::{documents_router, AppState, DocsConfig};

fn app() -> Router {
    documents_router(AppState::new(DocsConfig::default()))
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

fn patient() -> Value {
    json!({ "name": "Maria da Conceição", "record_number": "000042" })
}

fn report() -> Value {
    json!({
        "from": "2024-03-01",
        "to": "2024-03-31",
        "generated_at": "2024-04-01T08:00:00Z",
        "lines": [{
            "attendance_id": 7,
            "finished_at": "2024-03-05T10:20:00Z",
            "patient_id": 42,
            "patient_name": "Silva, Maria",
            "specialty_name": "Odontologia",
            "professional": "Dra. Lima",
            "procedures": ["Restauração", "11: Extração"],
            "prescriptions": 1,
            "exam_requests": 0
        }],
        "totals": [{ "specialty_name": "Odontologia", "attendances": 1 }],
        "patients": 1
    })
}

#[tokio::test]
async fn prescription_returns_pdf_attachment() {
    let body = json!({
        "patient": patient(),
        "professional": "Dra. Lima",
        "items": [{
            "medication": { "kind": "free_text", "name": "Dipirona 500mg" },
            "quantity": "10",
            "unit": "comprimidos",
            "frequency": "6/6h se dor"
        }]
    });

    let response = app()
        .oneshot(post_json("/api/documents/prescricao", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/pdf"
    );
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"prescricao-"));
    assert!(disposition.ends_with(".pdf\""));

    let bytes = body_bytes(response).await;
    assert!(!bytes.is_empty());
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn empty_prescription_is_unprocessable() {
    let body = json!({ "patient": patient(), "professional": "Dra. Lima", "items": [] });

    let response = app()
        .oneshot(post_json("/api/documents/prescricao", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let error: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(error["error"]["code"], "INCOMPLETE_DOCUMENT");
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/documents/exames")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();

    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn exam_request_renders() {
    let body = json!({
        "patient": patient(),
        "professional": "Dr. Reis",
        "exams": [{ "name": "Hemograma completo" }, { "name": "Raio-X panorâmico", "notes": "urgente" }],
        "indication": "Dor persistente"
    });

    let response = app()
        .oneshot(post_json("/api/documents/exames", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn minimal_triage_renders() {
    let body = json!({
        "id": 1,
        "patient_id": 42,
        "patient_name": "Maria",
        "age": null,
        "record_number": "000042",
        "specialties": [{ "id": 1, "name": "Odontologia" }],
        "situation": "Dor de dente",
        "vitals": {},
        "comorbidity": "não",
        "comorbidity_details": null,
        "medication_24h": "",
        "allergy": "sim",
        "allergy_details": null,
        "collected_by": "Enf. Carla",
        "collected_at": "2024-03-05T09:00:00Z"
    });

    let response = app()
        .oneshot(post_json("/api/documents/triagem", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/pdf"
    );
}

#[tokio::test]
async fn attendance_summary_renders() {
    let body = json!({
        "patient": patient(),
        "attendance": {
            "attendance_id": 7,
            "flow_id": 3,
            "specialty_id": 1,
            "specialty_name": "Odontologia",
            "professional": "Dra. Lima",
            "started_at": "2024-03-05T10:00:00Z",
            "finished_at": "2024-03-05T10:20:00Z",
            "evolution": "Paciente com cárie em 11.",
            "prescriptions": [],
            "procedures": ["11: Restauração (M, D)"],
            "exam_requests": []
        }
    });

    let response = app()
        .oneshot(post_json("/api/documents/atendimento", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn consolidated_report_as_pdf_and_csv() {
    let response = app()
        .oneshot(post_json("/api/reports/consolidado", &report()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/pdf"
    );

    let response = app()
        .oneshot(post_json("/api/reports/consolidado?format=csv", &report()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.ends_with(".csv\""));

    let csv = String::from_utf8(body_bytes(response).await).unwrap();
    let mut lines = csv.lines();
    assert!(lines.next().unwrap().starts_with("atendimento,data,"));
    assert!(lines.next().unwrap().contains("\"Silva, Maria\""));
}

#[tokio::test]
async fn unknown_report_format_is_bad_request() {
    let response = app()
        .oneshot(post_json("/api/reports/consolidado?format=xlsx", &report()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
