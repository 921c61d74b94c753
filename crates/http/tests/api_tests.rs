//! End-to-end tests of the HTTP surface over an embedded store.

#![allow(clippy::unwrap_used, reason = "test code")]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use notescan_core::WIPE_CONFIRMATION;
use notescan_http::{create_router, AppState, CONFIRM_RESET_HEADER};
use notescan_service::{IngestionService, ReconcileService, RegistryService, WipeGate};
use notescan_storage::{SerialRegistry, SqliteStore};
use notescan_vision::{
    ProgressObserver, Recognition, RecognitionRequest, Recognizer, VisionError,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "----NotescanTestBoundary";

/// Treats the upload as already-recognized text; `FAIL` is an engine error.
struct TextRecognizer;

#[async_trait]
impl Recognizer for TextRecognizer {
    async fn recognize(
        &self,
        image: &[u8],
        _request: &RecognitionRequest,
        _observer: &dyn ProgressObserver,
    ) -> Result<Recognition, VisionError> {
        let text = String::from_utf8_lossy(image).into_owned();
        if text == "FAIL" {
            return Err(VisionError::Unavailable("engine missing".into()));
        }
        Ok(Recognition { text, confidence: None })
    }
}

struct TestApp {
    router: Router,
    _dir: TempDir,
}

impl TestApp {
    fn new() -> Self {
        Self::with_limit(1024 * 1024)
    }

    fn with_limit(max_upload_bytes: usize) -> Self {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(&dir.path().join("serials.db"), 4).unwrap();
        let registry = SerialRegistry::new(Arc::new(store));
        let gate = WipeGate::new();
        let state = AppState {
            ingestion: Arc::new(
                IngestionService::new(registry.clone(), Arc::new(TextRecognizer))
                    .with_gate(gate.clone()),
            ),
            reconcile: Arc::new(ReconcileService::new(registry.clone(), gate.clone())),
            registry: Arc::new(RegistryService::new(registry, gate)),
            max_upload_bytes,
        };
        Self { router: create_router(Arc::new(state)), _dir: dir }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn upload(&self, uri: &str, files: &[(&str, &[u8])]) -> (StatusCode, Value) {
        let body = multipart(files);
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .header(header::CONTENT_LENGTH, body.len())
            .body(Body::from(body))
            .unwrap();
        self.json(request).await
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.json(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn send_json(&self, method: &str, uri: &str, payload: &Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap();
        self.json(request).await
    }
}

fn multipart(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, content) in files {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n")
                .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

#[tokio::test]
async fn health_is_plain_ok() {
    let app = TestApp::new();
    let (status, body) = app.send(Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");
}

#[tokio::test]
async fn extract_reports_per_file_results() {
    let app = TestApp::new();
    let (status, summary) = app
        .upload(
            "/extract",
            &[
                ("note1.jpg", b"LB42836549R and MF71554741C"),
                ("note2.jpg", b"FAIL"),
                ("note3.jpg", b"LB42836549R"),
            ],
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["totalCandidates"], 3);
    assert_eq!(summary["inserted"], 2);
    assert_eq!(summary["duplicates"], 1);
    assert_eq!(summary["results"][0], json!({"filename": "note1.jpg", "found": 2, "new": 2, "duplicates": 0}));
    assert_eq!(summary["results"][1]["filename"], "note2.jpg");
    assert!(summary["results"][1]["error"].is_string());
    assert_eq!(summary["results"][2]["duplicates"], 1);

    let (_, serials) = app.get("/serials").await;
    assert_eq!(serials, json!(["LB42836549R", "MF71554741C"]));
}

#[tokio::test]
async fn extract_without_files_is_bad_request() {
    let app = TestApp::new();
    let (status, body) = app.upload("/extract", &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let app = TestApp::with_limit(512);
    let big = vec![b'A'; 4096];
    let body = multipart(&[("big.jpg", &big)]);
    let request = Request::post("/extract")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    let (_, stats) = app.get("/stats").await;
    assert_eq!(stats["total"], 0);
}

#[tokio::test]
async fn manual_batch_edit_and_delete() {
    let app = TestApp::new();
    let (status, added) = app
        .send_json("POST", "/serials/batch", &json!({"serials": ["ab-123", "CD456", "AB123", "--"]}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(added, json!({"added": 2, "duplicates": 1, "skipped": 1}));

    let (_, page) = app.get("/records?q=ab1").await;
    assert_eq!(page["pagination"]["totalRecords"], 1);
    let id = page["data"][0]["id"].as_i64().unwrap();

    let (status, _) = app
        .send_json("PUT", &format!("/serials/{id}"), &json!({"serial_number": "CD456", "status": "flagged"}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, edited) = app
        .send_json("PUT", &format!("/serials/{id}"), &json!({"serial_number": "EF789", "status": "flagged"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["record"]["serial_number"], "EF789");
    assert_eq!(edited["record"]["status"], "flagged");

    let (status, _) = app
        .send_json("PUT", "/serials/99999", &json!({"serial_number": "GH000"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let delete = |serial: &str| Request::delete(format!("/serials/{serial}")).body(Body::empty()).unwrap();
    let (status, body) = app.json(delete("EF789")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let (status, _) = app.json(delete("EF789")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, stats) = app.get("/stats").await;
    assert_eq!(stats, json!({"total": 1, "confirmed": 1, "imported": 0, "flagged": 0}));
}

#[tokio::test]
async fn edit_without_status_keeps_current_status() {
    let app = TestApp::new();
    app.send_json("POST", "/serials/batch", &json!({"serials": ["AB12345678C"]})).await;
    let (_, page) = app.get("/records").await;
    let id = page["data"][0]["id"].as_i64().unwrap();

    let uri = format!("/serials/{id}");
    app.send_json("PUT", &uri, &json!({"serial_number": "AB12345678C", "status": "flagged"})).await;
    let (status, edited) = app.send_json("PUT", &uri, &json!({"serial_number": "AB12345678D"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["record"]["serial_number"], "AB12345678D");
    assert_eq!(edited["record"]["status"], "flagged");
}

#[tokio::test]
async fn records_are_paged() {
    let app = TestApp::new();
    let serials: Vec<String> = (0..5).map(|i| format!("AA1000000{i}B")).collect();
    app.send_json("POST", "/serials/batch", &json!({"serials": serials})).await;

    let (status, page) = app.get("/records?page=2&limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["data"].as_array().unwrap().len(), 2);
    assert_eq!(page["pagination"], json!({"current": 2, "limit": 2, "totalRecords": 5, "totalPages": 3}));
}

#[tokio::test]
async fn reset_requires_confirmation_header() {
    let app = TestApp::new();
    app.upload("/extract", &[("a.jpg", b"LB42836549R")]).await;

    let (status, _) = app.json(Request::post("/reset").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (_, serials) = app.get("/serials").await;
    assert_eq!(serials, json!(["LB42836549R"]));

    let request = Request::post("/reset")
        .header(CONFIRM_RESET_HEADER, WIPE_CONFIRMATION)
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.json(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let (_, serials) = app.get("/serials").await;
    assert_eq!(serials, json!([]));
}

#[tokio::test]
async fn import_then_export_csv() {
    let app = TestApp::new();
    app.upload("/extract", &[("a.jpg", b"LB42836549R")]).await;

    let csv = "serial_number,source_filename,extracted_at,status\n\
               LB42836549R,ledger.csv,2024-01-02T03:04:05.000Z,imported\n\
               MF71554741C\n\
               ,orphan.jpg\n";
    let (status, body) = app.upload("/import", &[("import.csv", csv.as_bytes())]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["inserted"], 1);
    assert_eq!(body["updated"], 1);
    assert_eq!(body["skipped"], 1);
    assert!(body["message"].as_str().unwrap().contains("1 new"));

    let response = app
        .router
        .clone()
        .oneshot(Request::get("/export?format=csv").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_owned();
    assert!(disposition.starts_with("attachment; filename=\"serials-"));
    assert!(disposition.ends_with(".csv\""));
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.starts_with("serial_number,source_filename,extracted_at,status\n"));
    assert!(text.contains("LB42836549R,ledger.csv,2024-01-02T03:04:05.000Z,imported"));
    assert!(text.contains("MF71554741C,csv_import,"));
}

#[tokio::test]
async fn export_formats() {
    let app = TestApp::new();
    app.upload("/extract", &[("a.jpg", b"LB42836549R")]).await;

    let (status, body) = app.send(Request::get("/export?format=sql").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains("INSERT INTO serials"));

    let (status, body) = app.send(Request::get("/export?format=db").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with(b"SQLite format 3\0"));

    let (status, body) = app.get("/export?format=xml").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("xml"));
}
