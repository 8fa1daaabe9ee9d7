use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{Method, header};
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};

use crate::handlers;
use crate::state::AppState;

/// Multipart framing allowance on top of the largest accepted file.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

pub fn router(state: Arc<AppState>) -> Router {
    let body_limit =
        DefaultBodyLimit::max(state.max_upload_bytes().saturating_add(MULTIPART_OVERHEAD));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers([header::CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST]);

    Router::new()
        .route("/", get(handlers::index::index))
        .route("/upload", post(handlers::upload::upload))
        .route("/progress/{task_id}", get(handlers::progress::progress))
        .route("/cancel/{task_id}", post(handlers::cancel::cancel))
        .layer(body_limit)
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tmj_core::{BackendError, PageSource, PdfBackend, TaskStore};
    use tmj_parsing::SectionExtractor;
    use tower::ServiceExt;

    const BOUNDARY: &str = "tmj-test-boundary";

    const JOURNAL_PAGE: &str = "\
Class 9
1234567 21/03/2024
Application No: 7654321
CORRIGENDA
1111111 ABC
FOLLOWING TRADE MARKS REGISTRATION RENEWED
5550001 5550002 5550003 5550004 5550005
PR SECTION
9999999 - Proprietor";

    struct FakeBackend {
        pages: Vec<String>,
    }

    struct FakePages(Vec<String>);

    impl PdfBackend for FakeBackend {
        fn open(&self, _path: &Path) -> Result<Box<dyn PageSource>, BackendError> {
            Ok(Box::new(FakePages(self.pages.clone())))
        }
    }

    impl PageSource for FakePages {
        fn page_count(&self) -> usize {
            self.0.len()
        }

        fn page_text(&mut self, index: usize) -> Result<String, BackendError> {
            Ok(self.0[index].clone())
        }
    }

    struct BrokenBackend;

    impl PdfBackend for BrokenBackend {
        fn open(&self, _path: &Path) -> Result<Box<dyn PageSource>, BackendError> {
            Err(BackendError::OpenError("not a PDF".into()))
        }
    }

    /// Cancels the named task as soon as the document is opened.
    struct CancellingBackend {
        tasks: Arc<TaskStore>,
        task_id: String,
    }

    impl PdfBackend for CancellingBackend {
        fn open(&self, _path: &Path) -> Result<Box<dyn PageSource>, BackendError> {
            self.tasks.cancel(&self.task_id);
            Ok(Box::new(FakePages(vec![JOURNAL_PAGE.to_string()])))
        }
    }

    fn state_with(backend: Arc<dyn PdfBackend>, tasks: Arc<TaskStore>) -> Arc<AppState> {
        Arc::new(AppState {
            tasks,
            extractor: SectionExtractor::new(),
            backend,
            max_upload_mb: 50,
        })
    }

    fn journal_state() -> Arc<AppState> {
        let backend = FakeBackend {
            pages: vec![JOURNAL_PAGE.to_string()],
        };
        state_with(Arc::new(backend), Arc::new(TaskStore::default()))
    }

    fn multipart_body(file: Option<(&str, &[u8])>, task_id: Option<&str>) -> Vec<u8> {
        let mut body = Vec::new();
        if let Some(id) = task_id {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"task_id\"\r\n\r\n{id}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((filename, data)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"pdf_file\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(body: Vec<u8>) -> Request<Body> {
        multipart_request(Body::from(body))
    }

    /// Sends the body in 64 KiB frames, the way a client streams a large upload.
    fn chunked_upload_request(body: Vec<u8>) -> Request<Body> {
        let chunks: Vec<Result<Vec<u8>, std::io::Error>> =
            body.chunks(64 * 1024).map(|c| Ok(c.to_vec())).collect();
        multipart_request(Body::from_stream(futures_util::stream::iter(chunks)))
    }

    fn multipart_request(body: Body) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(body)
            .unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_index_reports_running_with_cors() {
        let app = router(journal_state());
        let request = Request::builder()
            .uri("/")
            .header(header::ORIGIN, "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"PDF Number Extractor API is running");
    }

    #[tokio::test]
    async fn test_upload_returns_every_section() {
        let state = journal_state();
        let body = multipart_body(Some(("journal.pdf", b"%PDF-1.4")), None);
        let (status, json) = send(router(state.clone()), upload_request(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json["advertisement"],
            serde_json::json!([
                "1234567", "7654321", "1111111", "5550001", "5550002", "5550003", "5550004",
                "5550005", "9999999"
            ])
        );
        assert_eq!(json["corrigenda"], serde_json::json!(["1111111"]));
        assert_eq!(
            json["rc"],
            serde_json::json!(["5550001", "5550002", "5550003", "5550004", "5550005"])
        );
        assert_eq!(
            json["renewal"],
            serde_json::json!(["5550001", "5550002", "5550003", "5550004", "5550005", "9999999"])
        );
        assert_eq!(json["pr_section"], serde_json::json!(["9999999"]));

        let task_id = json["task_id"].as_str().unwrap().to_string();
        let (status, progress) = send(
            router(state),
            Request::builder()
                .uri(format!("/progress/{task_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(progress["status"], "completed");
        assert_eq!(progress["progress"], 100.0);
        assert_eq!(progress["current_section"], "pr_section");
    }

    #[tokio::test]
    async fn test_upload_rejects_non_pdf_without_creating_task() {
        let state = journal_state();
        let body = multipart_body(Some(("notes.txt", b"hello")), None);
        let (status, json) = send(router(state.clone()), upload_request(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Only PDF files are allowed");
        assert!(state.tasks.is_empty());
    }

    #[tokio::test]
    async fn test_upload_without_file() {
        let state = journal_state();
        let task_id = uuid::Uuid::new_v4().to_string();
        let body = multipart_body(None, Some(&task_id));
        let (status, json) = send(router(state.clone()), upload_request(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No file uploaded");
        assert!(state.tasks.is_empty());
    }

    fn one_mb_state() -> Arc<AppState> {
        Arc::new(AppState {
            tasks: Arc::new(TaskStore::default()),
            extractor: SectionExtractor::new(),
            backend: Arc::new(FakeBackend { pages: vec![] }),
            max_upload_mb: 1,
        })
    }

    /// Larger than a 1 MB upload plus the multipart allowance.
    fn past_body_limit() -> Vec<u8> {
        vec![b'0'; 3 * 1024 * 1024]
    }

    #[tokio::test]
    async fn test_upload_past_body_limit_checks_extension_first() {
        let state = one_mb_state();
        let data = past_body_limit();
        let body = multipart_body(Some(("scan.tiff", &data)), None);
        let (status, json) = send(router(state.clone()), chunked_upload_request(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Only PDF files are allowed");
        assert!(state.tasks.is_empty());
    }

    #[tokio::test]
    async fn test_upload_past_body_limit_is_oversize() {
        let state = one_mb_state();
        let data = past_body_limit();
        let body = multipart_body(Some(("journal.pdf", &data)), None);
        let (status, json) = send(router(state.clone()), chunked_upload_request(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "File size exceeds 1MB limit");
        assert!(state.tasks.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_unknown_field_is_reported() {
        let state = one_mb_state();
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"notes\"\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(&past_body_limit());
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(&multipart_body(Some(("journal.pdf", b"%PDF-1.4")), None));
        let (status, json) = send(router(state.clone()), chunked_upload_request(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error = json["error"].as_str().unwrap();
        assert!(
            error.starts_with("Failed to read form field notes"),
            "{error}"
        );
        assert!(state.tasks.is_empty());
    }

    #[tokio::test]
    async fn test_upload_rejects_oversize_file() {
        let state = one_mb_state();
        let data = vec![b'0'; 1024 * 1024 + 1];
        let body = multipart_body(Some(("big.pdf", &data)), None);
        let (status, json) = send(router(state.clone()), upload_request(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "File size exceeds 1MB limit");
        assert!(state.tasks.is_empty());
    }

    #[tokio::test]
    async fn test_upload_open_failure_is_unprocessable() {
        let state = state_with(Arc::new(BrokenBackend), Arc::new(TaskStore::default()));
        let body = multipart_body(Some(("journal.pdf", b"garbage")), None);
        let (status, json) = send(router(state.clone()), upload_request(body)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            json["error"],
            "Error processing PDF: failed to open PDF: not a PDF"
        );
        let task_id = json["task_id"].as_str().unwrap();
        let snapshot = state.tasks.snapshot(task_id).unwrap();
        assert_eq!(snapshot.status, tmj_core::TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_cancelled_upload_reports_cancellation() {
        let tasks = Arc::new(TaskStore::default());
        let task_id = uuid::Uuid::new_v4().to_string();
        let backend = CancellingBackend {
            tasks: tasks.clone(),
            task_id: task_id.clone(),
        };
        let state = state_with(Arc::new(backend), tasks);

        let body = multipart_body(Some(("journal.pdf", b"%PDF-1.4")), Some(&task_id));
        let (status, json) = send(router(state.clone()), upload_request(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["error"], "Processing cancelled by user");
        assert_eq!(json["task_id"], task_id.as_str());
        assert!(json.get("advertisement").is_none());

        let (_, progress) = send(
            router(state),
            Request::builder()
                .uri(format!("/progress/{task_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(progress["status"], "cancelled");
    }

    #[tokio::test]
    async fn test_duplicate_task_id_is_rejected() {
        let state = journal_state();
        let (task_id, _cancel) = state.tasks.create();

        let body = multipart_body(Some(("journal.pdf", b"%PDF-1.4")), Some(&task_id));
        let (status, json) = send(router(state.clone()), upload_request(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("already in use"));
        assert_eq!(state.tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_task_is_not_found() {
        let state = journal_state();

        let (status, json) = send(
            router(state.clone()),
            Request::builder()
                .uri("/progress/does-not-exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Invalid task ID");

        let (status, json) = send(
            router(state),
            Request::builder()
                .method("POST")
                .uri("/cancel/does-not-exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Invalid task ID");
    }

    #[tokio::test]
    async fn test_cancel_trips_token_of_running_task() {
        let state = journal_state();
        let (task_id, cancel) = state.tasks.create();

        let (status, json) = send(
            router(state.clone()),
            Request::builder()
                .method("POST")
                .uri(format!("/cancel/{task_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "cancellation_requested");
        assert_eq!(json["task_id"], task_id.as_str());
        assert!(cancel.is_cancelled());

        let (_, progress) = send(
            router(state),
            Request::builder()
                .uri(format!("/progress/{task_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(progress["status"], "cancelled");
        assert_eq!(progress["current_section"], "");
    }
}
