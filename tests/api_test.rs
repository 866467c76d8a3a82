//! API-layer integration tests driven through the router directly, without a live
//! worker. Exercises request validation, status reads, webhook reconciliation, and
//! error mapping (SPEC_FULL.md §6, §7).

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use dispatcher::api::{self, state::AppState};
use dispatcher::cache::StatusCache;
use dispatcher::config::Config;
use dispatcher::domain::{Job, JobStatus};
use dispatcher::humanize::ByteSize;
use dispatcher::observability::Metrics;
use dispatcher::queue::JobQueue;
use dispatcher::store::JobStore;
use dispatcher::vendor::{VendorClient, VendorConfig};

/// A port nothing listens on, so vendor calls fail fast with a connection error
/// rather than hanging. These tests never exercise vendor dispatch directly.
const UNREACHABLE_VENDOR_URL: &str = "http://127.0.0.1:9";

fn test_vendors() -> Arc<VendorClient> {
    Arc::new(
        VendorClient::new(
            vec![
                VendorConfig::builder()
                    .name("syncVendor".to_string())
                    .url(UNREACHABLE_VENDOR_URL.to_string())
                    .rate_limit_per_minute(60)
                    .is_async(false)
                    .build(),
                VendorConfig::builder()
                    .name("asyncVendor".to_string())
                    .url(UNREACHABLE_VENDOR_URL.to_string())
                    .rate_limit_per_minute(60)
                    .is_async(true)
                    .build(),
            ],
            "http://localhost:8080".to_string(),
        )
        .unwrap(),
    )
}

fn build_state(config: Config) -> (AppState, Arc<JobStore>, Arc<JobQueue>, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(JobStore::open(dir.path().join("jobs")).unwrap());
    let queue = Arc::new(JobQueue::open(dir.path().join("queue")).unwrap());
    let cache = Arc::new(StatusCache::default());
    let vendors = test_vendors();
    let metrics = Arc::new(Metrics::new());
    let state = AppState::new(
        config,
        store.clone(),
        queue.clone(),
        cache,
        vendors,
        metrics,
    );
    (state, store, queue, dir)
}

async fn response_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn create_job_accepts_valid_payload_and_returns_request_id() {
    let (state, ..) = build_state(Config::default());
    let app = api::router(state);

    let response = app
        .oneshot(json_request("POST", "/jobs", json!({"type": "sync", "url": "x"})))
        .await
        .unwrap();

    let (status, body) = response_json(response).await;
    assert_eq!(status, StatusCode::OK);
    let request_id = body["request_id"].as_str().expect("request_id present");
    assert!(Uuid::parse_str(request_id).is_ok());
}

#[tokio::test]
async fn create_job_rejects_non_json_content_type() {
    let (state, ..) = build_state(Config::default());
    let app = api::router(state);

    let request = Request::builder()
        .method("POST")
        .uri("/jobs")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("hello"))
        .unwrap();

    let (status, body) = response_json(app.oneshot(request).await.unwrap()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_PAYLOAD");
}

#[tokio::test]
async fn create_job_rejects_empty_object() {
    let (state, ..) = build_state(Config::default());
    let app = api::router(state);

    let (status, body) = response_json(
        app.oneshot(json_request("POST", "/jobs", json!({})))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_PAYLOAD");
}

#[tokio::test]
async fn create_job_rejects_oversized_payload() {
    let mut config = Config::default();
    config.max_payload_bytes = ByteSize(10);
    let (state, ..) = build_state(config);
    let app = api::router(state);

    let big_payload = json!({"data": "x".repeat(200)});
    let (status, body) = response_json(
        app.oneshot(json_request("POST", "/jobs", big_payload))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn get_job_returns_pending_job_after_creation() {
    let (state, store, ..) = build_state(Config::default());
    let request_id = Uuid::new_v4().to_string();
    store
        .create(Job::new_pending(request_id.clone(), json!({"type": "sync"})))
        .unwrap();

    let app = api::router(state);
    let request = Request::builder()
        .method("GET")
        .uri(format!("/jobs/{request_id}"))
        .body(Body::empty())
        .unwrap();

    let (status, body) = response_json(app.oneshot(request).await.unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");
}

#[tokio::test]
async fn get_job_404_for_unknown_id() {
    let (state, ..) = build_state(Config::default());
    let app = api::router(state);

    let request = Request::builder()
        .method("GET")
        .uri(format!("/jobs/{}", Uuid::new_v4()))
        .body(Body::empty())
        .unwrap();

    let (status, body) = response_json(app.oneshot(request).await.unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn webhook_reconciles_pending_job_to_complete() {
    let (state, store, ..) = build_state(Config::default());
    let request_id = Uuid::new_v4().to_string();
    store
        .create(Job::new_pending(request_id.clone(), json!({"type": "async"})))
        .unwrap();
    store
        .update_status(&request_id, JobStatus::Processing, Some("asyncVendor"))
        .unwrap();

    let app = api::router(state);
    let webhook_body = json!({
        "requestId": request_id,
        "status": "complete",
        "result": {"ok": true},
    });
    let (status, body) = response_json(
        app.oneshot(json_request(
            "POST",
            "/vendor-webhook/asyncVendor",
            webhook_body,
        ))
        .await
        .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let job = store.find_by_id(&request_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Complete);
    assert_eq!(job.result, Some(json!({"ok": true})));
}

#[tokio::test]
async fn webhook_rejects_unknown_request_id() {
    let (state, ..) = build_state(Config::default());
    let app = api::router(state);

    let webhook_body = json!({"requestId": Uuid::new_v4().to_string(), "status": "complete"});
    let (status, body) = response_json(
        app.oneshot(json_request(
            "POST",
            "/vendor-webhook/asyncVendor",
            webhook_body,
        ))
        .await
        .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "UNKNOWN_JOB");
}

#[tokio::test]
async fn webhook_rejects_invalid_status() {
    let (state, store, ..) = build_state(Config::default());
    let request_id = Uuid::new_v4().to_string();
    store
        .create(Job::new_pending(request_id.clone(), json!({"type": "async"})))
        .unwrap();

    let app = api::router(state);
    let webhook_body = json!({"requestId": request_id, "status": "bogus"});
    let (status, body) = response_json(
        app.oneshot(json_request(
            "POST",
            "/vendor-webhook/asyncVendor",
            webhook_body,
        ))
        .await
        .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_STATUS");
}

#[tokio::test]
async fn health_reports_degraded_when_vendors_unreachable() {
    let (state, ..) = build_state(Config::default());
    let app = api::router(state);

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let (status, body) = response_json(app.oneshot(request).await.unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["components"]["database"], true);
    assert_eq!(body["components"]["vendors"]["syncVendor"], false);
}

#[tokio::test]
async fn unknown_route_returns_json_404() {
    let (state, ..) = build_state(Config::default());
    let app = api::router(state);

    let request = Request::builder()
        .method("GET")
        .uri("/does-not-exist")
        .body(Body::empty())
        .unwrap();

    let (status, body) = response_json(app.oneshot(request).await.unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["path"], "/does-not-exist");
    assert_eq!(body["method"], "GET");
}
