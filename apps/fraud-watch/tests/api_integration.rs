//! Dashboard API Integration Tests
//!
//! Drives the axum router in process with stub feed and report adapters.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, BodyDataStream};
use axum::http::{Request, StatusCode, header};
use futures::StreamExt;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use fraud_watch::infrastructure::api::router;
use fraud_watch::{
    ApiState, init_metrics, DashboardService, FeedError, FeedStatus, ReconciliationConfig, ReportError,
    ReportId, ReportRequest, ReportSink, SnapshotSource, TimeWindow, TransactionRecord,
};

struct StaticSource(Result<Vec<TransactionRecord>, FeedError>);

#[async_trait]
impl SnapshotSource for StaticSource {
    async fn fetch(&self, _window: Option<TimeWindow>) -> Result<Vec<TransactionRecord>, FeedError> {
        self.0.clone()
    }
}

struct StaticSink(Result<ReportId, ReportError>);

#[async_trait]
impl ReportSink for StaticSink {
    async fn submit(&self, _request: &ReportRequest) -> Result<ReportId, ReportError> {
        self.0.clone()
    }
}

fn snapshot() -> Vec<TransactionRecord> {
    vec![
        TransactionRecord::new("t1", "A", "B", Decimal::new(100, 0)).with_probability(0.1),
        TransactionRecord::new("t2", "A", "C", Decimal::new(250, 0)).with_probability(0.95),
        TransactionRecord::new("t3", "C", "B", Decimal::new(40, 0)).with_fraud_flag(true),
    ]
}

struct Harness {
    app: Router,
    service: Arc<DashboardService>,
}

fn harness(
    source: Result<Vec<TransactionRecord>, FeedError>,
    sink: Option<Result<ReportId, ReportError>>,
) -> Harness {
    let service = Arc::new(DashboardService::new(ReconciliationConfig::default()));
    let report_sink = sink.map(|s| Arc::new(StaticSink(s)) as Arc<dyn ReportSink>);
    let state = Arc::new(ApiState::new(
        "test-0.0.1".to_string(),
        Arc::clone(&service),
        Arc::new(FeedStatus::new()),
        Arc::new(StaticSource(source)),
        report_sink,
        CancellationToken::new(),
    ));
    Harness {
        app: router(state),
        service,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(app: &Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    let request = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, bytes) = send(app, request).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn next_frame(frames: &mut BodyDataStream) -> String {
    let frame = tokio::time::timeout(Duration::from_secs(2), frames.next())
        .await
        .expect("no event within 2s")
        .expect("event stream ended")
        .unwrap();
    String::from_utf8(frame.to_vec()).unwrap()
}

// =============================================================================
// Health Tests
// =============================================================================

#[tokio::test]
async fn test_liveness_always_ok() {
    let h = harness(Ok(vec![]), None);
    let (status, body) = get(&h.app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
}

#[tokio::test]
async fn test_readiness_follows_snapshot_load() {
    let h = harness(Ok(snapshot()), None);

    let (status, _) = get(&h.app, "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = post_json(&h.app, "/api/refresh", &json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(&h.app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"READY");
}

#[tokio::test]
async fn test_health_reports_unhealthy_before_any_data() {
    let h = harness(Ok(vec![]), None);
    let (status, body) = get(&h.app, "/health").await;
    let body: Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["version"], "test-0.0.1");
    assert_eq!(body["snapshot_loaded"], false);
}

// =============================================================================
// View Tests
// =============================================================================

#[tokio::test]
async fn test_refresh_then_dashboard() {
    let h = harness(Ok(snapshot()), None);

    let (status, body) = post_json(&h.app, "/api/refresh", &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["transactions"], 3);

    let (status, bytes) = get(&h.app, "/api/dashboard").await;
    assert_eq!(status, StatusCode::OK);
    let view: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(view["kpis"]["total_transactions"], 3);
    assert_eq!(view["kpis"]["total_alerts"], 2);
    assert_eq!(view["accounts"].as_array().unwrap().len(), 3);
    assert_eq!(view["alerts"][0]["id"], "t3");
    assert_eq!(view["hourly"].as_array().unwrap().len(), 24);
}

#[tokio::test]
async fn test_partial_views() {
    let h = harness(Ok(snapshot()), None);
    h.service.load_snapshot(&snapshot());

    let (_, bytes) = get(&h.app, "/api/kpis").await;
    let kpis: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(kpis["confirmed_frauds"], 1);
    assert_eq!(kpis["suspected_frauds"], 1);

    let (_, bytes) = get(&h.app, "/api/alerts").await;
    let alerts: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(alerts.as_array().unwrap().len(), 2);

    let (_, bytes) = get(&h.app, "/api/accounts").await;
    let accounts: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(accounts[0]["id"], "A");
    assert_eq!(accounts[0]["risk"], true);
}

#[tokio::test]
async fn test_failed_refresh_keeps_projection() {
    let h = harness(
        Err(FeedError::Transport {
            message: "connection refused".to_string(),
        }),
        None,
    );
    h.service.load_snapshot(&snapshot());
    let before = h.service.revision();

    let (status, body) = post_json(&h.app, "/api/refresh", &json!({})).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
    assert_eq!(h.service.revision(), before);
    assert_eq!(h.service.kpis().total_transactions, 3);
}

#[tokio::test]
async fn test_events_stream_publishes_each_revision() {
    let h = harness(Ok(vec![]), None);
    let records = snapshot();
    h.service.apply(&records[1]);

    let response = h
        .app
        .clone()
        .oneshot(Request::get("/api/events").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/event-stream"), "{content_type}");

    let mut frames = response.into_body().into_data_stream();

    let first = next_frame(&mut frames).await;
    assert!(first.contains("event: dashboard"), "{first}");
    assert!(first.contains("\"revision\":1"), "{first}");
    assert!(first.contains("\"total_alerts\":1"), "{first}");

    h.service.apply(&records[2]);
    let second = next_frame(&mut frames).await;
    assert!(second.contains("\"revision\":2"), "{second}");
    assert!(second.contains("\"total_alerts\":2"), "{second}");
}

#[tokio::test]
async fn test_metrics_rendered_after_init() {
    init_metrics().unwrap();
    let h = harness(Ok(snapshot()), None);
    let (status, _) = post_json(&h.app, "/api/refresh", &json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(&h.app, "/metrics").await;
    let text = String::from_utf8(body).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert!(
        text.contains("fraud_watch_snapshot_loads_total{outcome=\"success\"}"),
        "{text}"
    );
}

// =============================================================================
// Report Tests
// =============================================================================

#[tokio::test]
async fn test_report_without_sink_is_unavailable() {
    let h = harness(Ok(vec![]), None);
    let (status, body) = post_json(&h.app, "/api/reports", &json!({"type": "daily"})).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_report_submitted() {
    let h = harness(Ok(vec![]), Some(Ok(ReportId("r-17".to_string()))));
    h.service.load_snapshot(&snapshot());

    let (status, body) = post_json(&h.app, "/api/reports", &json!({"type": "daily"})).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["report_id"], "r-17");
    assert_eq!(body["revision"], h.service.revision());
}

#[tokio::test]
async fn test_report_blank_type_rejected() {
    let h = harness(Ok(vec![]), Some(Ok(ReportId("unused".to_string()))));
    let (status, body) = post_json(&h.app, "/api/reports", &json!({"type": "  "})).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_report_store_outage_is_bad_gateway() {
    let h = harness(
        Ok(vec![]),
        Some(Err(ReportError::Transport {
            message: "timeout".to_string(),
        })),
    );
    let (status, _) = post_json(&h.app, "/api/reports", &json!({"type": "daily"})).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
}
