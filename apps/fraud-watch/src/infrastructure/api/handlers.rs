//! HTTP handlers for the dashboard API.

use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::WatchStream;

use super::ApiState;
use crate::application::ports::{ReportError, TimeWindow};
use crate::domain::reconciliation::Kpis;
use crate::infrastructure::feed::FeedStatusSnapshot;
use crate::infrastructure::metrics::{self, SnapshotOutcome, get_metrics_handle};

// =============================================================================
// Response Types
// =============================================================================

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Snapshot loaded and stream open.
    Healthy,
    /// One of the two is missing.
    Degraded,
    /// Neither.
    Unhealthy,
}

impl HealthStatus {
    const fn from_parts(snapshot_loaded: bool, stream_connected: bool) -> Self {
        match (snapshot_loaded, stream_connected) {
            (true, true) => Self::Healthy,
            (false, false) => Self::Unhealthy,
            _ => Self::Degraded,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Whether a snapshot has been loaded.
    pub snapshot_loaded: bool,
    /// Projection revision.
    pub revision: u64,
    /// Stream subscription status.
    pub stream: FeedStatusSnapshot,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            success: false,
            error: message.into(),
        }),
    )
        .into_response()
}

// =============================================================================
// Health Handlers
// =============================================================================

pub(super) async fn health(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

pub(super) async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub(super) async fn readiness(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    if state.service.is_snapshot_loaded() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

pub(super) async fn metrics() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                handle.render(),
            )
        },
    )
}

fn build_health_response(state: &ApiState) -> HealthResponse {
    let stream = state.feed_status.snapshot();
    let snapshot_loaded = state.service.is_snapshot_loaded();
    HealthResponse {
        status: HealthStatus::from_parts(snapshot_loaded, stream.connected),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        snapshot_loaded,
        revision: state.service.revision(),
        stream,
    }
}

// =============================================================================
// View Handlers
// =============================================================================

pub(super) async fn dashboard(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(state.service.view())
}

pub(super) async fn kpis(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(state.service.kpis())
}

pub(super) async fn alerts(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(state.service.view().alerts)
}

pub(super) async fn accounts(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(state.service.view().accounts)
}

#[derive(Debug, Serialize)]
struct ChangeEvent {
    revision: u64,
    kpis: Kpis,
}

pub(super) async fn events(
    State(state): State<Arc<ApiState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let service = Arc::clone(&state.service);
    let stream = WatchStream::new(service.subscribe())
        .map(move |revision| {
            let payload = ChangeEvent {
                revision,
                kpis: service.kpis(),
            };
            let data = serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string());
            Ok(Event::default().event("dashboard").data(data))
        })
        .take_until(state.shutdown.clone().cancelled_owned());

    Sse::new(stream).keep_alive(KeepAlive::default())
}

// =============================================================================
// Command Handlers
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub(super) struct RefreshParams {
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct RefreshResponse {
    success: bool,
    transactions: usize,
    revision: u64,
}

pub(super) async fn refresh(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<RefreshParams>,
) -> Response {
    let window = (params.from.is_some() || params.to.is_some()).then_some(TimeWindow {
        from: params.from,
        to: params.to,
    });

    match state
        .service
        .refresh(state.snapshot_source.as_ref(), window)
        .await
    {
        Ok(transactions) => {
            metrics::record_snapshot_load(SnapshotOutcome::Success);
            metrics::set_projection_gauges(&state.service.kpis(), state.service.alerts_retained());
            Json(RefreshResponse {
                success: true,
                transactions,
                revision: state.service.revision(),
            })
            .into_response()
        }
        Err(e) => {
            metrics::record_snapshot_load(SnapshotOutcome::Failure);
            tracing::warn!(error = %e, kind = e.kind(), "Manual refresh failed");
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ReportBody {
    #[serde(rename = "type")]
    report_type: String,
}

#[derive(Debug, Serialize)]
struct ReportResponse {
    success: bool,
    report_id: String,
    revision: u64,
}

pub(super) async fn submit_report(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<ReportBody>,
) -> Response {
    let Some(sink) = state.report_sink.as_deref() else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "report submission is not configured",
        );
    };

    match state.service.submit_report(sink, &body.report_type).await {
        Ok(outcome) => (
            StatusCode::CREATED,
            Json(ReportResponse {
                success: true,
                report_id: outcome.report_id.to_string(),
                revision: outcome.revision,
            }),
        )
            .into_response(),
        Err(e) => {
            let status = match e {
                ReportError::InvalidType { .. } | ReportError::Rejected { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                ReportError::Transport { .. } | ReportError::Format { .. } => {
                    StatusCode::BAD_GATEWAY
                }
            };
            tracing::warn!(error = %e, "Report submission failed");
            error_response(status, e.to_string())
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Healthy).unwrap(),
            "\"healthy\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Unhealthy).unwrap(),
            "\"unhealthy\""
        );
    }

    #[test]
    fn health_status_from_parts() {
        assert_eq!(HealthStatus::from_parts(true, true), HealthStatus::Healthy);
        assert_eq!(HealthStatus::from_parts(true, false), HealthStatus::Degraded);
        assert_eq!(HealthStatus::from_parts(false, true), HealthStatus::Degraded);
        assert_eq!(HealthStatus::from_parts(false, false), HealthStatus::Unhealthy);
    }
}
