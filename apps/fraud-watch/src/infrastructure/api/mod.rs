//! Dashboard API and Health Endpoints
//!
//! HTTP surface for view consumers, orchestrators and Prometheus.
//!
//! # Endpoints
//!
//! - `GET /health` - JSON health status
//! - `GET /healthz` - liveness check (simple OK)
//! - `GET /readyz` - readiness check (ready once a snapshot is loaded)
//! - `GET /metrics` - Prometheus metrics in text format
//! - `GET /api/dashboard` - full current view
//! - `GET /api/kpis`, `/api/alerts`, `/api/accounts` - parts of the view
//! - `GET /api/events` - SSE change notifications
//! - `POST /api/refresh` - refetch the snapshot and reset the projection
//! - `POST /api/reports` - submit a report of the current view

mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{ReportSink, SnapshotSource};
use crate::application::services::DashboardService;
use crate::infrastructure::feed::FeedStatus;

pub use handlers::{HealthResponse, HealthStatus};

// =============================================================================
// Server State
// =============================================================================

/// Shared state for the API handlers.
pub struct ApiState {
    version: String,
    started_at: Instant,
    service: Arc<DashboardService>,
    feed_status: Arc<FeedStatus>,
    snapshot_source: Arc<dyn SnapshotSource>,
    report_sink: Option<Arc<dyn ReportSink>>,
    shutdown: CancellationToken,
}

impl ApiState {
    /// Create API state.
    #[must_use]
    pub fn new(
        version: String,
        service: Arc<DashboardService>,
        feed_status: Arc<FeedStatus>,
        snapshot_source: Arc<dyn SnapshotSource>,
        report_sink: Option<Arc<dyn ReportSink>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            service,
            feed_status,
            snapshot_source,
            report_sink,
            shutdown,
        }
    }
}

/// Build the router. Exposed for in-process tests.
#[must_use]
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/healthz", get(handlers::liveness))
        .route("/readyz", get(handlers::readiness))
        .route("/metrics", get(handlers::metrics))
        .route("/api/dashboard", get(handlers::dashboard))
        .route("/api/kpis", get(handlers::kpis))
        .route("/api/alerts", get(handlers::alerts))
        .route("/api/accounts", get(handlers::accounts))
        .route("/api/events", get(handlers::events))
        .route("/api/refresh", post(handlers::refresh))
        .route("/api/reports", post(handlers::submit_report))
        .with_state(state)
}

// =============================================================================
// Server
// =============================================================================

/// Dashboard API HTTP server.
pub struct ApiServer {
    port: u16,
    state: Arc<ApiState>,
}

impl ApiServer {
    /// Create a server. Shuts down when the state's token is cancelled.
    #[must_use]
    pub const fn new(port: u16, state: Arc<ApiState>) -> Self {
        Self { port, state }
    }

    /// Serve until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ApiServerError` if binding fails or the server stops with
    /// an error.
    pub async fn run(self) -> Result<(), ApiServerError> {
        let shutdown = self.state.shutdown.clone();
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ApiServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
            .map_err(|e| ApiServerError::ServerFailed(e.to_string()))?;

        tracing::info!("API server stopped");
        Ok(())
    }
}

// =============================================================================
// Errors
// =============================================================================

/// API server errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}
