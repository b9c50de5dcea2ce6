#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Fraud Watch - Transaction & Alert Reconciliation
//!
//! Keeps one canonical in-memory projection of the transactions scored by
//! an external fraud prediction service: an account registry, the
//! transaction graph, a bounded alert list and rolling KPIs.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: records and the reconciliation fold
//!   - `transaction`: validated records, fraud signal normalization
//!   - `reconciliation`: the engine and its read-only views
//!
//! - **Application**: ports and services
//!   - `ports`: snapshot source, report sink
//!   - `services`: the shared dashboard service
//!
//! - **Infrastructure**: adapters and process plumbing
//!   - `feed`: HTTP snapshot fetcher, SSE subscriber, stream pump
//!   - `report`: report store client
//!   - `api`: dashboard API, health and metrics endpoints
//!   - `config`, `telemetry`, `metrics`
//!
//! # Data Flow
//!
//! ```text
//! GET /api/transactions ──► load_snapshot ─┐
//!                                          ├──► ReconciliationEngine ──► DashboardView
//! SSE /api/transactions/stream ──► apply ──┘            │
//!                                                       └──► watch<revision> ──► /api/events
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - records and the reconciliation fold.
pub mod domain;

/// Application layer - ports and services.
pub mod application;

/// Infrastructure layer - adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::reconciliation::{
    Account, AccountStatus, Alert, Connection, DashboardView, FoldOutcome, Kpis,
    ReconciliationConfig, ReconciliationEngine,
};
pub use domain::transaction::{
    AccountId, FraudSignal, FraudStatus, GeoPoint, RecordError, RiskBand, RiskSignal,
    TransactionRecord,
};

// Ports and services
pub use application::ports::{
    DashboardReport, FeedError, ReportError, ReportId, ReportRequest, ReportSink, SnapshotSource,
    TimeWindow,
};
pub use application::services::{DashboardService, ReportOutcome};

// Infrastructure config
pub use infrastructure::config::{AppConfig, ConfigError};

// Feed adapters (for integration tests)
pub use infrastructure::feed::{
    CloseReason, FeedStatus, HttpSnapshotFetcher, StreamHandler, StreamPump, StreamState,
    TransactionStream,
};

// Report adapter
pub use infrastructure::report::HttpReportSink;

// API server
pub use infrastructure::api::{ApiServer, ApiServerError, ApiState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
