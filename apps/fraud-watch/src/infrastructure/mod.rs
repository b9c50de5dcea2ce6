//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the application ports plus the process
//! plumbing: configuration, telemetry, metrics and the HTTP API.

/// Dashboard API, health checks and metrics endpoint.
pub mod api;

/// Environment-driven configuration.
pub mod config;

/// Snapshot fetcher and SSE subscriber for the prediction service.
pub mod feed;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Report store adapter.
pub mod report;

/// Logging and OpenTelemetry tracing integration.
pub mod telemetry;
