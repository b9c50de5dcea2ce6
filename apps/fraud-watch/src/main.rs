//! Fraud Watch Binary
//!
//! Starts the transaction reconciliation service.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin fraud-watch
//! ```
//!
//! # Environment Variables
//!
//! - `FRAUD_FEED_BASE_URL`: prediction service (default: <http://localhost:5000>)
//! - `FRAUD_ALERT_CUTOFF` / `FRAUD_HIGH_RISK_CUTOFF`: thresholds (default: 0.70 / 0.90)
//! - `FRAUD_MAX_ALERTS` / `FRAUD_MAX_CONNECTIONS`: bounds (default: 50 / 500)
//! - `FRAUD_WATCH_HTTP_PORT`: API port (default: 8083)
//! - `FRAUD_STREAM_AUTO_RECONNECT`: resubscribe after close (default: true)
//! - `REPORT_API_URL` / `REPORT_API_TOKEN`: report store (default: disabled)
//! - `REPORT_API_TIMEOUT_SECS`: report request timeout (default: 10)
//! - `OTEL_ENABLED`: export traces over OTLP (default: false)
//! - `RUST_LOG`: log level (default: info)

use std::sync::Arc;

use anyhow::Context;
use fraud_watch::application::ports::{ReportSink, SnapshotSource};
use fraud_watch::infrastructure::api::{ApiServer, ApiState};
use fraud_watch::infrastructure::feed::{
    self, FeedStatus, HttpSnapshotFetcher, StreamPump, TransactionStream,
};
use fraud_watch::infrastructure::metrics::{self, SnapshotOutcome};
use fraud_watch::infrastructure::report::HttpReportSink;
use fraud_watch::infrastructure::telemetry;
use fraud_watch::{AppConfig, DashboardService, init_metrics};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let _telemetry_guard = telemetry::init().context("failed to initialise telemetry")?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Fraud Watch");

    init_metrics().context("failed to install metrics recorder")?;

    let config = AppConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let client = feed::http_client(&config.feed).context("failed to build HTTP client")?;
    let snapshot_source: Arc<dyn SnapshotSource> =
        Arc::new(HttpSnapshotFetcher::new(client.clone(), &config.feed));
    let report_sink: Option<Arc<dyn ReportSink>> = config.report.url.clone().map(|url| {
        Arc::new(
            HttpReportSink::new(client.clone(), url, config.report.token.clone())
                .with_timeout(config.report.timeout),
        ) as Arc<dyn ReportSink>
    });

    let service = Arc::new(DashboardService::new(config.reconciliation.clone()));
    let feed_status = Arc::new(FeedStatus::new());

    // Initial snapshot; the service starts empty when it fails.
    match service.refresh(snapshot_source.as_ref(), None).await {
        Ok(count) => {
            metrics::record_snapshot_load(SnapshotOutcome::Success);
            metrics::set_projection_gauges(&service.kpis(), service.alerts_retained());
            tracing::info!(transactions = count, "Initial snapshot loaded");
        }
        Err(e) => {
            metrics::record_snapshot_load(SnapshotOutcome::Failure);
            tracing::error!(
                error = %e,
                kind = e.kind(),
                "Initial snapshot failed, starting with an empty projection"
            );
        }
    }

    // Spawn stream pump
    let pump = StreamPump::new(
        TransactionStream::new(client, &config.feed),
        Arc::clone(&service),
        Arc::clone(&feed_status),
        config.stream.clone(),
    );
    let pump_cancel = shutdown_token.clone();
    tokio::spawn(async move {
        if let Err(e) = pump.run(pump_cancel).await {
            tracing::error!(error = %e, "Stream pump stopped");
        }
    });

    // Spawn API server
    let api_state = Arc::new(ApiState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&service),
        Arc::clone(&feed_status),
        snapshot_source,
        report_sink,
        shutdown_token.clone(),
    ));
    let api_server = ApiServer::new(config.server.http_port, api_state);
    let api_handle = tokio::spawn(async move {
        if let Err(e) = api_server.run().await {
            tracing::error!(error = %e, "API server error");
        }
    });

    tracing::info!("Fraud Watch ready");

    await_shutdown(shutdown_token).await;
    let _ = api_handle.await;

    tracing::info!("Fraud Watch stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &AppConfig) {
    tracing::info!(
        feed = %config.feed.base_url,
        alert_cutoff = config.reconciliation.alert_cutoff,
        high_risk_cutoff = config.reconciliation.high_risk_cutoff,
        max_alerts = config.reconciliation.max_alerts,
        max_connections = ?config.reconciliation.max_connections,
        http_port = config.server.http_port,
        auto_reconnect = config.stream.auto_reconnect,
        reports = config.report.url.is_some(),
        "Configuration loaded"
    );
    tracing::debug!(
        snapshot_url = %config.feed.snapshot_url(),
        stream_url = %config.feed.stream_url(),
        "Feed endpoints"
    );
}

/// Load .env from the current directory or the nearest ancestor that has one.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        for dir in cwd.ancestors().skip(1) {
            let env_path = dir.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
        }
    }
}

/// Wait for SIGTERM or Ctrl+C, then cancel everything.
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
