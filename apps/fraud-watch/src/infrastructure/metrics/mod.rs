//! Prometheus Metrics Module
//!
//! Exposes service metrics in Prometheus format, rendered at `/metrics` on
//! the API port.
//!
//! # Metrics Categories
//!
//! - **Ingestion**: transactions folded by risk, malformed events, fold time
//! - **Alerts**: alerts raised, retained alert and account gauges
//! - **Feed**: snapshot loads by outcome, stream reconnects and closes

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::domain::reconciliation::{FoldOutcome, Kpis};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder once and return its handle.
///
/// # Errors
///
/// Returns the exporter's error when another global recorder is already
/// installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }
    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "fraud_watch_transactions_total",
        "Transactions folded into the projection, by risk signal"
    );
    describe_counter!(
        "fraud_watch_alerts_total",
        "Alerts raised, by severity"
    );
    describe_counter!(
        "fraud_watch_accounts_created_total",
        "Accounts first seen in a streamed transaction"
    );
    describe_counter!(
        "fraud_watch_malformed_events_total",
        "Stream events dropped because the payload was not a valid transaction"
    );
    describe_counter!(
        "fraud_watch_snapshot_loads_total",
        "Snapshot fetches, by outcome"
    );
    describe_counter!(
        "fraud_watch_stream_reconnects_total",
        "Stream resubscription attempts"
    );
    describe_counter!(
        "fraud_watch_stream_closes_total",
        "Stream closures, by reason"
    );

    describe_gauge!("fraud_watch_accounts", "Distinct accounts in the registry");
    describe_gauge!("fraud_watch_alerts_retained", "Alerts currently retained");

    describe_histogram!(
        "fraud_watch_fold_duration_seconds",
        "Time to fold one streamed transaction"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Snapshot load outcome label.
#[derive(Debug, Clone, Copy)]
pub enum SnapshotOutcome {
    /// Loaded.
    Success,
    /// Fetch or decode failed.
    Failure,
}

impl SnapshotOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// Record one streamed fold.
pub fn record_fold(outcome: &FoldOutcome, duration: Duration) {
    counter!(
        "fraud_watch_transactions_total",
        "risk" => outcome.risk.as_str()
    )
    .increment(1);
    if outcome.alert_raised {
        let severity = if outcome.high_risk { "high" } else { "standard" };
        counter!("fraud_watch_alerts_total", "severity" => severity).increment(1);
    }
    if outcome.accounts_created > 0 {
        counter!("fraud_watch_accounts_created_total")
            .increment(u64::from(outcome.accounts_created));
    }
    histogram!("fraud_watch_fold_duration_seconds").record(duration.as_secs_f64());
}

/// Record a dropped stream event.
pub fn record_malformed_event() {
    counter!("fraud_watch_malformed_events_total").increment(1);
}

/// Record a snapshot load attempt.
pub fn record_snapshot_load(outcome: SnapshotOutcome) {
    counter!(
        "fraud_watch_snapshot_loads_total",
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record a resubscription attempt.
pub fn record_reconnect() {
    counter!("fraud_watch_stream_reconnects_total").increment(1);
}

/// Record a stream closure.
pub fn record_stream_close(reason: &'static str) {
    counter!("fraud_watch_stream_closes_total", "reason" => reason).increment(1);
}

/// Refresh projection size gauges.
#[allow(clippy::cast_precision_loss)]
pub fn set_projection_gauges(kpis: &Kpis, alerts_retained: usize) {
    gauge!("fraud_watch_accounts").set(kpis.accounts as f64);
    gauge!("fraud_watch_alerts_retained").set(alerts_retained as f64);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transaction::RiskSignal;

    #[test]
    fn snapshot_outcome_as_str() {
        assert_eq!(SnapshotOutcome::Success.as_str(), "success");
        assert_eq!(SnapshotOutcome::Failure.as_str(), "failure");
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        let outcome = FoldOutcome {
            risk: RiskSignal::Confirmed,
            alert_raised: true,
            high_risk: true,
            accounts_created: 2,
        };
        record_fold(&outcome, Duration::from_micros(5));
        record_malformed_event();
        record_snapshot_load(SnapshotOutcome::Failure);
        set_projection_gauges(&Kpis::default(), 0);
    }

    #[test]
    fn fold_counts_created_accounts() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let outcome = FoldOutcome {
            risk: RiskSignal::Suspected(Some(0.8)),
            alert_raised: true,
            high_risk: false,
            accounts_created: 2,
        };

        metrics::with_local_recorder(&recorder, || {
            record_fold(&outcome, Duration::from_micros(5));
            record_fold(
                &FoldOutcome {
                    accounts_created: 0,
                    ..outcome
                },
                Duration::from_micros(5),
            );
        });
        let rendered = handle.render();

        assert!(rendered.contains("fraud_watch_accounts_created_total 2"), "{rendered}");
        assert!(
            rendered.contains("fraud_watch_alerts_total{severity=\"standard\"} 2"),
            "{rendered}"
        );
    }
}
