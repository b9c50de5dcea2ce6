//! Stream Pump
//!
//! Drives successive [`TransactionStream`] instances into the
//! [`DashboardService`], resubscribing with backoff when the stream closes.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use super::status::FeedStatus;
use super::stream::{CloseReason, StreamError, StreamHandler, StreamState, TransactionStream};
use crate::application::services::DashboardService;
use crate::domain::transaction::TransactionRecord;
use crate::infrastructure::config::StreamSettings;
use crate::infrastructure::metrics;

/// Errors that end the pump.
#[derive(Debug, thiserror::Error)]
pub enum PumpError {
    /// Every allowed resubscription failed.
    #[error("stream reconnection attempts exhausted after {0} tries")]
    ReconnectExhausted(u32),

    /// Subscriber misuse.
    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// Handler folding delivered records into the service.
struct IngestHandler {
    service: Arc<DashboardService>,
    status: Arc<FeedStatus>,
    opened: bool,
}

impl StreamHandler for IngestHandler {
    fn on_record(&mut self, record: TransactionRecord) {
        let started = Instant::now();
        let outcome = self.service.apply(&record);
        metrics::record_fold(&outcome, started.elapsed());
        metrics::set_projection_gauges(&self.service.kpis(), self.service.alerts_retained());
        self.status.increment_records();
    }

    fn on_malformed(&mut self, _payload: &str, _error: &serde_json::Error) {
        metrics::record_malformed_event();
        self.status.increment_malformed();
    }

    fn on_state(&mut self, state: StreamState, reason: Option<&CloseReason>) {
        if state == StreamState::Open {
            self.opened = true;
        }
        self.status.set_state(state, reason);
    }
}

/// Long-running ingestion loop.
#[derive(Debug)]
pub struct StreamPump {
    template: TransactionStream,
    service: Arc<DashboardService>,
    status: Arc<FeedStatus>,
    settings: StreamSettings,
}

impl StreamPump {
    /// Create a pump. `template` is never run; each attempt uses a
    /// fresh instance derived from it.
    #[must_use]
    pub const fn new(
        template: TransactionStream,
        service: Arc<DashboardService>,
        status: Arc<FeedStatus>,
        settings: StreamSettings,
    ) -> Self {
        Self {
            template,
            service,
            status,
            settings,
        }
    }

    /// Subscribe until cancelled, the stream ends without auto-reconnect, or
    /// the reconnect budget is spent.
    ///
    /// # Errors
    ///
    /// Returns [`PumpError::ReconnectExhausted`] when the policy gives up.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), PumpError> {
        let mut policy = ReconnectPolicy::new(ReconnectConfig::from(&self.settings));

        loop {
            let stream = self.template.reopen();
            let closer = stream.closer();
            let mut handler = IngestHandler {
                service: Arc::clone(&self.service),
                status: Arc::clone(&self.status),
                opened: false,
            };

            let reason = tokio::select! {
                () = cancel.cancelled() => {
                    closer.close();
                    CloseReason::Requested
                }
                result = stream.run(&mut handler) => result?,
            };

            if cancel.is_cancelled() || reason == CloseReason::Requested {
                self.status.set_state(StreamState::Closed, None);
                tracing::info!("Stream pump stopped");
                return Ok(());
            }
            metrics::record_stream_close(reason.as_str());

            if handler.opened {
                policy.reset();
            }
            if let Some(hint) = stream.retry_hint() {
                policy.set_min_delay(Some(hint));
            }
            if !self.settings.auto_reconnect {
                tracing::warn!(reason = reason.as_str(), "Stream closed, auto-reconnect disabled");
                return Ok(());
            }

            let Some(delay) = policy.next_delay() else {
                return Err(PumpError::ReconnectExhausted(policy.attempt_count()));
            };
            let attempt = policy.attempt_count();
            self.status.increment_reconnect_attempts();
            metrics::record_reconnect();
            tracing::info!(
                attempt,
                delay_ms = delay.as_millis(),
                "Resubscribing to transaction stream"
            );

            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("Stream pump cancelled during reconnect delay");
                    return Ok(());
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}
