//! Dashboard Service
//!
//! Shares one [`ReconciliationEngine`] between the stream writer, manual
//! refreshes and any number of readers. Folds run under the write lock so
//! readers only ever observe fold boundaries; each change bumps a revision
//! published on a `watch` channel.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::watch;

use crate::application::ports::{
    DashboardReport, FeedError, ReportError, ReportId, ReportRequest, ReportSink, SnapshotSource,
    TimeWindow,
};
use crate::domain::reconciliation::{
    DashboardView, FoldOutcome, Kpis, ReconciliationConfig, ReconciliationEngine,
};
use crate::domain::transaction::TransactionRecord;

/// Result of a successful report submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOutcome {
    /// Identifier assigned by the store.
    pub report_id: ReportId,
    /// Revision the report was taken from.
    pub revision: u64,
}

/// Owner of the live projection.
#[derive(Debug)]
pub struct DashboardService {
    engine: RwLock<ReconciliationEngine>,
    revision_tx: watch::Sender<u64>,
    snapshot_loaded: AtomicBool,
}

impl DashboardService {
    /// Create a service with an empty projection.
    #[must_use]
    pub fn new(config: ReconciliationConfig) -> Self {
        let (revision_tx, _) = watch::channel(0);
        Self {
            engine: RwLock::new(ReconciliationEngine::new(config)),
            revision_tx,
            snapshot_loaded: AtomicBool::new(false),
        }
    }

    /// Fetch a snapshot and replace the projection with it.
    ///
    /// The fetch runs without holding any lock. On failure the projection
    /// is left exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns the source's [`FeedError`] unchanged.
    pub async fn refresh(
        &self,
        source: &dyn SnapshotSource,
        window: Option<TimeWindow>,
    ) -> Result<usize, FeedError> {
        let records = source.fetch(window).await?;
        Ok(self.load_snapshot(&records))
    }

    /// Replace the projection with one built from `records`.
    pub fn load_snapshot(&self, records: &[TransactionRecord]) -> usize {
        // Revisions are published under the write lock so they never go backwards.
        let (folded, revision) = {
            let mut engine = self.engine.write();
            let folded = engine.load_snapshot(records);
            self.revision_tx.send_replace(engine.revision());
            (folded, engine.revision())
        };
        self.snapshot_loaded.store(true, Ordering::Release);
        tracing::info!(transactions = folded, revision, "Snapshot loaded");
        folded
    }

    /// Fold one streamed transaction.
    pub fn apply(&self, record: &TransactionRecord) -> FoldOutcome {
        let outcome = {
            let mut engine = self.engine.write();
            let outcome = engine.apply_event(record);
            self.revision_tx.send_replace(engine.revision());
            outcome
        };
        if outcome.alert_raised {
            tracing::info!(
                transaction_id = %record.id,
                source = %record.source,
                target = %record.target,
                risk = outcome.risk.as_str(),
                high_risk = outcome.high_risk,
                "Fraud alert raised"
            );
        }
        outcome
    }

    /// Full copy of the projection at the latest fold boundary.
    #[must_use]
    pub fn view(&self) -> DashboardView {
        self.engine.read().current_view()
    }

    /// Current counters.
    #[must_use]
    pub fn kpis(&self) -> Kpis {
        self.engine.read().kpis()
    }

    /// Alerts currently held.
    #[must_use]
    pub fn alerts_retained(&self) -> usize {
        self.engine.read().alerts_retained()
    }

    /// Latest revision.
    #[must_use]
    pub fn revision(&self) -> u64 {
        *self.revision_tx.borrow()
    }

    /// Subscribe to change notifications. Drop the receiver to unsubscribe.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision_tx.subscribe()
    }

    /// Whether at least one snapshot has been loaded.
    #[must_use]
    pub fn is_snapshot_loaded(&self) -> bool {
        self.snapshot_loaded.load(Ordering::Acquire)
    }

    /// Export the current view as a report.
    #[must_use]
    pub fn report(&self) -> DashboardReport {
        DashboardReport::from_view(self.view(), Utc::now())
    }

    /// Build a report of the current view and hand it to the store.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::InvalidType`] before contacting the store when
    /// the type is invalid, otherwise the sink's error.
    pub async fn submit_report(
        &self,
        sink: &dyn ReportSink,
        report_type: &str,
    ) -> Result<ReportOutcome, ReportError> {
        let report = self.report();
        let revision = report.revision;
        let request = ReportRequest::new(report_type, report)?;
        let report_id = sink.submit(&request).await?;
        tracing::info!(%report_id, report_type, revision, "Report submitted");
        Ok(ReportOutcome {
            report_id,
            revision,
        })
    }
}

impl Default for DashboardService {
    fn default() -> Self {
        Self::new(ReconciliationConfig::default())
    }
}

// =============================================================================
// Tests
// =============================================================================
