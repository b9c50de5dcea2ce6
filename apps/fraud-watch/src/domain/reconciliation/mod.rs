//! Reconciliation
//!
//! Merges a snapshot of scored transactions with the live event stream into
//! one projection of accounts, connections, alerts and counters.
//!
//! - [`ReconciliationEngine`]: the single writer of the projection
//! - [`DashboardView`]: the immutable copy handed to readers

mod engine;
mod view;

pub use engine::{FoldOutcome, ReconciliationEngine};
pub use view::{
    Account, AccountStatus, Alert, Connection, DashboardView, HourlyBucket, Kpis,
    RecentTransaction, RiskDistribution,
};

/// Thresholds and bounds applied on every fold.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationConfig {
    /// Probability at or above which a transaction raises an alert.
    pub alert_cutoff: f64,
    /// Score at or above which an alert counts as high-risk.
    pub high_risk_cutoff: f64,
    /// Score at or above which a transaction lands in the medium band.
    pub medium_risk_cutoff: f64,
    /// Alerts kept, newest first.
    pub max_alerts: usize,
    /// Connections kept, oldest dropped first. `None` keeps all.
    pub max_connections: Option<usize>,
    /// Entries in the live ticker.
    pub max_recent: usize,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            alert_cutoff: 0.70,
            high_risk_cutoff: 0.90,
            medium_risk_cutoff: 0.30,
            max_alerts: 50,
            max_connections: Some(500),
            max_recent: 10,
        }
    }
}
