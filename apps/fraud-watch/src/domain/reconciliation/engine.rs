//! Reconciliation Engine
//!
//! Folds scored transactions into the dashboard projection. The engine is a
//! plain owned value with no interior mutability: every mutation goes
//! through `&mut self`, so a fold is never observable half-way. Sharing
//! between a writer and many readers is the service layer's job.

use std::collections::{HashMap, VecDeque};

use chrono::Timelike;

use super::ReconciliationConfig;
use super::view::{
    Account, AccountStatus, Alert, Connection, DashboardView, HourlyBucket, Kpis,
    RecentTransaction, RiskDistribution,
};
use crate::domain::transaction::{AccountId, GeoPoint, RiskBand, RiskSignal, TransactionRecord};

const HOURS_PER_DAY: usize = 24;

/// Score shown for a confirmed fraud the predictor did not score.
const CONFIRMED_DEFAULT_SCORE: u8 = 100;

/// Score shown for a suspected fraud the predictor did not score.
const SUSPECTED_DEFAULT_SCORE: u8 = 50;

/// What a single fold did, for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FoldOutcome {
    /// Normalized risk of the folded transaction.
    pub risk: RiskSignal,
    /// Whether an alert was raised.
    pub alert_raised: bool,
    /// Whether the alert counted as high-risk.
    pub high_risk: bool,
    /// Accounts created by this fold (0, 1 or 2).
    pub accounts_created: u8,
}

/// Mutable projection state. Replaced wholesale on snapshot load.
#[derive(Debug, Clone)]
struct ProjectionState {
    revision: u64,
    accounts: Vec<Account>,
    account_index: HashMap<AccountId, usize>,
    connections: VecDeque<Connection>,
    alerts: VecDeque<Alert>,
    recent: VecDeque<RecentTransaction>,
    kpis: Kpis,
    hourly: Vec<HourlyBucket>,
    risk_distribution: RiskDistribution,
}

impl ProjectionState {
    fn empty(revision: u64) -> Self {
        Self {
            revision,
            accounts: Vec::new(),
            account_index: HashMap::new(),
            connections: VecDeque::new(),
            alerts: VecDeque::new(),
            recent: VecDeque::new(),
            kpis: Kpis::default(),
            hourly: (0..HOURS_PER_DAY)
                .map(|hour| HourlyBucket {
                    #[allow(clippy::cast_possible_truncation)]
                    hour: hour as u8,
                    ..HourlyBucket::default()
                })
                .collect(),
            risk_distribution: RiskDistribution::default(),
        }
    }

    /// Insert or update an account. Returns true when it was created.
    fn upsert_account(
        &mut self,
        id: &str,
        location: Option<GeoPoint>,
        risky: bool,
        status: AccountStatus,
    ) -> bool {
        if let Some(&idx) = self.account_index.get(id) {
            let account = &mut self.accounts[idx];
            account.risk |= risky;
            account.status = account.status.max(status);
            account.transaction_count += 1;
            if location.is_some() {
                account.location = location;
            }
            return false;
        }

        self.account_index
            .insert(id.to_string(), self.accounts.len());
        self.accounts.push(Account {
            id: id.to_string(),
            location,
            risk: risky,
            status,
            transaction_count: 1,
        });
        self.kpis.accounts += 1;
        true
    }
}

/// Owner of the canonical projection.
#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    config: ReconciliationConfig,
    state: ProjectionState,
}

impl ReconciliationEngine {
    /// Create an engine with an empty projection.
    #[must_use]
    pub fn new(config: ReconciliationConfig) -> Self {
        Self {
            config,
            state: ProjectionState::empty(0),
        }
    }

    /// The thresholds this engine folds with.
    #[must_use]
    pub const fn config(&self) -> &ReconciliationConfig {
        &self.config
    }

    /// Number of state changes applied so far.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.state.revision
    }

    /// Replace the whole projection with one built from `transactions`.
    ///
    /// Records are folded in input order with the same rules as
    /// [`apply_event`](Self::apply_event) into a fresh state, which then
    /// replaces the current one. Counts as a single revision.
    pub fn load_snapshot<'a, I>(&mut self, transactions: I) -> usize
    where
        I: IntoIterator<Item = &'a TransactionRecord>,
    {
        let mut fresh = ProjectionState::empty(self.state.revision + 1);
        let mut folded = 0;
        for record in transactions {
            fold(&self.config, &mut fresh, record);
            folded += 1;
        }
        self.state = fresh;
        folded
    }

    /// Fold one transaction into the existing projection.
    ///
    /// Transactions are not deduplicated: applying the same id twice
    /// counts it twice.
    pub fn apply_event(&mut self, transaction: &TransactionRecord) -> FoldOutcome {
        let outcome = fold(&self.config, &mut self.state, transaction);
        self.state.revision += 1;
        outcome
    }

    /// Copy of the projection at the current fold boundary.
    #[must_use]
    pub fn current_view(&self) -> DashboardView {
        let state = &self.state;
        DashboardView {
            revision: state.revision,
            accounts: state.accounts.clone(),
            connections: state.connections.iter().cloned().collect(),
            alerts: state.alerts.iter().cloned().collect(),
            recent: state.recent.iter().cloned().collect(),
            kpis: state.kpis.clone(),
            hourly: state.hourly.clone(),
            risk_distribution: state.risk_distribution.clone(),
        }
    }

    /// Counters only; cheaper than a full view.
    #[must_use]
    pub fn kpis(&self) -> Kpis {
        self.state.kpis.clone()
    }

    /// Alerts currently held.
    #[must_use]
    pub fn alerts_retained(&self) -> usize {
        self.state.alerts.len()
    }
}

fn fold(
    config: &ReconciliationConfig,
    state: &mut ProjectionState,
    tx: &TransactionRecord,
) -> FoldOutcome {
    let risk = RiskSignal::classify(&tx.signal, config.alert_cutoff);
    let score = tx.signal.score();
    let alert_raised = risk.is_alert();
    let high_risk = alert_raised
        && score.map_or(matches!(risk, RiskSignal::Confirmed), |s| {
            s >= config.high_risk_cutoff
        });

    // Only the sending side can be the fraud subject.
    let mut accounts_created = u8::from(state.upsert_account(
        &tx.source,
        tx.source_location,
        alert_raised,
        AccountStatus::from_signal(risk),
    ));
    if tx.target != tx.source {
        accounts_created += u8::from(state.upsert_account(
            &tx.target,
            tx.target_location,
            false,
            AccountStatus::Active,
        ));
    }

    state.connections.push_back(Connection {
        transaction_id: tx.id.clone(),
        source: tx.source.clone(),
        target: tx.target.clone(),
        amount: tx.amount,
        risk,
    });
    if let Some(max) = config.max_connections {
        while state.connections.len() > max {
            state.connections.pop_front();
        }
    }

    if alert_raised {
        state.alerts.push_front(Alert {
            id: tx.id.clone(),
            source: tx.source.clone(),
            target: tx.target.clone(),
            amount: tx.amount,
            score: alert_score(score, risk),
            high_risk,
            risk,
            timestamp: tx.timestamp,
        });
        state.alerts.truncate(config.max_alerts);
    }

    state.recent.push_front(RecentTransaction {
        id: tx.id.clone(),
        source: tx.source.clone(),
        target: tx.target.clone(),
        amount: tx.amount,
        timestamp: tx.timestamp,
        risk,
    });
    state.recent.truncate(config.max_recent);

    // Amount sums saturate at `Decimal::MAX`; a fold never fails half-way.
    let kpis = &mut state.kpis;
    kpis.total_transactions += 1;
    kpis.total_amount = kpis.total_amount.saturating_add(tx.amount);
    if alert_raised {
        kpis.total_alerts += 1;
        kpis.flagged_amount = kpis.flagged_amount.saturating_add(tx.amount);
        match risk {
            RiskSignal::Confirmed => kpis.confirmed_frauds += 1,
            RiskSignal::Suspected(_) => kpis.suspected_frauds += 1,
            RiskSignal::Clear => {}
        }
    }
    if high_risk {
        kpis.high_risk_alerts += 1;
    }

    if let Some(ts) = tx.timestamp {
        let bucket = &mut state.hourly[ts.hour() as usize];
        bucket.transactions += 1;
        bucket.amount = bucket.amount.saturating_add(tx.amount);
        if alert_raised {
            bucket.alerts += 1;
        }
    }

    let distribution = &mut state.risk_distribution;
    match RiskBand::of(score, risk, config.alert_cutoff, config.medium_risk_cutoff) {
        RiskBand::High => distribution.high += 1,
        RiskBand::Medium => distribution.medium += 1,
        RiskBand::Low => distribution.low += 1,
    }

    FoldOutcome {
        risk,
        alert_raised,
        high_risk,
        accounts_created,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn alert_score(score: Option<f64>, risk: RiskSignal) -> u8 {
    score.map_or(
        if matches!(risk, RiskSignal::Confirmed) {
            CONFIRMED_DEFAULT_SCORE
        } else {
            SUSPECTED_DEFAULT_SCORE
        },
        |s| (s * 100.0).floor().clamp(0.0, 100.0) as u8,
    )
}

// =============================================================================
// Tests
// =============================================================================
