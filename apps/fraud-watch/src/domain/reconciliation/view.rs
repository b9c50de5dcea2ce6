//! Read-only projection types handed to view consumers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::transaction::{AccountId, GeoPoint, RiskSignal};

/// Review status of an account, escalated by transactions it sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// Nothing suspicious observed.
    Active,
    /// Sent at least one suspected transaction.
    UnderReview,
    /// Sent at least one confirmed fraudulent transaction.
    Flagged,
}

impl AccountStatus {
    /// Status implied by a transaction sent by the account.
    #[must_use]
    pub const fn from_signal(risk: RiskSignal) -> Self {
        match risk {
            RiskSignal::Confirmed => Self::Flagged,
            RiskSignal::Suspected(_) => Self::UnderReview,
            RiskSignal::Clear => Self::Active,
        }
    }
}

/// An account seen as source or target of at least one transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    /// Account identifier.
    pub id: AccountId,
    /// Last reported location.
    pub location: Option<GeoPoint>,
    /// Sticky risk flag: true once the account sent a risky transaction.
    pub risk: bool,
    /// Highest status reached during the session.
    pub status: AccountStatus,
    /// Transactions referencing this account, as source or target.
    pub transaction_count: u64,
}

/// One edge of the transaction graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Connection {
    /// Originating transaction.
    pub transaction_id: String,
    /// Paying account.
    pub source: AccountId,
    /// Receiving account.
    pub target: AccountId,
    /// Transferred amount.
    pub amount: Decimal,
    /// Normalized risk of the transaction.
    pub risk: RiskSignal,
}

/// A transaction that crossed the alert threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    /// Transaction identifier.
    pub id: String,
    /// Paying account.
    pub source: AccountId,
    /// Receiving account.
    pub target: AccountId,
    /// Transferred amount.
    pub amount: Decimal,
    /// Score 0-100 shown to analysts.
    pub score: u8,
    /// Whether the alert also crossed the high-risk cutoff.
    pub high_risk: bool,
    /// Normalized risk of the transaction.
    pub risk: RiskSignal,
    /// Event time, when known.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Entry of the live transaction ticker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentTransaction {
    /// Transaction identifier.
    pub id: String,
    /// Paying account.
    pub source: AccountId,
    /// Receiving account.
    pub target: AccountId,
    /// Transferred amount.
    pub amount: Decimal,
    /// Event time, when known.
    pub timestamp: Option<DateTime<Utc>>,
    /// Normalized risk of the transaction.
    pub risk: RiskSignal,
}

/// Rolling counters since the last snapshot load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Kpis {
    /// Transactions folded.
    pub total_transactions: u64,
    /// Transactions that raised an alert.
    pub total_alerts: u64,
    /// Alerts that also crossed the high-risk cutoff.
    pub high_risk_alerts: u64,
    /// Alerts from confirmed fraud.
    pub confirmed_frauds: u64,
    /// Alerts from suspected fraud.
    pub suspected_frauds: u64,
    /// Distinct accounts seen.
    pub accounts: u64,
    /// Sum of all amounts.
    pub total_amount: Decimal,
    /// Sum of amounts of alerting transactions.
    pub flagged_amount: Decimal,
}

/// Activity within one UTC hour of the day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HourlyBucket {
    /// Hour of day, 0-23.
    pub hour: u8,
    /// Transactions in that hour.
    pub transactions: u64,
    /// Alerts in that hour.
    pub alerts: u64,
    /// Summed amount in that hour.
    pub amount: Decimal,
}

/// Transaction counts per risk band.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RiskDistribution {
    /// High band count.
    pub high: u64,
    /// Medium band count.
    pub medium: u64,
    /// Low band count.
    pub low: u64,
}

/// Immutable snapshot of the whole projection at one fold boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardView {
    /// Number of state changes (folds and resets) so far.
    pub revision: u64,
    /// Accounts in first-seen order.
    pub accounts: Vec<Account>,
    /// Connections, oldest first.
    pub connections: Vec<Connection>,
    /// Alerts, newest first.
    pub alerts: Vec<Alert>,
    /// Latest transactions, newest first.
    pub recent: Vec<RecentTransaction>,
    /// Counters.
    pub kpis: Kpis,
    /// 24 hourly buckets, hour 0 first.
    pub hourly: Vec<HourlyBucket>,
    /// Risk band histogram.
    pub risk_distribution: RiskDistribution,
}

impl DashboardView {
    /// Look up an account by id.
    #[must_use]
    pub fn account(&self, id: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == id)
    }
}
