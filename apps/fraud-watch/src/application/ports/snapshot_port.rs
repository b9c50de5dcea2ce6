//! Snapshot Source Port (Driven Port)
//!
//! Interface for fetching a bounded batch of scored transactions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::transaction::TransactionRecord;

/// Failure talking to the transaction feed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    /// Network failure or non-success HTTP status.
    #[error("Feed transport error: {message}")]
    Transport {
        /// Error details.
        message: String,
    },

    /// Payload could not be decoded into valid records.
    #[error("Feed format error: {message}")]
    Format {
        /// Error details.
        message: String,
    },

    /// The server broke the stream protocol.
    #[error("Feed protocol error: {message}")]
    Protocol {
        /// Error details.
        message: String,
    },
}

impl FeedError {
    /// Short label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Format { .. } => "format",
            Self::Protocol { .. } => "protocol",
        }
    }
}

/// Optional bounds on transaction time. Both ends are inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    /// Earliest event time.
    pub from: Option<DateTime<Utc>>,
    /// Latest event time.
    pub to: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// Window between two instants.
    #[must_use]
    pub const fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    /// Whether a record with this timestamp falls inside the window.
    ///
    /// Records without a timestamp cannot be placed and are kept.
    #[must_use]
    pub fn contains(&self, timestamp: Option<DateTime<Utc>>) -> bool {
        let Some(ts) = timestamp else {
            return true;
        };
        self.from.is_none_or(|from| ts >= from) && self.to.is_none_or(|to| ts <= to)
    }
}

/// Port for fetching historical transactions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch all transactions in the window, or everything the feed offers.
    ///
    /// The batch is all-or-nothing: one invalid record fails the call.
    async fn fetch(&self, window: Option<TimeWindow>)
    -> Result<Vec<TransactionRecord>, FeedError>;
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn window_bounds_are_inclusive() {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let window = TimeWindow::between(from, to);

        assert!(window.contains(Some(from)));
        assert!(window.contains(Some(to)));
        assert!(!window.contains(Some(to + chrono::Duration::seconds(1))));
        assert!(window.contains(None));
    }

    #[test]
    fn open_window_contains_everything() {
        let window = TimeWindow::default();
        assert!(window.contains(Some(Utc::now())));
    }

    #[test]
    fn error_kinds() {
        let err = FeedError::Format {
            message: "bad".to_string(),
        };
        assert_eq!(err.kind(), "format");
        assert_eq!(err.to_string(), "Feed format error: bad");
    }
}
