//! Live status of the stream subscription, read by the health endpoint.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use super::stream::{CloseReason, StreamState};

/// Point-in-time copy of [`FeedStatus`].
#[derive(Debug, Clone, Serialize)]
pub struct FeedStatusSnapshot {
    /// Current subscription state.
    pub state: &'static str,
    /// Whether events are flowing.
    pub connected: bool,
    /// Last time the stream reached `Open`.
    pub last_connected_at: Option<DateTime<Utc>>,
    /// Last close reason other than a requested close.
    pub last_error: Option<String>,
    /// Reconnects since the last successful open.
    pub reconnect_attempts: u32,
    /// Records delivered.
    pub records_received: u64,
    /// Events dropped as malformed.
    pub malformed_events: u64,
}

/// Shared, lock-light stream status.
#[derive(Debug)]
pub struct FeedStatus {
    state: RwLock<StreamState>,
    last_connected_at: RwLock<Option<DateTime<Utc>>>,
    last_error: RwLock<Option<String>>,
    reconnect_attempts: AtomicU32,
    records_received: AtomicU64,
    malformed_events: AtomicU64,
}

impl Default for FeedStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedStatus {
    /// Status of a subscriber that has not started.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: RwLock::new(StreamState::Idle),
            last_connected_at: RwLock::new(None),
            last_error: RwLock::new(None),
            reconnect_attempts: AtomicU32::new(0),
            records_received: AtomicU64::new(0),
            malformed_events: AtomicU64::new(0),
        }
    }

    /// Record a state change.
    pub fn set_state(&self, state: StreamState, reason: Option<&CloseReason>) {
        *self.state.write() = state;
        match state {
            StreamState::Open => {
                *self.last_connected_at.write() = Some(Utc::now());
                *self.last_error.write() = None;
                self.reconnect_attempts.store(0, Ordering::Relaxed);
            }
            StreamState::Closed => {
                if let Some(reason) = reason.and_then(CloseReason::to_feed_error) {
                    *self.last_error.write() = Some(reason.to_string());
                }
            }
            StreamState::Idle | StreamState::Subscribing => {}
        }
    }

    /// Count a reconnect attempt.
    pub fn increment_reconnect_attempts(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a delivered record.
    pub fn increment_records(&self) {
        self.records_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a malformed event.
    pub fn increment_malformed(&self) {
        self.malformed_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> StreamState {
        *self.state.read()
    }

    /// Copy everything out.
    #[must_use]
    pub fn snapshot(&self) -> FeedStatusSnapshot {
        let state = self.state();
        FeedStatusSnapshot {
            state: state.as_str(),
            connected: state == StreamState::Open,
            last_connected_at: *self.last_connected_at.read(),
            last_error: self.last_error.read().clone(),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            records_received: self.records_received.load(Ordering::Relaxed),
            malformed_events: self.malformed_events.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_clears_error_and_attempts() {
        let status = FeedStatus::new();
        status.set_state(
            StreamState::Closed,
            Some(&CloseReason::Transport {
                message: "reset".to_string(),
            }),
        );
        status.increment_reconnect_attempts();
        assert!(status.snapshot().last_error.is_some());

        status.set_state(StreamState::Open, None);
        let snapshot = status.snapshot();

        assert!(snapshot.connected);
        assert!(snapshot.last_error.is_none());
        assert_eq!(snapshot.reconnect_attempts, 0);
        assert!(snapshot.last_connected_at.is_some());
    }

    #[test]
    fn requested_close_is_not_an_error() {
        let status = FeedStatus::new();
        status.set_state(StreamState::Closed, Some(&CloseReason::Requested));
        assert!(status.snapshot().last_error.is_none());
        assert_eq!(status.snapshot().state, "closed");
    }

    #[test]
    fn counters() {
        let status = FeedStatus::default();
        status.increment_records();
        status.increment_records();
        status.increment_malformed();
        let snapshot = status.snapshot();
        assert_eq!(snapshot.records_received, 2);
        assert_eq!(snapshot.malformed_events, 1);
    }
}
