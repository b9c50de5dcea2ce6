//! Reconnection Policy
//!
//! Exponential backoff with jitter between stream subscriptions. The
//! subscriber itself never retries; the pump asks this policy how long to
//! wait before opening a fresh one.

use std::time::Duration;

use rand::Rng;

use crate::infrastructure::config::StreamSettings;

/// Jitter applied when none is configured explicitly.
const DEFAULT_JITTER: f64 = 0.1;

/// Backoff parameters.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on any delay.
    pub max_delay: Duration,
    /// Growth factor per failed attempt.
    pub multiplier: f64,
    /// Symmetric random spread as a fraction of the delay.
    pub jitter_factor: f64,
    /// Attempts before giving up (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::from(&StreamSettings::default())
    }
}

impl From<&StreamSettings> for ReconnectConfig {
    fn from(settings: &StreamSettings) -> Self {
        Self {
            initial_delay: settings.reconnect_delay_initial,
            max_delay: settings.reconnect_delay_max,
            multiplier: settings.reconnect_delay_multiplier,
            jitter_factor: DEFAULT_JITTER,
            max_attempts: settings.max_reconnect_attempts,
        }
    }
}

/// Tracks consecutive failures and hands out the next delay.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempts: u32,
    min_delay: Option<Duration>,
}

impl ReconnectPolicy {
    /// Create a policy with no failures recorded.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempts: 0,
            min_delay: None,
        }
    }

    /// Floor every later delay at the server's announced retry interval.
    pub const fn set_min_delay(&mut self, min_delay: Option<Duration>) {
        self.min_delay = min_delay;
    }

    /// Record a failure and return how long to wait, or `None` once the
    /// attempt budget is spent.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }
        let base = self.base_delay(self.attempts);
        self.attempts += 1;
        let delay = self.jittered(base);
        Some(self.min_delay.map_or(delay, |floor| delay.max(floor)))
    }

    /// Forget past failures after a subscription reached `Open`.
    pub const fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Consecutive failures so far.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempts
    }

    /// Whether another attempt is allowed.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.config.max_attempts == 0 || self.attempts < self.config.max_attempts
    }

    /// `initial * multiplier^attempt`, capped at `max_delay`.
    fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let factor = self.config.multiplier.max(1.0).powi(exponent);
        let scaled = self.config.initial_delay.as_secs_f64() * factor;
        if !scaled.is_finite() || scaled >= self.config.max_delay.as_secs_f64() {
            return self.config.max_delay;
        }
        Duration::from_secs_f64(scaled)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            return delay;
        }
        let millis = delay.as_secs_f64() * 1000.0;
        let spread = millis * self.config.jitter_factor;
        let jitter: f64 = rand::rng().random_range(-spread..=spread);
        Duration::from_secs_f64((millis + jitter).max(1.0) / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_attempts: u32) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            multiplier: 2.0,
            jitter_factor: 0.0,
            max_attempts,
        }
    }

    #[test]
    fn defaults_follow_stream_settings() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_millis(500));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.max_attempts, 0);
    }

    #[test]
    fn delays_grow_then_cap() {
        let mut policy = ReconnectPolicy::new(config(0));
        let delays: Vec<u128> = (0..6)
            .map(|_| policy.next_delay().unwrap().as_millis())
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000]);
    }

    #[test]
    fn gives_up_after_budget() {
        let mut policy = ReconnectPolicy::new(config(2));
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_none());
        assert!(!policy.should_retry());
    }

    #[test]
    fn reset_restarts_backoff() {
        let mut policy = ReconnectPolicy::new(config(2));
        let _ = policy.next_delay();
        let _ = policy.next_delay();
        policy.reset();

        assert_eq!(policy.attempt_count(), 0);
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn jitter_stays_in_band() {
        for _ in 0..100 {
            let mut policy = ReconnectPolicy::new(ReconnectConfig {
                jitter_factor: 0.1,
                initial_delay: Duration::from_secs(1),
                ..config(0)
            });
            let millis = policy.next_delay().unwrap().as_millis();
            assert!((900..=1100).contains(&millis), "delay {millis}ms out of band");
        }
    }

    #[test]
    fn server_hint_floors_delay() {
        let mut policy = ReconnectPolicy::new(config(0));
        policy.set_min_delay(Some(Duration::from_millis(300)));

        assert_eq!(policy.next_delay(), Some(Duration::from_millis(300)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(300)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(400)));

        policy.reset();
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(300)));
    }
}
