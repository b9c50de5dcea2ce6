//! Service Configuration Settings
//!
//! Configuration types for the fraud watch service, loaded from environment
//! variables. Unparseable numeric values fall back to their defaults;
//! thresholds are validated once everything is read.

use std::time::Duration;

use crate::domain::reconciliation::ReconciliationConfig;

/// Bearer token for the report store.
#[derive(Clone)]
pub struct ApiToken(String);

impl ApiToken {
    /// Wrap a raw token.
    #[must_use]
    pub const fn new(token: String) -> Self {
        Self(token)
    }

    /// Raw token value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiToken([REDACTED])")
    }
}

/// Where the prediction service lives.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Scheme, host and port, without trailing slash.
    pub base_url: String,
    /// Path of the snapshot endpoint.
    pub snapshot_path: String,
    /// Path of the SSE endpoint.
    pub stream_path: String,
    /// Request timeout for the snapshot fetch and the stream handshake.
    pub timeout: Duration,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            snapshot_path: "/api/transactions".to_string(),
            stream_path: "/api/transactions/stream".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl FeedSettings {
    /// Full snapshot URL.
    #[must_use]
    pub fn snapshot_url(&self) -> String {
        join_url(&self.base_url, &self.snapshot_path)
    }

    /// Full stream URL.
    #[must_use]
    pub fn stream_url(&self) -> String {
        join_url(&self.base_url, &self.stream_path)
    }
}

/// Stream subscription settings.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Resubscribe after the stream closes.
    pub auto_reconnect: bool,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            reconnect_delay_initial: Duration::from_millis(500),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_delay_multiplier: 2.0,
            max_reconnect_attempts: 0,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Port of the dashboard API, health and metrics endpoints.
    pub http_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { http_port: 8083 }
    }
}

/// Report store settings. Submission is disabled without a URL.
#[derive(Debug, Clone)]
pub struct ReportSettings {
    /// Endpoint accepting report submissions.
    pub url: Option<String>,
    /// Bearer token passed through unchanged.
    pub token: Option<ApiToken>,
    /// Bound on a whole submission, response included.
    pub timeout: Duration,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Prediction service endpoints.
    pub feed: FeedSettings,
    /// Engine thresholds and bounds.
    pub reconciliation: ReconciliationConfig,
    /// Stream reconnection behavior.
    pub stream: StreamSettings,
    /// HTTP server.
    pub server: ServerSettings,
    /// Report store.
    pub report: ReportSettings,
}

impl AppConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is empty where one is required or the
    /// thresholds are inconsistent.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let feed_defaults = FeedSettings::default();
        let engine_defaults = ReconciliationConfig::default();
        let stream_defaults = StreamSettings::default();

        let feed = FeedSettings {
            base_url: env
                .string("FRAUD_FEED_BASE_URL")
                .unwrap_or(feed_defaults.base_url)
                .trim_end_matches('/')
                .to_string(),
            snapshot_path: env
                .string("FRAUD_FEED_SNAPSHOT_PATH")
                .unwrap_or(feed_defaults.snapshot_path),
            stream_path: env
                .string("FRAUD_FEED_STREAM_PATH")
                .unwrap_or(feed_defaults.stream_path),
            timeout: env.duration_secs("FRAUD_FEED_TIMEOUT_SECS", feed_defaults.timeout),
        };
        if feed.base_url.is_empty() {
            return Err(ConfigError::EmptyValue("FRAUD_FEED_BASE_URL".to_string()));
        }

        let max_connections = env.parse(
            "FRAUD_MAX_CONNECTIONS",
            engine_defaults.max_connections.unwrap_or(0),
        );
        let reconciliation = ReconciliationConfig {
            alert_cutoff: env.parse("FRAUD_ALERT_CUTOFF", engine_defaults.alert_cutoff),
            high_risk_cutoff: env.parse("FRAUD_HIGH_RISK_CUTOFF", engine_defaults.high_risk_cutoff),
            medium_risk_cutoff: env.parse(
                "FRAUD_MEDIUM_RISK_CUTOFF",
                engine_defaults.medium_risk_cutoff,
            ),
            max_alerts: env.parse("FRAUD_MAX_ALERTS", engine_defaults.max_alerts),
            max_connections: (max_connections > 0).then_some(max_connections),
            max_recent: env.parse("FRAUD_MAX_RECENT", engine_defaults.max_recent),
        };
        validate_thresholds(&reconciliation)?;

        let stream = StreamSettings {
            auto_reconnect: env.parse("FRAUD_STREAM_AUTO_RECONNECT", stream_defaults.auto_reconnect),
            reconnect_delay_initial: env.duration_millis(
                "FRAUD_RECONNECT_DELAY_INITIAL_MS",
                stream_defaults.reconnect_delay_initial,
            ),
            reconnect_delay_max: env.duration_secs(
                "FRAUD_RECONNECT_DELAY_MAX_SECS",
                stream_defaults.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: env.parse(
                "FRAUD_RECONNECT_DELAY_MULTIPLIER",
                stream_defaults.reconnect_delay_multiplier,
            ),
            max_reconnect_attempts: env.parse(
                "FRAUD_MAX_RECONNECT_ATTEMPTS",
                stream_defaults.max_reconnect_attempts,
            ),
        };

        let server = ServerSettings {
            http_port: env.parse("FRAUD_WATCH_HTTP_PORT", ServerSettings::default().http_port),
        };

        let report = ReportSettings {
            url: env.string("REPORT_API_URL"),
            token: env.string("REPORT_API_TOKEN").map(ApiToken::new),
            timeout: env.duration_secs("REPORT_API_TIMEOUT_SECS", ReportSettings::default().timeout),
        };

        Ok(Self {
            feed,
            reconciliation,
            stream,
            server,
            report,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Value parsed but is not acceptable.
    #[error("invalid value for {key}: {reason}")]
    Invalid {
        /// Offending variable.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

fn validate_thresholds(config: &ReconciliationConfig) -> Result<(), ConfigError> {
    for (key, value) in [
        ("FRAUD_ALERT_CUTOFF", config.alert_cutoff),
        ("FRAUD_HIGH_RISK_CUTOFF", config.high_risk_cutoff),
        ("FRAUD_MEDIUM_RISK_CUTOFF", config.medium_risk_cutoff),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::Invalid {
                key,
                reason: format!("{value} is outside [0, 1]"),
            });
        }
    }
    if config.high_risk_cutoff < config.alert_cutoff {
        return Err(ConfigError::Invalid {
            key: "FRAUD_HIGH_RISK_CUTOFF",
            reason: format!(
                "{} is below the alert cutoff {}",
                config.high_risk_cutoff, config.alert_cutoff
            ),
        });
    }
    if config.max_alerts == 0 {
        return Err(ConfigError::Invalid {
            key: "FRAUD_MAX_ALERTS",
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(())
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-empty trimmed value.
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.string(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn duration_secs(&self, key: &str, default: Duration) -> Duration {
        self.string(key)
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(default, Duration::from_secs)
    }

    fn duration_millis(&self, key: &str, default: Duration) -> Duration {
        self.string(key)
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(default, Duration::from_millis)
    }
}
