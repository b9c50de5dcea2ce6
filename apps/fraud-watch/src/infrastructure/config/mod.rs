//! Configuration Module
//!
//! Environment-driven settings for the fraud watch service.

mod settings;

pub use settings::{
    AppConfig, ApiToken, ConfigError, FeedSettings, ReportSettings, ServerSettings, StreamSettings,
};
