//! Prediction Service Feed Adapters
//!
//! - `snapshot`: batch fetch over HTTP
//! - `sse` / `stream`: server-sent event subscription
//! - `reconnect` / `pump`: resubscription with backoff into the service
//! - `status`: stream health shared with the API

pub mod pump;
pub mod reconnect;
pub mod snapshot;
pub mod sse;
pub mod status;
pub mod stream;

pub use pump::{PumpError, StreamPump};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use snapshot::{HttpSnapshotFetcher, decode_snapshot};
pub use sse::{SseDecoder, SseError, SseEvent};
pub use status::{FeedStatus, FeedStatusSnapshot};
pub use stream::{
    CloseReason, StreamCloser, StreamError, StreamHandler, StreamState, TransactionStream,
};

use crate::infrastructure::config::FeedSettings;

/// User agent sent to the prediction service and report store.
pub const USER_AGENT: &str = concat!("fraud-watch/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client shared by the feed adapters.
///
/// Only the connect phase is bounded here; the snapshot fetch applies its
/// own per-request timeout and the stream stays open indefinitely.
///
/// # Errors
///
/// Returns the `reqwest` error if the TLS backend cannot be initialised.
pub fn http_client(settings: &FeedSettings) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(settings.timeout)
        .user_agent(USER_AGENT)
        .build()
}
