//! Transaction Stream Subscriber
//!
//! Long-lived SSE subscription to the prediction service. Each `data` event
//! is decoded into a [`TransactionRecord`] and handed to a [`StreamHandler`]
//! in arrival order.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──run()──► Subscribing ──2xx──► Open ──► Closed
//!                      │                 │
//!                      └─────error───────┴──► Closed
//! ```
//!
//! `Closed` is terminal. [`TransactionStream::reopen`] builds a fresh `Idle`
//! instance with the same endpoint; retry timing is the caller's business.
//!
//! Handler calls and [`close`](TransactionStream::close) serialize on a
//! reentrant gate, so once `close` returns the handler is never invoked
//! again, including when `close` is called from inside the handler.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use parking_lot::ReentrantMutex;
use reqwest::Client;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use tokio_util::sync::CancellationToken;

use super::sse::{SseDecoder, SseEvent};
use crate::application::ports::FeedError;
use crate::domain::transaction::TransactionRecord;
use crate::infrastructure::config::FeedSettings;

// =============================================================================
// State
// =============================================================================

/// Subscription state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StreamState {
    /// Created, not yet started.
    Idle = 0,
    /// Request sent, waiting for the response head.
    Subscribing = 1,
    /// Receiving events.
    Open = 2,
    /// Terminal.
    Closed = 3,
}

impl StreamState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Subscribing,
            2 => Self::Open,
            _ => Self::Closed,
        }
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Subscribing => "subscribing",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a subscription reached `Closed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Connection failed, dropped or was ended by the server.
    Transport {
        /// Error details.
        message: String,
    },
    /// The server answered with something that is not an event stream.
    Protocol {
        /// Error details.
        message: String,
    },
    /// [`TransactionStream::close`] was called.
    Requested,
}

impl CloseReason {
    /// Short label for logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Protocol { .. } => "protocol",
            Self::Requested => "requested",
        }
    }

    /// Feed error equivalent, `None` for a requested close.
    #[must_use]
    pub fn to_feed_error(&self) -> Option<FeedError> {
        match self {
            Self::Transport { message } => Some(FeedError::Transport {
                message: message.clone(),
            }),
            Self::Protocol { message } => Some(FeedError::Protocol {
                message: message.clone(),
            }),
            Self::Requested => None,
        }
    }
}

/// Misuse of a subscriber instance.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// `run` called on an instance that already left `Idle`.
    #[error("stream subscriber already used (state: {0})")]
    AlreadyStarted(StreamState),
}

// =============================================================================
// Handler
// =============================================================================

/// Receiver of stream callbacks. All calls happen on the task driving
/// [`TransactionStream::run`].
pub trait StreamHandler: Send {
    /// A decoded transaction.
    fn on_record(&mut self, record: TransactionRecord);

    /// An event whose payload is not a valid transaction. The stream
    /// continues.
    fn on_malformed(&mut self, _payload: &str, _error: &serde_json::Error) {}

    /// A state change. `reason` is set for `Closed`. A close requested
    /// through [`TransactionStream::close`] is not reported.
    fn on_state(&mut self, _state: StreamState, _reason: Option<&CloseReason>) {}
}

impl<F> StreamHandler for F
where
    F: FnMut(TransactionRecord) + Send,
{
    fn on_record(&mut self, record: TransactionRecord) {
        self(record);
    }
}

// =============================================================================
// Shared State
// =============================================================================

#[derive(Debug)]
struct Shared {
    state: AtomicU8,
    /// Server `retry:` hint in milliseconds, 0 when none was sent.
    retry_hint_ms: AtomicU64,
    gate: ReentrantMutex<()>,
    cancel: CancellationToken,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(StreamState::Idle as u8),
            retry_hint_ms: AtomicU64::new(0),
            gate: ReentrantMutex::new(()),
            cancel: CancellationToken::new(),
        }
    }

    fn state(&self) -> StreamState {
        StreamState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set(&self, state: StreamState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn close(&self) -> bool {
        self.cancel.cancel();
        let _gate = self.gate.lock();
        self.state.swap(StreamState::Closed as u8, Ordering::AcqRel) != StreamState::Closed as u8
    }
}

/// Cloneable handle that can close a running subscription.
#[derive(Debug, Clone)]
pub struct StreamCloser {
    shared: Arc<Shared>,
}

impl StreamCloser {
    /// Close the subscription. Idempotent.
    pub fn close(&self) {
        if self.shared.close() {
            tracing::debug!("Transaction stream close requested");
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> StreamState {
        self.shared.state()
    }
}

// =============================================================================
// Subscriber
// =============================================================================

/// One SSE subscription.
#[derive(Debug)]
pub struct TransactionStream {
    client: Client,
    url: String,
    handshake_timeout: Duration,
    shared: Arc<Shared>,
}

impl TransactionStream {
    /// Create an `Idle` subscriber for the configured stream endpoint.
    #[must_use]
    pub fn new(client: Client, settings: &FeedSettings) -> Self {
        Self::with_endpoint(client, settings.stream_url(), settings.timeout)
    }

    /// Create an `Idle` subscriber for an explicit URL.
    #[must_use]
    pub fn with_endpoint(client: Client, url: String, handshake_timeout: Duration) -> Self {
        Self {
            client,
            url,
            handshake_timeout,
            shared: Arc::new(Shared::new()),
        }
    }

    /// Fresh `Idle` subscriber with the same endpoint.
    #[must_use]
    pub fn reopen(&self) -> Self {
        Self::with_endpoint(self.client.clone(), self.url.clone(), self.handshake_timeout)
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> StreamState {
        self.shared.state()
    }

    /// Reconnection delay the server announced with a `retry:` field.
    #[must_use]
    pub fn retry_hint(&self) -> Option<Duration> {
        match self.shared.retry_hint_ms.load(Ordering::Acquire) {
            0 => None,
            millis => Some(Duration::from_millis(millis)),
        }
    }

    /// Stream endpoint.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Handle for closing from elsewhere, including from the handler.
    #[must_use]
    pub fn closer(&self) -> StreamCloser {
        StreamCloser {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Close the subscription. Idempotent; no handler call happens after
    /// this returns.
    pub fn close(&self) {
        self.closer().close();
    }

    /// Subscribe and deliver events until the stream closes.
    ///
    /// Returns why it closed. Transport and protocol failures are reported
    /// here, not as errors.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::AlreadyStarted`] when the instance is not
    /// `Idle`.
    pub async fn run<H>(&self, handler: &mut H) -> Result<CloseReason, StreamError>
    where
        H: StreamHandler + ?Sized,
    {
        if self
            .shared
            .state
            .compare_exchange(
                StreamState::Idle as u8,
                StreamState::Subscribing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Err(StreamError::AlreadyStarted(self.state()));
        }
        self.notify(handler, StreamState::Subscribing);
        tracing::info!(url = %self.url, "Subscribing to transaction stream");

        let request = self
            .client
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");

        let sent = tokio::select! {
            () = self.shared.cancel.cancelled() => return Ok(CloseReason::Requested),
            sent = tokio::time::timeout(self.handshake_timeout, request.send()) => sent,
        };
        let response = match sent {
            Err(_) => {
                return Ok(self.fail(handler, CloseReason::Transport {
                    message: format!("no response within {:?}", self.handshake_timeout),
                }));
            }
            Ok(Err(e)) => {
                return Ok(self.fail(handler, CloseReason::Transport {
                    message: e.to_string(),
                }));
            }
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        if !status.is_success() {
            return Ok(self.fail(handler, CloseReason::Protocol {
                message: format!("stream request returned {status}"),
            }));
        }
        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            && !content_type.starts_with("text/event-stream")
        {
            return Ok(self.fail(handler, CloseReason::Protocol {
                message: format!("unexpected content type {content_type}"),
            }));
        }

        if !self.open(handler) {
            return Ok(CloseReason::Requested);
        }
        tracing::info!(url = %self.url, "Transaction stream open");

        let mut body = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        loop {
            let chunk = tokio::select! {
                () = self.shared.cancel.cancelled() => return Ok(CloseReason::Requested),
                chunk = body.next() => chunk,
            };
            let bytes = match chunk {
                None => {
                    return Ok(self.fail(handler, CloseReason::Transport {
                        message: "server ended the stream".to_string(),
                    }));
                }
                Some(Err(e)) => {
                    return Ok(self.fail(handler, CloseReason::Transport {
                        message: e.to_string(),
                    }));
                }
                Some(Ok(bytes)) => bytes,
            };

            let events = match decoder.decode(&bytes) {
                Ok(events) => events,
                Err(e) => {
                    return Ok(self.fail(handler, CloseReason::Protocol {
                        message: e.to_string(),
                    }));
                }
            };
            if let Some(retry) = decoder.retry() {
                let millis = u64::try_from(retry.as_millis()).unwrap_or(u64::MAX);
                self.shared.retry_hint_ms.store(millis, Ordering::Release);
            }
            for event in &events {
                if !self.dispatch(handler, event) {
                    return Ok(CloseReason::Requested);
                }
            }
        }
    }

    fn notify<H: StreamHandler + ?Sized>(&self, handler: &mut H, state: StreamState) {
        let _gate = self.shared.gate.lock();
        if self.shared.state() == state {
            handler.on_state(state, None);
        }
    }

    fn open<H: StreamHandler + ?Sized>(&self, handler: &mut H) -> bool {
        let _gate = self.shared.gate.lock();
        if self.shared.state() == StreamState::Closed {
            return false;
        }
        self.shared.set(StreamState::Open);
        handler.on_state(StreamState::Open, None);
        true
    }

    /// Deliver one event. Returns false once the stream has been closed.
    fn dispatch<H: StreamHandler + ?Sized>(&self, handler: &mut H, event: &SseEvent) -> bool {
        let decoded = TransactionRecord::from_json(&event.data);

        let _gate = self.shared.gate.lock();
        if self.shared.state() != StreamState::Open {
            return false;
        }
        match decoded {
            Ok(record) => handler.on_record(record),
            Err(error) => {
                if is_heartbeat(&event.data) {
                    tracing::debug!("Empty stream event skipped");
                } else {
                    tracing::warn!(error = %error, event = %event.event, "Malformed stream event dropped");
                }
                handler.on_malformed(&event.data, &error);
            }
        }
        self.shared.state() == StreamState::Open
    }

    fn fail<H: StreamHandler + ?Sized>(&self, handler: &mut H, reason: CloseReason) -> CloseReason {
        let _gate = self.shared.gate.lock();
        if self.shared.state() == StreamState::Closed {
            return CloseReason::Requested;
        }
        self.shared.set(StreamState::Closed);
        tracing::warn!(url = %self.url, reason = reason.as_str(), detail = ?reason, "Transaction stream closed");
        handler.on_state(StreamState::Closed, Some(&reason));
        reason
    }
}

/// `{}` and blank payloads the feed emits while it has nothing to score.
fn is_heartbeat(data: &str) -> bool {
    let trimmed = data.trim();
    trimmed.is_empty() || trimmed == "{}"
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn stream() -> TransactionStream {
        TransactionStream::with_endpoint(
            Client::new(),
            "http://127.0.0.1:9/api/transactions/stream".to_string(),
            Duration::from_secs(1),
        )
    }

    fn event(data: &str) -> SseEvent {
        SseEvent {
            event: "message".to_string(),
            data: data.to_string(),
            id: None,
        }
    }

    const RECORD: &str = r#"{"id":"t1","source":"A","target":"B","amount":5}"#;

    #[derive(Default)]
    struct Recorder {
        records: Vec<String>,
        malformed: usize,
        states: Vec<StreamState>,
    }

    impl StreamHandler for Recorder {
        fn on_record(&mut self, record: TransactionRecord) {
            self.records.push(record.id);
        }

        fn on_malformed(&mut self, _payload: &str, _error: &serde_json::Error) {
            self.malformed += 1;
        }

        fn on_state(&mut self, state: StreamState, _reason: Option<&CloseReason>) {
            self.states.push(state);
        }
    }

    #[test]
    fn new_stream_is_idle() {
        assert_eq!(stream().state(), StreamState::Idle);
    }

    #[test]
    fn close_is_idempotent() {
        let stream = stream();
        stream.close();
        stream.close();
        stream.closer().close();
        assert_eq!(stream.state(), StreamState::Closed);
    }

    #[tokio::test]
    async fn closed_stream_cannot_run() {
        let stream = stream();
        stream.close();
        let mut recorder = Recorder::default();

        let err = stream.run(&mut recorder).await.unwrap_err();
        assert!(matches!(err, StreamError::AlreadyStarted(StreamState::Closed)));
        assert!(recorder.states.is_empty());
    }

    #[test]
    fn reopen_yields_fresh_idle_instance() {
        let stream = stream();
        stream.close();
        let fresh = stream.reopen();
        assert_eq!(fresh.state(), StreamState::Idle);
        assert_eq!(fresh.url(), stream.url());
    }

    #[test]
    fn dispatch_delivers_and_flags_malformed() {
        let stream = stream();
        stream.shared.set(StreamState::Open);
        let mut recorder = Recorder::default();

        assert!(stream.dispatch(&mut recorder, &event(RECORD)));
        assert!(stream.dispatch(&mut recorder, &event("not json")));
        assert!(stream.dispatch(&mut recorder, &event("{}")));

        assert_eq!(recorder.records, vec!["t1".to_string()]);
        assert_eq!(recorder.malformed, 2);
    }

    #[test]
    fn close_from_inside_handler_stops_delivery() {
        let stream = stream();
        stream.shared.set(StreamState::Open);
        let closer = stream.closer();
        let mut seen = 0;
        let mut handler = |_record: TransactionRecord| {
            seen += 1;
            closer.close();
        };

        assert!(!stream.dispatch(&mut handler, &event(RECORD)));
        assert!(!stream.dispatch(&mut handler, &event(RECORD)));
        assert_eq!(seen, 1);
        assert_eq!(stream.state(), StreamState::Closed);
    }

    #[test]
    fn failure_after_close_is_reported_as_requested() {
        let stream = stream();
        stream.shared.set(StreamState::Open);
        stream.close();
        let mut recorder = Recorder::default();

        let reason = stream.fail(&mut recorder, CloseReason::Transport {
            message: "reset".to_string(),
        });
        assert_eq!(reason, CloseReason::Requested);
        assert!(recorder.states.is_empty());
    }

    #[test]
    fn close_reasons_map_to_feed_errors() {
        assert!(CloseReason::Requested.to_feed_error().is_none());
        assert!(matches!(
            CloseReason::Protocol {
                message: "x".to_string()
            }
            .to_feed_error(),
            Some(FeedError::Protocol { .. })
        ));
    }

    #[test]
    fn heartbeat_detection() {
        assert!(is_heartbeat("{}"));
        assert!(is_heartbeat("  "));
        assert!(!is_heartbeat(RECORD));
    }
}
