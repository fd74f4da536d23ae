//! Transport abstraction traits for slackline.
//!
//! A [`Transport`] opens streams. Each open stream is owned through a
//! [`StreamHandle`] and reports its lifecycle as [`StreamSignal`]s on a
//! channel supplied by the caller. Signals for one stream are delivered in
//! order, and never concurrently.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;

/// Atomic counter backing [`StreamId::generate`].
static STREAM_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier for one stream handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(pub u64);

impl StreamId {
    /// Allocate a fresh stream ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(STREAM_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}

/// What happened on a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalKind {
    /// The stream finished connecting.
    Open,
    /// A text frame arrived.
    Text(Bytes),
    /// A binary frame arrived.
    Binary(Bytes),
    /// The stream failed, with an optional message.
    Error(Option<String>),
    /// The stream was closed, with an optional reason.
    Close(Option<String>),
}

/// A lifecycle signal from one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSignal {
    /// The stream that produced the signal.
    pub stream: StreamId,
    /// What happened.
    pub kind: SignalKind,
}

impl StreamSignal {
    /// Create a new signal.
    #[must_use]
    pub fn new(stream: StreamId, kind: SignalKind) -> Self {
        Self { stream, kind }
    }
}

/// Channel on which streams report their signals.
pub type SignalSender = mpsc::UnboundedSender<StreamSignal>;

/// Receiving half of a [`SignalSender`].
pub type SignalReceiver = mpsc::UnboundedReceiver<StreamSignal>;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The stream is closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The stream could not be opened.
    #[error("Connect failed: {0}")]
    Connect(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// A transport that can open streams.
pub trait Transport: Send + Sync {
    /// Start opening a stream to `url`.
    ///
    /// This does not wait for the connection: the returned handle is live
    /// immediately, and [`SignalKind::Open`] (or an error) is reported on
    /// `signals` once the connection attempt finishes.
    ///
    /// # Errors
    ///
    /// Returns an error if the attempt cannot even be started.
    fn open(&self, url: &str, signals: SignalSender)
        -> Result<Box<dyn StreamHandle>, TransportError>;

    /// Get the transport name (e.g., "websocket").
    fn name(&self) -> &'static str;
}

/// Owned reference to one open stream.
///
/// Dropping the handle tears the stream down. [`StreamHandle::abort`]
/// consumes the handle, so a stream is released at most once.
pub trait StreamHandle: Send + Sync {
    /// Get the stream's identifier.
    fn id(&self) -> StreamId;

    /// Queue a text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream has already shut down.
    fn send_text(&self, data: Bytes) -> Result<(), TransportError>;

    /// Tear down the stream without waiting for a close handshake.
    ///
    /// No further signals are delivered for an aborted stream, apart from
    /// any already queued.
    fn abort(self: Box<Self>);
}

/// Errors from the session bootstrap API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The service answered with `"ok": false`.
    #[error("API error: {0}")]
    Service(String),

    /// The response body was not usable.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// The error text to show to the user, as supplied upstream.
    #[must_use]
    pub fn upstream_message(&self) -> &str {
        match self {
            ApiError::Http(msg) | ApiError::Service(msg) | ApiError::InvalidResponse(msg) => msg,
        }
    }
}

/// The session bootstrap (`rtm.connect`) endpoint.
#[async_trait]
pub trait BootstrapApi: Send + Sync {
    /// Request a new stream endpoint.
    ///
    /// Returns the response body on success.
    async fn rtm_connect(&self) -> Result<Value, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_id_generation() {
        let id1 = StreamId::generate();
        let id2 = StreamId::generate();
        assert_ne!(id1, id2);
        assert!(id2.as_u64() > id1.as_u64());
        assert!(id1.to_string().starts_with("stream-"));
    }

    #[test]
    fn test_api_error_upstream_message() {
        let err = ApiError::Service("invalid_auth".into());
        assert_eq!(err.upstream_message(), "invalid_auth");
        assert_eq!(err.to_string(), "API error: invalid_auth");
    }
}
