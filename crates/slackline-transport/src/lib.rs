//! # slackline-transport
//!
//! Transport layer for slackline.
//!
//! This crate provides the two network collaborators a session needs:
//!
//! - **Stream transport** - opens the RTM WebSocket and reports its
//!   lifecycle (`Open`, text frames, `Error`, `Close`) as signals
//! - **Bootstrap API** - the `rtm.connect` HTTP call that yields the
//!   stream URL and identity metadata
//!
//! ## Transport Abstraction
//!
//! Streams are opened through the [`Transport`] trait and owned through a
//! [`StreamHandle`], so the session layer never depends on a concrete
//! socket implementation.
//!
//! ```rust,ignore
//! use slackline_transport::{Transport, WebSocketTransport};
//! use tokio::sync::mpsc;
//!
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! let handle = WebSocketTransport::default().open("wss://example.invalid/ws", tx)?;
//! while let Some(signal) = rx.recv().await {
//!     // React to signal.kind
//! }
//! ```

pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

#[cfg(feature = "http")]
pub mod http;

pub use traits::{
    ApiError, BootstrapApi, SignalKind, SignalReceiver, SignalSender, StreamHandle, StreamId,
    StreamSignal, Transport, TransportError,
};

#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConfig, WebSocketTransport};

#[cfg(feature = "http")]
pub use http::{HttpBootstrapApi, DEFAULT_API_BASE};
