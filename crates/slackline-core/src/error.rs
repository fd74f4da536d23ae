//! Session errors.

use slackline_protocol::{FrameError, ProtocolError};
use slackline_transport::{ApiError, TransportError};
use thiserror::Error;

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// There is no open stream to send on.
    #[error("RTM stream is not connected")]
    NotConnected,

    /// The caller built a malformed command.
    #[error("Invalid command: {0}")]
    InvalidCommand(#[from] FrameError),

    /// The handshake yielded no usable `url` or `self.id`.
    ///
    /// `upstream` holds the bootstrap API's own error when the request
    /// itself failed.
    #[error("Missing required handshake field: {field}")]
    MissingHandshakeField {
        field: &'static str,
        upstream: Option<ApiError>,
    },

    /// An inbound frame could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] ProtocolError),

    /// Transport error.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The session driver is no longer running.
    #[error("Session driver stopped")]
    DriverStopped,
}

impl SessionError {
    /// Whether this error is a caller contract violation rather than a
    /// runtime condition.
    #[must_use]
    pub fn is_programming_error(&self) -> bool {
        matches!(self, SessionError::InvalidCommand(_))
    }
}
