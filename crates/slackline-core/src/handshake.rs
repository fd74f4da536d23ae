//! Session handshake.
//!
//! The handshake asks the bootstrap API for a stream URL, records the
//! identity and team metadata it returns, initializes the roster and then
//! opens the stream.

use serde_json::Value;
use slackline_protocol::{HandshakeResult, ProtocolError};
use slackline_transport::ApiError;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::host::CONNECT_STEPS;
use crate::session::{Session, SessionState};

/// Failure message when the response lacks required fields and the API
/// supplied no error text of its own.
pub const MISSING_PARAMETERS: &str = "Missing RTM parameters";

impl Session {
    /// Mark the start of a handshake.
    ///
    /// The caller then issues the bootstrap request and passes its outcome
    /// to [`Session::complete_handshake`].
    pub fn begin_handshake(&mut self) {
        self.state = SessionState::Connecting;
        self.status
            .update_progress("Requesting RTM", 1, CONNECT_STEPS);
        debug!("Requesting RTM endpoint");
    }

    /// Apply the bootstrap response and open the stream.
    ///
    /// Any existing stream is aborted first, whatever the outcome. On
    /// failure a network-class error is reported to the host and the session
    /// is left without a stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the response is missing `url` or `self.id`, or
    /// if the transport refuses to open the stream.
    pub fn complete_handshake(
        &mut self,
        response: Result<Value, ApiError>,
    ) -> Result<(), SessionError> {
        if self.abort_stream() {
            debug!("Replaced existing RTM stream");
        }

        let (json, upstream) = match response {
            Ok(json) => (json, None),
            Err(e) => (Value::Null, Some(e)),
        };

        let result = match HandshakeResult::from_json(&json) {
            Ok(result) => result,
            Err(e) => {
                let message = upstream
                    .as_ref()
                    .map(ApiError::upstream_message)
                    .unwrap_or(MISSING_PARAMETERS);
                warn!(error = %e, message = %message, "RTM handshake failed");
                self.report_error(message);
                self.state = SessionState::Failed;

                return Err(match e {
                    ProtocolError::MissingField(field) => {
                        SessionError::MissingHandshakeField { field, upstream }
                    }
                    other => SessionError::Decode(other),
                });
            }
        };

        self.self_id = Some(result.self_id);
        self.self_name = result.self_name;
        if let Some(name) = self.self_name.as_deref() {
            self.status.set_display_name(name);
        }
        self.team = result.team;

        // Roster setup needs the team context recorded above.
        let handlers = Arc::clone(&self.handlers);
        handlers.init_roster(self);

        self.status
            .update_progress("Connecting to RTM", 2, CONNECT_STEPS);
        info!(
            url = %result.url,
            self_id = ?self.self_id,
            team = ?self.team.id,
            "Opening RTM stream"
        );

        match self.transport.open(&result.url, self.signals.clone()) {
            Ok(stream) => {
                debug!(stream = %stream.id(), "RTM stream installed");
                self.stream = Some(stream);
                self.state = SessionState::Connecting;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to open RTM stream");
                self.report_error(&e.to_string());
                self.state = SessionState::Failed;
                Err(SessionError::Transport(e))
            }
        }
    }
}
