//! RTM session state.
//!
//! A [`Session`] represents one logical connection to the service. It owns
//! the current stream handle, the outbound command counter and the identity
//! and team metadata learned during the handshake.
//!
//! All mutation happens through `&mut Session`, so a session has exactly one
//! owner at a time (normally a [`SessionDriver`](crate::SessionDriver) task).

use slackline_protocol::TeamInfo;
use slackline_transport::{SignalSender, StreamHandle, StreamId, Transport};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::host::{ConnectionStatus, ErrorClass, EventHandlers};

/// Lifecycle of a session's stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No stream and no handshake in progress.
    Disconnected,
    /// Handshake in flight, or stream opened but not yet connected.
    Connecting,
    /// Stream open and receiving frames.
    Open,
    /// The stream was closed by the remote side.
    Closed,
    /// The handshake or the stream failed.
    Failed,
}

impl SessionState {
    /// Whether the session needs a new handshake to recover.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Open => "open",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What to do when an inbound frame cannot be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum DecodeFailurePolicy {
    /// Report a connection error and keep the stream open.
    #[default]
    Report,
    /// Report a connection error and abort the stream.
    Close,
}

/// Default for [`SessionConfig::max_pending_commands`].
pub const DEFAULT_MAX_PENDING_COMMANDS: usize = 1024;

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Reaction to undecodable frames.
    pub decode_failure: DecodeFailurePolicy,
    /// Keepalive ping interval while the stream is open (zero disables).
    pub ping_interval: Duration,
    /// Unacknowledged commands tracked at once; the oldest are dropped
    /// past this.
    pub max_pending_commands: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            decode_failure: DecodeFailurePolicy::Report,
            ping_interval: Duration::from_secs(30),
            max_pending_commands: DEFAULT_MAX_PENDING_COMMANDS,
        }
    }
}

/// One logical RTM connection.
pub struct Session {
    pub(crate) config: SessionConfig,
    pub(crate) state: SessionState,
    pub(crate) stream: Option<Box<dyn StreamHandle>>,
    pub(crate) command_id: u64,
    /// Sent commands awaiting a reply (id -> command type).
    pub(crate) pending: BTreeMap<u64, String>,
    pub(crate) self_id: Option<String>,
    pub(crate) self_name: Option<String>,
    pub(crate) team: TeamInfo,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) signals: SignalSender,
    pub(crate) status: Arc<dyn ConnectionStatus>,
    pub(crate) handlers: Arc<dyn EventHandlers>,
}

impl Session {
    /// Create a new, disconnected session.
    ///
    /// Streams opened by this session report their signals on `signals`;
    /// the owner feeds them back through [`Session::handle_signal`].
    #[must_use]
    pub fn new(
        config: SessionConfig,
        transport: Arc<dyn Transport>,
        signals: SignalSender,
        status: Arc<dyn ConnectionStatus>,
        handlers: Arc<dyn EventHandlers>,
    ) -> Self {
        Self {
            config,
            state: SessionState::Disconnected,
            stream: None,
            command_id: 0,
            pending: BTreeMap::new(),
            self_id: None,
            self_name: None,
            team: TeamInfo::default(),
            transport,
            signals,
            status,
            handlers,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether a stream handle is installed.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// ID of the current stream, if any.
    #[must_use]
    pub fn stream_id(&self) -> Option<StreamId> {
        self.stream.as_ref().map(|stream| stream.id())
    }

    /// The local user's id.
    #[must_use]
    pub fn self_id(&self) -> Option<&str> {
        self.self_id.as_deref()
    }

    /// The local user's display name.
    #[must_use]
    pub fn self_name(&self) -> Option<&str> {
        self.self_name.as_deref()
    }

    /// Team metadata from the last handshake.
    #[must_use]
    pub fn team(&self) -> &TeamInfo {
        &self.team
    }

    /// The most recently allocated command id (0 if none).
    #[must_use]
    pub fn last_command_id(&self) -> u64 {
        self.command_id
    }

    /// Number of sent commands still waiting for a reply.
    #[must_use]
    pub fn pending_commands(&self) -> usize {
        self.pending.len()
    }

    /// Session configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Tear down the stream, if any, and return to `Disconnected`.
    pub fn disconnect(&mut self) {
        self.abort_stream();
        self.state = SessionState::Disconnected;
        debug!("Session disconnected");
    }

    /// Abort and discard the current stream handle.
    ///
    /// Returns whether there was a stream to abort.
    pub(crate) fn abort_stream(&mut self) -> bool {
        self.pending.clear();
        match self.stream.take() {
            Some(stream) => {
                debug!(stream = %stream.id(), "Aborting RTM stream");
                stream.abort();
                true
            }
            None => false,
        }
    }

    /// Report a network-class connection error to the host.
    pub(crate) fn report_error(&self, message: &str) {
        self.status.connection_error(ErrorClass::Network, message);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("stream", &self.stream_id())
            .field("command_id", &self.command_id)
            .field("self_id", &self.self_id)
            .field("team", &self.team)
            .finish()
    }
}
