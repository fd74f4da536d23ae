//! Inbound frame types for the RTM stream.
//!
//! Every text frame the service pushes is a JSON object. Most carry a
//! `type` discriminator; acknowledgements of our own commands carry a
//! `reply_to` correlation id instead.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Inbound event type discriminators.
///
/// Unknown tags are preserved in [`EventKind::Other`] so that new event
/// types from the service never fail to decode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    /// Sent once the stream is ready.
    Hello,
    /// A user's profile changed.
    UserChanged,
    /// A new user joined the team.
    TeamJoin,
    /// A direct message channel was closed.
    ImClosed,
    /// A direct message channel was opened.
    ImOpen,
    /// A single user's presence changed.
    PresenceChange,
    /// Batched presence changes for several users.
    PresenceChangeBatch,
    /// Any tag this crate does not know about.
    Other(String),
}

impl EventKind {
    /// The wire tag for this kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Hello => "hello",
            EventKind::UserChanged => "user_changed",
            EventKind::TeamJoin => "team_join",
            EventKind::ImClosed => "im_closed",
            EventKind::ImOpen => "im_open",
            EventKind::PresenceChange => "presence_change",
            EventKind::PresenceChangeBatch => "presence_change_batch",
            EventKind::Other(tag) => tag,
        }
    }

    /// Whether this is a tag without a dedicated variant.
    #[must_use]
    pub fn is_other(&self) -> bool {
        matches!(self, EventKind::Other(_))
    }
}

impl From<&str> for EventKind {
    fn from(tag: &str) -> Self {
        match tag {
            "hello" => EventKind::Hello,
            "user_changed" => EventKind::UserChanged,
            "team_join" => EventKind::TeamJoin,
            "im_closed" => EventKind::ImClosed,
            "im_open" => EventKind::ImOpen,
            "presence_change" => EventKind::PresenceChange,
            "presence_change_batch" => EventKind::PresenceChangeBatch,
            other => EventKind::Other(other.to_string()),
        }
    }
}

impl From<String> for EventKind {
    fn from(tag: String) -> Self {
        EventKind::from(tag.as_str())
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> String {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded inbound event.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    /// The event type discriminator.
    pub kind: EventKind,
    /// The complete JSON object, including the `type` field.
    pub payload: Value,
}

impl InboundEvent {
    /// Create a new event.
    #[must_use]
    pub fn new(kind: EventKind, payload: Value) -> Self {
        Self { kind, payload }
    }
}

/// The service's acknowledgement of an outbound command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    /// Correlation id of the command being acknowledged.
    pub reply_to: u64,
    /// Whether the command succeeded.
    pub ok: bool,
    /// Error text supplied by the service for a failed command.
    pub error: Option<String>,
}

/// Anything a text frame can decode to.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// A typed event.
    Event(InboundEvent),
    /// A reply to one of our commands.
    Reply(CommandReply),
}
