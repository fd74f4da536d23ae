//! Interfaces to the host application and domain handlers.
//!
//! The session never interprets event payloads itself. It reports
//! connection progress and failures to a [`ConnectionStatus`] sink and hands
//! decoded events to an [`EventHandlers`] implementation.

use serde_json::Value;
use std::fmt;

use crate::session::Session;

/// Number of connection steps reported through
/// [`ConnectionStatus::update_progress`].
pub const CONNECT_STEPS: u32 = 3;

/// Class of a terminal connection error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorClass {
    /// Network or protocol failure; the caller may reconnect.
    Network,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Network => f.write_str("network"),
        }
    }
}

/// Connection status sink provided by the host.
pub trait ConnectionStatus: Send + Sync {
    /// Report connection progress.
    fn update_progress(&self, message: &str, step: u32, total: u32);

    /// Report a connection error.
    fn connection_error(&self, class: ErrorClass, message: &str);

    /// Set the local user's display name.
    fn set_display_name(&self, name: &str);
}

/// Domain handlers invoked by the event dispatcher.
///
/// Each method is called synchronously on the session's task with the
/// unmodified event payload.
pub trait EventHandlers: Send + Sync {
    /// Load the user directory (on `hello`).
    fn load_users(&self, session: &Session);

    /// A user changed or joined the team.
    fn user_changed(&self, session: &Session, payload: &Value);

    /// A direct message channel was closed.
    fn im_closed(&self, session: &Session, payload: &Value);

    /// A direct message channel was opened.
    fn im_opened(&self, session: &Session, payload: &Value);

    /// One or more users changed presence.
    fn presence_changed(&self, session: &Session, payload: &Value);

    /// Initialize the roster once team metadata is known.
    fn init_roster(&self, session: &Session);
}
