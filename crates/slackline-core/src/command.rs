//! Outbound command builder.

use serde_json::{Map, Value};
use slackline_protocol::{codec, Command};
use tracing::{debug, error, warn};

use crate::error::SessionError;
use crate::session::Session;

impl Session {
    /// Start a command with a fresh correlation id.
    ///
    /// The returned command's object is left open for command-specific
    /// fields and must be closed before [`Session::send`].
    pub fn new_command(&mut self, type_tag: &str) -> Command {
        self.command_id += 1;
        Command::new(self.command_id, type_tag)
    }

    /// Send a closed command on the open stream.
    ///
    /// Returns the command's correlation id.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidCommand`] if the body is empty, larger
    /// than the framing limit, or not a single JSON object;
    /// [`SessionError::NotConnected`] if there is no stream.
    pub fn send(&mut self, command: Command) -> Result<u64, SessionError> {
        if let Err(e) = codec::validate_frame(command.body().as_bytes()) {
            error!(
                command_id = command.id(),
                command = %command.type_tag(),
                error = %e,
                "Refusing to send malformed RTM command"
            );
            return Err(SessionError::InvalidCommand(e));
        }

        let Some(stream) = self.stream.as_ref() else {
            warn!(command = %command.type_tag(), "Cannot send RTM command: not connected");
            return Err(SessionError::NotConnected);
        };

        debug!(stream = %stream.id(), body = %command.body(), "RTM send");

        let id = command.id();
        let type_tag = command.type_tag().to_string();
        stream.send_text(command.into_bytes())?;
        self.track_pending(id, type_tag);

        Ok(id)
    }

    /// Remember a sent command until its reply arrives.
    ///
    /// Ids only grow, so the first key is always the oldest command.
    fn track_pending(&mut self, id: u64, type_tag: String) {
        self.pending.insert(id, type_tag);
        while self.pending.len() > self.config.max_pending_commands {
            if let Some((oldest, command)) = self.pending.pop_first() {
                debug!(command_id = oldest, command = %command, "Dropping unacknowledged command");
            }
        }
    }

    /// Build, close and send a command with the given fields.
    ///
    /// # Errors
    ///
    /// See [`Session::send`].
    pub fn send_command(
        &mut self,
        type_tag: &str,
        fields: &Map<String, Value>,
    ) -> Result<u64, SessionError> {
        let mut command = self.new_command(type_tag);
        for (key, value) in fields {
            command.push_field(key, value);
        }
        self.send(command.close())
    }
}
