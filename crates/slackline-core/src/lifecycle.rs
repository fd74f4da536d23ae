//! Stream lifecycle controller.
//!
//! Reacts to the signals of the session's current stream: `Open` advances
//! progress, text frames are decoded and dispatched, `Error`/`Close` end
//! the stream and are reported as connection errors.

use serde_json::Value;
use slackline_protocol::{codec, CommandReply, InboundFrame};
use slackline_transport::{SignalKind, StreamSignal};
use tracing::{debug, error, info, trace, warn};

use crate::dispatch::dispatch;
use crate::host::CONNECT_STEPS;
use crate::session::{DecodeFailurePolicy, Session, SessionState};

/// Reported when the stream ends without a message of its own.
pub const CONNECTION_CLOSED: &str = "RTM connection closed";

/// Reported when a text frame cannot be decoded.
pub const PARSE_ERROR: &str = "Could not parse RTM JSON";

impl Session {
    /// Handle one signal from a stream.
    ///
    /// Signals from any stream other than the current one (for example,
    /// leftovers from a stream replaced by a new handshake) are ignored.
    pub fn handle_signal(&mut self, signal: StreamSignal) {
        if self.stream_id() != Some(signal.stream) {
            debug!(stream = %signal.stream, "Ignoring signal from stale stream");
            return;
        }

        match signal.kind {
            SignalKind::Open => {
                self.state = SessionState::Open;
                self.status
                    .update_progress("RTM Connected", 3, CONNECT_STEPS);
                info!(stream = %signal.stream, "RTM stream open");
            }
            SignalKind::Text(data) => {
                trace!(
                    stream = %signal.stream,
                    frame = %String::from_utf8_lossy(&data),
                    "RTM frame"
                );
                self.handle_text(&data);
            }
            SignalKind::Error(message) => {
                self.end_stream(message.as_deref(), SessionState::Failed);
            }
            SignalKind::Close(message) => {
                self.end_stream(message.as_deref(), SessionState::Closed);
            }
            SignalKind::Binary(data) => {
                trace!(stream = %signal.stream, bytes = data.len(), "Ignoring binary frame");
            }
        }
    }

    /// Decode a text frame and route it.
    fn handle_text(&mut self, data: &[u8]) {
        match codec::decode(data) {
            Ok(InboundFrame::Event(event)) => {
                // Some events (e.g. `pong`) also acknowledge a command.
                if let Some(reply_to) = event.payload.get("reply_to").and_then(Value::as_u64) {
                    self.pending.remove(&reply_to);
                }
                dispatch(self, &event);
            }
            Ok(InboundFrame::Reply(reply)) => self.handle_reply(reply),
            Err(e) => {
                error!(
                    error = %e,
                    frame = %String::from_utf8_lossy(data),
                    "Could not parse RTM frame"
                );
                self.report_error(PARSE_ERROR);

                if self.config.decode_failure == DecodeFailurePolicy::Close {
                    self.abort_stream();
                    self.state = SessionState::Failed;
                }
            }
        }
    }

    /// Match a command reply against the pending commands.
    fn handle_reply(&mut self, reply: CommandReply) {
        let Some(command) = self.pending.remove(&reply.reply_to) else {
            debug!(reply_to = reply.reply_to, "Reply for unknown command");
            return;
        };

        if reply.ok {
            debug!(reply_to = reply.reply_to, command = %command, "Command acknowledged");
        } else {
            warn!(
                reply_to = reply.reply_to,
                command = %command,
                error = reply.error.as_deref().unwrap_or("unknown"),
                "Command rejected"
            );
        }
    }

    /// The current stream is gone; report it and drop the handle.
    fn end_stream(&mut self, message: Option<&str>, state: SessionState) {
        let message = message.unwrap_or(CONNECTION_CLOSED);
        warn!(stream = ?self.stream_id(), message = %message, state = %state, "RTM stream ended");

        self.report_error(message);
        // The transport has already finished with this stream.
        self.stream = None;
        self.pending.clear();
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{text, Harness};
    use bytes::Bytes;
    use slackline_transport::StreamId;

    fn signal(session: &Session, kind: SignalKind) -> StreamSignal {
        StreamSignal::new(session.stream_id().unwrap(), kind)
    }

    #[test]
    fn test_open_advances_progress() {
        let harness = Harness::new();
        let mut session = harness.session();
        session.begin_handshake();
        session
            .complete_handshake(Ok(crate::test_support::valid_handshake()))
            .unwrap();
        assert_eq!(session.state(), SessionState::Connecting);

        let open = signal(&session, SignalKind::Open);
        session.handle_signal(open);

        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(
            harness.journal.entries().last().map(String::as_str),
            Some("progress 3/3 RTM Connected")
        );
    }

    #[test]
    fn test_close_with_message() {
        let harness = Harness::new();
        let mut session = harness.connected_session();

        let close = signal(&session, SignalKind::Close(Some("server restart".into())));
        session.handle_signal(close);

        assert_eq!(session.state(), SessionState::Closed);
        assert!(!session.is_connected());
        assert_eq!(harness.journal.count("error network server restart"), 1);
    }

    #[test]
    fn test_close_without_message_uses_default() {
        let harness = Harness::new();
        let mut session = harness.connected_session();

        let close = signal(&session, SignalKind::Close(None));
        session.handle_signal(close);

        assert_eq!(
            harness.journal.count("error network RTM connection closed"),
            1
        );
        assert!(!session.is_connected());
    }

    #[test]
    fn test_error_signal_fails_session() {
        let harness = Harness::new();
        let mut session = harness.connected_session();
        let stream = session.stream_id().unwrap();

        let error = signal(&session, SignalKind::Error(Some("connection reset".into())));
        session.handle_signal(error);

        assert_eq!(session.state(), SessionState::Failed);
        assert!(!session.is_connected());
        assert_eq!(harness.journal.count("error network connection reset"), 1);
        // The transport already released the stream; it is not aborted again.
        assert_eq!(harness.journal.count(&format!("abort {}", stream)), 0);
    }

    #[test]
    fn test_hello_frame_loads_users() {
        let harness = Harness::new();
        let mut session = harness.connected_session();

        let frame = text(&session, r#"{"type":"hello"}"#);
        session.handle_signal(frame);

        assert_eq!(harness.journal.count("load_users"), 1);
    }

    #[test]
    fn test_presence_batch_frame_forwards_payload() {
        let harness = Harness::new();
        let mut session = harness.connected_session();
        let body = r#"{"type":"presence_change_batch","presences":[{"user":"U1","presence":"away"}]}"#;
        let expected: Value = serde_json::from_str(body).unwrap();

        let frame = text(&session, body);
        session.handle_signal(frame);

        assert_eq!(
            harness.journal.count(&format!("presence_changed {}", expected)),
            1
        );
    }

    #[test]
    fn test_frame_without_type_reports_parse_error() {
        let harness = Harness::new();
        let mut session = harness.connected_session();

        let frame = text(&session, r#"{"user":"U1"}"#);
        session.handle_signal(frame);

        assert_eq!(
            harness.journal.count("error network Could not parse RTM JSON"),
            1
        );
        // Default policy keeps the stream.
        assert!(session.is_connected());
        assert_eq!(session.state(), SessionState::Open);
    }

    #[test]
    fn test_parse_error_close_policy() {
        let harness = Harness::new();
        let config = crate::SessionConfig {
            decode_failure: DecodeFailurePolicy::Close,
            ..Harness::config()
        };
        let mut session = harness.connect(harness.session_with(config));
        let stream = session.stream_id().unwrap();

        let frame = text(&session, "not json");
        session.handle_signal(frame);

        assert_eq!(
            harness.journal.count("error network Could not parse RTM JSON"),
            1
        );
        assert!(!session.is_connected());
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(harness.journal.count(&format!("abort {}", stream)), 1);
    }

    #[test]
    fn test_stale_signals_ignored() {
        let harness = Harness::new();
        let mut session = harness.connected_session();
        harness.journal.clear();

        let stale = StreamId::generate();
        session.handle_signal(StreamSignal::new(stale, SignalKind::Close(None)));
        session.handle_signal(StreamSignal::new(
            stale,
            SignalKind::Text(Bytes::from_static(br#"{"type":"hello"}"#)),
        ));

        assert!(session.is_connected());
        assert_eq!(session.state(), SessionState::Open);
        assert!(harness.journal.entries().is_empty());
    }

    #[test]
    fn test_binary_frames_ignored() {
        let harness = Harness::new();
        let mut session = harness.connected_session();
        harness.journal.clear();

        let binary = signal(&session, SignalKind::Binary(Bytes::from_static(b"\x00\x01")));
        session.handle_signal(binary);

        assert!(harness.journal.entries().is_empty());
        assert_eq!(session.state(), SessionState::Open);
    }

    #[test]
    fn test_reply_clears_pending_command() {
        let harness = Harness::new();
        let mut session = harness.connected_session();

        let ok = session.new_command("typing").close();
        let ok_id = session.send(ok).unwrap();
        let rejected = session.new_command("typing").close();
        let rejected_id = session.send(rejected).unwrap();
        assert_eq!(session.pending_commands(), 2);

        let reply = text(&session, &format!(r#"{{"ok":true,"reply_to":{}}}"#, ok_id));
        session.handle_signal(reply);
        assert_eq!(session.pending_commands(), 1);

        let reply = text(
            &session,
            &format!(
                r#"{{"ok":false,"reply_to":{},"error":{{"code":1,"msg":"no"}}}}"#,
                rejected_id
            ),
        );
        session.handle_signal(reply);
        assert_eq!(session.pending_commands(), 0);

        // Replies are not connection errors.
        assert_eq!(harness.journal.count_prefix("error"), 0);
    }

    #[test]
    fn test_pong_event_clears_pending_ping() {
        let harness = Harness::new();
        let mut session = harness.connected_session();

        let ping = session.new_command("ping").close();
        let id = session.send(ping).unwrap();

        let pong = text(&session, &format!(r#"{{"type":"pong","reply_to":{}}}"#, id));
        session.handle_signal(pong);

        assert_eq!(session.pending_commands(), 0);
        assert_eq!(harness.journal.count_prefix("error"), 0);
    }
}
