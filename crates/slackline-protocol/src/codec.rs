//! Codec for RTM stream frames.
//!
//! Inbound text frames are decoded into [`InboundFrame`]s. Outbound commands
//! are built incrementally as raw JSON text with [`Command`] and checked with
//! [`validate_frame`] before they reach the transport.

use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;

use crate::frames::{CommandReply, EventKind, InboundEvent, InboundFrame};
use crate::handshake::optional_str;

/// Maximum outbound command size in bytes.
pub const MAX_COMMAND_SIZE: usize = 16 * 1024;

/// Protocol errors that can occur while decoding frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame is not valid JSON.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame has neither a `type` nor a `reply_to` field.
    #[error("Frame has no type discriminator")]
    MissingType,

    /// A required field is missing or has the wrong type.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}

/// Framing violations for outbound commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The body is empty.
    #[error("Frame is empty")]
    Empty,

    /// The body exceeds [`MAX_COMMAND_SIZE`].
    #[error("Frame size {0} exceeds maximum {MAX_COMMAND_SIZE}")]
    TooLarge(usize),

    /// The body does not start with `{` and end with `}`.
    #[error("Frame is not a JSON object")]
    NotAnObject,
}

/// Decode a text frame.
///
/// # Errors
///
/// Returns an error if the data is not JSON, or if it carries neither a
/// string `type` nor an integer `reply_to`.
pub fn decode(data: &[u8]) -> Result<InboundFrame, ProtocolError> {
    let payload: Value = serde_json::from_slice(data)?;

    if let Some(kind) = optional_str(&payload, "type").map(EventKind::from) {
        return Ok(InboundFrame::Event(InboundEvent::new(kind, payload)));
    }

    if let Some(reply_to) = payload.get("reply_to").and_then(Value::as_u64) {
        let ok = payload.get("ok").and_then(Value::as_bool).unwrap_or(false);
        let error = payload
            .get("error")
            .and_then(|e| optional_str(e, "msg"))
            .map(str::to_string);
        return Ok(InboundFrame::Reply(CommandReply {
            reply_to,
            ok,
            error,
        }));
    }

    Err(ProtocolError::MissingType)
}

/// Check that an outbound body is a single, bounded JSON object.
///
/// Only the outer framing is checked; the body is not parsed.
///
/// # Errors
///
/// Returns a [`FrameError`] describing the first violated rule.
pub fn validate_frame(body: &[u8]) -> Result<(), FrameError> {
    if body.is_empty() {
        return Err(FrameError::Empty);
    }
    if body.len() > MAX_COMMAND_SIZE {
        return Err(FrameError::TooLarge(body.len()));
    }
    if body.first() != Some(&b'{') || body.last() != Some(&b'}') {
        return Err(FrameError::NotAnObject);
    }
    Ok(())
}

/// An outbound command under construction.
///
/// The body starts as `{"id":<id>,"type":"<tag>"` and is left open so that
/// callers can append command-specific fields. It must be [`closed`] before
/// it is sent.
///
/// [`closed`]: Command::close
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    id: u64,
    type_tag: String,
    body: String,
    closed: bool,
}

impl Command {
    /// Start a new command with the given correlation id and type tag.
    #[must_use]
    pub fn new(id: u64, type_tag: impl Into<String>) -> Self {
        let type_tag = type_tag.into();
        let body = format!(
            "{{\"id\":{},\"type\":{}",
            id,
            Value::String(type_tag.clone())
        );
        Self {
            id,
            type_tag,
            body,
            closed: false,
        }
    }

    /// Append a field to the open object.
    ///
    /// Fields pushed after [`Command::close`] are ignored.
    #[must_use]
    pub fn with_field(mut self, key: &str, value: &Value) -> Self {
        self.push_field(key, value);
        self
    }

    /// Append a field to the open object in place.
    pub fn push_field(&mut self, key: &str, value: &Value) {
        if self.closed {
            return;
        }
        self.body.push(',');
        self.body.push_str(&Value::String(key.to_string()).to_string());
        self.body.push(':');
        self.body.push_str(&value.to_string());
    }

    /// Close the object. Closing twice is a no-op.
    #[must_use]
    pub fn close(mut self) -> Self {
        if !self.closed {
            self.body.push('}');
            self.closed = true;
        }
        self
    }

    /// The correlation id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The command type tag.
    #[must_use]
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Whether [`Command::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The raw JSON text built so far.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Consume the command, returning its body as bytes.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_event() {
        let frame = decode(br#"{"type":"hello"}"#).unwrap();
        match frame {
            InboundFrame::Event(event) => {
                assert_eq!(event.kind, EventKind::Hello);
                assert_eq!(event.payload, json!({"type": "hello"}));
            }
            other => panic!("Expected event, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_keeps_full_payload() {
        let raw = br#"{"type":"presence_change_batch","presences":[{"user":"U1","presence":"away"}]}"#;
        let InboundFrame::Event(event) = decode(raw).unwrap() else {
            panic!("Expected event");
        };
        assert_eq!(event.kind, EventKind::PresenceChangeBatch);
        assert_eq!(event.payload["presences"][0]["user"], "U1");
    }

    #[test]
    fn test_decode_reply() {
        let frame = decode(br#"{"ok":false,"reply_to":7,"error":{"code":2,"msg":"bad channel"}}"#)
            .unwrap();
        match frame {
            InboundFrame::Reply(reply) => assert_eq!(
                reply,
                CommandReply {
                    reply_to: 7,
                    ok: false,
                    error: Some("bad channel".to_string()),
                }
            ),
            other => panic!("Expected reply, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_missing_type() {
        assert!(matches!(
            decode(br#"{"channel":"C1"}"#),
            Err(ProtocolError::MissingType)
        ));
        // A non-string type counts as missing.
        assert!(matches!(
            decode(br#"{"type":5}"#),
            Err(ProtocolError::MissingType)
        ));
        assert!(matches!(decode(b"[1,2]"), Err(ProtocolError::MissingType)));
    }

    #[test]
    fn test_decode_invalid_json() {
        assert!(matches!(decode(b"{\"type\":"), Err(ProtocolError::Json(_))));
        assert!(matches!(decode(b""), Err(ProtocolError::Json(_))));
    }

    #[test]
    fn test_validate_frame() {
        assert_eq!(validate_frame(b"{}"), Ok(()));
        assert_eq!(validate_frame(b""), Err(FrameError::Empty));
        assert_eq!(validate_frame(b"[]"), Err(FrameError::NotAnObject));
        assert_eq!(validate_frame(b"{\"id\":1"), Err(FrameError::NotAnObject));
        assert_eq!(validate_frame(b"\"id\":1}"), Err(FrameError::NotAnObject));
    }

    #[test]
    fn test_validate_frame_size_limit() {
        let mut body = vec![b' '; MAX_COMMAND_SIZE];
        body[0] = b'{';
        body[MAX_COMMAND_SIZE - 1] = b'}';
        assert_eq!(validate_frame(&body), Ok(()));

        body.insert(1, b' ');
        assert_eq!(
            validate_frame(&body),
            Err(FrameError::TooLarge(MAX_COMMAND_SIZE + 1))
        );
    }

    #[test]
    fn test_command_builder() {
        let command = Command::new(3, "typing")
            .with_field("channel", &json!("D024BE91L"))
            .close();

        assert!(command.is_closed());
        assert_eq!(command.id(), 3);
        assert_eq!(command.type_tag(), "typing");
        assert_eq!(
            command.body(),
            r#"{"id":3,"type":"typing","channel":"D024BE91L"}"#
        );
        assert_eq!(validate_frame(command.body().as_bytes()), Ok(()));
    }

    #[test]
    fn test_command_open_until_closed() {
        let command = Command::new(1, "ping");
        assert_eq!(command.body(), r#"{"id":1,"type":"ping""#);
        assert_eq!(
            validate_frame(command.body().as_bytes()),
            Err(FrameError::NotAnObject)
        );

        let closed = command.close().close();
        assert_eq!(closed.body(), r#"{"id":1,"type":"ping"}"#);

        let parsed: Value = serde_json::from_str(closed.body()).unwrap();
        assert_eq!(parsed, json!({"id": 1, "type": "ping"}));
    }

    #[test]
    fn test_command_escapes_strings() {
        let command = Command::new(2, "message")
            .with_field("text", &json!("say \"hi\"\n"))
            .close();
        let parsed: Value = serde_json::from_str(command.body()).unwrap();
        assert_eq!(parsed["text"], "say \"hi\"\n");
    }
}
