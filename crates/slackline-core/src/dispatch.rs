//! Event dispatcher.

use slackline_protocol::{EventKind, InboundEvent};
use std::sync::Arc;
use tracing::{debug, info};

use crate::session::Session;

/// Route an inbound event to its domain handler.
///
/// Exactly one handler is called for a recognized event kind. Unknown
/// kinds are logged and ignored. Returns whether a handler was called.
pub fn dispatch(session: &Session, event: &InboundEvent) -> bool {
    let handlers = Arc::clone(&session.handlers);
    let payload = &event.payload;

    match &event.kind {
        EventKind::Hello => handlers.load_users(session),
        EventKind::UserChanged | EventKind::TeamJoin => handlers.user_changed(session, payload),
        EventKind::ImClosed => handlers.im_closed(session, payload),
        EventKind::ImOpen => handlers.im_opened(session, payload),
        EventKind::PresenceChange | EventKind::PresenceChangeBatch => {
            handlers.presence_changed(session, payload)
        }
        EventKind::Other(tag) => {
            info!(event_type = %tag, "Unhandled RTM type");
            return false;
        }
    }

    debug!(event_type = %event.kind, "Dispatched RTM event");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Harness;
    use serde_json::{json, Value};

    fn event(payload: Value) -> InboundEvent {
        let kind = EventKind::from(payload["type"].as_str().unwrap());
        InboundEvent::new(kind, payload)
    }

    #[test]
    fn test_each_tag_calls_one_handler() {
        let cases = [
            ("hello", "load_users"),
            ("user_changed", "user_changed"),
            ("team_join", "user_changed"),
            ("im_closed", "im_closed"),
            ("im_open", "im_opened"),
            ("presence_change", "presence_changed"),
            ("presence_change_batch", "presence_changed"),
        ];

        for (tag, handler) in cases {
            let harness = Harness::new();
            let session = harness.session();
            let payload = json!({"type": tag, "user": {"id": "U1"}, "channel": "D1"});

            assert!(dispatch(&session, &event(payload.clone())));

            let entries = harness.journal.entries();
            assert_eq!(entries.len(), 1, "tag {} called {:?}", tag, entries);
            let expected = if handler == "load_users" {
                handler.to_string()
            } else {
                format!("{} {}", handler, payload)
            };
            assert_eq!(entries[0], expected, "tag {}", tag);
        }
    }

    #[test]
    fn test_unknown_tags_call_nothing() {
        let harness = Harness::new();
        let session = harness.session();

        for tag in ["goodbye", "reaction_added", "", "HELLO", "pong"] {
            assert!(!dispatch(&session, &event(json!({"type": tag}))));
        }

        assert!(harness.journal.entries().is_empty());
    }

    #[test]
    fn test_payload_is_forwarded_unmodified() {
        let harness = Harness::new();
        let session = harness.session();
        let payload = json!({
            "type": "presence_change_batch",
            "presences": [
                {"user": "U1", "presence": "away"},
                {"user": "U2", "presence": "active"}
            ]
        });

        dispatch(&session, &event(payload.clone()));

        assert_eq!(
            harness.journal.entries(),
            vec![format!("presence_changed {}", payload)]
        );
    }
}
