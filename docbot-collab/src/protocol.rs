//! JSON text-frame protocol spoken with the relay.
//!
//! Every frame is one JSON object with a `type` discriminator:
//! ```text
//! ┌────────────┬──────────────────────────────────────────────────┐
//! │ type       │ other keys                                       │
//! ├────────────┼──────────────────────────────────────────────────┤
//! │ annotation │ id, page, selected_text, annotation, timestamp,  │
//! │            │ user, [origin]                                   │
//! │ chat       │ timestamp, user, message, [id], [origin]         │
//! └────────────┴──────────────────────────────────────────────────┘
//! ```
//! No schema version, no authentication. Unknown `type` values are not
//! errors; they are skipped so newer peers can add kinds.

use docbot_core::{AnnotationEvent, ChatEvent, RelayEvent, ValidationError};
use serde_json::Value;
use thiserror::Error;

/// Room used when no document is open.
pub const DEFAULT_ROOM: &str = "lobby";

/// Collaboration failures. All of them are non-fatal for the session.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollabError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("malformed relay event: {0}")]
    MalformedEvent(String),
    #[error("publish failed: {0}")]
    Publish(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Serialize an event into a text frame.
pub fn encode_event(event: &RelayEvent) -> Result<String, CollabError> {
    serde_json::to_string(event).map_err(|e| CollabError::MalformedEvent(e.to_string()))
}

/// Parse a text frame.
///
/// - `Err(MalformedEvent)`: not JSON, or a known `type` with bad fields
/// - `Ok(None)`: valid JSON without a recognised `type`
/// - `Ok(Some(_))`: an annotation or chat event
pub fn decode_frame(raw: &str) -> Result<Option<RelayEvent>, CollabError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| CollabError::MalformedEvent(e.to_string()))?;

    let kind = match value.get("type").and_then(Value::as_str) {
        Some(kind) => kind.to_owned(),
        None => return Ok(None),
    };

    let event = match kind.as_str() {
        "annotation" => serde_json::from_value::<AnnotationEvent>(value).map(RelayEvent::Annotation),
        "chat" => serde_json::from_value::<ChatEvent>(value).map(RelayEvent::Chat),
        _ => return Ok(None),
    };

    event
        .map(Some)
        .map_err(|e| CollabError::MalformedEvent(format!("{kind}: {e}")))
}

/// Relay address for a room: `{base}/{room}`.
pub fn room_url(base: &str, room: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), room)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_decode_chat_frame() {
        let raw = r#"{"type":"chat","user":"alice","message":"hi","timestamp":1700000000}"#;
        match decode_frame(raw).unwrap() {
            Some(RelayEvent::Chat(chat)) => {
                assert_eq!(chat.user, "alice");
                assert_eq!(chat.message, "hi");
                assert_eq!(chat.timestamp, 1_700_000_000.0);
            }
            other => panic!("expected chat, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_annotation_frame() {
        let raw = r#"{"type":"annotation","id":"0_1700000000.1","page":1,
            "selected_text":"quote","annotation":"note","timestamp":1700000000.1,"user":""}"#;
        match decode_frame(raw).unwrap() {
            Some(RelayEvent::Annotation(a)) => {
                assert_eq!(a.id, "0_1700000000.1");
                assert_eq!(a.page, 1);
                assert_eq!(a.annotation_text, "note");
                assert!(a.user.is_empty());
            }
            other => panic!("expected annotation, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_unknown_type_is_skipped() {
        assert_eq!(decode_frame(r#"{"type":"cursor","x":1}"#).unwrap(), None);
        assert_eq!(decode_frame(r#"{"user":"alice"}"#).unwrap(), None);
        assert_eq!(decode_frame("[1,2,3]").unwrap(), None);
    }

    #[test]
    fn test_decode_garbage_is_malformed() {
        assert!(matches!(decode_frame("not json"), Err(CollabError::MalformedEvent(_))));
        assert!(matches!(decode_frame(""), Err(CollabError::MalformedEvent(_))));
    }

    #[test]
    fn test_decode_known_type_missing_fields_is_malformed() {
        let err = decode_frame(r#"{"type":"chat","user":"alice"}"#).unwrap_err();
        match err {
            CollabError::MalformedEvent(reason) => assert!(reason.starts_with("chat:")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_encode_matches_decode() {
        let event = RelayEvent::Chat(ChatEvent::new("bob", "hello", Uuid::new_v4()));
        let text = encode_event(&event).unwrap();
        assert!(text.contains(r#""type":"chat""#));

        let (RelayEvent::Chat(sent), Some(RelayEvent::Chat(parsed))) = (event, decode_frame(&text).unwrap()) else {
            panic!("expected chat on both sides");
        };
        assert_eq!(parsed.id, sent.id);
        assert_eq!(parsed.origin, sent.origin);
        assert_eq!(parsed.message, "hello");
    }

    #[test]
    fn test_room_url() {
        assert_eq!(room_url("ws://127.0.0.1:6789", "lobby"), "ws://127.0.0.1:6789/lobby");
        assert_eq!(room_url("ws://127.0.0.1:6789/", "abc"), "ws://127.0.0.1:6789/abc");
    }
}
