//! Events exchanged over the relay and the revision history kept for
//! local annotations.
//!
//! Wire shape (JSON text frame):
//! ```text
//! {"type":"annotation","id":"0-…","page":1,"selected_text":"…",
//!  "annotation":"…","timestamp":1700000000.5,"user":"alice"}
//! {"type":"chat","timestamp":1700000000.5,"user":"alice","message":"hi"}
//! ```
//! `origin` and the chat `id` are optional and omitted when absent, so
//! frames from older clients still parse.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current wall-clock time in seconds since the epoch.
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// A comment attached to a span of page text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationEvent {
    /// Stable for the lifetime of the annotation
    pub id: String,
    /// 1-based page number
    pub page: u32,
    pub selected_text: String,
    #[serde(rename = "annotation")]
    pub annotation_text: String,
    pub timestamp: f64,
    #[serde(default)]
    pub user: String,
    /// Session that authored the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Uuid>,
}

impl AnnotationEvent {
    /// Build a fresh annotation for the 0-based `page_index`.
    ///
    /// The id keeps the page index as a readable prefix; uniqueness comes
    /// from the random suffix, not from the clock.
    pub fn new(
        page_index: usize,
        selected_text: impl Into<String>,
        annotation_text: impl Into<String>,
        user: impl Into<String>,
        origin: Uuid,
    ) -> Self {
        Self {
            id: format!("{page_index}-{}", Uuid::new_v4()),
            page: page_index as u32 + 1,
            selected_text: selected_text.into(),
            annotation_text: annotation_text.into(),
            timestamp: now_secs(),
            user: user.into(),
            origin: Some(origin),
        }
    }

    /// 0-based index of the page this annotation belongs to.
    pub fn page_index(&self) -> usize {
        self.page.saturating_sub(1) as usize
    }
}

/// A single chat line. Never revised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub timestamp: f64,
    #[serde(default)]
    pub user: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Uuid>,
}

impl ChatEvent {
    /// New chat message stamped now, with a fresh id.
    pub fn new(user: impl Into<String>, message: impl Into<String>, origin: Uuid) -> Self {
        Self {
            timestamp: now_secs(),
            user: user.into(),
            message: message.into(),
            id: Some(Uuid::new_v4()),
            origin: Some(origin),
        }
    }
}

/// The two message kinds carried by the relay, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RelayEvent {
    Annotation(AnnotationEvent),
    Chat(ChatEvent),
}

impl RelayEvent {
    /// Session that authored the event, if the sender tagged it.
    pub fn origin(&self) -> Option<Uuid> {
        match self {
            Self::Annotation(a) => a.origin,
            Self::Chat(c) => c.origin,
        }
    }

    /// Wire discriminator.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Annotation(_) => "annotation",
            Self::Chat(_) => "chat",
        }
    }
}

impl From<AnnotationEvent> for RelayEvent {
    fn from(event: AnnotationEvent) -> Self {
        Self::Annotation(event)
    }
}

impl From<ChatEvent> for RelayEvent {
    fn from(event: ChatEvent) -> Self {
        Self::Chat(event)
    }
}

/// Append-only snapshots of one annotation, oldest first.
///
/// Always holds at least the creation snapshot; deserializing an empty
/// list is an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRevisionRecord")]
pub struct RevisionRecord {
    snapshots: Vec<AnnotationEvent>,
}

#[derive(Deserialize)]
struct RawRevisionRecord {
    snapshots: Vec<AnnotationEvent>,
}

impl TryFrom<RawRevisionRecord> for RevisionRecord {
    type Error = &'static str;

    fn try_from(raw: RawRevisionRecord) -> Result<Self, Self::Error> {
        if raw.snapshots.is_empty() {
            return Err("revision record needs at least one snapshot");
        }
        Ok(Self {
            snapshots: raw.snapshots,
        })
    }
}

impl RevisionRecord {
    /// Start a history from the annotation as created.
    pub fn new(creation: AnnotationEvent) -> Self {
        Self {
            snapshots: vec![creation],
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// The creation snapshot.
    pub fn first(&self) -> &AnnotationEvent {
        &self.snapshots[0]
    }

    /// The most recent snapshot.
    pub fn latest(&self) -> &AnnotationEvent {
        &self.snapshots[self.snapshots.len() - 1]
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnnotationEvent> {
        self.snapshots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotation_wire_keys() {
        let origin = Uuid::new_v4();
        let event = RelayEvent::from(AnnotationEvent::new(2, "quote", "comment", "alice", origin));
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], "annotation");
        assert_eq!(value["page"], 3);
        assert_eq!(value["selected_text"], "quote");
        assert_eq!(value["annotation"], "comment");
        assert_eq!(value["user"], "alice");
        assert!(value["id"].as_str().unwrap().starts_with("2-"));
        assert_eq!(value["origin"], origin.to_string());
    }

    #[test]
    fn test_chat_without_optional_fields() {
        let raw = r#"{"type":"chat","user":"alice","message":"hi","timestamp":1700000000}"#;
        let event: RelayEvent = serde_json::from_str(raw).unwrap();

        match event {
            RelayEvent::Chat(chat) => {
                assert_eq!(chat.user, "alice");
                assert_eq!(chat.message, "hi");
                assert_eq!(chat.timestamp, 1_700_000_000.0);
                assert!(chat.id.is_none());
                assert!(chat.origin.is_none());
            }
            other => panic!("expected chat, got {other:?}"),
        }
    }

    #[test]
    fn test_optional_fields_omitted_on_wire() {
        let chat = ChatEvent {
            timestamp: 1.0,
            user: String::new(),
            message: "x".into(),
            id: None,
            origin: None,
        };
        let text = serde_json::to_string(&RelayEvent::Chat(chat)).unwrap();
        assert!(!text.contains("origin"));
        assert!(!text.contains("\"id\""));
    }

    #[test]
    fn test_annotation_ids_unique_within_tick() {
        let origin = Uuid::new_v4();
        let a = AnnotationEvent::new(0, "a", "b", "", origin);
        let b = AnnotationEvent::new(0, "a", "b", "", origin);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_page_index_round_trip() {
        let a = AnnotationEvent::new(4, "a", "b", "", Uuid::nil());
        assert_eq!(a.page, 5);
        assert_eq!(a.page_index(), 4);
    }

    #[test]
    fn test_revision_record_seeded_with_creation() {
        let a = AnnotationEvent::new(0, "a", "b", "bob", Uuid::nil());
        let record = RevisionRecord::new(a.clone());

        assert_eq!(record.len(), 1);
        assert!(!record.is_empty());
        assert_eq!(record.first(), &a);
        assert_eq!(record.latest(), &a);
        assert_eq!(record.iter().count(), 1);
    }

    #[test]
    fn test_revision_record_rejects_empty_history() {
        let err = serde_json::from_str::<RevisionRecord>(r#"{"snapshots":[]}"#).unwrap_err();
        assert!(err.to_string().contains("at least one snapshot"));

        let a = AnnotationEvent::new(1, "a", "b", "bob", Uuid::nil());
        let text = serde_json::to_string(&RevisionRecord::new(a.clone())).unwrap();
        let record: RevisionRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(record.first().id, a.id);
    }
}
