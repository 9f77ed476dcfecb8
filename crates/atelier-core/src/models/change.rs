use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ChangeParseError;

/// Backend wire shape of one comment record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRow {
    pub id: String,
    pub thread_id: String,
    pub author_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Identity of a deleted row. Delete notifications carry only the old
/// record's key fields, and some transports omit everything but the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedRow {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// A change notification from the push channel, parsed into a closed set of
/// tagged variants. Raw payloads never drive store mutation directly; they
/// pass through [`ChangeEvent::from_payload`] first so malformed shapes are
/// rejected up front.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "eventType", rename_all = "lowercase")]
pub enum ChangeEvent {
    Insert { new: CommentRow },
    Update { new: CommentRow },
    Delete { old: DeletedRow },
}

impl ChangeEvent {
    /// Parse and validate a raw channel payload.
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, ChangeParseError> {
        Ok(serde_json::from_value(payload.clone())?)
    }

    /// Thread the event claims to belong to, when the payload carries one.
    /// Consumers re-validate this against their own thread id; the
    /// transport-side filter is advisory only.
    pub fn thread_id(&self) -> Option<&str> {
        match self {
            ChangeEvent::Insert { new } | ChangeEvent::Update { new } => Some(&new.thread_id),
            ChangeEvent::Delete { old } => old.thread_id.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_insert_payload() {
        let payload = json!({
            "eventType": "insert",
            "new": {
                "id": "c1",
                "thread_id": "task-1",
                "author_id": "user-a",
                "content": "hello",
                "created_at": "2026-03-01T09:00:00Z"
            }
        });

        let event = ChangeEvent::from_payload(&payload).expect("insert should parse");
        match event {
            ChangeEvent::Insert { new } => {
                assert_eq!(new.id, "c1");
                assert_eq!(new.updated_at, None);
            }
            other => panic!("expected insert, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_update_payload_with_updated_at() {
        let payload = json!({
            "eventType": "update",
            "new": {
                "id": "c1",
                "thread_id": "task-1",
                "author_id": "user-a",
                "content": "hello again",
                "created_at": "2026-03-01T09:00:00Z",
                "updated_at": "2026-03-01T09:05:00Z"
            }
        });

        let event = ChangeEvent::from_payload(&payload).expect("update should parse");
        assert_eq!(event.thread_id(), Some("task-1"));
        match event {
            ChangeEvent::Update { new } => assert!(new.updated_at.is_some()),
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_delete_payload_without_thread_id() {
        let payload = json!({
            "eventType": "delete",
            "old": { "id": "c1" }
        });

        let event = ChangeEvent::from_payload(&payload).expect("delete should parse");
        assert_eq!(event.thread_id(), None);
        match event {
            ChangeEvent::Delete { old } => assert_eq!(old.id, "c1"),
            other => panic!("expected delete, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_unknown_event_type() {
        let payload = json!({ "eventType": "truncate", "new": {} });
        assert!(ChangeEvent::from_payload(&payload).is_err());
    }

    #[test]
    fn test_rejects_missing_fields() {
        let payload = json!({
            "eventType": "insert",
            "new": { "id": "c1" }
        });
        assert!(ChangeEvent::from_payload(&payload).is_err());
    }
}
