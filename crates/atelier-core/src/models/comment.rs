use chrono::{DateTime, Utc};

use super::author::AuthorDisplay;
use super::change::CommentRow;

/// One message in a task's discussion thread.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    /// Stable once confirmed by the backend. Holds a locally-generated
    /// temporary id while the create round-trip is in flight.
    pub id: String,
    /// Owning task id (foreign reference, not owned by this subsystem).
    pub thread_id: String,
    pub author_id: String,
    pub author: AuthorDisplay,
    pub content: String,
    /// Immutable, set once at confirmation.
    pub created_at: DateTime<Utc>,
    /// Present only after at least one edit; `None` means never edited.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Comment {
    /// Build a display comment from a backend row plus resolved author info.
    pub fn from_row(row: CommentRow, author: AuthorDisplay) -> Self {
        Self {
            id: row.id,
            thread_id: row.thread_id,
            author_id: row.author_id,
            author,
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    pub fn was_edited(&self) -> bool {
        self.updated_at.is_some()
    }
}
