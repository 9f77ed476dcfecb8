use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::BackendError;
use crate::models::{AuthorDisplay, CommentRow, ReadMarker, TaskRef};

pub mod memory;

pub use memory::MemoryBackend;

/// Connection state of a push-channel subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Subscribed,
    Closed,
    Errored,
}

/// One message from a push-channel subscription.
#[derive(Debug, Clone)]
pub enum ChannelSignal {
    /// The channel changed connection state.
    Status(ChannelStatus),
    /// A raw change notification. Consumers parse and validate it before any
    /// store mutation; see [`crate::models::ChangeEvent::from_payload`].
    Change(serde_json::Value),
}

/// Draft of a comment to persist. The backend assigns id and `created_at`.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub thread_id: String,
    pub author_id: String,
    pub content: String,
}

/// The backing persistent store for comments, read markers and profiles.
///
/// Implementations are the authority: they re-validate the edit window on
/// update (answering [`BackendError::PermissionDenied`] once it has elapsed)
/// and enforce authorship/admin rules on delete. `actor` identifies the
/// user performing a write, matching what a session-bound connection would
/// derive server-side.
#[async_trait]
pub trait CommentBackend: Send + Sync {
    /// Load a thread's comments, chronological ascending.
    async fn comments_for_thread(&self, thread_id: &str) -> Result<Vec<CommentRow>, BackendError>;

    /// Persist a new comment; returns the stored row with its assigned id
    /// and creation timestamp.
    async fn create_comment(&self, draft: NewComment) -> Result<CommentRow, BackendError>;

    /// Update a comment's content. Rejected with `PermissionDenied` when the
    /// actor is not the author or the edit window has elapsed; callers must
    /// not auto-retry that rejection.
    async fn update_comment(
        &self,
        id: &str,
        content: &str,
        actor: &str,
    ) -> Result<CommentRow, BackendError>;

    /// Delete a comment. Authorship or admin override only; no time window.
    async fn delete_comment(&self, id: &str, actor: &str) -> Result<(), BackendError>;

    /// Upsert read markers with ignore-duplicate semantics: re-inserting an
    /// existing `(user, comment)` pair is a successful no-op.
    async fn upsert_read_markers(&self, markers: &[ReadMarker]) -> Result<(), BackendError>;

    /// Resolve a user's display name/avatar.
    async fn resolve_author(&self, user_id: &str) -> Result<AuthorDisplay, BackendError>;

    /// Tasks whose thread involves the user as assignee or creator.
    async fn threads_for_user(&self, user_id: &str) -> Result<Vec<TaskRef>, BackendError>;

    /// All comments across the given threads, newest first.
    async fn comments_for_threads(
        &self,
        thread_ids: &[String],
    ) -> Result<Vec<CommentRow>, BackendError>;

    /// The user's ledger rows restricted to the given comment ids.
    async fn read_markers_for_user(
        &self,
        user_id: &str,
        comment_ids: &[String],
    ) -> Result<Vec<ReadMarker>, BackendError>;

    /// Subscribe to change notifications for one thread. The filter is
    /// advisory: the transport may still deliver foreign events, and
    /// consumers re-validate thread membership on every event.
    fn subscribe_thread(&self, thread_id: &str) -> mpsc::Receiver<ChannelSignal>;

    /// Subscribe to change notifications for the whole comment collection.
    fn subscribe_all(&self) -> mpsc::Receiver<ChannelSignal>;
}
