use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{ChannelSignal, ChannelStatus, CommentBackend, NewComment};
use crate::config::SyncConfig;
use crate::error::BackendError;
use crate::models::{AuthorDisplay, CommentRow, ReadMarker, TaskRef};

/// In-memory reference implementation of [`CommentBackend`].
///
/// Behaves like the hosted store as far as this subsystem can observe it:
/// assigns ids and creation timestamps, enforces the edit window and the
/// authorship/admin deletion rule authoritatively, upserts read markers with
/// ignore-duplicate semantics, and broadcasts change notifications to every
/// subscriber. Used by the test suites and for local development.
///
/// The clock is manually advanced (`advance`, `set_now`) so window-boundary
/// behavior can be exercised deterministically. `set_offline` makes every
/// operation answer `Unavailable`, for driving rollback and retry paths.
pub struct MemoryBackend {
    config: SyncConfig,
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    comments: Vec<CommentRow>,
    markers: HashSet<ReadMarker>,
    profiles: HashMap<String, AuthorDisplay>,
    tasks: Vec<TaskRef>,
    admins: HashSet<String>,
    subscribers: Vec<mpsc::Sender<ChannelSignal>>,
    now: DateTime<Utc>,
    offline: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    pub fn with_config(config: SyncConfig) -> Self {
        Self {
            config,
            inner: Arc::new(Mutex::new(Inner {
                comments: Vec::new(),
                markers: HashSet::new(),
                profiles: HashMap::new(),
                tasks: Vec::new(),
                admins: HashSet::new(),
                subscribers: Vec::new(),
                now: Utc::now(),
                offline: false,
            })),
        }
    }

    // ===== Fixture seeding =====

    pub fn add_task(&self, task: TaskRef) {
        self.inner.lock().tasks.push(task);
    }

    pub fn add_profile(&self, user_id: impl Into<String>, display: AuthorDisplay) {
        self.inner.lock().profiles.insert(user_id.into(), display);
    }

    pub fn add_admin(&self, user_id: impl Into<String>) {
        self.inner.lock().admins.insert(user_id.into());
    }

    // ===== Clock control =====

    pub fn now(&self) -> DateTime<Utc> {
        self.inner.lock().now
    }

    pub fn set_now(&self, now: DateTime<Utc>) {
        self.inner.lock().now = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut inner = self.inner.lock();
        inner.now += by;
    }

    // ===== Fault injection =====

    /// When offline, every operation answers `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.inner.lock().offline = offline;
    }

    /// Number of persisted read markers (test observability).
    pub fn marker_count(&self) -> usize {
        self.inner.lock().markers.len()
    }

    fn broadcast(inner: &mut Inner, payload: serde_json::Value) {
        // Subscribers that are gone or whose buffer overflowed are dropped;
        // they recover through reload-on-resubscribe, like any lossy
        // transport consumer.
        inner
            .subscribers
            .retain(|tx| tx.try_send(ChannelSignal::Change(payload.clone())).is_ok());
    }

    fn subscribe(&self) -> mpsc::Receiver<ChannelSignal> {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let mut inner = self.inner.lock();
        let status = if inner.offline {
            ChannelStatus::Errored
        } else {
            ChannelStatus::Subscribed
        };
        let _ = tx.try_send(ChannelSignal::Status(status));
        inner.subscribers.push(tx);
        rx
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn guard_online(inner: &Inner) -> Result<(), BackendError> {
    if inner.offline {
        Err(BackendError::Unavailable("backend offline".to_string()))
    } else {
        Ok(())
    }
}

#[async_trait]
impl CommentBackend for MemoryBackend {
    async fn comments_for_thread(&self, thread_id: &str) -> Result<Vec<CommentRow>, BackendError> {
        let inner = self.inner.lock();
        guard_online(&inner)?;
        let mut rows: Vec<CommentRow> = inner
            .comments
            .iter()
            .filter(|c| c.thread_id == thread_id)
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.created_at);
        Ok(rows)
    }

    async fn create_comment(&self, draft: NewComment) -> Result<CommentRow, BackendError> {
        let mut inner = self.inner.lock();
        guard_online(&inner)?;
        let row = CommentRow {
            id: Uuid::new_v4().to_string(),
            thread_id: draft.thread_id,
            author_id: draft.author_id,
            content: draft.content,
            created_at: inner.now,
            updated_at: None,
        };
        inner.comments.push(row.clone());
        Self::broadcast(&mut inner, json!({ "eventType": "insert", "new": &row }));
        Ok(row)
    }

    async fn update_comment(
        &self,
        id: &str,
        content: &str,
        actor: &str,
    ) -> Result<CommentRow, BackendError> {
        let mut inner = self.inner.lock();
        guard_online(&inner)?;
        let now = inner.now;
        let window = self.config.edit_window;
        let inclusive = self.config.inclusive_boundary;

        let Some(row) = inner.comments.iter_mut().find(|c| c.id == id) else {
            return Err(BackendError::NotFound(id.to_string()));
        };
        if row.author_id != actor {
            return Err(BackendError::PermissionDenied(
                "not the comment author".to_string(),
            ));
        }
        let elapsed = now - row.created_at;
        let within = if inclusive {
            elapsed <= window
        } else {
            elapsed < window
        };
        if !within {
            return Err(BackendError::PermissionDenied(
                "edit window expired".to_string(),
            ));
        }

        row.content = content.to_string();
        row.updated_at = Some(now);
        let updated = row.clone();
        Self::broadcast(&mut inner, json!({ "eventType": "update", "new": &updated }));
        Ok(updated)
    }

    async fn delete_comment(&self, id: &str, actor: &str) -> Result<(), BackendError> {
        let mut inner = self.inner.lock();
        guard_online(&inner)?;
        let Some(pos) = inner.comments.iter().position(|c| c.id == id) else {
            // Already gone; deleting is idempotent.
            return Ok(());
        };
        let is_admin = inner.admins.contains(actor);
        if inner.comments[pos].author_id != actor && !is_admin {
            return Err(BackendError::PermissionDenied(
                "not the comment author".to_string(),
            ));
        }
        let removed = inner.comments.remove(pos);
        Self::broadcast(
            &mut inner,
            json!({
                "eventType": "delete",
                "old": { "id": removed.id, "thread_id": removed.thread_id }
            }),
        );
        Ok(())
    }

    async fn upsert_read_markers(&self, markers: &[ReadMarker]) -> Result<(), BackendError> {
        let mut inner = self.inner.lock();
        guard_online(&inner)?;
        // Unique constraint with ignore-on-conflict: re-inserting is a no-op.
        inner.markers.extend(markers.iter().cloned());
        Ok(())
    }

    async fn resolve_author(&self, user_id: &str) -> Result<AuthorDisplay, BackendError> {
        let inner = self.inner.lock();
        guard_online(&inner)?;
        inner
            .profiles
            .get(user_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(user_id.to_string()))
    }

    async fn threads_for_user(&self, user_id: &str) -> Result<Vec<TaskRef>, BackendError> {
        let inner = self.inner.lock();
        guard_online(&inner)?;
        Ok(inner
            .tasks
            .iter()
            .filter(|t| t.involves_user(user_id))
            .cloned()
            .collect())
    }

    async fn comments_for_threads(
        &self,
        thread_ids: &[String],
    ) -> Result<Vec<CommentRow>, BackendError> {
        let inner = self.inner.lock();
        guard_online(&inner)?;
        let mut rows: Vec<CommentRow> = inner
            .comments
            .iter()
            .filter(|c| thread_ids.contains(&c.thread_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn read_markers_for_user(
        &self,
        user_id: &str,
        comment_ids: &[String],
    ) -> Result<Vec<ReadMarker>, BackendError> {
        let inner = self.inner.lock();
        guard_online(&inner)?;
        Ok(inner
            .markers
            .iter()
            .filter(|m| m.user_id == user_id && comment_ids.contains(&m.comment_id))
            .cloned()
            .collect())
    }

    fn subscribe_thread(&self, _thread_id: &str) -> mpsc::Receiver<ChannelSignal> {
        // The thread filter is advisory in the production transport, so the
        // reference backend does not filter either: every subscriber sees
        // every event and consumers re-validate thread membership.
        self.subscribe()
    }

    fn subscribe_all(&self) -> mpsc::Receiver<ChannelSignal> {
        self.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChangeEvent;

    fn draft(thread_id: &str, author: &str, content: &str) -> NewComment {
        NewComment {
            thread_id: thread_id.to_string(),
            author_id: author.to_string(),
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_timestamp() {
        let backend = MemoryBackend::new();
        let row = backend
            .create_comment(draft("task-1", "user-a", "hello"))
            .await
            .unwrap();
        assert!(!row.id.is_empty());
        assert_eq!(row.created_at, backend.now());
        assert_eq!(row.updated_at, None);
    }

    #[tokio::test]
    async fn test_update_inside_window_succeeds() {
        let backend = MemoryBackend::new();
        let row = backend
            .create_comment(draft("task-1", "user-a", "hello"))
            .await
            .unwrap();

        backend.advance(Duration::seconds(14 * 60 + 59));
        let updated = backend
            .update_comment(&row.id, "hello again", "user-a")
            .await
            .unwrap();
        assert_eq!(updated.content, "hello again");
        assert!(updated.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_update_after_window_is_permission_denied() {
        let backend = MemoryBackend::new();
        let row = backend
            .create_comment(draft("task-1", "user-a", "hello"))
            .await
            .unwrap();

        backend.advance(Duration::seconds(15 * 60 + 1));
        let err = backend
            .update_comment(&row.id, "too late", "user-a")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_update_boundary_respects_inclusivity() {
        let inclusive = MemoryBackend::new();
        let row = inclusive
            .create_comment(draft("task-1", "user-a", "hello"))
            .await
            .unwrap();
        inclusive.advance(Duration::minutes(15));
        assert!(inclusive
            .update_comment(&row.id, "at the boundary", "user-a")
            .await
            .is_ok());

        let exclusive =
            MemoryBackend::with_config(SyncConfig::new(Duration::minutes(15), false));
        let row = exclusive
            .create_comment(draft("task-1", "user-a", "hello"))
            .await
            .unwrap();
        exclusive.advance(Duration::minutes(15));
        assert!(exclusive
            .update_comment(&row.id, "at the boundary", "user-a")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_update_by_non_author_is_denied() {
        let backend = MemoryBackend::new();
        let row = backend
            .create_comment(draft("task-1", "user-a", "hello"))
            .await
            .unwrap();
        let err = backend
            .update_comment(&row.id, "hijack", "user-b")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_delete_has_no_window_but_needs_authorship_or_admin() {
        let backend = MemoryBackend::new();
        backend.add_admin("admin-1");
        let by_a = backend
            .create_comment(draft("task-1", "user-a", "mine"))
            .await
            .unwrap();
        let by_b = backend
            .create_comment(draft("task-1", "user-b", "theirs"))
            .await
            .unwrap();

        // Far outside the edit window; deletion is still allowed.
        backend.advance(Duration::days(2));
        assert!(backend.delete_comment(&by_a.id, "user-a").await.is_ok());

        let err = backend.delete_comment(&by_b.id, "user-a").await.unwrap_err();
        assert!(matches!(err, BackendError::PermissionDenied(_)));
        assert!(backend.delete_comment(&by_b.id, "admin-1").await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_unknown_id_is_idempotent() {
        let backend = MemoryBackend::new();
        assert!(backend.delete_comment("ghost", "user-a").await.is_ok());
    }

    #[tokio::test]
    async fn test_marker_upsert_ignores_duplicates() {
        let backend = MemoryBackend::new();
        let markers = vec![
            ReadMarker::new("user-a", "c1"),
            ReadMarker::new("user-a", "c2"),
        ];
        backend.upsert_read_markers(&markers).await.unwrap();
        backend.upsert_read_markers(&markers).await.unwrap();
        assert_eq!(backend.marker_count(), 2);
    }

    #[tokio::test]
    async fn test_subscriber_receives_insert_broadcast() {
        let backend = MemoryBackend::new();
        let mut rx = backend.subscribe_thread("task-1");

        match rx.recv().await {
            Some(ChannelSignal::Status(ChannelStatus::Subscribed)) => {}
            other => panic!("expected subscribed status, got {other:?}"),
        }

        let row = backend
            .create_comment(draft("task-1", "user-a", "hello"))
            .await
            .unwrap();

        match rx.recv().await {
            Some(ChannelSignal::Change(payload)) => {
                let event = ChangeEvent::from_payload(&payload).unwrap();
                match event {
                    ChangeEvent::Insert { new } => assert_eq!(new.id, row.id),
                    other => panic!("expected insert, got {other:?}"),
                }
            }
            other => panic!("expected change signal, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_offline_backend_fails_everything() {
        let backend = MemoryBackend::new();
        backend.set_offline(true);

        let err = backend
            .create_comment(draft("task-1", "user-a", "hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Unavailable(_)));
        assert!(backend.comments_for_thread("task-1").await.is_err());
        assert!(backend.threads_for_user("user-a").await.is_err());
    }
}
