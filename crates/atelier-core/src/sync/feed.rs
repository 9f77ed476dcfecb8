use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::backend::{ChannelSignal, CommentBackend};
use crate::error::LoadError;
use crate::models::{ChangeEvent, CommentRow, ConversationSummary};
use crate::store::ReadLedger;

/// Cross-thread activity feed: last message plus unread count per
/// conversation the user is involved in.
///
/// Unlike the per-thread store this is a bulk recompute, not a live cache.
/// Every insert anywhere (observed through an unfiltered subscription)
/// triggers a full [`ConversationFeed::refresh`]; the summaries are always
/// derivable fresh from the comment and marker sets, never merged
/// incrementally.
pub struct ConversationFeed {
    user_id: String,
    backend: Arc<dyn CommentBackend>,
    summaries: Vec<ConversationSummary>,
}

impl ConversationFeed {
    pub fn new(user_id: impl Into<String>, backend: Arc<dyn CommentBackend>) -> Self {
        Self {
            user_id: user_id.into(),
            backend,
            summaries: Vec::new(),
        }
    }

    // ===== Getters =====

    /// Current summaries, most recently active conversation first.
    pub fn summaries(&self) -> &[ConversationSummary] {
        &self.summaries
    }

    /// Badge count: unread comments across every surfaced conversation.
    pub fn total_unread(&self) -> usize {
        self.summaries.iter().map(|s| s.unread_count).sum()
    }

    // ===== Recompute =====

    /// Rebuild the whole feed from the backend. On failure the previous
    /// summaries are left untouched.
    pub async fn refresh(&mut self) -> Result<(), LoadError> {
        let tasks = self.backend.threads_for_user(&self.user_id).await?;
        let thread_ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();

        let rows = self.backend.comments_for_threads(&thread_ids).await?;
        let comment_ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let markers = self
            .backend
            .read_markers_for_user(&self.user_id, &comment_ids)
            .await?;

        let mut ledger = ReadLedger::new();
        ledger.record_all(markers);

        // Rows arrive newest first, so each thread's first row is its last
        // message.
        let mut by_thread: HashMap<String, Vec<CommentRow>> = HashMap::new();
        for row in rows {
            by_thread.entry(row.thread_id.clone()).or_default().push(row);
        }

        let mut summaries = Vec::new();
        for task in tasks {
            // Conversations with no comments never surface.
            let Some(thread_rows) = by_thread.get(&task.id) else {
                continue;
            };
            let Some(last) = thread_rows.first() else {
                continue;
            };
            summaries.push(ConversationSummary {
                unread_count: ledger.unread_count_rows(&self.user_id, thread_rows),
                total_comments: thread_rows.len(),
                last_message: last.clone(),
                task,
            });
        }
        summaries.sort_by(|a, b| b.last_message.created_at.cmp(&a.last_message.created_at));

        debug!(user_id = %self.user_id, conversations = summaries.len(), "feed recomputed");
        self.summaries = summaries;
        Ok(())
    }

    // ===== Signals =====

    /// Drive the feed from an unfiltered subscription until it closes.
    pub async fn run(&mut self, mut signals: mpsc::Receiver<ChannelSignal>) {
        while let Some(signal) = signals.recv().await {
            self.handle_signal(signal).await;
        }
        debug!(user_id = %self.user_id, "feed channel closed");
    }

    /// Apply one push-channel signal. Only inserts move the feed; updates and
    /// deletes do not change which conversation was last active.
    pub async fn handle_signal(&mut self, signal: ChannelSignal) {
        match signal {
            ChannelSignal::Status(status) => {
                debug!(user_id = %self.user_id, ?status, "feed channel status");
            }
            ChannelSignal::Change(payload) => {
                let event = match ChangeEvent::from_payload(&payload) {
                    Ok(event) => event,
                    Err(err) => {
                        warn!(error = %err, "dropping malformed change payload");
                        return;
                    }
                };
                if matches!(event, ChangeEvent::Insert { .. }) {
                    if let Err(err) = self.refresh().await {
                        warn!(user_id = %self.user_id, error = %err, "feed refresh failed, keeping previous summaries");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, NewComment};
    use crate::models::{AuthorDisplay, ReadMarker, TaskRef};
    use chrono::Duration;
    use serde_json::json;

    fn task(id: &str, title: &str, assigned: Option<&str>, creator: &str) -> TaskRef {
        TaskRef {
            id: id.to_string(),
            title: title.to_string(),
            assigned_user_id: assigned.map(str::to_string),
            created_by_user_id: creator.to_string(),
            status_label: Some("In Progress".to_string()),
            color: Some("#7c5cff".to_string()),
        }
    }

    async fn post(backend: &MemoryBackend, thread_id: &str, author: &str, content: &str) {
        backend
            .create_comment(NewComment {
                thread_id: thread_id.to_string(),
                author_id: author.to_string(),
                content: content.to_string(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_feed_surfaces_only_active_conversations() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_task(task("task-1", "Hero artwork", Some("viewer"), "user-b"));
        backend.add_task(task("task-2", "Icon pass", Some("viewer"), "user-b"));
        backend.add_task(task("task-3", "Type scale", Some("viewer"), "user-b"));

        // task-3 gets an older message, task-1 two newer ones, task-2 none.
        post(&backend, "task-3", "user-b", "old news").await;
        backend.advance(Duration::minutes(5));
        post(&backend, "task-1", "user-b", "first round").await;
        backend.advance(Duration::minutes(5));
        post(&backend, "task-1", "user-b", "second round").await;

        let mut feed = ConversationFeed::new("viewer", backend.clone() as Arc<dyn CommentBackend>);
        feed.refresh().await.unwrap();

        let summaries = feed.summaries();
        assert_eq!(summaries.len(), 2, "empty conversations must be dropped");
        assert_eq!(summaries[0].task.id, "task-1");
        assert_eq!(summaries[0].unread_count, 2);
        assert_eq!(summaries[0].total_comments, 2);
        assert_eq!(summaries[0].last_message.content, "second round");
        assert_eq!(summaries[1].task.id, "task-3");
        assert_eq!(feed.total_unread(), 3);
    }

    #[tokio::test]
    async fn test_feed_ignores_threads_the_user_is_not_involved_in() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_task(task("task-1", "Mine", Some("viewer"), "user-b"));
        backend.add_task(task("task-9", "Someone else's", Some("user-c"), "user-b"));
        post(&backend, "task-1", "user-b", "for you").await;
        post(&backend, "task-9", "user-b", "not for you").await;

        let mut feed = ConversationFeed::new("viewer", backend.clone() as Arc<dyn CommentBackend>);
        feed.refresh().await.unwrap();

        assert_eq!(feed.summaries().len(), 1);
        assert_eq!(feed.summaries()[0].task.id, "task-1");
    }

    #[tokio::test]
    async fn test_unread_respects_ledger_and_self_exclusion() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_task(task("task-1", "Hero artwork", Some("viewer"), "user-b"));
        post(&backend, "task-1", "user-b", "seen already").await;
        post(&backend, "task-1", "viewer", "my own reply").await;
        post(&backend, "task-1", "user-b", "fresh").await;

        // The viewer has already seen the first comment.
        let rows = backend.comments_for_thread("task-1").await.unwrap();
        let seen = rows.iter().find(|r| r.content == "seen already").unwrap();
        backend
            .upsert_read_markers(&[ReadMarker::new("viewer", seen.id.clone())])
            .await
            .unwrap();

        let mut feed = ConversationFeed::new("viewer", backend.clone() as Arc<dyn CommentBackend>);
        feed.refresh().await.unwrap();

        // Own comment and the marked one are excluded; only "fresh" counts.
        assert_eq!(feed.summaries()[0].unread_count, 1);
        assert_eq!(feed.summaries()[0].total_comments, 3);
    }

    #[tokio::test]
    async fn test_insert_signal_triggers_recompute() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_task(task("task-1", "Hero artwork", Some("viewer"), "user-b"));

        let mut feed = ConversationFeed::new("viewer", backend.clone() as Arc<dyn CommentBackend>);
        let mut rx = backend.subscribe_all();
        feed.refresh().await.unwrap();
        assert!(feed.summaries().is_empty());

        post(&backend, "task-1", "user-b", "hot off the press").await;
        while let Ok(signal) = rx.try_recv() {
            feed.handle_signal(signal).await;
        }

        assert_eq!(feed.summaries().len(), 1);
        assert_eq!(feed.summaries()[0].last_message.content, "hot off the press");
    }

    #[tokio::test]
    async fn test_update_and_delete_signals_do_not_recompute() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_task(task("task-1", "Hero artwork", Some("viewer"), "user-b"));

        let mut feed = ConversationFeed::new("viewer", backend.clone() as Arc<dyn CommentBackend>);
        post(&backend, "task-1", "user-b", "original").await;
        feed.refresh().await.unwrap();
        let before = feed.summaries().to_vec();

        // A content edit elsewhere does not reorder the feed.
        let mut row = backend.comments_for_thread("task-1").await.unwrap()[0].clone();
        row.content = "edited elsewhere".to_string();
        row.updated_at = Some(row.created_at);
        let payload = json!({ "eventType": "update", "new": &row });
        feed.handle_signal(ChannelSignal::Change(payload)).await;

        assert_eq!(feed.summaries(), &before[..]);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_summaries() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_task(task("task-1", "Hero artwork", Some("viewer"), "user-b"));
        post(&backend, "task-1", "user-b", "stable").await;

        let mut feed = ConversationFeed::new("viewer", backend.clone() as Arc<dyn CommentBackend>);
        feed.refresh().await.unwrap();
        let before = feed.summaries().to_vec();

        backend.set_offline(true);
        assert!(feed.refresh().await.is_err());
        assert_eq!(feed.summaries(), &before[..]);

        // A refresh-triggering signal while offline also keeps prior state.
        let payload = json!({
            "eventType": "insert",
            "new": {
                "id": "c-x",
                "thread_id": "task-1",
                "author_id": "user-b",
                "content": "lost",
                "created_at": "2026-03-01T09:00:00Z"
            }
        });
        feed.handle_signal(ChannelSignal::Change(payload)).await;
        assert_eq!(feed.summaries(), &before[..]);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_dropped() {
        let backend = Arc::new(MemoryBackend::new());
        let mut feed = ConversationFeed::new("viewer", backend.clone() as Arc<dyn CommentBackend>);
        feed.handle_signal(ChannelSignal::Change(json!({ "eventType": "merge" })))
            .await;
        assert!(feed.summaries().is_empty());
    }
}
