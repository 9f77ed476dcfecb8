use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::backend::{ChannelSignal, ChannelStatus, CommentBackend, NewComment};
use crate::config::SyncConfig;
use crate::error::{BackendError, LoadError, WriteError};
use crate::models::{AuthorDisplay, ChangeEvent, Comment, CommentRow, LocalUser};
use crate::policy::EditWindowPolicy;
use crate::store::{CommentStore, ReadLedger};

/// How far an open thread view has come.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadPhase {
    Loading,
    Ready,
    /// The initial load failed; prior state (if any) is untouched and
    /// `load` may be retried.
    Errored,
}

/// Keeps one thread's comment store consistent against the backend.
///
/// Owns the authoritative load, applies push-channel signals (re-validating
/// thread membership on every event, since the transport filter is advisory),
/// deduplicates echoes of this client's own inserts, and drives the
/// optimistic create/edit/delete round-trips. Read receipts are advanced on
/// every visible-set change while the view is open.
///
/// Dropping the bridge (or the receiver passed to [`ThreadSync::run`])
/// detaches the thread view; in-flight backend requests still complete but
/// their results no longer reach this store.
pub struct ThreadSync {
    thread_id: String,
    user: LocalUser,
    backend: Arc<dyn CommentBackend>,
    store: Arc<Mutex<CommentStore>>,
    ledger: Arc<Mutex<ReadLedger>>,
    policy: EditWindowPolicy,
    /// Display info cache for remote authors. Failed lookups are not cached
    /// so the next sighting retries.
    profiles: HashMap<String, AuthorDisplay>,
    loaded_once: bool,
    phase: ThreadPhase,
    channel_status: Option<ChannelStatus>,
}

impl ThreadSync {
    pub fn new(
        thread_id: impl Into<String>,
        user: LocalUser,
        backend: Arc<dyn CommentBackend>,
        config: &SyncConfig,
    ) -> Self {
        let thread_id = thread_id.into();
        Self {
            store: Arc::new(Mutex::new(CommentStore::new(thread_id.clone()))),
            ledger: Arc::new(Mutex::new(ReadLedger::new())),
            policy: EditWindowPolicy::from_config(config),
            profiles: HashMap::new(),
            loaded_once: false,
            phase: ThreadPhase::Loading,
            channel_status: None,
            thread_id,
            user,
            backend,
        }
    }

    // ===== Getters =====

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Shared handle to the thread's comment store, for rendering.
    pub fn store(&self) -> Arc<Mutex<CommentStore>> {
        self.store.clone()
    }

    pub fn phase(&self) -> ThreadPhase {
        self.phase
    }

    pub fn channel_status(&self) -> Option<ChannelStatus> {
        self.channel_status
    }

    /// Unread count for the viewer over the currently visible set.
    pub fn unread_count(&self) -> usize {
        let store = self.store.lock();
        self.ledger.lock().unread_count(&self.user.id, store.comments())
    }

    // ===== Lifecycle =====

    /// Perform the authoritative full load. The thread is not "ready" until
    /// this has completed once; on failure the prior in-memory state is left
    /// untouched and the call may be retried.
    pub async fn load(&mut self) -> Result<(), LoadError> {
        let rows = match self.backend.comments_for_thread(&self.thread_id).await {
            Ok(rows) => rows,
            Err(err) => {
                if !self.loaded_once {
                    self.phase = ThreadPhase::Errored;
                }
                warn!(thread_id = %self.thread_id, error = %err, "thread load failed, keeping prior state");
                return Err(LoadError::from(err));
            }
        };

        let comments = self.hydrate_rows(rows).await;

        // Pull the viewer's existing markers so unread counts carry across
        // sessions and mark_viewed only upserts what is genuinely new.
        let comment_ids: Vec<String> = comments.iter().map(|c| c.id.clone()).collect();
        match self
            .backend
            .read_markers_for_user(&self.user.id, &comment_ids)
            .await
        {
            Ok(markers) => self.ledger.lock().record_all(markers),
            Err(err) => {
                warn!(thread_id = %self.thread_id, error = %err, "read ledger fetch failed, unread may briefly overcount");
            }
        }

        self.store.lock().replace_confirmed(comments);
        self.loaded_once = true;
        self.phase = ThreadPhase::Ready;
        debug!(thread_id = %self.thread_id, count = self.store.lock().len(), "thread loaded");

        self.mark_viewed().await;
        Ok(())
    }

    /// Drive the bridge from a subscription until the channel closes.
    pub async fn run(&mut self, mut signals: mpsc::Receiver<ChannelSignal>) {
        while let Some(signal) = signals.recv().await {
            self.handle_signal(signal).await;
        }
        debug!(thread_id = %self.thread_id, "signal channel closed");
    }

    /// Apply one push-channel signal.
    pub async fn handle_signal(&mut self, signal: ChannelSignal) {
        match signal {
            ChannelSignal::Status(status) => {
                self.channel_status = Some(status);
                match status {
                    ChannelStatus::Subscribed => {
                        // First Subscribed arrives alongside the initial load,
                        // which already covers it. A later one means the
                        // channel dropped and recovered, so reload to pick up
                        // anything missed while detached.
                        if self.loaded_once {
                            if let Err(err) = self.load().await {
                                warn!(thread_id = %self.thread_id, error = %err, "reload after resubscribe failed");
                            }
                        } else {
                            debug!(thread_id = %self.thread_id, "channel subscribed before first load");
                        }
                    }
                    ChannelStatus::Closed | ChannelStatus::Errored => {
                        debug!(thread_id = %self.thread_id, ?status, "channel degraded");
                    }
                }
            }
            ChannelSignal::Change(payload) => {
                let event = match ChangeEvent::from_payload(&payload) {
                    Ok(event) => event,
                    Err(err) => {
                        warn!(thread_id = %self.thread_id, error = %err, "dropping malformed change payload");
                        return;
                    }
                };

                // The transport-side filter is advisory only; re-validate
                // thread membership before applying anything.
                if let Some(claimed) = event.thread_id() {
                    if claimed != self.thread_id {
                        debug!(thread_id = %self.thread_id, foreign = %claimed, "dropping foreign-thread event");
                        return;
                    }
                }

                match event {
                    ChangeEvent::Insert { new } => self.apply_remote_insert(new).await,
                    ChangeEvent::Update { new } => {
                        let applied =
                            self.store
                                .lock()
                                .apply_update(&new.id, &new.content, new.updated_at);
                        if !applied {
                            debug!(id = %new.id, "update for unknown comment dropped");
                        }
                    }
                    ChangeEvent::Delete { old } => {
                        let applied = self.store.lock().apply_delete(&old.id);
                        if !applied {
                            debug!(id = %old.id, "delete for unknown comment dropped");
                        }
                    }
                }
            }
        }
    }

    async fn apply_remote_insert(&mut self, row: CommentRow) {
        // Resolve the author before taking the store lock; the lookup may
        // suspend.
        let display = self.display_for(&row.author_id).await;
        let comment = Comment::from_row(row, display);
        let applied = self.store.lock().apply_insert(comment);
        if applied {
            // Visible set changed with the viewer present.
            self.mark_viewed().await;
        }
    }

    // ===== Writes =====

    /// Post a comment. Appears in the store immediately; on acknowledgment
    /// the temporary id is replaced in place and the confirmed id returned.
    /// On failure the entry is removed again and a retryable error raised.
    pub async fn create(&self, content: &str) -> Result<String, WriteError> {
        let draft = NewComment {
            thread_id: self.thread_id.clone(),
            author_id: self.user.id.clone(),
            content: content.to_string(),
        };
        let temp_id = self
            .store
            .lock()
            .insert_pending(content, &self.user, Utc::now());

        match self.backend.create_comment(draft).await {
            Ok(row) => {
                let id = row.id.clone();
                self.store.lock().confirm_pending(&temp_id, row);
                Ok(id)
            }
            Err(err) => {
                warn!(thread_id = %self.thread_id, error = %err, "create failed, rolling back");
                self.store.lock().roll_back(&temp_id);
                Err(WriteError::Transient(err))
            }
        }
    }

    /// Edit a comment, preconditioned on the edit-window policy. The patch is
    /// applied optimistically; on failure the whole prior snapshot is
    /// restored, and an authority rejection surfaces as the terminal
    /// `EditWindowExpired` rather than a retryable failure.
    pub async fn edit(&self, comment_id: &str, new_content: &str) -> Result<(), WriteError> {
        let now = Utc::now();
        let snapshot = {
            let mut store = self.store.lock();
            let Some(comment) = store.get(comment_id) else {
                return Err(WriteError::UnknownComment(comment_id.to_string()));
            };
            if comment.author_id != self.user.id {
                return Err(WriteError::NotCommentAuthor);
            }
            if !self.policy.can_edit(comment, &self.user.id, now) {
                return Err(WriteError::EditWindowExpired);
            }
            if store.is_pending(comment_id) {
                // No confirmed id yet; the authority cannot address it.
                return Err(WriteError::UnknownComment(comment_id.to_string()));
            }
            let snapshot = store.snapshot();
            store.patch_content(comment_id, new_content, now);
            snapshot
        };

        match self
            .backend
            .update_comment(comment_id, new_content, &self.user.id)
            .await
        {
            Ok(row) => {
                // The authority's timestamps win over the optimistic stamp.
                self.store
                    .lock()
                    .apply_update(&row.id, &row.content, row.updated_at);
                Ok(())
            }
            Err(BackendError::PermissionDenied(reason)) => {
                // Authoritative rejection: the window elapsed between our
                // pre-check and the server-side re-validation. Terminal.
                debug!(id = %comment_id, %reason, "authority rejected edit");
                self.store.lock().restore(snapshot);
                Err(WriteError::EditWindowExpired)
            }
            Err(err) => {
                warn!(id = %comment_id, error = %err, "edit failed, restoring snapshot");
                self.store.lock().restore(snapshot);
                Err(WriteError::Transient(err))
            }
        }
    }

    /// Delete a comment. Authorship or admin override only; deletion has no
    /// time window. Optimistically removed, restored on failure.
    pub async fn delete(&self, comment_id: &str) -> Result<(), WriteError> {
        let snapshot = {
            let mut store = self.store.lock();
            let Some(comment) = store.get(comment_id) else {
                return Err(WriteError::UnknownComment(comment_id.to_string()));
            };
            if !self
                .policy
                .can_delete(comment, &self.user.id, self.user.is_admin)
            {
                return Err(WriteError::NotCommentAuthor);
            }
            if store.is_pending(comment_id) {
                return Err(WriteError::UnknownComment(comment_id.to_string()));
            }
            let snapshot = store.snapshot();
            store.remove(comment_id);
            snapshot
        };

        match self.backend.delete_comment(comment_id, &self.user.id).await {
            Ok(()) => Ok(()),
            Err(BackendError::PermissionDenied(reason)) => {
                debug!(id = %comment_id, %reason, "authority rejected delete");
                self.store.lock().restore(snapshot);
                Err(WriteError::NotCommentAuthor)
            }
            Err(err) => {
                warn!(id = %comment_id, error = %err, "delete failed, restoring snapshot");
                self.store.lock().restore(snapshot);
                Err(WriteError::Transient(err))
            }
        }
    }

    // ===== Read receipts =====

    /// Upsert read markers for every visible comment by another author that
    /// the viewer has not seen yet. Safe to call on every visible-set
    /// change; both the ledger and the backend treat duplicates as no-ops.
    pub async fn mark_viewed(&self) {
        let unseen = {
            let store = self.store.lock();
            self.ledger.lock().unseen_for(&self.user.id, store.comments())
        };
        if unseen.is_empty() {
            return;
        }
        match self.backend.upsert_read_markers(&unseen).await {
            Ok(()) => self.ledger.lock().record_all(unseen),
            Err(err) => {
                // The next visible-set change retries; upserts are idempotent.
                warn!(thread_id = %self.thread_id, error = %err, "failed to persist read markers");
            }
        }
    }

    // ===== Author hydration =====

    async fn display_for(&mut self, author_id: &str) -> AuthorDisplay {
        if author_id == self.user.id {
            return self.user.display.clone();
        }
        if let Some(display) = self.profiles.get(author_id) {
            return display.clone();
        }
        match self.backend.resolve_author(author_id).await {
            Ok(display) => {
                self.profiles
                    .insert(author_id.to_string(), display.clone());
                display
            }
            Err(err) => {
                debug!(author_id = %author_id, error = %err, "author profile unresolved, using placeholder");
                AuthorDisplay::unknown()
            }
        }
    }

    async fn hydrate_rows(&mut self, rows: Vec<CommentRow>) -> Vec<Comment> {
        // Resolve unseen authors concurrently before building the comments.
        let mut unresolved: Vec<String> = rows
            .iter()
            .map(|r| r.author_id.clone())
            .filter(|id| *id != self.user.id && !self.profiles.contains_key(id))
            .collect();
        unresolved.sort();
        unresolved.dedup();

        let results = join_all(
            unresolved
                .iter()
                .map(|id| self.backend.resolve_author(id)),
        )
        .await;
        for (id, result) in unresolved.into_iter().zip(results) {
            match result {
                Ok(display) => {
                    self.profiles.insert(id, display);
                }
                Err(err) => {
                    debug!(author_id = %id, error = %err, "author profile unresolved, using placeholder");
                }
            }
        }

        rows.into_iter()
            .map(|row| {
                let display = if row.author_id == self.user.id {
                    self.user.display.clone()
                } else {
                    self.profiles
                        .get(&row.author_id)
                        .cloned()
                        .unwrap_or_else(AuthorDisplay::unknown)
                };
                Comment::from_row(row, display)
            })
            .collect()
    }
}
