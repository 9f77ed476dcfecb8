use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::constants::TEMP_ID_PREFIX;
use crate::models::{Comment, CommentRow, LocalUser};

/// Lifecycle of one optimistic create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    Pending,
    Confirmed,
    RolledBack,
}

/// Explicit record of one optimistic create, keyed by its temporary id.
/// Holding these in a map (rather than in write-callback closures) is what
/// makes the ack/echo race resolvable in either arrival order.
#[derive(Debug, Clone)]
pub struct PendingWrite {
    pub temp_id: String,
    pub state: WriteState,
}

/// Full-store snapshot used to roll back failed edits and deletes. A failed
/// write restores all of this, not just the touched comment, because other
/// mutations may have interleaved while the request was in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot {
    comments: Vec<Comment>,
    self_originated: HashSet<String>,
}

/// Per-thread ordered cache of comments with optimistic create/edit/delete.
///
/// The store is synchronous and does no I/O; the realtime bridge drives the
/// async halves of each operation and feeds results back in. Comments are
/// kept ordered by `created_at` ascending, insertion order as tie-break.
pub struct CommentStore {
    thread_id: String,
    comments: Vec<Comment>,
    /// Optimistic-create ledger, keyed by temporary id. Records are kept
    /// after they settle so a write's outcome stays observable.
    writes: HashMap<String, PendingWrite>,
    /// Confirmed ids whose insert this client performed. The matching
    /// realtime echo is recognized through this set and dropped.
    self_originated: HashSet<String>,
}

impl CommentStore {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            comments: Vec::new(),
            writes: HashMap::new(),
            self_originated: HashSet::new(),
        }
    }

    // ===== Getters =====

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.comments.iter().any(|c| c.id == id)
    }

    /// Outcome of the optimistic create identified by `temp_id`, if any.
    pub fn write_state(&self, temp_id: &str) -> Option<WriteState> {
        self.writes.get(temp_id).map(|w| w.state)
    }

    /// Whether `id` is a not-yet-acknowledged optimistic entry.
    pub fn is_pending(&self, id: &str) -> bool {
        self.writes
            .get(id)
            .is_some_and(|w| w.state == WriteState::Pending)
    }

    // ===== Load / reload =====

    /// Replace the confirmed contents with an authoritative load result.
    /// Optimistic entries that have not been acknowledged yet are kept: the
    /// backend cannot have returned them.
    pub fn replace_confirmed(&mut self, mut confirmed: Vec<Comment>) {
        let mut kept = Vec::new();
        for comment in self.comments.drain(..) {
            if self
                .writes
                .get(&comment.id)
                .is_some_and(|w| w.state == WriteState::Pending)
            {
                kept.push(comment);
            }
        }

        confirmed.sort_by_key(|c| c.created_at);
        self.comments = confirmed;
        for comment in kept {
            self.insert_sorted(comment);
        }
    }

    // ===== Optimistic writes =====

    /// Append an optimistic comment in `Pending` state and return its
    /// temporary id. The persistent write is issued by the caller; the entry
    /// is visible immediately.
    pub fn insert_pending(
        &mut self,
        content: impl Into<String>,
        user: &LocalUser,
        now: DateTime<Utc>,
    ) -> String {
        let temp_id = format!("{TEMP_ID_PREFIX}{}", Uuid::new_v4());
        let comment = Comment {
            id: temp_id.clone(),
            thread_id: self.thread_id.clone(),
            author_id: user.id.clone(),
            author: user.display.clone(),
            content: content.into(),
            created_at: now,
            updated_at: None,
        };
        self.insert_sorted(comment);
        self.writes.insert(
            temp_id.clone(),
            PendingWrite {
                temp_id: temp_id.clone(),
                state: WriteState::Pending,
            },
        );
        temp_id
    }

    /// Settle an optimistic create with the authoritative row.
    ///
    /// Normal case: the temporary entry is rewritten in place (id and
    /// timestamps replaced, never a second entry appended) and the confirmed
    /// id is recorded as self-originated so the later realtime echo is
    /// dropped. If the echo already landed the confirmed row, the temporary
    /// entry is removed instead and the set is left untouched; the echo was
    /// consumed as a regular remote insert. Both orders leave exactly one
    /// entry for the id.
    pub fn confirm_pending(&mut self, temp_id: &str, row: CommentRow) {
        let Some(write) = self.writes.get_mut(temp_id) else {
            return;
        };
        if write.state != WriteState::Pending {
            return;
        }
        write.state = WriteState::Confirmed;

        if self.comments.iter().any(|c| c.id == row.id) {
            // The echo won the race; our temporary entry is the duplicate.
            self.comments.retain(|c| c.id != temp_id);
            return;
        }

        let Some(pos) = self.comments.iter().position(|c| c.id == temp_id) else {
            // Entry vanished while the write was in flight (store reloaded
            // underneath us); the next reload carries the confirmed row.
            return;
        };
        let mut comment = self.comments.remove(pos);
        comment.id = row.id.clone();
        comment.created_at = row.created_at;
        comment.updated_at = row.updated_at;
        comment.content = row.content;
        self.insert_sorted(comment);
        self.self_originated.insert(row.id);
    }

    /// Remove a failed optimistic create entirely, restoring the pre-call
    /// state for that entry.
    pub fn roll_back(&mut self, temp_id: &str) {
        if let Some(write) = self.writes.get_mut(temp_id) {
            write.state = WriteState::RolledBack;
        }
        self.comments.retain(|c| c.id != temp_id);
    }

    /// Snapshot for edit/delete rollback.
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            comments: self.comments.clone(),
            self_originated: self.self_originated.clone(),
        }
    }

    /// Restore a previously taken snapshot.
    pub fn restore(&mut self, snapshot: StoreSnapshot) {
        self.comments = snapshot.comments;
        self.self_originated = snapshot.self_originated;
    }

    /// Optimistically patch a comment's content, stamping `updated_at`.
    pub fn patch_content(&mut self, id: &str, content: impl Into<String>, now: DateTime<Utc>) {
        if let Some(comment) = self.comments.iter_mut().find(|c| c.id == id) {
            comment.content = content.into();
            comment.updated_at = Some(now);
        }
    }

    /// Optimistically remove a comment.
    pub fn remove(&mut self, id: &str) {
        self.comments.retain(|c| c.id != id);
    }

    // ===== Remote event application =====

    /// Apply a remote insert. Returns false when the event was a duplicate:
    /// either the echo of a write this client already applied (consumes one
    /// self-originated entry) or a redelivery of a known id.
    pub fn apply_insert(&mut self, comment: Comment) -> bool {
        if self.self_originated.remove(&comment.id) {
            return false;
        }
        if self.comments.iter().any(|c| c.id == comment.id) {
            return false;
        }
        self.insert_sorted(comment);
        true
    }

    /// Patch content/updated_at for a remote update. Events referencing an
    /// unknown id are dropped (returns false); a later reload self-heals.
    pub fn apply_update(
        &mut self,
        id: &str,
        content: &str,
        updated_at: Option<DateTime<Utc>>,
    ) -> bool {
        match self.comments.iter_mut().find(|c| c.id == id) {
            Some(comment) => {
                comment.content = content.to_string();
                comment.updated_at = updated_at;
                true
            }
            None => false,
        }
    }

    /// Remove by id for a remote delete; unknown ids are a no-op.
    pub fn apply_delete(&mut self, id: &str) -> bool {
        let before = self.comments.len();
        self.comments.retain(|c| c.id != id);
        self.comments.len() != before
    }

    // Insert in sorted position (oldest first); equal timestamps keep
    // insertion order.
    fn insert_sorted(&mut self, comment: Comment) {
        let pos = self
            .comments
            .partition_point(|c| c.created_at <= comment.created_at);
        self.comments.insert(pos, comment);
    }
}
