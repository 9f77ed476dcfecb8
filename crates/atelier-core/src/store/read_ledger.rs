use std::collections::HashSet;

use crate::models::{Comment, CommentRow, ReadMarker};

/// Client-side mirror of the per-user "seen" ledger.
///
/// Markers are insert-only and keyed by `(user_id, comment_id)`, so multiple
/// viewers writing their own rows never collide. Recording a marker twice is
/// a no-op, which keeps `mark as viewed` safe to re-run on every visible-set
/// change.
#[derive(Debug, Default)]
pub struct ReadLedger {
    seen: HashSet<ReadMarker>,
}

impl ReadLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_read(&self, user_id: &str, comment_id: &str) -> bool {
        self.seen.contains(&ReadMarker::new(user_id, comment_id))
    }

    /// Record one marker; returns true when it was newly inserted.
    pub fn record(&mut self, marker: ReadMarker) -> bool {
        self.seen.insert(marker)
    }

    /// Merge a batch of markers (bulk load result or a just-persisted set).
    pub fn record_all(&mut self, markers: impl IntoIterator<Item = ReadMarker>) {
        self.seen.extend(markers);
    }

    /// Comments by others that the user has not seen yet, as the markers that
    /// would mark them read. Own comments are never included.
    pub fn unseen_for(&self, user_id: &str, comments: &[Comment]) -> Vec<ReadMarker> {
        comments
            .iter()
            .filter(|c| c.author_id != user_id)
            .filter(|c| !self.is_read(user_id, &c.id))
            .map(|c| ReadMarker::new(user_id, c.id.clone()))
            .collect()
    }

    /// Number of comments by others not present in the ledger.
    pub fn unread_count(&self, user_id: &str, comments: &[Comment]) -> usize {
        comments
            .iter()
            .filter(|c| c.author_id != user_id && !self.is_read(user_id, &c.id))
            .count()
    }

    /// Same as [`ReadLedger::unread_count`] over backend rows, for the bulk
    /// aggregation path which never hydrates full comments.
    pub fn unread_count_rows(&self, user_id: &str, rows: &[CommentRow]) -> usize {
        rows.iter()
            .filter(|r| r.author_id != user_id && !self.is_read(user_id, &r.id))
            .count()
    }
}
