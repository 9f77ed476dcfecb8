use chrono::{DateTime, Duration, Utc};

use crate::config::SyncConfig;
use crate::models::Comment;

/// Pure predicate deciding whether an actor may edit or delete a given
/// comment right now.
///
/// This is the client-side optimistic pre-check only. The authority
/// re-validates on write and may still reject near the boundary (clock skew,
/// network delay); that rejection is final and is never retried here.
#[derive(Debug, Clone)]
pub struct EditWindowPolicy {
    window: Duration,
    inclusive: bool,
}

impl EditWindowPolicy {
    pub fn new(window: Duration, inclusive: bool) -> Self {
        Self { window, inclusive }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.edit_window, config.inclusive_boundary)
    }

    /// Authors may edit their own comments inside the window.
    pub fn can_edit(&self, comment: &Comment, user_id: &str, now: DateTime<Utc>) -> bool {
        if comment.author_id != user_id {
            return false;
        }
        let elapsed = now - comment.created_at;
        if self.inclusive {
            elapsed <= self.window
        } else {
            elapsed < self.window
        }
    }

    /// Deletion carries no time window: authorship or admin override only.
    pub fn can_delete(&self, comment: &Comment, user_id: &str, is_admin: bool) -> bool {
        is_admin || comment.author_id == user_id
    }
}

impl Default for EditWindowPolicy {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuthorDisplay;
    use chrono::TimeZone;

    fn comment_by(author_id: &str) -> Comment {
        Comment {
            id: "c1".to_string(),
            thread_id: "task-1".to_string(),
            author_id: author_id.to_string(),
            author: AuthorDisplay::new("Ada"),
            content: "first pass at the hero copy".to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            updated_at: None,
        }
    }

    #[test]
    fn test_author_can_edit_inside_window() {
        let policy = EditWindowPolicy::default();
        let comment = comment_by("user-a");
        let now = comment.created_at + Duration::seconds(14 * 60 + 59);
        assert!(policy.can_edit(&comment, "user-a", now));
    }

    #[test]
    fn test_edit_rejected_after_window() {
        let policy = EditWindowPolicy::default();
        let comment = comment_by("user-a");
        let now = comment.created_at + Duration::seconds(15 * 60 + 1);
        assert!(!policy.can_edit(&comment, "user-a", now));
    }

    #[test]
    fn test_inclusive_boundary_allows_edit_at_exactly_fifteen_minutes() {
        let policy = EditWindowPolicy::new(Duration::minutes(15), true);
        let comment = comment_by("user-a");
        let now = comment.created_at + Duration::minutes(15);
        assert!(policy.can_edit(&comment, "user-a", now));
    }

    #[test]
    fn test_exclusive_boundary_rejects_edit_at_exactly_fifteen_minutes() {
        let policy = EditWindowPolicy::new(Duration::minutes(15), false);
        let comment = comment_by("user-a");
        let now = comment.created_at + Duration::minutes(15);
        assert!(!policy.can_edit(&comment, "user-a", now));
    }

    #[test]
    fn test_non_author_cannot_edit_even_inside_window() {
        let policy = EditWindowPolicy::default();
        let comment = comment_by("user-a");
        let now = comment.created_at + Duration::minutes(1);
        assert!(!policy.can_edit(&comment, "user-b", now));
    }

    #[test]
    fn test_delete_has_no_time_window() {
        let policy = EditWindowPolicy::default();
        let comment = comment_by("user-a");
        // Well past the edit window; deletion is still allowed for the author.
        assert!(policy.can_delete(&comment, "user-a", false));
    }

    #[test]
    fn test_admin_can_delete_others_comments() {
        let policy = EditWindowPolicy::default();
        let comment = comment_by("user-a");
        assert!(!policy.can_delete(&comment, "user-b", false));
        assert!(policy.can_delete(&comment, "user-b", true));
    }
}
