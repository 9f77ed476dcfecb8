use super::change::CommentRow;
use super::task::TaskRef;

/// Derived activity-feed entry for one conversation. Never stored:
/// recomputed in bulk from the comment and read-marker sets on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSummary {
    pub task: TaskRef,
    /// Newest comment in the thread.
    pub last_message: CommentRow,
    /// Comments by others the viewer has not seen yet.
    pub unread_count: usize,
    pub total_comments: usize,
}
