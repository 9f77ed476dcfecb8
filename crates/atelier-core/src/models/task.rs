use serde::{Deserialize, Serialize};

/// Projection of the external work item that owns a discussion thread.
/// Task CRUD itself lives outside this subsystem; the feed only needs
/// identity, membership, and the labels shown next to a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRef {
    pub id: String,
    pub title: String,
    pub assigned_user_id: Option<String>,
    pub created_by_user_id: String,
    /// Display label, e.g. "In Review".
    pub status_label: Option<String>,
    /// Accent color hex used by the board, e.g. "#7c5cff".
    pub color: Option<String>,
}

impl TaskRef {
    /// Whether the user is this task's assignee or creator.
    pub fn involves_user(&self, user_id: &str) -> bool {
        self.created_by_user_id == user_id || self.assigned_user_id.as_deref() == Some(user_id)
    }
}
