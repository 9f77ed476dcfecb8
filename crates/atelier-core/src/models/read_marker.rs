use serde::{Deserialize, Serialize};

/// One "userId has seen commentId" fact. Insert-only: markers are never
/// mutated or deleted, and upserting a duplicate is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReadMarker {
    pub user_id: String,
    pub comment_id: String,
}

impl ReadMarker {
    pub fn new(user_id: impl Into<String>, comment_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            comment_id: comment_id.into(),
        }
    }
}
