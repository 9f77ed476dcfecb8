use serde::{Deserialize, Serialize};

use crate::constants::UNKNOWN_AUTHOR_NAME;

/// Display metadata for a comment author (name, optional avatar).
/// Resolved lazily for authors other than the local user and cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorDisplay {
    pub name: String,
    pub avatar_url: Option<String>,
}

impl AuthorDisplay {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            avatar_url: None,
        }
    }

    pub fn with_avatar(name: impl Into<String>, avatar_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            avatar_url: Some(avatar_url.into()),
        }
    }

    /// Placeholder used when a profile lookup fails.
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_AUTHOR_NAME)
    }
}

/// The logged-in viewer on whose behalf this client reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalUser {
    pub id: String,
    pub display: AuthorDisplay,
    /// Admins may delete comments they did not author.
    pub is_admin: bool,
}

impl LocalUser {
    pub fn new(id: impl Into<String>, display: AuthorDisplay) -> Self {
        Self {
            id: id.into(),
            display,
            is_admin: false,
        }
    }

    pub fn admin(id: impl Into<String>, display: AuthorDisplay) -> Self {
        Self {
            is_admin: true,
            ..Self::new(id, display)
        }
    }
}
