use thiserror::Error;

/// Failures raised by collaborator backends.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend could not be reached or answered with a transient fault.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The authority refused the operation. For edits this is how the
    /// server-side edit-window check surfaces; it must not be retried.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// An initial or reload fetch failed. Prior in-memory state is preserved
/// untouched; callers log and may retry.
#[derive(Debug, Error)]
#[error("load failed: {source}")]
pub struct LoadError {
    #[from]
    pub source: BackendError,
}

/// A write round-trip failed. The optimistic mutation has already been rolled
/// back to the exact pre-call snapshot by the time this is returned.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The edit window has elapsed (locally pre-checked or authority-rejected).
    /// Terminal: present "can no longer be edited", do not retry.
    #[error("comment can no longer be edited")]
    EditWindowExpired,

    /// Caller is neither the comment author nor an admin.
    #[error("not the comment author")]
    NotCommentAuthor,

    /// The target comment is not addressable in this store.
    #[error("unknown comment id: {0}")]
    UnknownComment(String),

    /// Transient backend failure; safe to retry.
    #[error("write failed: {0}")]
    Transient(BackendError),
}

/// A push-channel payload did not parse into a known change shape.
/// Malformed payloads are logged and dropped, never applied.
#[derive(Debug, Error)]
#[error("malformed change payload: {0}")]
pub struct ChangeParseError(#[from] pub serde_json::Error);
