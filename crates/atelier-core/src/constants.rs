//! Application-wide constants
//!
//! Centralized location for magic values that are used across
//! multiple modules.

/// Edit window length in seconds - an author may modify their own comment
/// this long after posting it.
pub const EDIT_WINDOW_SECS: i64 = 15 * 60; // 15 minutes

/// Default buffer size for change-notification channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Display name used when an author's profile cannot be resolved.
pub const UNKNOWN_AUTHOR_NAME: &str = "Unknown";

/// Prefix for locally-generated temporary comment ids.
/// Backend-assigned ids never carry this prefix, so the two can never collide.
pub const TEMP_ID_PREFIX: &str = "local-";
