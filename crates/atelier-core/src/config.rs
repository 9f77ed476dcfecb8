use chrono::Duration;

use crate::constants::{DEFAULT_CHANNEL_CAPACITY, EDIT_WINDOW_SECS};

/// Tunables for the sync engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How long after creation an author may still edit a comment.
    pub edit_window: Duration,
    /// Whether editing exactly at the window boundary is allowed
    /// (`elapsed <= window` when true, `elapsed < window` when false).
    pub inclusive_boundary: bool,
    /// Buffer size for change-notification channels.
    pub channel_capacity: usize,
}

impl SyncConfig {
    pub fn new(edit_window: Duration, inclusive_boundary: bool) -> Self {
        Self {
            edit_window,
            inclusive_boundary,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(Duration::seconds(EDIT_WINDOW_SECS), true)
    }
}
