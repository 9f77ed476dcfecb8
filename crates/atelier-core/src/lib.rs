//! Realtime comment synchronization engine for the atelier task dashboard.
//!
//! Keeps per-thread comment lists consistent under optimistic local writes,
//! an asynchronous push channel of change notifications, an authority-enforced
//! edit window, and cross-thread unread aggregation for the activity feed.

pub mod backend;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod policy;
pub mod store;
pub mod sync;
pub mod tracing_setup;

pub use backend::{ChannelSignal, ChannelStatus, CommentBackend, MemoryBackend, NewComment};
pub use config::SyncConfig;
pub use error::{BackendError, ChangeParseError, LoadError, WriteError};
pub use models::{
    AuthorDisplay, ChangeEvent, Comment, CommentRow, ConversationSummary, LocalUser, ReadMarker,
    TaskRef,
};
pub use policy::EditWindowPolicy;
pub use store::{CommentStore, ReadLedger, WriteState};
pub use sync::{ConversationFeed, ThreadPhase, ThreadSync};
