pub mod feed;
pub mod thread_sync;

pub use feed::ConversationFeed;
pub use thread_sync::{ThreadPhase, ThreadSync};
