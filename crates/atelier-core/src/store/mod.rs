pub mod comment_store;
pub mod read_ledger;

pub use comment_store::{CommentStore, PendingWrite, StoreSnapshot, WriteState};
pub use read_ledger::ReadLedger;
