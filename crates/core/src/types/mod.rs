//! Domain types shared across the cache, the queue and the sync engine

mod id;
mod operation;
mod record;
mod stats;
mod timestamp;

pub use id::RecordId;
pub use operation::{Action, PendingOperation};
pub use record::Record;
pub use stats::SyncStats;
pub use timestamp::Timestamp;
