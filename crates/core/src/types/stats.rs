//! Cache statistics

use serde::{Deserialize, Serialize};

/// Snapshot of the local cache's sync state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Records held locally
    pub total: usize,
    /// Records whose latest write reached the remote
    pub synced: usize,
    /// Records with local changes not yet confirmed
    pub unsynced: usize,
    /// Queued operations, including deletes of records no longer held
    pub pending: usize,
}

impl SyncStats {
    /// Returns true when nothing is waiting to be synced
    pub fn is_settled(&self) -> bool {
        self.pending == 0
    }
}
