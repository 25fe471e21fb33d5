//! Cached domain records

use super::{RecordId, Timestamp};
use serde::{Deserialize, Serialize};

/// A domain entity held in the local store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Record identifier
    pub id: RecordId,
    /// Opaque domain data
    pub payload: serde_json::Value,
    /// Whether the latest local write has reached the remote
    pub synced: bool,
    /// When the record was last written locally
    pub last_written_at: Timestamp,
}

impl Record {
    /// Creates a new unsynced record stamped with the current time
    pub fn new(id: RecordId, payload: serde_json::Value) -> Self {
        Self {
            id,
            payload,
            synced: false,
            last_written_at: Timestamp::now(),
        }
    }
}
