//! Sync behaviour configuration section

use crate::validation::{ConfigSection, ValidationError};
use serde::{Deserialize, Serialize};

/// When and how queued changes are pushed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncSettings {
    /// Drain the queue after each write made while online
    pub auto_sync_on_write: bool,

    /// Send queued creates through the batch endpoint
    pub batch_creates: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            auto_sync_on_write: true,
            batch_creates: false,
        }
    }
}

impl ConfigSection for SyncSettings {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        Ok(())
    }

    fn merge(&mut self, other: Self) {
        *self = other;
    }

    fn section_name(&self) -> &'static str {
        "sync"
    }
}
