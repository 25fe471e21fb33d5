// crates/sync-engine/src/error.rs
//! Error types for sync operations

use harbor_core::AppError;
use harbor_network::GatewayError;
use thiserror::Error;

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in the sync engine
///
/// Remote failures of queued operations never show up here; they are
/// reported through drain summaries and events. Only local storage faults
/// and direct remote calls (like a refresh) produce a `SyncError`.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local storage failed
    #[error("Storage error: {0}")]
    Storage(#[from] AppError),

    /// A direct remote call failed
    #[error("Remote error: {0}")]
    Gateway(#[from] GatewayError),

    /// The operation needs the remote and the device is offline
    #[error("Remote service is unreachable")]
    Offline,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Custom error
    #[error("{0}")]
    Custom(String),
}

impl SyncError {
    /// Returns true if the local store itself is unusable
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Storage(e) if e.is_critical())
    }
}
