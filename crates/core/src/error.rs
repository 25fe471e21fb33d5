//! Error types and recovery strategies for Harbor
//!
//! Local errors fall into three severity tiers:
//! - **Recoverable**: can be retried (database briefly locked)
//! - **Degraded**: the operation failed but the cache keeps working (record missing)
//! - **Fatal**: the durable medium is unusable (corrupted file, failed migration)
//!
//! Remote failures are not represented here. They never reach the caller of a
//! local write; see the gateway error type in `harbor-network`.

use std::fmt;
use thiserror::Error;

/// Recovery actions that can be taken when an error occurs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Retry the operation immediately
    RetryImmediate,
    /// Retry with exponential backoff
    RetryWithBackoff,
    /// Attempt to repair the database and retry
    RepairDatabase,
    /// Reopen the store from scratch
    ResetStore,
    /// No automatic recovery - user intervention required
    UserIntervention,
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetryImmediate => write!(f, "Retrying immediately"),
            Self::RetryWithBackoff => write!(f, "Retrying with backoff"),
            Self::RepairDatabase => write!(f, "Repairing database"),
            Self::ResetStore => write!(f, "Resetting local store"),
            Self::UserIntervention => write!(f, "User intervention required"),
        }
    }
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Error can be automatically recovered from
    Recoverable,
    /// Operation failed but the cache can continue
    Degraded,
    /// Critical error, the local store cannot be trusted
    Fatal,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recoverable => write!(f, "Recoverable"),
            Self::Degraded => write!(f, "Degraded"),
            Self::Fatal => write!(f, "Fatal"),
        }
    }
}

/// Main error type for local cache operations
#[derive(Error, Debug)]
pub enum AppError {
    // ===== Storage Errors =====
    /// The durable medium rejected or failed an operation
    #[error("Storage fault: {message}")]
    StorageFault {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database is corrupted and needs repair
    #[error("Storage corrupted: {details}")]
    StorageCorrupted { details: String },

    /// Database migration failed
    #[error("Migration failed: {version} - {reason}")]
    MigrationFailed { version: String, reason: String },

    /// Database is locked by another process
    #[error("Storage locked: {operation}")]
    StorageLocked { operation: String },

    /// Record not found in the store
    #[error("Record not found: {entity} with {identifier}")]
    RecordNotFound { entity: String, identifier: String },

    // ===== Data Errors =====
    /// A stored or submitted payload could not be (de)serialized
    #[error("Invalid payload for {identifier}: {reason}")]
    InvalidPayload { identifier: String, reason: String },

    /// Invalid argument provided
    #[error("Invalid argument: {argument} - {reason}")]
    InvalidArgument { argument: String, reason: String },

    // ===== Generic Errors =====
    /// Generic internal error
    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl AppError {
    /// Returns the severity level of this error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::StorageLocked { .. } => ErrorSeverity::Recoverable,

            Self::RecordNotFound { .. }
            | Self::InvalidArgument { .. }
            | Self::InvalidPayload { .. } => ErrorSeverity::Degraded,

            Self::StorageFault { .. }
            | Self::StorageCorrupted { .. }
            | Self::MigrationFailed { .. }
            | Self::InternalError { .. } => ErrorSeverity::Fatal,
        }
    }

    /// Returns the recommended recovery action for this error
    pub fn recovery_action(&self) -> RecoveryAction {
        match self {
            Self::StorageLocked { .. } => RecoveryAction::RetryWithBackoff,
            Self::StorageCorrupted { .. } => RecoveryAction::RepairDatabase,
            Self::MigrationFailed { .. } => RecoveryAction::ResetStore,
            _ => RecoveryAction::UserIntervention,
        }
    }

    /// Returns a user-friendly error message suitable for display in the UI
    pub fn user_message(&self) -> String {
        match self {
            Self::StorageFault { .. } => {
                "Your changes could not be saved on this device. Please try again.".to_string()
            }
            Self::StorageCorrupted { .. } => {
                "The offline data on this device is damaged and needs repair.".to_string()
            }
            Self::MigrationFailed { .. } => {
                "Failed to update the offline data format.".to_string()
            }
            Self::StorageLocked { .. } => {
                "Offline data is busy. Please try again in a moment.".to_string()
            }
            Self::RecordNotFound { .. } => "The requested item was not found.".to_string(),
            Self::InvalidPayload { .. } => "The saved item could not be read.".to_string(),
            Self::InvalidArgument { .. } => "Invalid input provided.".to_string(),
            Self::InternalError { .. } => {
                "An unexpected error occurred. Please try again.".to_string()
            }
        }
    }

    /// Returns true if this error should be logged at ERROR level
    pub fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Fatal
    }

    /// Returns true if this error can be automatically retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.recovery_action(),
            RecoveryAction::RetryImmediate | RecoveryAction::RetryWithBackoff
        )
    }

    /// Returns true if the error means the record simply does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound { .. })
    }

    /// Helper to create a storage fault from any error type
    pub fn storage<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::StorageFault {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Helper to create a not-found error for a record identifier
    pub fn record_not_found(identifier: impl Into<String>) -> Self {
        Self::RecordNotFound {
            entity: "Record".to_string(),
            identifier: identifier.into(),
        }
    }

    /// Helper to create an invalid payload error
    pub fn invalid_payload(identifier: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::InvalidPayload {
            identifier: identifier.into(),
            reason: reason.to_string(),
        }
    }
}

/// Convenience type alias for Results using AppError
pub type Result<T> = std::result::Result<T, AppError>;
