//! Shared error and domain types for the Harbor offline cache
//!
//! Every other crate in the workspace builds on the types defined here:
//! - [`Record`]: a cached domain entity and its sync flag
//! - [`PendingOperation`]: a queued mutation waiting to reach the remote
//! - [`AppError`]: the local error taxonomy with severity and recovery hints

pub mod error;
pub mod types;

pub use error::{AppError, ErrorSeverity, RecoveryAction, Result};
pub use types::{Action, PendingOperation, Record, RecordId, SyncStats, Timestamp};
