//! Harbor local storage layer
//!
//! Durable SQLite-backed storage for the offline cache, built on sqlx:
//! - [`RecordStore`]: the cached domain records and their sync flags
//! - [`PendingLog`]: the queue of mutations waiting for the remote
//! - [`LocalStore`]: atomic writes spanning both tables
//!
//! All writes go through one async write lock, so a queued entry is never
//! replaced and removed at the same time.

pub mod connection;
pub mod local;
pub mod migrations;
pub mod pending_log;
pub mod queries;
pub mod record_store;

pub use connection::{connect, connect_in_memory, DbPool, StoreConfig};
pub use local::LocalStore;
pub use migrations::{current_version, optimize, run_migrations, verify_integrity};
pub use pending_log::PendingLog;
pub use record_store::RecordStore;

/// Lock serialising write transactions across store handles
pub(crate) type WriteLock = std::sync::Arc<tokio::sync::Mutex<()>>;
