// crates/sync-engine/src/lib.rs
//! Offline-first sync engine
//!
//! Ties the local store to the remote:
//! - Local writes are durable at once and queued for the remote
//! - Queued operations drain in order when online, after writes, on reconnect
//!   and on demand
//! - Remote failures stay queued and are reported, never lost
//!
//! # Example
//!
//! ```rust,no_run
//! use harbor_core::{Action, RecordId};
//! use harbor_network::{
//!     Connectivity, ConnectivityMonitor, Gateway, HttpClient, HttpResourceApi, ClientConfig,
//!     StaticCredentials,
//! };
//! use harbor_store::LocalStore;
//! use harbor_sync_engine::{OfflineCache, SyncConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = LocalStore::open_in_memory().await?;
//! let client = Arc::new(HttpClient::with_config(ClientConfig::new("https://api.example.com"))?);
//! let api = Arc::new(HttpResourceApi::new(Gateway::new(
//!     client,
//!     Arc::new(StaticCredentials::none()),
//! )));
//! let monitor = ConnectivityMonitor::new(Connectivity::Offline);
//!
//! let cache = OfflineCache::new(store, api, monitor, SyncConfig::default());
//! let id = RecordId::from_string("reg-1")?;
//! cache.submit(&id, Action::Create, serde_json::json!({"seats": 2})).await?;
//! # Ok(())
//! # }
//! ```

mod engine;
mod error;
mod orchestrator;
mod types;

pub use engine::{OfflineCache, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use orchestrator::{DrainOptions, SyncOrchestrator};
pub use types::{
    OperationFailure, OperationOutcome, SyncEvent, SyncState, SyncStatus, SyncSummary,
    TriggerOutcome,
};
