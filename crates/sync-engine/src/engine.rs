// crates/sync-engine/src/engine.rs
//! Application-facing offline cache

use crate::error::{SyncError, SyncResult};
use crate::orchestrator::{DrainOptions, SyncOrchestrator};
use crate::types::{SyncEvent, SyncStatus, TriggerOutcome};
use harbor_core::{Action, PendingOperation, Record, RecordId, SyncStats};
use harbor_network::{ConnectivityEvent, ConnectivityMonitor, ResourceApi};
use harbor_store::LocalStore;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Configuration for the offline cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Start a drain after every local write made while online
    pub auto_sync_on_write: bool,
    /// Push queued creates through the batch endpoint
    pub batch_creates: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync_on_write: true,
            batch_creates: false,
        }
    }
}

impl SyncConfig {
    /// Sets whether writes start a drain
    pub fn with_auto_sync(mut self, enabled: bool) -> Self {
        self.auto_sync_on_write = enabled;
        self
    }

    /// Sets whether creates go out as one batch
    pub fn with_batch_creates(mut self, enabled: bool) -> Self {
        self.batch_creates = enabled;
        self
    }
}

/// Local-first cache whose writes reach the remote eventually
///
/// Reads and writes only touch local storage and succeed offline. Queued
/// changes are drained after writes made online, whenever connectivity comes
/// back, and on [`OfflineCache::trigger_sync`]. Must be created inside a
/// tokio runtime.
pub struct OfflineCache {
    store: LocalStore,
    api: Arc<dyn ResourceApi>,
    connectivity: Arc<ConnectivityMonitor>,
    orchestrator: Arc<SyncOrchestrator>,
    config: SyncConfig,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl OfflineCache {
    /// Creates the cache and starts listening for reconnects
    pub fn new(
        store: LocalStore,
        api: Arc<dyn ResourceApi>,
        connectivity: Arc<ConnectivityMonitor>,
        config: SyncConfig,
    ) -> Self {
        let orchestrator = Arc::new(SyncOrchestrator::new(
            store.clone(),
            Arc::clone(&api),
            Arc::clone(&connectivity),
            DrainOptions {
                batch_creates: config.batch_creates,
            },
        ));

        let cache = Self {
            store,
            api,
            connectivity,
            orchestrator,
            config,
            tasks: Mutex::new(Vec::new()),
        };
        cache.spawn_reconnect_listener();
        cache
    }

    fn spawn_reconnect_listener(&self) {
        let mut events = self.connectivity.subscribe();
        let connectivity = Arc::clone(&self.connectivity);
        let orchestrator = Arc::clone(&self.orchestrator);

        let handle = tokio::spawn(async move {
            loop {
                let reconnected = match events.recv().await {
                    Ok(ConnectivityEvent::Reconnected) => true,
                    Ok(ConnectivityEvent::Disconnected) => false,
                    // Missed transitions; act on where we ended up
                    Err(broadcast::error::RecvError::Lagged(_)) => connectivity.is_online(),
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                if reconnected {
                    log::info!("Back online; draining pending operations");
                    if let Err(e) = orchestrator.trigger().await {
                        log::error!("Drain after reconnect failed: {}", e);
                    }
                }
            }
        });
        self.track(handle);
    }

    /// Writes locally and queues the change for the remote
    ///
    /// Returns once the write is durable. Remote failures never surface here.
    pub async fn submit(
        &self,
        id: &RecordId,
        action: Action,
        payload: serde_json::Value,
    ) -> SyncResult<PendingOperation> {
        let op = self.store.submit(id, action, payload).await?;
        self.orchestrator.refresh_pending_count().await?;

        if self.config.auto_sync_on_write && self.connectivity.is_online() {
            self.spawn_drain();
        }

        Ok(op)
    }

    /// Creates a record under a freshly generated id
    pub async fn submit_new(&self, payload: serde_json::Value) -> SyncResult<RecordId> {
        let id = RecordId::generate();
        self.submit(&id, Action::Create, payload).await?;
        Ok(id)
    }

    /// Returns the locally held record
    pub async fn query(&self, id: &RecordId) -> SyncResult<Option<Record>> {
        Ok(self.store.records().find(id).await?)
    }

    /// Returns every locally held record
    pub async fn query_all(&self) -> SyncResult<Vec<Record>> {
        Ok(self.store.records().get_all().await?)
    }

    /// Returns record and queue counts
    pub async fn get_sync_stats(&self) -> SyncResult<SyncStats> {
        Ok(self.store.stats().await?)
    }

    /// Lists queued operations in drain order
    pub async fn pending_operations(&self) -> SyncResult<Vec<PendingOperation>> {
        Ok(self.store.pending().list_pending().await?)
    }

    /// Coarse status for display
    pub async fn sync_status(&self) -> SyncResult<SyncStatus> {
        if self.orchestrator.is_draining() {
            return Ok(SyncStatus::Syncing);
        }
        let pending = self.store.pending().count().await?;

        Ok(if pending == 0 {
            SyncStatus::UpToDate
        } else if !self.connectivity.is_online() {
            SyncStatus::SavedOffline
        } else {
            SyncStatus::RetryPending
        })
    }

    /// Drains the queue now
    pub async fn trigger_sync(&self) -> SyncResult<TriggerOutcome> {
        self.orchestrator.trigger().await
    }

    /// Pulls the remote copy of a record into the cache
    ///
    /// The remote copy is stored as synced unless a local change for the id is
    /// still queued, in which case the local version is kept. Returns `None`
    /// when the remote does not know the id.
    pub async fn refresh(&self, id: &RecordId) -> SyncResult<Option<Record>> {
        if !self.connectivity.is_online() {
            return Err(SyncError::Offline);
        }

        let Some(remote) = self.api.fetch(id).await? else {
            log::debug!("Remote has no record {}", id);
            return Ok(None);
        };

        if !self.store.cache_remote(id, remote).await? {
            log::debug!("Kept local copy of {}; a change is still queued", id);
        }
        self.query(id).await
    }

    /// Empties the cache and the queue
    pub async fn clear(&self) -> SyncResult<()> {
        self.store.clear().await?;
        self.orchestrator.refresh_pending_count().await?;
        log::info!("Local cache cleared");
        Ok(())
    }

    /// Watches the number of queued operations
    pub fn pending_count(&self) -> watch::Receiver<usize> {
        self.orchestrator.watch_pending()
    }

    /// Subscribes to drain progress
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.orchestrator.subscribe()
    }

    /// The connectivity monitor this cache reacts to
    pub fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
        &self.connectivity
    }

    /// The underlying store
    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Stops background tasks; queued operations stay on disk
    pub fn shutdown(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
    }

    fn spawn_drain(&self) {
        let orchestrator = Arc::clone(&self.orchestrator);
        let handle = tokio::spawn(async move {
            if let Err(e) = orchestrator.trigger().await {
                log::error!("Drain after write failed: {}", e);
            }
        });
        self.track(handle);
    }

    fn track(&self, handle: JoinHandle<()>) {
        match self.tasks.lock() {
            Ok(mut tasks) => {
                tasks.retain(|task| !task.is_finished());
                tasks.push(handle);
            }
            Err(_) => handle.abort(),
        }
    }
}

impl Drop for OfflineCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}
