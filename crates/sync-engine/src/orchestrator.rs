// crates/sync-engine/src/orchestrator.rs
//! Sync orchestrator: drains the pending log against the remote

use crate::error::SyncResult;
use crate::types::{
    OperationFailure, OperationOutcome, SyncEvent, SyncState, SyncSummary, TriggerOutcome,
};
use harbor_core::{Action, PendingOperation, RecordId};
use harbor_network::{ConnectivityMonitor, GatewayError, ResourceApi};
use harbor_store::LocalStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, watch};

/// Capacity of the sync event channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Entries rejected permanently during one trigger, by id and version
///
/// Follow-up passes of the same trigger skip them unless a newer local
/// write replaced the entry.
type Rejected = HashMap<RecordId, i64>;

/// Drain behaviour switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainOptions {
    /// Send queued creates together through the batch endpoint
    pub batch_creates: bool,
}

/// Sole remover of pending entries
///
/// One drain runs at a time. A trigger that arrives while a drain is running
/// is folded into a single follow-up pass started right after it.
pub struct SyncOrchestrator {
    store: LocalStore,
    api: Arc<dyn ResourceApi>,
    connectivity: Arc<ConnectivityMonitor>,
    options: DrainOptions,
    state: Mutex<SyncState>,
    events: broadcast::Sender<SyncEvent>,
    pending_count: watch::Sender<usize>,
}

impl SyncOrchestrator {
    /// Creates an orchestrator
    pub fn new(
        store: LocalStore,
        api: Arc<dyn ResourceApi>,
        connectivity: Arc<ConnectivityMonitor>,
        options: DrainOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (pending_count, _) = watch::channel(0);

        Self {
            store,
            api,
            connectivity,
            options,
            state: Mutex::new(SyncState::default()),
            events,
            pending_count,
        }
    }

    /// Subscribes to drain progress
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Watches the number of queued operations
    pub fn watch_pending(&self) -> watch::Receiver<usize> {
        self.pending_count.subscribe()
    }

    /// Re-reads the queue length and publishes it
    pub async fn refresh_pending_count(&self) -> SyncResult<usize> {
        let count = self.store.pending().count().await?;
        self.pending_count.send_replace(count);
        Ok(count)
    }

    /// Returns a copy of the drain bookkeeping
    pub fn state(&self) -> SyncState {
        self.lock_state().clone()
    }

    /// Returns true while a drain is running
    pub fn is_draining(&self) -> bool {
        self.lock_state().in_progress
    }

    /// Drains the queue unless offline or already draining
    ///
    /// Remote failures are reported in the summary; only local storage
    /// faults make this return an error.
    pub async fn trigger(&self) -> SyncResult<TriggerOutcome> {
        if !self.connectivity.is_online() {
            log::debug!("Offline; deferring sync");
            return Ok(TriggerOutcome::Offline);
        }

        let mut guard = {
            let mut state = self.lock_state();
            if state.in_progress {
                state.rerun_requested = true;
                log::debug!("Drain in progress; scheduling one follow-up");
                return Ok(TriggerOutcome::Scheduled);
            }
            state.in_progress = true;
            state.rerun_requested = false;
            DrainGuard {
                orchestrator: self,
                armed: true,
            }
        };

        let mut rejected = Rejected::new();
        let mut summary = self.drain_once(&mut rejected).await?;
        while guard.take_rerun() {
            if !self.connectivity.is_online() {
                guard.release();
                break;
            }
            summary.absorb(self.drain_once(&mut rejected).await?);
        }

        Ok(TriggerOutcome::Completed(summary))
    }

    async fn drain_once(&self, rejected: &mut Rejected) -> SyncResult<SyncSummary> {
        let snapshot: Vec<PendingOperation> = self
            .store
            .pending()
            .list_pending()
            .await?
            .into_iter()
            .filter(|op| rejected.get(&op.id) != Some(&op.version))
            .collect();
        let _ = self.events.send(SyncEvent::DrainStarted {
            queued: snapshot.len(),
        });
        log::debug!("Draining {} queued operations", snapshot.len());

        let mut summary = SyncSummary::default();

        let (creates, singles): (Vec<_>, Vec<_>) = if self.options.batch_creates {
            snapshot
                .into_iter()
                .partition(|op| op.action == Action::Create)
        } else {
            (Vec::new(), snapshot)
        };

        if !creates.is_empty() {
            self.push_creates(&creates, &mut summary, rejected).await?;
        }

        for op in &singles {
            summary.attempted += 1;
            let outcome = self.sync_one(op).await?;
            self.apply_outcome(op, outcome, &mut summary, rejected).await?;
        }

        summary.remaining = self.refresh_pending_count().await?;

        {
            let mut state = self.lock_state();
            state.last_sync = Some(chrono::Utc::now());
            state.last_summary = Some(summary.clone());
        }

        log::info!(
            "Drain finished: {} attempted, {} synced, {} failed, {} superseded, {} remaining",
            summary.attempted,
            summary.succeeded,
            summary.failed,
            summary.superseded,
            summary.remaining
        );
        let _ = self.events.send(SyncEvent::DrainCompleted(summary.clone()));

        Ok(summary)
    }

    /// Sends one operation and settles it locally
    async fn sync_one(&self, op: &PendingOperation) -> SyncResult<OperationOutcome> {
        log::debug!("Sending {} for {} (v{})", op.action, op.id, op.version);

        let result = match op.action {
            Action::Create => self.api.create(&op.id, &op.payload).await.map(|_| ()),
            Action::Update => self.api.update(&op.id, &op.payload).await.map(|_| ()),
            Action::Delete => self.api.delete(&op.id).await,
        };

        match result {
            Ok(()) => self.settle(op).await,
            Err(e) => Ok(OperationOutcome::from_error(e)),
        }
    }

    async fn push_creates(
        &self,
        creates: &[PendingOperation],
        summary: &mut SyncSummary,
        rejected: &mut Rejected,
    ) -> SyncResult<()> {
        let items: Vec<(RecordId, serde_json::Value)> = creates
            .iter()
            .map(|op| (op.id.clone(), op.payload.clone()))
            .collect();
        log::debug!("Sending {} creates as one batch", items.len());

        let response = self.api.push_batch(&items).await;
        summary.attempted += creates.len();

        for op in creates {
            let outcome = match &response {
                Ok(batch) => match batch.error_for(op.id.as_str()) {
                    Some(item) => OperationOutcome::PermanentFailure(GatewayError::ClientError {
                        status: 200,
                        message: item.error.clone(),
                    }),
                    None => self.settle(op).await?,
                },
                Err(e) => OperationOutcome::from_error(e.clone()),
            };
            self.apply_outcome(op, outcome, summary, rejected).await?;
        }

        Ok(())
    }

    /// Removes a remotely accepted entry unless a newer write replaced it
    async fn settle(&self, op: &PendingOperation) -> SyncResult<OperationOutcome> {
        if self.store.complete(op).await? {
            Ok(OperationOutcome::Synced)
        } else {
            Ok(OperationOutcome::Superseded)
        }
    }

    async fn apply_outcome(
        &self,
        op: &PendingOperation,
        outcome: OperationOutcome,
        summary: &mut SyncSummary,
        rejected: &mut Rejected,
    ) -> SyncResult<()> {
        match outcome {
            OperationOutcome::Synced => {
                summary.succeeded += 1;
                let _ = self.events.send(SyncEvent::OperationSynced {
                    id: op.id.clone(),
                    action: op.action,
                });
            }
            OperationOutcome::Superseded => {
                summary.superseded += 1;
                log::debug!("{} changed while in flight; newer edit stays queued", op.id);
            }
            OperationOutcome::RetryableFailure(e) | OperationOutcome::PermanentFailure(e) => {
                let retryable = e.is_retryable();
                log::warn!(
                    "{} of {} failed ({}): {}",
                    op.action,
                    op.id,
                    if retryable { "will retry" } else { "rejected" },
                    e
                );

                self.store.pending().record_failure(&op.id, &e.to_string()).await?;
                if !retryable {
                    rejected.insert(op.id.clone(), op.version);
                }

                let failure = OperationFailure {
                    id: op.id.clone(),
                    action: op.action,
                    error: e.to_string(),
                    retryable,
                };
                summary.failed += 1;
                summary.failures.push(failure.clone());
                let _ = self.events.send(SyncEvent::OperationFailed(failure));

                if e.requires_reauthentication() && !summary.reauth_required {
                    summary.reauth_required = true;
                    log::warn!("Remote rejected credentials; re-authentication required");
                    let _ = self.events.send(SyncEvent::ReauthenticationRequired);
                }
            }
        }
        Ok(())
    }

    fn lock_state(&self) -> MutexGuard<'_, SyncState> {
        // The state is plain data; a panic elsewhere cannot leave it torn
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Clears the in-progress flag however the drain ends
struct DrainGuard<'a> {
    orchestrator: &'a SyncOrchestrator,
    armed: bool,
}

impl DrainGuard<'_> {
    /// Consumes a pending follow-up request, or releases the drain flag when
    /// there is none. Checking and releasing happen under one lock so a
    /// trigger cannot slip in between.
    fn take_rerun(&mut self) -> bool {
        let mut state = self.orchestrator.lock_state();
        if state.rerun_requested {
            state.rerun_requested = false;
            true
        } else {
            state.in_progress = false;
            self.armed = false;
            false
        }
    }

    fn release(&mut self) {
        if self.armed {
            let mut state = self.orchestrator.lock_state();
            state.in_progress = false;
            state.rerun_requested = false;
            self.armed = false;
        }
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
