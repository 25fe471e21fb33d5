// crates/sync-engine/src/types.rs
//! Drain outcomes, summaries, events and status

use chrono::{DateTime, Utc};
use harbor_core::{Action, RecordId};
use harbor_network::GatewayError;
use serde::{Deserialize, Serialize};

/// What happened to one queued operation during a drain
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome {
    /// The remote accepted it; entry removed and record marked synced
    Synced,
    /// The remote accepted it, but a newer local write replaced the entry
    /// meanwhile; the newer entry stays queued
    Superseded,
    /// Failed after the gateway's retries; stays queued for a later drain
    RetryableFailure(GatewayError),
    /// Rejected; stays queued and surfaced, not retried in this drain
    PermanentFailure(GatewayError),
}

impl OperationOutcome {
    /// Classifies a gateway error
    pub fn from_error(err: GatewayError) -> Self {
        if err.is_retryable() {
            OperationOutcome::RetryableFailure(err)
        } else {
            OperationOutcome::PermanentFailure(err)
        }
    }

    /// Returns the failure, if this outcome is one
    pub fn error(&self) -> Option<&GatewayError> {
        match self {
            OperationOutcome::RetryableFailure(e) | OperationOutcome::PermanentFailure(e) => {
                Some(e)
            }
            _ => None,
        }
    }
}

/// A failed operation as reported in a [`SyncSummary`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationFailure {
    /// Target record
    pub id: RecordId,
    /// Operation kind
    pub action: Action,
    /// Failure message
    pub error: String,
    /// Whether a later drain may succeed without intervention
    pub retryable: bool,
}

/// Result of one or more drain passes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    /// Operations sent to the remote
    pub attempted: usize,
    /// Operations completed and removed
    pub succeeded: usize,
    /// Operations that failed and stay queued
    pub failed: usize,
    /// Operations accepted remotely but replaced locally in the meantime
    pub superseded: usize,
    /// Queue length once the drain finished
    pub remaining: usize,
    /// Set when the remote rejected the credential
    pub reauth_required: bool,
    /// Details of every failure
    pub failures: Vec<OperationFailure>,
}

impl SyncSummary {
    /// Returns true when every attempted operation went through
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    /// Folds a follow-up pass into this summary
    pub fn absorb(&mut self, next: SyncSummary) {
        self.attempted += next.attempted;
        self.succeeded += next.succeeded;
        self.failed += next.failed;
        self.superseded += next.superseded;
        self.remaining = next.remaining;
        self.reauth_required |= next.reauth_required;
        self.failures.extend(next.failures);
    }
}

/// Result of asking for a drain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A drain ran (plus any follow-up requested while it ran)
    Completed(SyncSummary),
    /// Offline; nothing was attempted
    Offline,
    /// A drain was already running; it will run once more when done
    Scheduled,
}

impl TriggerOutcome {
    /// Returns the summary if a drain ran
    pub fn summary(&self) -> Option<&SyncSummary> {
        match self {
            TriggerOutcome::Completed(summary) => Some(summary),
            _ => None,
        }
    }
}

/// Progress notifications broadcast by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A drain pass started with this many queued operations
    DrainStarted { queued: usize },
    /// An operation reached the remote and was removed
    OperationSynced { id: RecordId, action: Action },
    /// An operation failed and stays queued
    OperationFailed(OperationFailure),
    /// The remote rejected the credential; the host should renew it
    ReauthenticationRequired,
    /// A drain pass finished
    DrainCompleted(SyncSummary),
}

/// Coarse sync state for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    /// Nothing queued
    UpToDate,
    /// Changes are queued and the device is offline
    SavedOffline,
    /// A drain is running
    Syncing,
    /// Online, but changes are still queued after a drain
    RetryPending,
}

impl SyncStatus {
    /// Short message suitable for a status line
    pub fn message(&self) -> &'static str {
        match self {
            SyncStatus::UpToDate => "All changes synced",
            SyncStatus::SavedOffline => "Saved offline, will sync when connected",
            SyncStatus::Syncing => "Syncing…",
            SyncStatus::RetryPending => "Sync error, will retry",
        }
    }
}

/// Bookkeeping of the drain loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    /// A drain is running
    pub in_progress: bool,
    /// A trigger arrived mid-drain; one more pass is owed
    pub rerun_requested: bool,
    /// When the last drain finished
    pub last_sync: Option<DateTime<Utc>>,
    /// Summary of the last drain pass
    pub last_summary: Option<SyncSummary>,
}
