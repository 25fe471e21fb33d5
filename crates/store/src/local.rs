//! Atomic local store over the records and pending tables
//!
//! Application writes land here: the record change and its queued mutation
//! are committed in one transaction, so a crash can never leave a record
//! without its pending operation (or the reverse).

use crate::connection::{self, DbPool, StoreConfig};
use crate::migrations;
use crate::pending_log::{self, PendingLog};
use crate::queries::{pending, records};
use crate::record_store::RecordStore;
use crate::WriteLock;
use harbor_core::{Action, AppError, PendingOperation, Record, RecordId, SyncStats};
use sqlx::{Sqlite, Transaction};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handle to the durable cache
///
/// Cloning is cheap; clones share the pool and the write lock.
#[derive(Debug, Clone)]
pub struct LocalStore {
    pool: DbPool,
    write_lock: WriteLock,
}

impl LocalStore {
    /// Opens (creating if needed) the database described by `config` and
    /// brings its schema up to date
    pub async fn open(config: StoreConfig) -> Result<Self, AppError> {
        let pool = connection::connect(config).await?;
        Self::from_pool(pool).await
    }

    /// Opens a throwaway in-memory store
    pub async fn open_in_memory() -> Result<Self, AppError> {
        let pool = connection::connect_in_memory().await?;
        Self::from_pool(pool).await
    }

    /// Wraps an existing pool, running migrations first
    pub async fn from_pool(pool: DbPool) -> Result<Self, AppError> {
        migrations::run_migrations(&pool).await?;
        Ok(Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Record Store view sharing this store's write lock
    pub fn records(&self) -> RecordStore {
        RecordStore::new(self.pool.clone(), Arc::clone(&self.write_lock))
    }

    /// Pending Operation Log view sharing this store's write lock
    pub fn pending(&self) -> PendingLog {
        PendingLog::new(self.pool.clone(), Arc::clone(&self.write_lock))
    }

    /// Applies a local write and queues it for the remote in one transaction
    ///
    /// Create and update upsert the record as unsynced; delete removes it.
    /// Returns the pending entry as it stands after coalescing.
    pub async fn submit(
        &self,
        id: &RecordId,
        action: Action,
        payload: serde_json::Value,
    ) -> Result<PendingOperation, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.begin().await?;

        match action {
            Action::Delete => {
                records::delete_record(&mut *tx, id).await?;
            }
            Action::Create | Action::Update => {
                let record = Record::new(id.clone(), payload.clone());
                records::upsert_record(&mut *tx, &record).await?;
            }
        }

        let op = pending_log::enqueue_in(&mut *tx, id, action, &payload).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::storage("Failed to commit local write", e))?;
        Ok(op)
    }

    /// Finishes a successfully synced operation
    ///
    /// The entry is removed and its record marked synced only if the entry
    /// still carries the version that was sent. Returns false when a newer
    /// local write superseded it in the meantime. A superseded create that
    /// the remote accepted leaves the newer edit queued as an update, since
    /// the entity now exists remotely.
    pub async fn complete(&self, op: &PendingOperation) -> Result<bool, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.begin().await?;

        let removed = pending::delete_pending_if_version(&mut *tx, &op.id, op.version).await?;
        if removed && !op.is_delete() {
            records::mark_record_synced(&mut *tx, &op.id).await?;
        } else if !removed && op.action == Action::Create {
            pending::demote_create_to_update(&mut *tx, &op.id).await?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::storage("Failed to commit sync completion", e))?;
        Ok(removed)
    }

    /// Stores a copy fetched from the remote as synced
    ///
    /// Skipped (returning false) while a local change to the same id is still
    /// queued, so unsent edits are never overwritten.
    pub async fn cache_remote(
        &self,
        id: &RecordId,
        payload: serde_json::Value,
    ) -> Result<bool, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.begin().await?;

        if pending::find_pending(&mut *tx, id).await?.is_some() {
            return Ok(false);
        }

        let mut record = Record::new(id.clone(), payload);
        record.synced = true;
        records::upsert_record(&mut *tx, &record).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::storage("Failed to commit remote copy", e))?;
        Ok(true)
    }

    /// Counts records by sync state along with queued operations
    pub async fn stats(&self) -> Result<SyncStats, AppError> {
        let (total, synced) = records::count_records(&self.pool).await?;
        let queued = pending::count_pending(&self.pool).await?;

        let to_usize = |n: i64| usize::try_from(n).unwrap_or(0);
        Ok(SyncStats {
            total: to_usize(total),
            synced: to_usize(synced),
            unsynced: to_usize(total - synced),
            pending: to_usize(queued),
        })
    }

    /// Empties both records and the pending log
    pub async fn clear(&self) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.begin().await?;

        let dropped_records = records::clear_records(&mut *tx).await?;
        let dropped_ops = pending::clear_pending(&mut *tx).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::storage("Failed to commit clear", e))?;

        log::info!(
            "Cleared local cache ({} records, {} pending operations)",
            dropped_records,
            dropped_ops
        );
        Ok(())
    }

    /// Runs SQLite's integrity check
    pub async fn verify_integrity(&self) -> Result<(), AppError> {
        migrations::verify_integrity(&self.pool).await
    }

    /// Runs SQLite's optimizer
    pub async fn optimize(&self) -> Result<(), AppError> {
        migrations::optimize(&self.pool).await
    }

    /// Closes the underlying pool
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn begin(&self) -> Result<Transaction<'static, Sqlite>, AppError> {
        self.pool
            .begin()
            .await
            .map_err(|e| AppError::storage("Failed to begin transaction", e))
    }
}
