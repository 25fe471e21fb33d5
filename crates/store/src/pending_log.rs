//! Pending Operation Log: durable queue of mutations, one entry per id

use crate::queries::pending;
use crate::{DbPool, WriteLock};
use harbor_core::{Action, AppError, PendingOperation, RecordId, Timestamp};

/// Handle to the queued mutations
#[derive(Debug, Clone)]
pub struct PendingLog {
    pool: DbPool,
    write_lock: WriteLock,
}

impl PendingLog {
    pub(crate) fn new(pool: DbPool, write_lock: WriteLock) -> Self {
        Self { pool, write_lock }
    }

    /// Appends an operation, or folds it into the entry already queued for
    /// the same id
    ///
    /// The folded entry keeps its original `enqueued_at`, carries the newest
    /// payload and a bumped `version`.
    pub async fn enqueue(
        &self,
        id: &RecordId,
        action: Action,
        payload: &serde_json::Value,
    ) -> Result<PendingOperation, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::storage("Failed to begin transaction", e))?;

        let op = enqueue_in(&mut *tx, id, action, payload).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::storage("Failed to commit enqueue", e))?;
        Ok(op)
    }

    /// Lists queued operations, oldest first
    pub async fn list_pending(&self) -> Result<Vec<PendingOperation>, AppError> {
        pending::list_pending(&self.pool).await
    }

    /// Gets the entry queued for a record, if any
    pub async fn find(&self, id: &RecordId) -> Result<Option<PendingOperation>, AppError> {
        pending::find_pending(&self.pool, id).await
    }

    /// Removes the entry for a record whatever its version
    pub async fn remove(&self, id: &RecordId) -> Result<bool, AppError> {
        let _guard = self.write_lock.lock().await;
        pending::delete_pending(&self.pool, id).await
    }

    /// Removes the entry only if no newer write replaced it since `version`
    /// was read
    pub async fn remove_if_version(&self, id: &RecordId, version: i64) -> Result<bool, AppError> {
        let _guard = self.write_lock.lock().await;
        pending::delete_pending_if_version(&self.pool, id, version).await
    }

    /// Bumps the attempt counter and stores the failure message
    pub async fn record_failure(&self, id: &RecordId, error: &str) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        pending::record_pending_failure(&self.pool, id, error).await
    }

    /// Number of queued operations
    pub async fn count(&self) -> Result<usize, AppError> {
        let count = pending::count_pending(&self.pool).await?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

/// Enqueue body shared with the atomic submit path
pub(crate) async fn enqueue_in(
    conn: &mut sqlx::SqliteConnection,
    id: &RecordId,
    action: Action,
    payload: &serde_json::Value,
) -> Result<PendingOperation, AppError> {
    let existing = pending::find_pending(&mut *conn, id).await?;
    let action = match &existing {
        Some(queued) => queued.action.coalesce(action),
        None => action,
    };

    pending::upsert_pending(&mut *conn, id, action, payload, Timestamp::now()).await?;

    let op = pending::find_pending(&mut *conn, id)
        .await?
        .ok_or_else(|| AppError::InternalError {
            message: format!("pending entry for {} vanished inside its transaction", id),
        })?;

    match existing {
        Some(previous) => log::debug!(
            "Coalesced {} into queued {} for {} (v{})",
            op.action,
            previous.action,
            id,
            op.version
        ),
        None => log::debug!("Queued {} for {}", op.action, id),
    }

    Ok(op)
}
