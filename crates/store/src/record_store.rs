//! Record Store: durable id → record map with a sync flag

use crate::queries::records;
use crate::{DbPool, WriteLock};
use harbor_core::{AppError, Record, RecordId};

/// Handle to the cached records
///
/// Writes take the store-wide write lock, so they never interleave with a
/// transaction running through [`crate::LocalStore`].
#[derive(Debug, Clone)]
pub struct RecordStore {
    pool: DbPool,
    write_lock: WriteLock,
}

impl RecordStore {
    pub(crate) fn new(pool: DbPool, write_lock: WriteLock) -> Self {
        Self { pool, write_lock }
    }

    /// Upserts a record as unsynced, stamped with the current time
    pub async fn put(&self, id: &RecordId, payload: serde_json::Value) -> Result<Record, AppError> {
        let record = Record::new(id.clone(), payload);
        let _guard = self.write_lock.lock().await;
        records::upsert_record(&self.pool, &record).await?;
        Ok(record)
    }

    /// Gets a record, failing with `RecordNotFound` when absent
    pub async fn get(&self, id: &RecordId) -> Result<Record, AppError> {
        self.find(id)
            .await?
            .ok_or_else(|| AppError::record_not_found(id.as_str()))
    }

    /// Gets a record if present
    pub async fn find(&self, id: &RecordId) -> Result<Option<Record>, AppError> {
        records::find_record(&self.pool, id).await
    }

    /// Lists every record, in no particular order
    pub async fn get_all(&self) -> Result<Vec<Record>, AppError> {
        records::list_records(&self.pool).await
    }

    /// Removes a record
    pub async fn delete(&self, id: &RecordId) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        records::delete_record(&self.pool, id).await?;
        Ok(())
    }

    /// Flags a record as synced; absent ids are ignored
    pub async fn mark_synced(&self, id: &RecordId) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        records::mark_record_synced(&self.pool, id).await
    }
}
