//! Record table operations
//!
//! Every function takes any SQLite executor, so the same statement runs
//! against the pool or inside an open transaction.

use harbor_core::{AppError, Record, RecordId, Timestamp};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};

/// Inserts or replaces a record
pub async fn upsert_record<'e, E>(executor: E, record: &Record) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let payload = serde_json::to_string(&record.payload)
        .map_err(|e| AppError::invalid_payload(record.id.as_str(), e))?;

    sqlx::query(
        r#"
        INSERT INTO records (id, payload, synced, last_written_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            payload = excluded.payload,
            synced = excluded.synced,
            last_written_at = excluded.last_written_at
        "#,
    )
    .bind(record.id.as_str())
    .bind(payload)
    .bind(record.synced as i64)
    .bind(record.last_written_at.as_millis())
    .execute(executor)
    .await
    .map_err(|e| AppError::storage("Failed to write record", e))?;

    Ok(())
}

/// Gets a record by ID, if present
pub async fn find_record<'e, E>(executor: E, id: &RecordId) -> Result<Option<Record>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT id, payload, synced, last_written_at FROM records WHERE id = ?")
        .bind(id.as_str())
        .fetch_optional(executor)
        .await
        .map_err(|e| AppError::storage("Failed to fetch record", e))?;

    row.map(row_to_record).transpose()
}

/// Lists every record
pub async fn list_records<'e, E>(executor: E) -> Result<Vec<Record>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query("SELECT id, payload, synced, last_written_at FROM records")
        .fetch_all(executor)
        .await
        .map_err(|e| AppError::storage("Failed to list records", e))?;

    rows.into_iter().map(row_to_record).collect()
}

/// Deletes a record, returning whether a row was removed
pub async fn delete_record<'e, E>(executor: E, id: &RecordId) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM records WHERE id = ?")
        .bind(id.as_str())
        .execute(executor)
        .await
        .map_err(|e| AppError::storage("Failed to delete record", e))?;

    Ok(result.rows_affected() > 0)
}

/// Flags a record as synced without touching its payload
pub async fn mark_record_synced<'e, E>(executor: E, id: &RecordId) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE records SET synced = 1 WHERE id = ?")
        .bind(id.as_str())
        .execute(executor)
        .await
        .map_err(|e| AppError::storage("Failed to mark record synced", e))?;

    Ok(())
}

/// Returns `(total, synced)` record counts
pub async fn count_records<'e, E>(executor: E) -> Result<(i64, i64), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as("SELECT COUNT(*), COALESCE(SUM(synced), 0) FROM records")
        .fetch_one(executor)
        .await
        .map_err(|e| AppError::storage("Failed to count records", e))
}

/// Removes every record
pub async fn clear_records<'e, E>(executor: E) -> Result<u64, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM records")
        .execute(executor)
        .await
        .map_err(|e| AppError::storage("Failed to clear records", e))?;

    Ok(result.rows_affected())
}

pub(crate) fn row_to_record(row: SqliteRow) -> Result<Record, AppError> {
    let id_str: String = row
        .try_get("id")
        .map_err(|e| AppError::storage("Missing record ID", e))?;
    let id = RecordId::from_string(&id_str)?;

    let payload_str: String = row
        .try_get("payload")
        .map_err(|e| AppError::storage("Missing record payload", e))?;
    let payload = serde_json::from_str(&payload_str)
        .map_err(|e| AppError::invalid_payload(id.as_str(), e))?;

    let synced: i64 = row
        .try_get("synced")
        .map_err(|e| AppError::storage("Missing synced flag", e))?;
    let last_written_at: i64 = row
        .try_get("last_written_at")
        .map_err(|e| AppError::storage("Missing last_written_at", e))?;

    Ok(Record {
        id,
        payload,
        synced: synced != 0,
        last_written_at: Timestamp::from_millis(last_written_at),
    })
}
