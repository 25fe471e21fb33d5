//! Pending operation table operations

use harbor_core::{Action, AppError, PendingOperation, RecordId, Timestamp};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};

const PENDING_COLUMNS: &str =
    "id, action, payload, enqueued_at, seq, version, attempts, last_error";

/// Inserts a new pending entry or replaces the action and payload of the
/// existing one
///
/// A replacement keeps `enqueued_at`, `seq` and `attempts` and bumps
/// `version`. The caller decides the final action (see [`Action::coalesce`]).
pub async fn upsert_pending<'e, E>(
    executor: E,
    id: &RecordId,
    action: Action,
    payload: &serde_json::Value,
    enqueued_at: Timestamp,
) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let payload =
        serde_json::to_string(payload).map_err(|e| AppError::invalid_payload(id.as_str(), e))?;

    sqlx::query(
        r#"
        INSERT INTO pending_operations (id, action, payload, enqueued_at, seq, version, attempts)
        VALUES (?, ?, ?, ?, (SELECT COALESCE(MAX(seq), 0) + 1 FROM pending_operations), 1, 0)
        ON CONFLICT(id) DO UPDATE SET
            action = excluded.action,
            payload = excluded.payload,
            version = pending_operations.version + 1
        "#,
    )
    .bind(id.as_str())
    .bind(action.as_str())
    .bind(payload)
    .bind(enqueued_at.as_millis())
    .execute(executor)
    .await
    .map_err(|e| AppError::storage("Failed to enqueue operation", e))?;

    Ok(())
}

/// Gets the pending entry for a record, if any
pub async fn find_pending<'e, E>(
    executor: E,
    id: &RecordId,
) -> Result<Option<PendingOperation>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM pending_operations WHERE id = ?", PENDING_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.as_str())
        .fetch_optional(executor)
        .await
        .map_err(|e| AppError::storage("Failed to fetch pending operation", e))?;

    row.map(row_to_pending).transpose()
}

/// Lists pending entries oldest first
pub async fn list_pending<'e, E>(executor: E) -> Result<Vec<PendingOperation>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM pending_operations ORDER BY enqueued_at ASC, seq ASC",
        PENDING_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .fetch_all(executor)
        .await
        .map_err(|e| AppError::storage("Failed to list pending operations", e))?;

    rows.into_iter().map(row_to_pending).collect()
}

/// Deletes the pending entry for a record unconditionally
pub async fn delete_pending<'e, E>(executor: E, id: &RecordId) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM pending_operations WHERE id = ?")
        .bind(id.as_str())
        .execute(executor)
        .await
        .map_err(|e| AppError::storage("Failed to remove pending operation", e))?;

    Ok(result.rows_affected() > 0)
}

/// Deletes the pending entry only while it still carries `version`
pub async fn delete_pending_if_version<'e, E>(
    executor: E,
    id: &RecordId,
    version: i64,
) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM pending_operations WHERE id = ? AND version = ?")
        .bind(id.as_str())
        .bind(version)
        .execute(executor)
        .await
        .map_err(|e| AppError::storage("Failed to remove pending operation", e))?;

    Ok(result.rows_affected() == 1)
}

/// Turns a queued create into an update
///
/// Used once the remote has accepted the create, so later edits to the same
/// id are not posted as a second create.
pub async fn demote_create_to_update<'e, E>(executor: E, id: &RecordId) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE pending_operations SET action = 'update' WHERE id = ? AND action = 'create'",
    )
    .bind(id.as_str())
    .execute(executor)
    .await
    .map_err(|e| AppError::storage("Failed to rewrite pending create", e))?;

    Ok(result.rows_affected() == 1)
}

/// Counts a failed remote attempt against the entry
pub async fn record_pending_failure<'e, E>(
    executor: E,
    id: &RecordId,
    error: &str,
) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "UPDATE pending_operations SET attempts = attempts + 1, last_error = ? WHERE id = ?",
    )
    .bind(error)
    .bind(id.as_str())
    .execute(executor)
    .await
    .map_err(|e| AppError::storage("Failed to record operation failure", e))?;

    Ok(())
}

/// Counts pending entries
pub async fn count_pending<'e, E>(executor: E) -> Result<i64, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar("SELECT COUNT(*) FROM pending_operations")
        .fetch_one(executor)
        .await
        .map_err(|e| AppError::storage("Failed to count pending operations", e))
}

/// Removes every pending entry
pub async fn clear_pending<'e, E>(executor: E) -> Result<u64, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM pending_operations")
        .execute(executor)
        .await
        .map_err(|e| AppError::storage("Failed to clear pending operations", e))?;

    Ok(result.rows_affected())
}

pub(crate) fn row_to_pending(row: SqliteRow) -> Result<PendingOperation, AppError> {
    let id_str: String = row
        .try_get("id")
        .map_err(|e| AppError::storage("Missing operation ID", e))?;
    let id = RecordId::from_string(&id_str)?;

    let action_str: String = row
        .try_get("action")
        .map_err(|e| AppError::storage("Missing operation action", e))?;
    let action: Action = action_str.parse()?;

    let payload_str: String = row
        .try_get("payload")
        .map_err(|e| AppError::storage("Missing operation payload", e))?;
    let payload = serde_json::from_str(&payload_str)
        .map_err(|e| AppError::invalid_payload(id.as_str(), e))?;

    let enqueued_at: i64 = row
        .try_get("enqueued_at")
        .map_err(|e| AppError::storage("Missing enqueued_at", e))?;
    let seq: i64 = row
        .try_get("seq")
        .map_err(|e| AppError::storage("Missing seq", e))?;
    let version: i64 = row
        .try_get("version")
        .map_err(|e| AppError::storage("Missing version", e))?;
    let attempts: i64 = row
        .try_get("attempts")
        .map_err(|e| AppError::storage("Missing attempts", e))?;

    let last_error: Option<String> = row
        .try_get("last_error")
        .map_err(|e| AppError::storage("Unreadable last_error", e))?;

    Ok(PendingOperation {
        id,
        action,
        payload,
        enqueued_at: Timestamp::from_millis(enqueued_at),
        version,
        seq,
        attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
        last_error,
    })
}
