//! Database query operations organized by table

pub mod pending;
pub mod records;

// Re-export commonly used query functions
pub use pending::{
    clear_pending, count_pending, delete_pending, delete_pending_if_version, find_pending,
    list_pending, record_pending_failure, upsert_pending,
};
pub use records::{
    clear_records, count_records, delete_record, find_record, list_records, mark_record_synced,
    upsert_record,
};
