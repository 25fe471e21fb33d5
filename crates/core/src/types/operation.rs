//! Queued mutation intents

use super::{RecordId, Timestamp};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of mutation a pending operation carries to the remote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Entity was created locally
    Create,
    /// Entity was modified locally
    Update,
    /// Entity was removed locally
    Delete,
}

impl Action {
    /// Returns the lowercase wire/storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }

    /// Merges a newer local write into an action that is still queued.
    ///
    /// A create that never reached the remote stays a create when it is
    /// edited again. A create followed by a delete collapses into the delete.
    /// Every other pair takes the newer action.
    pub fn coalesce(self, newer: Action) -> Action {
        match (self, newer) {
            (Action::Create, Action::Update) => Action::Create,
            (_, newer) => newer,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Action::Create),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            other => Err(AppError::InvalidArgument {
                argument: "action".to_string(),
                reason: format!("unknown action '{}'", other),
            }),
        }
    }
}

/// A mutation waiting in the pending log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    /// Target record
    pub id: RecordId,
    /// What to do remotely
    pub action: Action,
    /// Payload snapshot taken at the latest enqueue
    pub payload: serde_json::Value,
    /// Time of the first enqueue for this id, kept across coalescing
    pub enqueued_at: Timestamp,
    /// Bumped every time a newer local write replaces the entry
    pub version: i64,
    /// Insertion order, breaks ties between equal `enqueued_at` values
    pub seq: i64,
    /// Number of failed remote attempts so far
    pub attempts: u32,
    /// Message of the most recent failure
    pub last_error: Option<String>,
}

impl PendingOperation {
    /// Returns true if the operation removes the record remotely
    pub fn is_delete(&self) -> bool {
        matches!(self.action, Action::Delete)
    }
}
