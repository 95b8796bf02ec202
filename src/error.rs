use serde_json::Value;
use thiserror::Error;

use crate::model::Entry;

/// All expected failure modes of the sync kernel, as a single sum type.
///
/// Foreign-key violations never reach this type directly (they are deferred
/// and retried inside the applier); they only surface here once retries are
/// exhausted, as `DeferredChangeFailed`.
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    #[error("foreign key violation on {table} {pk}: {detail}")]
    ForeignKeyViolation {
        table: String,
        pk: Value,
        detail: String,
    },

    #[error("deferred change failed: {reason} (entry version {})", .entry.version)]
    DeferredChangeFailed { entry: Box<Entry>, reason: String },

    #[error("full resync required: client at {client_version}, oldest surviving version {oldest_version}")]
    FullResyncRequired {
        client_version: i64,
        oldest_version: i64,
    },

    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("database error: {0}")]
    Database(String),

    #[error("unresolved conflict between local version {} and remote version {}", .local.version, .remote.version)]
    UnresolvedConflict {
        local: Box<Entry>,
        remote: Box<Entry>,
    },

    #[error("mapping failed: {0}")]
    MappingFailed(String),

    #[error("serde: {0}")]
    Serde(String),

    #[error("evaluator error: {0}")]
    Eval(String),
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serde(e.to_string())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
