use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::SyncResult;
use crate::model::{Entry, MappingState, Operation, RecordHash, TrackedClient};

/// Host-provided persistence for the change log and its satellite tables
/// (spec §6). Concrete database drivers are out of scope for the kernel; this
/// trait is the seam a host implements against SQLite, Postgres, or anything
/// else. See `sqlite` module (feature `sqlite-store`) for a reference
/// implementation.
pub trait ChangeLogStore {
    /// Append a new entry, returning the version assigned by the log.
    /// For trigger-layer use only — the kernel itself never calls this
    /// directly except when told to record an applied mapping's output.
    fn append(
        &self,
        table: &str,
        pk_json: &Value,
        op: Operation,
        payload_json: Option<&Value>,
        origin: &str,
        ts: &str,
    ) -> SyncResult<i64>;

    /// Ascending by version, strictly greater than `from_version`.
    fn fetch(&self, from_version: i64, limit: i64) -> SyncResult<Vec<Entry>>;

    fn get_state(&self, key: &str) -> SyncResult<Option<String>>;
    fn set_state(&self, key: &str, value: &str) -> SyncResult<()>;

    fn get_session_flag(&self) -> SyncResult<bool>;
    fn set_session_flag(&self, flag: bool) -> SyncResult<()>;

    /// Deletes entries with `version <= max_version` eligible for purge
    /// (tombstones, or superseded entries per host policy). Returns count.
    fn purge(&self, max_version: i64) -> SyncResult<u64>;

    fn list_clients(&self) -> SyncResult<Vec<TrackedClient>>;
    fn upsert_client(&self, client: &TrackedClient) -> SyncResult<()>;
    fn delete_client(&self, origin_id: &str) -> SyncResult<()>;

    fn get_mapping_state(&self, mapping_id: &str) -> SyncResult<Option<MappingState>>;
    fn put_mapping_state(&self, state: &MappingState) -> SyncResult<()>;

    fn get_record_hash(&self, mapping_id: &str, source_pk: &Value) -> SyncResult<Option<RecordHash>>;
    fn put_record_hash(&self, hash: &RecordHash) -> SyncResult<()>;
}

/// Result of attempting to apply a single entry to the local store
/// (spec §4.2, §6 "Apply contract").
pub enum ApplyOutcome {
    Ok,
    FkDeferred,
    Fatal(crate::error::SyncError),
}

/// Host-provided row writer. Must be idempotent: applying the same entry
/// twice leaves the target row in the same state as applying it once
/// (spec §6, property P2).
pub trait ChangeApplier {
    fn apply_one(&self, entry: &Entry) -> ApplyOutcome;
}

/// Push-side wire contract (spec §6 "Transport contract").
pub trait Transport {
    fn send(&self, changes: &[Entry]) -> SyncResult<()>;
}

/// Injected time source, so the kernel never calls `Utc::now()` directly and
/// stays deterministic under test (spec §6 lists `Clock` as a collaborator).
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Shared heuristic for identifying a foreign-key violation from a host error
/// message, used as the default when a host's `apply_one` does not have a
/// more precise classification available (spec §4.2).
pub fn looks_like_fk_violation(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("foreign key")
        || lower.contains("fk_")
        || lower.contains("foreign key constraint")
}
