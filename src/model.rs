use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One of the three logical operations a change-log entry can record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// A single append-only change-log record (spec §3).
///
/// `(origin, version)` uniquely identifies an entry across the universe
/// (invariant L1). Entries are never mutated after construction; only
/// appended or purged (L5).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entry {
    pub version: i64,
    pub table_name: String,
    pub pk_value: Value,
    pub operation: Operation,
    /// `None` iff `operation == Delete` (invariant L4).
    pub payload: Option<Value>,
    pub origin: String,
    /// ISO-8601 UTC, millisecond precision, monotonic non-decreasing per origin.
    pub timestamp: String,
}

impl Entry {
    /// True when `self` and `other` describe the same logical row, which is
    /// the precondition for conflict detection and for superseding ordering
    /// (invariants L2/L3).
    pub fn same_row(&self, other: &Entry) -> bool {
        self.table_name == other.table_name && self.pk_value == other.pk_value
    }

    /// `(timestamp, version)` ordering key used by Last-Write-Wins (spec §4.4).
    /// Timestamps are compared lexicographically, which matches chronological
    /// order only because all producers emit zero-padded millisecond UTC
    /// (spec §9's open question about non-canonical timestamps).
    pub fn lww_key(&self) -> (&str, i64) {
        (&self.timestamp, self.version)
    }
}

/// Format "now" the way entry timestamps must be: zero-padded, millisecond,
/// UTC, RFC 3339 (`...Z`), so that lexicographic string ordering matches
/// chronological ordering (spec §3, §9).
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Per-replica sync watermarks (spec §3 "Replica sync state").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplicaSyncState {
    pub origin_id: String,
    pub last_server_version: i64,
    pub last_push_version: i64,
}

impl Default for ReplicaSyncState {
    fn default() -> Self {
        ReplicaSyncState {
            origin_id: String::new(),
            last_server_version: 0,
            last_push_version: 0,
        }
    }
}

/// Ephemeral per-connection echo-suppression flag (spec §3, §4.8).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionState {
    pub sync_active: bool,
}

/// Server-side bookkeeping used for tombstone retention (spec §3, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackedClient {
    pub origin_id: String,
    pub last_sync_version: i64,
    pub last_sync_timestamp: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionType {
    Record,
    Table,
    Query,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscription {
    pub subscription_id: String,
    pub origin_id: String,
    #[serde(rename = "type")]
    pub kind: SubscriptionType,
    pub table_name: String,
    pub filter: Option<Value>,
    pub created_at: String,
    pub expires_at: Option<String>,
}

/// Per-mapping tracking bookkeeping (spec §3, §4.9).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MappingState {
    pub mapping_id: String,
    pub last_synced_version: i64,
    pub last_sync_timestamp: String,
    pub records_synced: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordHash {
    pub mapping_id: String,
    pub source_pk: Value,
    pub payload_hash: String,
    pub synced_at: String,
}
