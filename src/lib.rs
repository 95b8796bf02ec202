pub mod applier;
pub mod batch;
pub mod config;
pub mod conflict;
pub mod coordinator;
pub mod error;
pub mod hash;
pub mod lql;
pub mod mapping;
pub mod model;
#[cfg(feature = "sqlite-store")]
pub mod sqlite;
pub mod store;
pub mod subscription;
pub mod suppression;
pub mod sync;
pub mod tombstone;

pub use applier::{apply_batch, apply_batch_with, ApplyResult, DEFAULT_MAX_RETRY_PASSES};
pub use batch::{fetch_batch, Batch};
pub use config::BatchConfig;
pub use conflict::{is_conflict, resolve, ConflictOutcome, ConflictStrategy};
pub use coordinator::{pull, push, PullResult, PushResult, SyncResultSummary};
pub use error::{SyncError, SyncResult};
pub use hash::{batch_hash, database_hash, payload_hash};
pub use model::{
    format_timestamp, Entry, MappingState, Operation, RecordHash, ReplicaSyncState, SessionState,
    Subscription, SubscriptionType, TrackedClient,
};
#[cfg(feature = "sqlite-store")]
pub use sqlite::SqliteStore;
pub use store::{looks_like_fk_violation, ApplyOutcome, ChangeApplier, ChangeLogStore, Clock, SystemClock, Transport};
pub use subscription::{match_subscriptions, Match};
pub use suppression::{enable as enable_suppression, SuppressionGuard};
pub use sync::SyncClient;
pub use tombstone::{default_inactivity_limit, find_stale_clients, purge, requires_full_resync, safe_purge_version};
