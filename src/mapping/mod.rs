pub mod config;
pub mod engine;
pub mod tracking;

pub use config::{
    ColumnMapping, Direction, Filter, MappingConfig, PkMapping, TableMapping, TargetMapping,
    TrackingStrategy, TransformKind, UnmappedTableBehavior,
};
pub use engine::{apply_entry, find_mapping, MapOutcome, SkipReason};
pub use tracking::{record_batch_synced, should_sync};
