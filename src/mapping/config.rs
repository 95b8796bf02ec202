use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Direction a `TableMapping` applies to (spec §4.9). Unknown values in
/// config JSON fall back to `Push` (spec §6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Pull,
    Both,
    #[serde(other)]
    Push,
}

impl Default for Direction {
    fn default() -> Self {
        Direction::Push
    }
}

impl Direction {
    /// True when a mapping configured for `self` applies during `phase`
    /// (`phase` is always `Push` or `Pull`, never `Both`).
    pub fn applies_to(self, phase: Direction) -> bool {
        self == phase || self == Direction::Both
    }
}

/// Per-mapping tracking strategy (spec §4.9). Unknown values fall back to
/// `Version` (spec §6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrackingStrategy {
    Hash,
    Timestamp,
    External,
    #[serde(other)]
    Version,
}

impl Default for TrackingStrategy {
    fn default() -> Self {
        TrackingStrategy::Version
    }
}

/// What to do with an entry whose table has no matching mapping (spec §4.9).
/// Unknown values fall back to `Strict` (spec §6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UnmappedTableBehavior {
    Passthrough,
    #[serde(other)]
    Strict,
}

impl Default for UnmappedTableBehavior {
    fn default() -> Self {
        UnmappedTableBehavior::Strict
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    Constant,
    Lql,
    #[serde(other)]
    None,
}

impl Default for TransformKind {
    fn default() -> Self {
        TransformKind::None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PkMapping {
    pub source_column: String,
    pub target_column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnMapping {
    pub source: Option<String>,
    pub target: String,
    #[serde(default)]
    pub transform: TransformKind,
    pub value: Option<Value>,
    pub lql: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Filter {
    pub lql: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetMapping {
    pub target_table: String,
    #[serde(default)]
    pub column_mappings: Vec<ColumnMapping>,
    #[serde(default)]
    pub excluded_columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TableMapping {
    pub id: String,
    pub source_table: String,
    pub target_table: Option<String>,
    pub direction: Direction,
    pub enabled: bool,
    pub pk_mapping: Option<PkMapping>,
    pub column_mappings: Vec<ColumnMapping>,
    pub excluded_columns: Vec<String>,
    pub filter: Option<Filter>,
    pub tracking: TrackingStrategy,
    pub is_multi_target: bool,
    pub targets: Option<Vec<TargetMapping>>,
}

impl Default for TableMapping {
    fn default() -> Self {
        TableMapping {
            id: String::new(),
            source_table: String::new(),
            target_table: None,
            direction: Direction::default(),
            enabled: true,
            pk_mapping: None,
            column_mappings: Vec::new(),
            excluded_columns: Vec::new(),
            filter: None,
            tracking: TrackingStrategy::default(),
            is_multi_target: false,
            targets: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MappingConfig {
    pub tables: Vec<TableMapping>,
    pub unmapped_table_behavior: UnmappedTableBehavior,
}

impl Default for MappingConfig {
    fn default() -> Self {
        MappingConfig {
            tables: Vec::new(),
            unmapped_table_behavior: UnmappedTableBehavior::default(),
        }
    }
}
