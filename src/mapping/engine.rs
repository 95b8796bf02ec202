use serde_json::{Map, Value};

use crate::error::SyncResult;
use crate::lql;
use crate::mapping::config::{
    ColumnMapping, Direction, MappingConfig, TableMapping, TargetMapping, TransformKind,
    UnmappedTableBehavior,
};
use crate::model::{Entry, Operation};

/// Why an entry was skipped instead of mapped (spec §4.9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoMapping,
    FilterRejected,
}

/// Result of running an entry through the mapping engine.
#[derive(Debug, Clone, PartialEq)]
pub enum MapOutcome {
    Mapped {
        entries: Vec<Entry>,
        warnings: Vec<String>,
        /// The mapping that produced these entries, or `None` for an
        /// identity passthrough with no configured mapping.
        mapping_id: Option<String>,
    },
    Skipped(SkipReason),
}

/// The first enabled mapping whose `source_table` matches and whose
/// `direction` is compatible with `phase` (spec §4.9 "Find rule").
pub fn find_mapping<'a>(config: &'a MappingConfig, table: &str, phase: Direction) -> Option<&'a TableMapping> {
    config
        .tables
        .iter()
        .find(|m| m.enabled && m.source_table == table && m.direction.applies_to(phase))
}

/// Translate `entry` for the given sync `phase`.
pub fn apply_entry(config: &MappingConfig, entry: &Entry, phase: Direction) -> SyncResult<MapOutcome> {
    let mapping = match find_mapping(config, &entry.table_name, phase) {
        Some(m) => m,
        None => {
            return match config.unmapped_table_behavior {
                UnmappedTableBehavior::Passthrough => Ok(MapOutcome::Mapped {
                    entries: vec![entry.clone()],
                    warnings: Vec::new(),
                    mapping_id: None,
                }),
                UnmappedTableBehavior::Strict => Ok(MapOutcome::Skipped(SkipReason::NoMapping)),
            };
        }
    };

    // Filters are advisory on deletes because deletes carry no payload;
    // deletes always pass (spec §4.9).
    if let (Some(filter), Operation::Insert | Operation::Update) = (&mapping.filter, entry.operation) {
        let payload = entry.payload.as_ref().cloned().unwrap_or(Value::Null);
        let result = lql::evaluate(&filter.lql, &payload)?;
        if !is_truthy(&result) {
            return Ok(MapOutcome::Skipped(SkipReason::FilterRejected));
        }
    }

    let pk_value = map_pk(mapping, entry);
    let mut warnings = Vec::new();
    let mut entries = Vec::new();

    if mapping.is_multi_target {
        for target in mapping.targets.as_deref().unwrap_or(&[]) {
            entries.push(build_target_entry(entry, target, &pk_value, &mut warnings));
        }
    } else {
        let target_table = mapping
            .target_table
            .clone()
            .unwrap_or_else(|| mapping.source_table.clone());
        let (payload, mut w) = apply_payload(
            &mapping.column_mappings,
            &mapping.excluded_columns,
            entry.payload.as_ref(),
        );
        warnings.append(&mut w);
        entries.push(Entry {
            version: entry.version,
            table_name: target_table,
            pk_value: pk_value.clone(),
            operation: entry.operation,
            payload,
            origin: entry.origin.clone(),
            timestamp: entry.timestamp.clone(),
        });
    }

    Ok(MapOutcome::Mapped {
        entries,
        warnings,
        mapping_id: Some(mapping.id.clone()),
    })
}

fn build_target_entry(
    entry: &Entry,
    target: &TargetMapping,
    pk_value: &Value,
    warnings: &mut Vec<String>,
) -> Entry {
    let (payload, mut w) = apply_payload(&target.column_mappings, &target.excluded_columns, entry.payload.as_ref());
    warnings.append(&mut w);
    Entry {
        version: entry.version,
        table_name: target.target_table.clone(),
        pk_value: pk_value.clone(),
        operation: entry.operation,
        payload,
        origin: entry.origin.clone(),
        timestamp: entry.timestamp.clone(),
    }
}

/// Rewrites a single-column PK per `mapping.pk_mapping`, or passes the
/// source PK through unchanged when no mapping is configured.
fn map_pk(mapping: &TableMapping, entry: &Entry) -> Value {
    match &mapping.pk_mapping {
        Some(pk) => {
            let source_value = entry
                .pk_value
                .as_object()
                .and_then(|o| get_case_insensitive(o, &pk.source_column))
                .cloned()
                .unwrap_or(Value::Null);
            let mut out = Map::new();
            out.insert(pk.target_column.clone(), source_value);
            Value::Object(out)
        }
        None => entry.pk_value.clone(),
    }
}

fn apply_payload(
    column_mappings: &[ColumnMapping],
    excluded_columns: &[String],
    source_payload: Option<&Value>,
) -> (Option<Value>, Vec<String>) {
    let source = match source_payload {
        Some(p) => p,
        None => return (None, Vec::new()),
    };

    if column_mappings.is_empty() {
        let mut obj = source.as_object().cloned().unwrap_or_default();
        obj.retain(|k, _| !excluded_columns.iter().any(|e| e.eq_ignore_ascii_case(k)));
        return (Some(Value::Object(obj)), Vec::new());
    }

    let mut out = Map::new();
    let mut warnings = Vec::new();
    let source_obj = source.as_object();

    for cm in column_mappings {
        match cm.transform {
            TransformKind::None => {
                if let Some(src_col) = &cm.source {
                    if let Some(v) = source_obj.and_then(|o| get_case_insensitive(o, src_col)) {
                        out.insert(cm.target.clone(), v.clone());
                    }
                }
            }
            TransformKind::Constant => {
                if let Some(v) = &cm.value {
                    out.insert(cm.target.clone(), v.clone());
                }
            }
            TransformKind::Lql => {
                let expr = cm.lql.as_deref().unwrap_or("");
                match lql::evaluate(expr, source) {
                    Ok(v) => {
                        out.insert(cm.target.clone(), v);
                    }
                    Err(_) => {
                        let fallback = cm
                            .source
                            .as_ref()
                            .and_then(|c| source_obj.and_then(|o| get_case_insensitive(o, c)))
                            .cloned()
                            .unwrap_or(Value::Null);
                        out.insert(cm.target.clone(), fallback);
                        warnings.push(format!(
                            "lql evaluation failed for column `{}`, falling back to raw source value",
                            cm.target
                        ));
                    }
                }
            }
        }
    }

    (Some(Value::Object(out)), warnings)
}

fn get_case_insensitive<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    if let Some(v) = obj.get(key) {
        return Some(v);
    }
    obj.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)).map(|(_, v)| v)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
