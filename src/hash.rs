use std::collections::BTreeMap;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::model::Entry;

/// The canonical JSON serialisation used as input to every hash in this
/// crate (spec §4.7). This is an explicit canonicaliser, independent of
/// `serde_json`'s own formatting defaults, per the redesign note in spec §9:
/// object keys are sorted ordinal-ascending, no inserted whitespace, `null`
/// is preserved, and integers are never emitted with a trailing `.0`.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => out.push_str(&escape_string(s)),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            out.push('{');
            for (i, (k, v)) in sorted.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&escape_string(k));
                out.push(':');
                write_canonical(v, out);
            }
            out.push('}');
        }
    }
}

/// Minimal-escape quoting, delegated to `serde_json`'s string encoder so the
/// escape table matches the host JSON library exactly (spec §4.7).
fn escape_string(s: &str) -> String {
    serde_json::to_string(s).expect("string serialisation cannot fail")
}

/// SHA-256 of a single payload's canonical form, used by the mapping
/// engine's `hash` tracking strategy (spec §4.9).
pub fn payload_hash(value: &Value) -> String {
    sha256_hex(&canonical_json(value))
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// SHA-256 of the version-ordered entry stream (spec §4.7 "Batch hash").
///
/// Entries are serialised in the order given — callers must pass them in
/// version order, which `fetch_batch` already guarantees.
pub fn batch_hash(entries: &[Entry]) -> String {
    let mut buf = String::new();
    for e in entries {
        buf.push_str(&e.version.to_string());
        buf.push(':');
        buf.push_str(&e.table_name);
        buf.push(':');
        buf.push_str(&canonical_json(&e.pk_value));
        buf.push(':');
        buf.push_str(e.operation.as_str());
        buf.push(':');
        match &e.payload {
            Some(p) => buf.push_str(&canonical_json(p)),
            None => buf.push_str("null"),
        }
        buf.push('\n');
    }
    sha256_hex(&buf)
}

/// SHA-256 of a full database snapshot (spec §4.7 "Database hash").
///
/// `tables` maps table name to its rows, already in primary-key order; the
/// `BTreeMap` key type guarantees the lexicographic table ordering the spec
/// requires.
pub fn database_hash(tables: &BTreeMap<String, Vec<Value>>) -> String {
    let mut buf = String::new();
    for (table, rows) in tables {
        buf.push_str(table);
        buf.push('\n');
        for row in rows {
            buf.push_str(&canonical_json(row));
            buf.push('\n');
        }
    }
    sha256_hex(&buf)
}
