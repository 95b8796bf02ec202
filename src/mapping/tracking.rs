use serde_json::Value;

use crate::error::SyncResult;
use crate::hash::payload_hash;
use crate::mapping::config::TrackingStrategy;
use crate::model::{format_timestamp, Entry, MappingState, Operation, RecordHash};
use crate::store::{ChangeLogStore, Clock};

/// Whether `entry` should be synced under a mapping's tracking strategy,
/// consulted before `apply_entry` (spec §4.9).
pub fn should_sync(
    strategy: TrackingStrategy,
    mapping_id: &str,
    entry: &Entry,
    store: &dyn ChangeLogStore,
) -> SyncResult<bool> {
    match strategy {
        TrackingStrategy::Version => {
            let last = store
                .get_mapping_state(mapping_id)?
                .map(|s| s.last_synced_version)
                .unwrap_or(0);
            Ok(entry.version > last)
        }
        TrackingStrategy::Hash => {
            if entry.operation == Operation::Delete {
                return Ok(true);
            }
            let payload = match &entry.payload {
                Some(p) => p,
                None => return Ok(true),
            };
            let current_hash = payload_hash(payload);
            let existing = store.get_record_hash(mapping_id, &entry.pk_value)?;
            Ok(existing.map(|r| r.payload_hash != current_hash).unwrap_or(true))
        }
        TrackingStrategy::Timestamp => {
            let existing = store.get_record_hash(mapping_id, &entry.pk_value)?;
            Ok(existing
                .map(|r| entry.timestamp.as_str() > r.synced_at.as_str())
                .unwrap_or(true))
        }
        TrackingStrategy::External => Ok(true),
    }
}

/// After a batch of mapped entries has been successfully synced, advance the
/// mapping's watermark and (for the `hash`/`timestamp` strategies) upsert a
/// `record_hash` row per entry so a later `should_sync` has something to
/// compare against (spec §4.9). `clock` stamps `last_sync_timestamp`; the
/// `timestamp` strategy's per-record watermark is each entry's own
/// `timestamp` rather than "now", since that is what `should_sync` compares
/// a later entry's timestamp against.
pub fn record_batch_synced(
    store: &dyn ChangeLogStore,
    mapping_id: &str,
    strategy: TrackingStrategy,
    synced: &[Entry],
    clock: &dyn Clock,
) -> SyncResult<()> {
    let now = format_timestamp(clock.now());

    if let Some(max_version) = synced.iter().map(|e| e.version).max() {
        let mut state = store.get_mapping_state(mapping_id)?.unwrap_or(MappingState {
            mapping_id: mapping_id.to_string(),
            last_synced_version: 0,
            last_sync_timestamp: now.clone(),
            records_synced: 0,
        });
        state.last_synced_version = state.last_synced_version.max(max_version);
        state.last_sync_timestamp = now.clone();
        state.records_synced += synced.len() as u64;
        store.put_mapping_state(&state)?;
    }

    match strategy {
        TrackingStrategy::Hash => {
            for entry in synced {
                if let Some(payload) = &entry.payload {
                    store.put_record_hash(&RecordHash {
                        mapping_id: mapping_id.to_string(),
                        source_pk: entry.pk_value.clone(),
                        payload_hash: payload_hash(payload),
                        synced_at: now.clone(),
                    })?;
                }
            }
        }
        TrackingStrategy::Timestamp => {
            for entry in synced {
                let payload_hash_val = entry.payload.as_ref().map(payload_hash).unwrap_or_default();
                store.put_record_hash(&RecordHash {
                    mapping_id: mapping_id.to_string(),
                    source_pk: entry.pk_value.clone(),
                    payload_hash: payload_hash_val,
                    synced_at: entry.timestamp.clone(),
                })?;
            }
        }
        TrackingStrategy::Version | TrackingStrategy::External => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeStore {
        mapping_states: RefCell<HashMap<String, MappingState>>,
        record_hashes: RefCell<HashMap<(String, String), RecordHash>>,
    }

    impl ChangeLogStore for FakeStore {
        fn append(
            &self,
            _table: &str,
            _pk_json: &Value,
            _op: Operation,
            _payload_json: Option<&Value>,
            _origin: &str,
            _ts: &str,
        ) -> SyncResult<i64> {
            unimplemented!()
        }
        fn fetch(&self, _from_version: i64, _limit: i64) -> SyncResult<Vec<Entry>> {
            Ok(vec![])
        }
        fn get_state(&self, _key: &str) -> SyncResult<Option<String>> {
            Ok(None)
        }
        fn set_state(&self, _key: &str, _value: &str) -> SyncResult<()> {
            Ok(())
        }
        fn get_session_flag(&self) -> SyncResult<bool> {
            Ok(false)
        }
        fn set_session_flag(&self, _flag: bool) -> SyncResult<()> {
            Ok(())
        }
        fn purge(&self, _max_version: i64) -> SyncResult<u64> {
            Ok(0)
        }
        fn list_clients(&self) -> SyncResult<Vec<crate::model::TrackedClient>> {
            Ok(vec![])
        }
        fn upsert_client(&self, _client: &crate::model::TrackedClient) -> SyncResult<()> {
            Ok(())
        }
        fn delete_client(&self, _origin_id: &str) -> SyncResult<()> {
            Ok(())
        }
        fn get_mapping_state(&self, mapping_id: &str) -> SyncResult<Option<MappingState>> {
            Ok(self.mapping_states.borrow().get(mapping_id).cloned())
        }
        fn put_mapping_state(&self, state: &MappingState) -> SyncResult<()> {
            self.mapping_states
                .borrow_mut()
                .insert(state.mapping_id.clone(), state.clone());
            Ok(())
        }
        fn get_record_hash(&self, mapping_id: &str, source_pk: &Value) -> SyncResult<Option<RecordHash>> {
            Ok(self
                .record_hashes
                .borrow()
                .get(&(mapping_id.to_string(), source_pk.to_string()))
                .cloned())
        }
        fn put_record_hash(&self, hash: &RecordHash) -> SyncResult<()> {
            self.record_hashes.borrow_mut().insert(
                (hash.mapping_id.clone(), hash.source_pk.to_string()),
                hash.clone(),
            );
            Ok(())
        }
    }

    struct FixedClock(chrono::DateTime<chrono::Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> chrono::DateTime<chrono::Utc> {
            self.0
        }
    }

    fn fixed_clock(rfc3339: &str) -> FixedClock {
        FixedClock(chrono::DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&chrono::Utc))
    }

    fn entry(version: i64, payload: Option<Value>) -> Entry {
        entry_at(version, payload, "2025-01-01T00:00:00.000Z")
    }

    fn entry_at(version: i64, payload: Option<Value>, timestamp: &str) -> Entry {
        Entry {
            version,
            table_name: "t".into(),
            pk_value: json!({"id": 1}),
            operation: if payload.is_some() { Operation::Update } else { Operation::Delete },
            payload,
            origin: "A".into(),
            timestamp: timestamp.into(),
        }
    }

    #[test]
    fn version_strategy_syncs_when_ahead_of_state() {
        let store = FakeStore::default();
        let e = entry(5, Some(json!({"a": 1})));
        assert!(should_sync(TrackingStrategy::Version, "m1", &e, &store).unwrap());
        store
            .put_mapping_state(&MappingState {
                mapping_id: "m1".into(),
                last_synced_version: 5,
                last_sync_timestamp: "x".into(),
                records_synced: 1,
            })
            .unwrap();
        assert!(!should_sync(TrackingStrategy::Version, "m1", &e, &store).unwrap());
    }

    #[test]
    fn hash_strategy_syncs_when_payload_changes() {
        let store = FakeStore::default();
        let e1 = entry(1, Some(json!({"a": 1})));
        assert!(should_sync(TrackingStrategy::Hash, "m1", &e1, &store).unwrap());
        record_batch_synced(&store, "m1", TrackingStrategy::Hash, &[e1.clone()], &fixed_clock("2025-01-01T00:00:00.000Z")).unwrap();
        assert!(!should_sync(TrackingStrategy::Hash, "m1", &e1, &store).unwrap());

        let e2 = entry(2, Some(json!({"a": 2})));
        assert!(should_sync(TrackingStrategy::Hash, "m1", &e2, &store).unwrap());
    }

    #[test]
    fn hash_strategy_deletes_always_sync() {
        let store = FakeStore::default();
        let e = entry(1, None);
        assert!(should_sync(TrackingStrategy::Hash, "m1", &e, &store).unwrap());
    }

    #[test]
    fn external_strategy_always_true() {
        let store = FakeStore::default();
        let e = entry(1, Some(json!({"a": 1})));
        assert!(should_sync(TrackingStrategy::External, "m1", &e, &store).unwrap());
    }

    #[test]
    fn record_batch_synced_advances_watermark_and_counts() {
        let store = FakeStore::default();
        let entries = vec![entry(3, Some(json!({"a": 1}))), entry(7, Some(json!({"a": 2})))];
        record_batch_synced(&store, "m1", TrackingStrategy::Version, &entries, &fixed_clock("2025-01-01T00:00:00.000Z")).unwrap();
        let state = store.get_mapping_state("m1").unwrap().unwrap();
        assert_eq!(state.last_synced_version, 7);
        assert_eq!(state.records_synced, 2);
    }

    #[test]
    fn timestamp_strategy_dedupes_after_record_batch_synced() {
        let store = FakeStore::default();
        let e1 = entry_at(1, Some(json!({"a": 1})), "2025-01-01T00:00:00.000Z");
        assert!(should_sync(TrackingStrategy::Timestamp, "m1", &e1, &store).unwrap());

        record_batch_synced(&store, "m1", TrackingStrategy::Timestamp, &[e1.clone()], &fixed_clock("2025-01-01T00:00:01.000Z")).unwrap();

        // Same timestamp as what was just recorded: not a newer write, so no resync.
        let e_same = entry_at(2, Some(json!({"a": 1})), "2025-01-01T00:00:00.000Z");
        assert!(!should_sync(TrackingStrategy::Timestamp, "m1", &e_same, &store).unwrap());

        // Strictly newer timestamp: should sync again.
        let e_newer = entry_at(3, Some(json!({"a": 2})), "2025-01-01T00:00:01.000Z");
        assert!(should_sync(TrackingStrategy::Timestamp, "m1", &e_newer, &store).unwrap());
    }
}
