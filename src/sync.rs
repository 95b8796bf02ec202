use crate::batch::{fetch_batch, Batch};
use crate::config::BatchConfig;
use crate::coordinator::{self, PullResult, PushResult, SyncResultSummary};
use crate::error::SyncResult;
use crate::model::Entry;
use crate::store::{ApplyOutcome, ChangeApplier, ChangeLogStore, Transport};

const SERVER_VERSION_KEY: &str = "last_server_version";
const PUSH_VERSION_KEY: &str = "last_push_version";

/// Convenience wrapper binding one store and one applier together, so a host
/// doesn't have to thread watermarks through the free functions in
/// `coordinator` by hand. Everything here is a thin restatement of
/// `coordinator::pull`/`push`/`sync` against `self.store`'s own state keys.
pub struct SyncClient<'s, S, A> {
    store: &'s S,
    applier: &'s A,
    origin_id: String,
    cfg: BatchConfig,
}

impl<'s, S: ChangeLogStore, A: ChangeApplier> SyncClient<'s, S, A> {
    pub fn new(store: &'s S, applier: &'s A, origin_id: impl Into<String>, cfg: BatchConfig) -> Self {
        SyncClient {
            store,
            applier,
            origin_id: origin_id.into(),
            cfg,
        }
    }

    fn watermark(&self, key: &str) -> SyncResult<i64> {
        Ok(self
            .store
            .get_state(key)?
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0))
    }

    /// Pull remote changes and apply them locally, advancing and persisting
    /// `last_server_version` as pages land.
    pub fn pull(
        &self,
        oldest_remote_version: Option<i64>,
        fetch_remote: impl FnMut(i64, u64) -> SyncResult<Batch>,
    ) -> SyncResult<PullResult> {
        let last_server_version = self.watermark(SERVER_VERSION_KEY)?;
        coordinator::pull(
            self.store,
            &self.origin_id,
            last_server_version,
            &self.cfg,
            oldest_remote_version,
            fetch_remote,
            |entry: &Entry| self.applier.apply_one(entry),
            |v| self.store.set_state(SERVER_VERSION_KEY, &v.to_string()),
        )
    }

    /// Push local changes to the remote, advancing and persisting
    /// `last_push_version` as pages are accepted.
    pub fn push(&self, mut send_remote: impl FnMut(&[Entry]) -> SyncResult<()>) -> SyncResult<PushResult> {
        let last_push_version = self.watermark(PUSH_VERSION_KEY)?;
        coordinator::push(
            last_push_version,
            &self.cfg,
            |from, size| fetch_batch(self.store, from, size, false),
            |changes| send_remote(changes),
            |v| self.store.set_state(PUSH_VERSION_KEY, &v.to_string()),
        )
    }

    /// Pull then push in one call (spec §4.3's "sync cycle").
    pub fn sync(
        &self,
        oldest_remote_version: Option<i64>,
        fetch_remote: impl FnMut(i64, u64) -> SyncResult<Batch>,
        send_remote: impl FnMut(&[Entry]) -> SyncResult<()>,
    ) -> SyncResult<SyncResultSummary> {
        let pull = self.pull(oldest_remote_version, fetch_remote)?;
        let push = self.push(send_remote)?;
        Ok(SyncResultSummary { pull, push })
    }

    /// `push` via a `Transport` collaborator instead of a bare closure.
    pub fn push_via(&self, transport: &dyn Transport) -> SyncResult<PushResult> {
        self.push(|changes| transport.send(changes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Operation;
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemStore {
        log: RefCell<Vec<Entry>>,
        state: RefCell<HashMap<String, String>>,
        flag: RefCell<bool>,
    }

    impl ChangeLogStore for MemStore {
        fn append(
            &self,
            table: &str,
            pk_json: &Value,
            op: Operation,
            payload_json: Option<&Value>,
            origin: &str,
            ts: &str,
        ) -> SyncResult<i64> {
            let version = self.log.borrow().len() as i64 + 1;
            self.log.borrow_mut().push(Entry {
                version,
                table_name: table.to_string(),
                pk_value: pk_json.clone(),
                operation: op,
                payload: payload_json.cloned(),
                origin: origin.to_string(),
                timestamp: ts.to_string(),
            });
            Ok(version)
        }
        fn fetch(&self, from_version: i64, limit: i64) -> SyncResult<Vec<Entry>> {
            Ok(self
                .log
                .borrow()
                .iter()
                .filter(|e| e.version > from_version)
                .take(limit as usize)
                .cloned()
                .collect())
        }
        fn get_state(&self, key: &str) -> SyncResult<Option<String>> {
            Ok(self.state.borrow().get(key).cloned())
        }
        fn set_state(&self, key: &str, value: &str) -> SyncResult<()> {
            self.state.borrow_mut().insert(key.to_string(), value.to_string());
            Ok(())
        }
        fn get_session_flag(&self) -> SyncResult<bool> {
            Ok(*self.flag.borrow())
        }
        fn set_session_flag(&self, flag: bool) -> SyncResult<()> {
            *self.flag.borrow_mut() = flag;
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
        fn get_mapping_state(&self, _mapping_id: &str) -> SyncResult<Option<crate::model::MappingState>> {
            Ok(None)
        }
        fn put_mapping_state(&self, _state: &crate::model::MappingState) -> SyncResult<()> {
            Ok(())
        }
        fn get_record_hash(
            &self,
            _mapping_id: &str,
            _source_pk: &Value,
        ) -> SyncResult<Option<crate::model::RecordHash>> {
            Ok(None)
        }
        fn put_record_hash(&self, _hash: &crate::model::RecordHash) -> SyncResult<()> {
            Ok(())
        }
    }

    struct AcceptAll;
    impl ChangeApplier for AcceptAll {
        fn apply_one(&self, _entry: &Entry) -> ApplyOutcome {
            ApplyOutcome::Ok
        }
    }

    #[test]
    fn push_drains_local_log_and_persists_watermark() {
        let store = MemStore::default();
        store
            .append("t", &json!({"id": 1}), Operation::Insert, Some(&json!({"id": 1})), "A", "2025-01-01T00:00:00.000Z")
            .unwrap();
        let applier = AcceptAll;
        let client = SyncClient::new(&store, &applier, "A", BatchConfig::default());

        let sent = RefCell::new(Vec::new());
        let result = client
            .push(|changes| {
                sent.borrow_mut().extend_from_slice(changes);
                Ok(())
            })
            .unwrap();

        assert_eq!(result.pushed, 1);
        assert_eq!(store.get_state(PUSH_VERSION_KEY).unwrap(), Some("1".into()));
    }

    #[test]
    fn pull_applies_remote_batch_and_persists_watermark() {
        let store = MemStore::default();
        let applier = AcceptAll;
        let client = SyncClient::new(&store, &applier, "A", BatchConfig::default());

        let remote = vec![Entry {
            version: 9,
            table_name: "t".into(),
            pk_value: json!({"id": 1}),
            operation: Operation::Insert,
            payload: Some(json!({"id": 1})),
            origin: "B".into(),
            timestamp: "2025-01-01T00:00:00.000Z".into(),
        }];
        let served = RefCell::new(Some(remote));

        let result = client
            .pull(None, |_from, _size| {
                let changes = served.borrow_mut().take().unwrap_or_default();
                Ok(Batch {
                    to_version: changes.last().map(|e| e.version).unwrap_or(0),
                    from_version: 0,
                    has_more: false,
                    changes,
                    hash: None,
                })
            })
            .unwrap();

        assert_eq!(result.to, 9);
        assert_eq!(store.get_state(SERVER_VERSION_KEY).unwrap(), Some("9".into()));
    }
}
