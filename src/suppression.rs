use crate::error::SyncResult;
use crate::store::ChangeLogStore;

/// A per-connection trigger-suppression token (spec §4.8).
///
/// Reshaped per the redesign note in spec §9 away from a global
/// per-process flag: `enable` returns a guard bound to the store it was
/// enabled on, and dropping it disables suppression again — including on
/// every error path, since `Drop` always runs.
pub struct SuppressionGuard<'a> {
    store: &'a dyn ChangeLogStore,
    // Set to true once disabled, so `Drop` does not double-disable after an
    // explicit `disable()` call.
    active: bool,
}

impl<'a> SuppressionGuard<'a> {
    pub fn disable(mut self) -> SyncResult<()> {
        self.active = false;
        self.store.set_session_flag(false)
    }
}

impl<'a> Drop for SuppressionGuard<'a> {
    fn drop(&mut self) {
        if self.active {
            let _ = self.store.set_session_flag(false);
        }
    }
}

/// Sets the session flag to true and returns a guard that restores it to
/// false, guaranteeing the flag is false outside of pull-apply windows even
/// on error paths (spec §4.8, §5 O3).
pub fn enable(store: &dyn ChangeLogStore) -> SyncResult<SuppressionGuard<'_>> {
    store.set_session_flag(true)?;
    Ok(SuppressionGuard {
        store,
        active: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Operation;
    use serde_json::Value;
    use std::cell::Cell;

    struct FlagStore {
        flag: Cell<bool>,
    }

    impl ChangeLogStore for FlagStore {
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
        fn fetch(&self, _from_version: i64, _limit: i64) -> SyncResult<Vec<crate::model::Entry>> {
            Ok(vec![])
        }
        fn get_state(&self, _key: &str) -> SyncResult<Option<String>> {
            Ok(None)
        }
        fn set_state(&self, _key: &str, _value: &str) -> SyncResult<()> {
            Ok(())
        }
        fn get_session_flag(&self) -> SyncResult<bool> {
            Ok(self.flag.get())
        }
        fn set_session_flag(&self, flag: bool) -> SyncResult<()> {
            self.flag.set(flag);
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
        fn get_mapping_state(
            &self,
            _mapping_id: &str,
        ) -> SyncResult<Option<crate::model::MappingState>> {
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

    #[test]
    fn guard_disables_on_drop() {
        let store = FlagStore {
            flag: Cell::new(false),
        };
        {
            let _guard = enable(&store).unwrap();
            assert!(store.flag.get());
        }
        assert!(!store.flag.get());
    }

    #[test]
    fn guard_disables_on_explicit_call() {
        let store = FlagStore {
            flag: Cell::new(false),
        };
        let guard = enable(&store).unwrap();
        guard.disable().unwrap();
        assert!(!store.flag.get());
    }
}
