use serde::{Deserialize, Serialize};

use crate::error::SyncResult;
use crate::hash::batch_hash;
use crate::model::Entry;
use crate::store::ChangeLogStore;

/// A page of the change log (spec §4.1, §6 wire format).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Batch {
    pub changes: Vec<Entry>,
    pub from_version: i64,
    pub to_version: i64,
    pub has_more: bool,
    pub hash: Option<String>,
}

/// Produce an ordered page of the log after `from_version`.
///
/// Asks the store for up to `size + 1` entries; if more than `size` come
/// back the last is dropped and `has_more` is set, otherwise `has_more` is
/// false. `to_version` is the greatest version present, or `from_version`
/// when the page is empty.
pub fn fetch_batch(
    store: &dyn ChangeLogStore,
    from_version: i64,
    size: u64,
    verify: bool,
) -> SyncResult<Batch> {
    let ask = size.saturating_add(1) as i64;
    let mut changes = store.fetch(from_version, ask)?;

    let has_more = changes.len() as u64 > size;
    if has_more {
        changes.truncate(size as usize);
    }

    let to_version = changes.last().map(|e| e.version).unwrap_or(from_version);
    let hash = if verify {
        Some(batch_hash(&changes))
    } else {
        None
    };

    Ok(Batch {
        changes,
        from_version,
        to_version,
        has_more,
        hash,
    })
}
