use crate::batch::Batch;
use crate::error::{SyncError, SyncResult};
use crate::model::Entry;
use crate::store::{ApplyOutcome, ChangeApplier};

/// Outcome of applying a full batch (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyResult {
    pub applied: u64,
    pub skipped: u64,
    pub to_version: i64,
}

pub const DEFAULT_MAX_RETRY_PASSES: u32 = 3;

/// Apply a batch of entries to the local store with foreign-key-aware
/// ordering and echo prevention (spec §4.2).
///
/// `apply_one` is called once per non-echo entry per pass; it should be the
/// same idempotent host callback described in the `ChangeApplier` contract.
pub fn apply_batch(
    batch: &Batch,
    my_origin_id: &str,
    max_retry_passes: u32,
    mut apply_one: impl FnMut(&Entry) -> ApplyOutcome,
) -> SyncResult<ApplyResult> {
    let mut applied: u64 = 0;
    let mut skipped: u64 = 0;
    let mut deferred: Vec<&Entry> = Vec::new();

    // Echo skip + first pass, in strict version-ascending order (O1). The
    // store is expected to hand back entries already sorted by version;
    // `fetch_batch` guarantees this.
    for entry in &batch.changes {
        if entry.origin == my_origin_id {
            skipped += 1;
            continue;
        }
        match apply_one(entry) {
            ApplyOutcome::Ok => applied += 1,
            ApplyOutcome::FkDeferred => deferred.push(entry),
            ApplyOutcome::Fatal(err) => return Err(err),
        }
    }

    // Retry passes: each may resolve entries whose FK targets were created
    // by earlier entries in this batch. Stop early once a pass resolves
    // nothing.
    for _pass in 0..max_retry_passes {
        if deferred.is_empty() {
            break;
        }
        let mut still_deferred = Vec::with_capacity(deferred.len());
        let mut resolved_this_pass = 0u64;
        for entry in deferred {
            match apply_one(entry) {
                ApplyOutcome::Ok => {
                    applied += 1;
                    resolved_this_pass += 1;
                }
                ApplyOutcome::FkDeferred => still_deferred.push(entry),
                ApplyOutcome::Fatal(err) => return Err(err),
            }
        }
        deferred = still_deferred;
        if resolved_this_pass == 0 {
            break;
        }
    }

    if let Some(first) = deferred.first() {
        return Err(SyncError::DeferredChangeFailed {
            entry: Box::new((*first).clone()),
            reason: format!(
                "{} entries still deferred after {} retry passes",
                deferred.len(),
                max_retry_passes
            ),
        });
    }

    Ok(ApplyResult {
        applied,
        skipped,
        to_version: batch.to_version,
    })
}

/// Convenience wrapper over a `ChangeApplier` trait object, for hosts that
/// prefer an object rather than a closure.
pub fn apply_batch_with(
    batch: &Batch,
    my_origin_id: &str,
    max_retry_passes: u32,
    applier: &dyn ChangeApplier,
) -> SyncResult<ApplyResult> {
    apply_batch(batch, my_origin_id, max_retry_passes, |entry| {
        applier.apply_one(entry)
    })
}
