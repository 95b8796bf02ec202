use crate::applier::apply_batch;
use crate::batch::Batch;
use crate::config::BatchConfig;
use crate::error::{SyncError, SyncResult};
use crate::model::Entry;
use crate::store::{ApplyOutcome, ChangeLogStore};
use crate::suppression;
use crate::tombstone::requires_full_resync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PullResult {
    pub applied: u64,
    pub from: i64,
    pub to: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushResult {
    pub pushed: u64,
    pub from: i64,
    pub to: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncResultSummary {
    pub pull: PullResult,
    pub push: PushResult,
}

/// Pull remote changes and apply them locally until the remote reports no
/// more pages (spec §4.3).
///
/// Trigger suppression is held for the entire loop via `SuppressionGuard`,
/// so applied rows never generate new local log entries, and it is lifted
/// on every exit path including early returns on error (O3).
///
/// `oldest_remote_version`, when known, lets the coordinator detect that
/// `last_server_version` has fallen off the remote's retained history
/// before attempting to fetch anything (spec §4.6, §7).
pub fn pull(
    store: &dyn ChangeLogStore,
    my_origin_id: &str,
    last_server_version: i64,
    cfg: &BatchConfig,
    oldest_remote_version: Option<i64>,
    mut fetch_remote: impl FnMut(i64, u64) -> SyncResult<Batch>,
    mut apply_one: impl FnMut(&Entry) -> ApplyOutcome,
    mut store_server_version: impl FnMut(i64) -> SyncResult<()>,
) -> SyncResult<PullResult> {
    if let Some(oldest) = oldest_remote_version {
        if requires_full_resync(last_server_version, oldest) {
            return Err(SyncError::FullResyncRequired {
                client_version: last_server_version,
                oldest_version: oldest,
            });
        }
    }

    let _guard = suppression::enable(store)?;

    let mut current = last_server_version;
    let mut applied_total = 0u64;

    loop {
        let batch = fetch_remote(current, cfg.batch_size)?;
        if batch.changes.is_empty() {
            break;
        }

        let result = apply_batch(&batch, my_origin_id, cfg.max_retry_passes, &mut apply_one)?;
        applied_total += result.applied;
        current = batch.to_version;
        store_server_version(current)?;

        if !batch.has_more {
            break;
        }
    }

    Ok(PullResult {
        applied: applied_total,
        from: last_server_version,
        to: current,
    })
}

/// Push local changes to the remote in batches until the local log reports
/// no more pages (spec §4.3). Echo prevention on replay is the server's
/// responsibility (origin-skip during its own pull, spec §4.2).
pub fn push(
    last_push_version: i64,
    cfg: &BatchConfig,
    mut fetch_local: impl FnMut(i64, u64) -> SyncResult<Batch>,
    mut send_remote: impl FnMut(&[Entry]) -> SyncResult<()>,
    mut store_push_version: impl FnMut(i64) -> SyncResult<()>,
) -> SyncResult<PushResult> {
    let mut current = last_push_version;
    let mut pushed_total = 0u64;

    loop {
        let batch = fetch_local(current, cfg.batch_size)?;
        if batch.changes.is_empty() {
            break;
        }

        send_remote(&batch.changes)?;
        pushed_total += batch.changes.len() as u64;
        current = batch.to_version;
        store_push_version(current)?;

        if !batch.has_more {
            break;
        }
    }

    Ok(PushResult {
        pushed: pushed_total,
        from: last_push_version,
        to: current,
    })
}

/// Pull then push. Either phase's error fails the whole operation, but each
/// phase's durably-persisted watermark survives (spec §4.3).
#[allow(clippy::too_many_arguments)]
pub fn sync(
    store: &dyn ChangeLogStore,
    my_origin_id: &str,
    last_server_version: i64,
    last_push_version: i64,
    cfg: &BatchConfig,
    oldest_remote_version: Option<i64>,
    fetch_remote: impl FnMut(i64, u64) -> SyncResult<Batch>,
    apply_one: impl FnMut(&Entry) -> ApplyOutcome,
    store_server_version: impl FnMut(i64) -> SyncResult<()>,
    fetch_local: impl FnMut(i64, u64) -> SyncResult<Batch>,
    send_remote: impl FnMut(&[Entry]) -> SyncResult<()>,
    store_push_version: impl FnMut(i64) -> SyncResult<()>,
) -> SyncResult<SyncResultSummary> {
    let pull_result = pull(
        store,
        my_origin_id,
        last_server_version,
        cfg,
        oldest_remote_version,
        fetch_remote,
        apply_one,
        store_server_version,
    )?;

    let push_result = push(last_push_version, cfg, fetch_local, send_remote, store_push_version)?;

    Ok(SyncResultSummary {
        pull: pull_result,
        push: push_result,
    })
}
