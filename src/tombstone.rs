use chrono::{DateTime, Duration, Utc};

use crate::error::SyncResult;
use crate::model::TrackedClient;
use crate::store::Clock;

/// Default max inactivity before a tracked client is considered stale
/// (spec §4.6, §6).
pub fn default_inactivity_limit() -> Duration {
    Duration::days(90)
}

/// The highest version every tracked client has already seen. `0` when no
/// clients are tracked, which suppresses purging entirely — never purge
/// what nobody has seen (spec §4.6, property P7).
pub fn safe_purge_version(clients: &[TrackedClient]) -> i64 {
    clients
        .iter()
        .map(|c| c.last_sync_version)
        .min()
        .unwrap_or(0)
}

/// Origins whose last sync is older than `now - max_inactivity`.
pub fn find_stale_clients(
    clients: &[TrackedClient],
    now: DateTime<Utc>,
    max_inactivity: Duration,
) -> Vec<String> {
    let cutoff = now - max_inactivity;
    clients
        .iter()
        .filter_map(|c| {
            let last_seen = DateTime::parse_from_rfc3339(&c.last_sync_timestamp).ok()?;
            if last_seen.with_timezone(&Utc) < cutoff {
                Some(c.origin_id.clone())
            } else {
                None
            }
        })
        .collect()
}

/// True when a pulling client's watermark predates the oldest surviving log
/// entry — it has fallen off the retained history and must snapshot-resync
/// (spec §4.6).
pub fn requires_full_resync(client_version: i64, oldest_version: i64) -> bool {
    client_version < oldest_version
}

/// Removes stale clients first (so abandoned clients do not pin the log
/// forever), then computes and applies the safe purge version via
/// `purge_fn`. `clock` is the sole source of "now" (spec §1/§6 lists `Clock`
/// as a kernel collaborator), so callers never stamp this themselves.
pub fn purge(
    clients: &[TrackedClient],
    clock: &dyn Clock,
    max_inactivity: Duration,
    remove_client: impl Fn(&str) -> SyncResult<()>,
    purge_fn: impl FnOnce(i64) -> SyncResult<u64>,
) -> SyncResult<u64> {
    let stale = find_stale_clients(clients, clock.now(), max_inactivity);
    let stale_set: std::collections::HashSet<&str> = stale.iter().map(|s| s.as_str()).collect();
    for origin in &stale {
        remove_client(origin)?;
    }

    let surviving: Vec<TrackedClient> = clients
        .iter()
        .filter(|c| !stale_set.contains(c.origin_id.as_str()))
        .cloned()
        .collect();

    let safe_version = safe_purge_version(&surviving);
    purge_fn(safe_version)
}
