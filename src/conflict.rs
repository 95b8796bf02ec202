use crate::error::SyncError;
use crate::model::Entry;

/// Two entries conflict iff they describe the same row and were produced by
/// different replicas (spec §4.4).
pub fn is_conflict(a: &Entry, b: &Entry) -> bool {
    a.same_row(b) && a.origin != b.origin
}

pub enum ConflictStrategy {
    /// Compare `(timestamp, version)`; higher wins. Ties break on version,
    /// which keeps the result deterministic even under clock skew.
    LastWriteWins,
    ServerWins,
    ClientWins,
    Custom(Box<dyn Fn(&Entry, &Entry) -> ConflictOutcome>),
}

pub enum ConflictOutcome {
    Resolved(Entry),
    Unresolved,
}

/// Resolve a conflict between `local` and `remote` under `strategy`.
///
/// LWW compares the entries themselves, not stored row data, so the result
/// is a pure function of its two inputs and is symmetric: `resolve(a, b)`
/// and `resolve(b, a)` pick the same winning entry (property P8).
pub fn resolve(local: &Entry, remote: &Entry, strategy: &ConflictStrategy) -> Result<Entry, SyncError> {
    match strategy {
        ConflictStrategy::LastWriteWins => {
            if local.lww_key() >= remote.lww_key() {
                Ok(local.clone())
            } else {
                Ok(remote.clone())
            }
        }
        ConflictStrategy::ServerWins => Ok(remote.clone()),
        ConflictStrategy::ClientWins => Ok(local.clone()),
        ConflictStrategy::Custom(f) => match f(local, remote) {
            ConflictOutcome::Resolved(e) => Ok(e),
            ConflictOutcome::Unresolved => Err(SyncError::UnresolvedConflict {
                local: Box::new(local.clone()),
                remote: Box::new(remote.clone()),
            }),
        },
    }
}
