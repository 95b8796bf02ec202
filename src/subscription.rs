use crate::hash::canonical_json;
use crate::model::{Entry, Subscription, SubscriptionType};

/// A subscription that should be notified about `entry`, or flagged as a
/// candidate for host-defined predicate evaluation (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match<'a> {
    Matched(&'a str),
    /// `Query` subscriptions have no defined matcher in the kernel; the
    /// host must evaluate the predicate itself (spec §9 open question).
    Candidate(&'a str),
}

/// Returns the subscriptions that should be notified about a newly-appended
/// entry, filtering out expired subscriptions first.
pub fn match_subscriptions<'a>(
    subscriptions: &'a [Subscription],
    entry: &Entry,
    now: &str,
) -> Vec<Match<'a>> {
    subscriptions
        .iter()
        .filter(|s| !is_expired(s, now))
        .filter_map(|s| match_one(s, entry))
        .collect()
}

/// Expiry comparison is lexicographic on ISO-8601 strings, which is correct
/// because all timestamps are zero-padded UTC (spec §4.5, §9).
fn is_expired(sub: &Subscription, now: &str) -> bool {
    match &sub.expires_at {
        Some(expires_at) => expires_at.as_str() < now,
        None => false,
    }
}

fn match_one<'a>(sub: &'a Subscription, entry: &Entry) -> Option<Match<'a>> {
    if sub.table_name != entry.table_name {
        return None;
    }
    match sub.kind {
        SubscriptionType::Table => Some(Match::Matched(&sub.subscription_id)),
        SubscriptionType::Record => {
            let filter = sub.filter.as_ref()?;
            let canonical_filter = canonical_json(filter);
            let canonical_pk = canonical_json(&entry.pk_value);
            if canonical_filter.contains(&canonical_pk) {
                Some(Match::Matched(&sub.subscription_id))
            } else {
                None
            }
        }
        SubscriptionType::Query => Some(Match::Candidate(&sub.subscription_id)),
    }
}
