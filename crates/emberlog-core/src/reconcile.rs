use crate::incident::Incident;
use std::cmp::Ordering;

/// Cap applied to the live list when no page size is in effect.
pub const DEFAULT_CAP: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The id was already held; the list is untouched.
    Duplicate,
    /// The incident is in the list; `evicted` older records fell off the end.
    Inserted { evicted: usize },
    /// The list was full of newer records and the incident itself fell off.
    Dropped,
}

/// Merge one arrived incident into a newest-first list.
///
/// First write wins: an id already present anywhere in `current` leaves it unchanged,
/// even when the incoming copy is newer.
pub fn merge_incident(incoming: Incident, current: &[Incident], cap: usize) -> Vec<Incident> {
    let mut next = current.to_vec();
    merge_into(&mut next, incoming, cap);
    next
}

/// In-place form of [`merge_incident`] that also reports what happened.
pub fn merge_into(list: &mut Vec<Incident>, incoming: Incident, cap: usize) -> MergeOutcome {
    if list.iter().any(|existing| existing.id == incoming.id) {
        return MergeOutcome::Duplicate;
    }

    let incoming_id = incoming.id;
    list.insert(0, incoming);
    sort_newest_first(list);

    let evicted = list.len().saturating_sub(cap);
    list.truncate(cap);

    if list.iter().any(|existing| existing.id == incoming_id) {
        MergeOutcome::Inserted { evicted }
    } else {
        MergeOutcome::Dropped
    }
}

pub fn sort_newest_first(list: &mut [Incident]) {
    list.sort_by(newest_first);
}

/// Total order: dispatched_at descending, then id descending.
///
/// Parseable timestamps compare as instants. Unparseable ones sort after all parseable
/// ones, by raw string descending.
pub fn newest_first(a: &Incident, b: &Incident) -> Ordering {
    let by_time = match (a.dispatched_at_utc(), b.dispatched_at_utc()) {
        (Some(ta), Some(tb)) => tb.cmp(&ta),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.dispatched_at.cmp(&a.dispatched_at),
    };
    by_time.then_with(|| b.id.cmp(&a.id))
}
