//! Reconciliation between feed events and destination state.

use std::collections::HashSet;

use crate::event::CanonicalEvent;

/// An event as it currently exists in the destination calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEvent {
    /// Destination event id. Matches the content id for events this tool
    /// created; anything else never matches and is treated as stale.
    pub id: String,
    /// Present for logging only.
    pub summary: Option<String>,
}

/// The outcome of comparing a feed's events with destination state.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Events absent from the destination, in feed order.
    pub to_insert: Vec<CanonicalEvent>,
    /// Destination ids to remove, in listing order. Always empty unless
    /// stale removal was requested.
    pub to_delete: Vec<String>,
    /// Ids present on both sides, left untouched.
    pub unchanged: Vec<String>,
}

impl ReconcilePlan {
    /// True when the plan performs no destination writes.
    pub fn is_noop(&self) -> bool {
        self.to_insert.is_empty() && self.to_delete.is_empty()
    }
}

/// Computes the reconciliation plan for a feed against destination state.
///
/// Matching is by id alone: ids are content hashes, so an id present on
/// both sides means the stored event is already byte-for-byte what the
/// feed wants. When `remove_stale` is false, destination events missing
/// from the feed are left alone entirely.
///
/// Neither input is mutated; running the same inputs twice yields the
/// same plan.
pub fn reconcile(
    new_events: Vec<CanonicalEvent>,
    existing: &[RemoteEvent],
    remove_stale: bool,
) -> ReconcilePlan {
    let mut unchanged = Vec::new();
    let mut to_delete = Vec::new();

    {
        let new_ids: HashSet<&str> = new_events.iter().map(|e| e.id.as_str()).collect();
        for remote in existing {
            if new_ids.contains(remote.id.as_str()) {
                unchanged.push(remote.id.clone());
            } else if remove_stale {
                to_delete.push(remote.id.clone());
            }
        }
    }

    let matched: HashSet<&str> = unchanged.iter().map(|id| id.as_str()).collect();
    let to_insert = new_events
        .into_iter()
        .filter(|e| !matched.contains(e.id.as_str()))
        .collect();

    ReconcilePlan {
        to_insert,
        to_delete,
        unchanged,
    }
}
