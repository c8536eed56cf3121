//! Point deduplication
//!
//! At-least-once delivery means the same press can land in an aggregate
//! twice. Before any reconciliation runs, the point list is brought into
//! canonical order and collapsed so no two points share `(timestamp, rater)`
//! for the same target, keeping the first occurrence. Tombstoned points keep
//! their identity here; a redelivered copy of a deleted press collapses into
//! the tombstone instead of resurrecting the point.

use std::collections::HashSet;

use crate::types::TrackedPoint;

/// Stable canonical ordering: ascending timestamp, ties broken by rater
pub fn canonical_sort<P: TrackedPoint>(points: &mut [P]) {
    points.sort_by(|a, b| {
        a.timestamp()
            .cmp(&b.timestamp())
            .then_with(|| a.rater().cmp(b.rater()))
    });
}

/// Sort the list canonically and drop duplicate points.
///
/// Returns the number of points removed; a non-zero count means the
/// aggregate changed and must be persisted even if no event applies to it.
pub fn dedup_points<P: TrackedPoint>(points: &mut Vec<P>) -> usize {
    canonical_sort(points);

    let before = points.len();
    let mut seen: HashSet<(String, i64, String)> = HashSet::new();
    points.retain(|p| {
        seen.insert((
            p.target_id().to_string(),
            p.timestamp().timestamp_millis(),
            p.rater().to_string(),
        ))
    });
    before - points.len()
}
