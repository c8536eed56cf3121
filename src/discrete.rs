//! Discrete reconciliation
//!
//! Non-duration targets record plain counts. An incoming event either lands
//! on an existing point with the same `(target, timestamp, rater)` identity,
//! in which case only the fields the event actually carries are applied, or
//! it appends a fresh count point. No interval concept applies here.

use chrono::{DateTime, Utc};

use crate::schema::raw_event::RawEvent;
use crate::types::{PointState, TrackedPoint};

/// What a discrete merge did to the point list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscreteOutcome {
    /// A new count point was appended
    Appended { index: usize },
    /// An existing point's detail fields were overwritten
    Updated { index: usize },
    /// An existing point received a tombstone
    Tombstoned { index: usize },
    /// A removal referenced a point that does not exist
    SourceMismatch,
    /// Nothing changed (redelivered event carrying no new fields)
    NoOp,
}

impl DiscreteOutcome {
    /// Whether the aggregate needs persisting after this merge
    pub fn is_dirty(&self) -> bool {
        !matches!(
            self,
            DiscreteOutcome::SourceMismatch | DiscreteOutcome::NoOp
        )
    }

    /// Index of a committed, reportable point worth notifying about.
    /// Tombstones are not reportable.
    pub fn notified_index(&self) -> Option<usize> {
        match self {
            DiscreteOutcome::Appended { index } | DiscreteOutcome::Updated { index } => {
                Some(*index)
            }
            _ => None,
        }
    }
}

/// Merge one event for a non-duration target into the point list.
///
/// `timestamp` is the event's resolved timestamp and `now` is the wall clock
/// used for tombstone dates. The identity lookup is exact: target, timestamp
/// and rater must all match for an update instead of an append.
pub fn merge_discrete<P: TrackedPoint>(
    points: &mut Vec<P>,
    event: &RawEvent,
    timestamp: DateTime<Utc>,
    now: DateTime<Utc>,
) -> DiscreteOutcome {
    let found = points.iter().position(|p| {
        p.target_id() == event.target_id
            && p.timestamp() == timestamp
            && p.rater() == event.source.rater
    });

    match found {
        Some(index) => {
            if event.remove {
                if points[index].is_deleted() {
                    return DiscreteOutcome::NoOp;
                }
                // A removal still carries its details onto the point before
                // it freezes
                points[index].merge_event_details(event);
                points[index].tombstone(&event.source.rater, now);
                return DiscreteOutcome::Tombstoned { index };
            }
            let changed = points[index].merge_event_details(event);
            if changed {
                DiscreteOutcome::Updated { index }
            } else {
                DiscreteOutcome::NoOp
            }
        }
        None => {
            if event.remove {
                return DiscreteOutcome::SourceMismatch;
            }
            points.push(P::from_event(event, timestamp, PointState::Count));
            DiscreteOutcome::Appended {
                index: points.len() - 1,
            }
        }
    }
}
