//! Incremental duration reconciliation
//!
//! Duration-tracked targets follow an open/close state machine driven by
//! presses: the first press opens an interval, the next one closes it with
//! the elapsed time. Matching is rater-blind and prefers the current local
//! day; whether an event may close an interval opened on an earlier day is a
//! [`WindowPolicy`] decision. There is no timeout that closes a stale open
//! interval outside an explicit rebuild.
//!
//! Out-of-order arrivals that would produce a negative duration, and events
//! carrying `redo_durations`, are handed to the rebuild engine instead of
//! being patched incrementally.

use chrono::{DateTime, Utc};

use crate::rebuild::rebuild_with_event;
use crate::schema::raw_event::RawEvent;
use crate::types::{PointState, TrackedPoint};
use crate::window::WindowPolicy;

/// What a duration merge did to the point list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationOutcome {
    /// A new open interval was started
    Opened { index: usize },
    /// An open interval was closed by this event
    Closed { index: usize, duration_ms: i64 },
    /// An exact-timestamp match took the event's duration in place
    Updated { index: usize },
    /// A point received a tombstone
    Tombstoned { index: usize },
    /// No open interval existed; the event's explicit duration was stored
    /// as a ready-closed point
    AppendedClosed { index: usize },
    /// The event was handed to the rebuild engine
    Rebuilt { target_points: usize },
    /// A removal referenced a point that does not exist
    SourceMismatch,
    /// Nothing changed (redelivered event)
    NoOp,
}

impl DurationOutcome {
    /// Whether the aggregate needs persisting after this merge
    pub fn is_dirty(&self) -> bool {
        !matches!(
            self,
            DurationOutcome::SourceMismatch | DurationOutcome::NoOp
        )
    }

    /// Index of a committed, reportable point worth notifying about.
    /// Opens and tombstones are not reportable; rebuilds touch too many
    /// points to single one out.
    pub fn notified_index(&self) -> Option<usize> {
        match self {
            DurationOutcome::Closed { index, .. }
            | DurationOutcome::Updated { index }
            | DurationOutcome::AppendedClosed { index } => Some(*index),
            _ => None,
        }
    }
}

/// Merge one event for a duration-tracked target into the point list.
pub fn apply_duration<P: TrackedPoint>(
    points: &mut Vec<P>,
    event: &RawEvent,
    timestamp: DateTime<Utc>,
    now: DateTime<Utc>,
    policy: &WindowPolicy,
) -> DurationOutcome {
    if event.redo_durations {
        let target_points = rebuild_with_event(points, event, timestamp, now);
        return DurationOutcome::Rebuilt { target_points };
    }

    // Exact-timestamp identity wins over interval pairing. Rater-blind, any
    // status; the latest entry takes the update when several share the
    // instant.
    if let Some(index) = points
        .iter()
        .rposition(|p| p.target_id() == event.target_id && p.timestamp() == timestamp)
    {
        if event.remove {
            if points[index].is_deleted() {
                return DurationOutcome::NoOp;
            }
            if let Some(duration_ms) = event.duration_ms {
                points[index].set_state(PointState::Closed { duration_ms });
            }
            points[index].tombstone(&event.source.rater, now);
            return DurationOutcome::Tombstoned { index };
        }
        let mut updated = false;
        if let Some(duration_ms) = event.duration_ms {
            let closed = PointState::Closed { duration_ms };
            if points[index].state() != closed {
                points[index].set_state(closed);
                updated = true;
            }
        }
        return if updated {
            DurationOutcome::Updated { index }
        } else {
            DurationOutcome::NoOp
        };
    }

    // Most recent open interval for the target, same local day first, then
    // anywhere in the aggregate when cross-day closing is allowed
    let open_index = most_recent_open(points, &event.target_id, |p| {
        policy.same_local_day(p.timestamp(), timestamp)
    })
    .or_else(|| {
        if policy.cross_day_close {
            most_recent_open(points, &event.target_id, |_| true)
        } else {
            None
        }
    });

    if let Some(index) = open_index {
        let duration_ms =
            timestamp.timestamp_millis() - points[index].timestamp().timestamp_millis();
        if duration_ms < 0 {
            // The closing press arrived before its opener; re-pair the whole
            // target deterministically instead of storing a negative span
            let target_points = rebuild_with_event(points, event, timestamp, now);
            return DurationOutcome::Rebuilt { target_points };
        }

        points[index].set_state(PointState::Closed { duration_ms });
        points[index].merge_event_details(event);
        if event.remove {
            points[index].tombstone(&event.source.rater, now);
            return DurationOutcome::Tombstoned { index };
        }
        return DurationOutcome::Closed { index, duration_ms };
    }

    if event.remove {
        return DurationOutcome::SourceMismatch;
    }

    // No interval to close: open a new one, or store a ready-closed point
    // when the event carries its own span (manual entry, replay after loss)
    let state = match event.duration_ms {
        Some(duration_ms) => PointState::Closed { duration_ms },
        None => PointState::Open,
    };
    points.push(P::from_event(event, timestamp, state));
    let index = points.len() - 1;
    match state {
        PointState::Open => DurationOutcome::Opened { index },
        _ => DurationOutcome::AppendedClosed { index },
    }
}

fn most_recent_open<P, F>(points: &[P], target_id: &str, in_scope: F) -> Option<usize>
where
    P: TrackedPoint,
    F: Fn(&P) -> bool,
{
    points
        .iter()
        .enumerate()
        .filter(|(_, p)| {
            p.target_id() == target_id && !p.is_deleted() && p.state().is_open() && in_scope(p)
        })
        .max_by_key(|(i, p)| (p.timestamp(), *i))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataPoint, Source, TrackedPoint};
    use chrono::TimeZone;

    fn make_event(behavior: &str, ts_ms: i64) -> RawEvent {
        RawEvent::new(
            "student-1",
            behavior,
            Utc.timestamp_millis_opt(ts_ms).unwrap(),
            Source {
                device: "clicker-07".to_string(),
                rater: "r1".to_string(),
            },
        )
    }

    fn apply(points: &mut Vec<DataPoint>, event: &RawEvent) -> DurationOutcome {
        let ts = event.timestamp.unwrap();
        let now = Utc.timestamp_millis_opt(99_000).unwrap();
        apply_duration(points, event, ts, now, &WindowPolicy::default())
    }

    #[test]
    fn test_press_pair_closes_interval() {
        let mut points: Vec<DataPoint> = Vec::new();

        let start = make_event("B1", 1000);
        assert_eq!(apply(&mut points, &start), DurationOutcome::Opened { index: 0 });
        assert!(points[0].state.is_open());

        let stop = make_event("B1", 1500);
        assert_eq!(
            apply(&mut points, &stop),
            DurationOutcome::Closed {
                index: 0,
                duration_ms: 500
            }
        );

        // One closed point, no residual open interval
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].timestamp.timestamp_millis(), 1000);
        assert_eq!(points[0].state, PointState::Closed { duration_ms: 500 });
    }

    #[test]
    fn test_close_copies_event_details() {
        let mut points: Vec<DataPoint> = Vec::new();
        apply(&mut points, &make_event("B1", 1000));

        let stop = make_event("B1", 4000).with_intensity(2);
        apply(&mut points, &stop);

        assert_eq!(points[0].intensity, Some(2));
    }

    #[test]
    fn test_closes_most_recent_open() {
        let mut points: Vec<DataPoint> = Vec::new();
        // Two opens can coexist after policy-driven appends; the later one
        // takes the close
        points.push(DataPoint::from_event(
            &make_event("B1", 1000),
            Utc.timestamp_millis_opt(1000).unwrap(),
            PointState::Open,
        ));
        points.push(DataPoint::from_event(
            &make_event("B1", 3000),
            Utc.timestamp_millis_opt(3000).unwrap(),
            PointState::Open,
        ));

        let outcome = apply(&mut points, &make_event("B1", 4000));
        assert_eq!(
            outcome,
            DurationOutcome::Closed {
                index: 1,
                duration_ms: 1000
            }
        );
        assert!(points[0].state.is_open());
    }

    #[test]
    fn test_exact_match_takes_supplied_duration() {
        let mut points: Vec<DataPoint> = Vec::new();
        apply(&mut points, &make_event("B1", 1000));

        let report = make_event("B1", 1000).with_duration_ms(250);
        assert_eq!(apply(&mut points, &report), DurationOutcome::Updated { index: 0 });
        assert_eq!(points[0].state, PointState::Closed { duration_ms: 250 });

        // Redelivery of the same report changes nothing
        assert_eq!(apply(&mut points, &report), DurationOutcome::NoOp);
    }

    #[test]
    fn test_redelivered_press_does_not_reopen() {
        let mut points: Vec<DataPoint> = Vec::new();
        apply(&mut points, &make_event("B1", 1000));
        apply(&mut points, &make_event("B1", 1500));
        assert_eq!(points[0].state, PointState::Closed { duration_ms: 500 });

        // The original opening press arrives again after the close
        assert_eq!(apply(&mut points, &make_event("B1", 1000)), DurationOutcome::NoOp);
        assert_eq!(points[0].state, PointState::Closed { duration_ms: 500 });
    }

    #[test]
    fn test_remove_closes_and_tombstones() {
        let mut points: Vec<DataPoint> = Vec::new();
        apply(&mut points, &make_event("B1", 1000));

        let mut removal = make_event("B1", 2000);
        removal.remove = true;
        assert_eq!(apply(&mut points, &removal), DurationOutcome::Tombstoned { index: 0 });

        assert_eq!(points.len(), 1);
        assert!(points[0].is_deleted());
        assert_eq!(points[0].state, PointState::Closed { duration_ms: 1000 });
    }

    #[test]
    fn test_remove_without_match_is_mismatch() {
        let mut points: Vec<DataPoint> = Vec::new();
        let mut removal = make_event("B1", 2000);
        removal.remove = true;

        assert_eq!(apply(&mut points, &removal), DurationOutcome::SourceMismatch);
        assert!(points.is_empty());
    }

    #[test]
    fn test_supplied_duration_without_open_appends_closed() {
        let mut points: Vec<DataPoint> = Vec::new();
        let manual = make_event("B1", 5000).with_duration_ms(90_000).with_manual();

        let outcome = apply(&mut points, &manual);
        assert_eq!(outcome, DurationOutcome::AppendedClosed { index: 0 });
        assert_eq!(points[0].state, PointState::Closed { duration_ms: 90_000 });
        assert!(points[0].is_manual);
        assert_eq!(outcome.notified_index(), Some(0));
    }

    #[test]
    fn test_cross_day_close_follows_policy() {
        // Open at 23:00 UTC, closing press at 01:00 the next day
        let open_ts = Utc.with_ymd_and_hms(2024, 1, 15, 23, 0, 0).unwrap();
        let close_ts = Utc.with_ymd_and_hms(2024, 1, 16, 1, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 16, 2, 0, 0).unwrap();

        let open_event = make_event("B1", open_ts.timestamp_millis());
        let close_event = make_event("B1", close_ts.timestamp_millis());

        let allowing = WindowPolicy::default();
        let mut points: Vec<DataPoint> = Vec::new();
        apply_duration(&mut points, &open_event, open_ts, now, &allowing);
        let outcome = apply_duration(&mut points, &close_event, close_ts, now, &allowing);
        assert_eq!(
            outcome,
            DurationOutcome::Closed {
                index: 0,
                duration_ms: 2 * 60 * 60 * 1000
            }
        );

        let same_day_only = WindowPolicy {
            cross_day_close: false,
            ..WindowPolicy::default()
        };
        let mut points: Vec<DataPoint> = Vec::new();
        apply_duration(&mut points, &open_event, open_ts, now, &same_day_only);
        let outcome = apply_duration(&mut points, &close_event, close_ts, now, &same_day_only);

        // The stale open interval stays; the new press opens its own
        assert_eq!(outcome, DurationOutcome::Opened { index: 1 });
        assert!(points[0].state.is_open());
        assert!(points[1].state.is_open());
    }

    #[test]
    fn test_negative_close_delegates_to_rebuild() {
        let mut points: Vec<DataPoint> = Vec::new();
        apply(&mut points, &make_event("B1", 5000));

        // The opener for an earlier interval arrives late
        let outcome = apply(&mut points, &make_event("B1", 1000));
        assert_eq!(outcome, DurationOutcome::Rebuilt { target_points: 1 });

        // Re-pairing uses press order, not arrival order
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].timestamp.timestamp_millis(), 1000);
        assert_eq!(points[0].state, PointState::Closed { duration_ms: 4000 });
    }

    #[test]
    fn test_redo_routes_to_rebuild() {
        let mut points: Vec<DataPoint> = Vec::new();
        apply(&mut points, &make_event("B1", 1000));
        apply(&mut points, &make_event("B1", 1500));

        let redo = make_event("B1", 1000).with_duration_ms(500).with_redo_durations();
        let outcome = apply(&mut points, &redo);

        assert_eq!(outcome, DurationOutcome::Rebuilt { target_points: 1 });
        assert_eq!(points[0].state, PointState::Closed { duration_ms: 500 });
        assert!(outcome.is_dirty());
        assert_eq!(outcome.notified_index(), None);
    }
}
