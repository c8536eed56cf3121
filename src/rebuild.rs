//! Deterministic interval rebuild
//!
//! Incremental open/close pairing depends on delivery order. When a producer
//! requests `redo_durations`, or when out-of-order delivery makes an
//! incremental close impossible, the target's whole history is flattened
//! back into a press stream and re-paired from scratch: every point
//! contributes its start, every closed point additionally contributes a
//! synthesized stop at `timestamp + duration`, and the sorted stream is
//! walked with a single open cursor. The result depends only on the set of
//! points, never on the order they arrived in, and re-running the rebuild on
//! its own output changes nothing.
//!
//! Tombstoned points are frozen: they keep their stored pairing, contribute
//! no presses, and are carried through untouched.

use chrono::{DateTime, Duration, Utc};

use crate::dedup::canonical_sort;
use crate::schema::raw_event::RawEvent;
use crate::types::{PointState, TrackedPoint};

struct Entry<P> {
    point: P,
    marker: bool,
}

/// Upsert the triggering event into the point list, then rebuild its target.
///
/// The upsert follows exact-timestamp identity: a matching point takes the
/// event's duration (when supplied) and tombstone request; otherwise a new
/// press is appended. Returns the number of target points after the rebuild.
pub fn rebuild_with_event<P: TrackedPoint>(
    points: &mut Vec<P>,
    event: &RawEvent,
    timestamp: DateTime<Utc>,
    now: DateTime<Utc>,
) -> usize {
    let found = points
        .iter()
        .rposition(|p| p.target_id() == event.target_id && p.timestamp() == timestamp);

    match found {
        Some(index) => {
            if let Some(duration_ms) = event.duration_ms {
                points[index].set_state(PointState::Closed { duration_ms });
            }
            if event.remove {
                points[index].tombstone(&event.source.rater, now);
            }
        }
        None => {
            if !event.remove {
                let state = match event.duration_ms {
                    Some(duration_ms) => PointState::Closed { duration_ms },
                    None => PointState::Open,
                };
                points.push(P::from_event(event, timestamp, state));
            }
        }
    }

    rebuild_target(points, &event.target_id)
}

/// Re-pair every interval for one target from its point history.
///
/// Returns the number of target points (active plus tombstoned) afterwards.
pub fn rebuild_target<P: TrackedPoint>(points: &mut Vec<P>, target_id: &str) -> usize {
    let mut others: Vec<P> = Vec::new();
    let mut frozen: Vec<P> = Vec::new();
    let mut active: Vec<P> = Vec::new();
    for point in points.drain(..) {
        if point.target_id() != target_id {
            others.push(point);
        } else if point.is_deleted() {
            frozen.push(point);
        } else {
            active.push(point);
        }
    }

    // Flatten to a press stream: each point is a start, each stored duration
    // contributes its historical stop back as a marker. A stop instant too
    // far out to represent contributes no marker; its press then re-pairs
    // like any unstopped interval.
    let mut working: Vec<Entry<P>> = Vec::new();
    for point in active {
        if let Some(duration_ms) = point.state().duration_ms() {
            if let Some(stop) = point
                .timestamp()
                .checked_add_signed(Duration::milliseconds(duration_ms))
            {
                let mut marker = point.clone();
                marker.set_timestamp(stop);
                working.push(Entry {
                    point: marker,
                    marker: true,
                });
            }
        }
        working.push(Entry {
            point,
            marker: false,
        });
    }

    // Total order so re-pairing never depends on arrival order. Stops sort
    // before starts at the same instant, letting a recovered stop close the
    // running interval rather than collapse into the press that follows it.
    working.sort_by(|a, b| {
        a.point
            .timestamp()
            .cmp(&b.point.timestamp())
            .then_with(|| b.marker.cmp(&a.marker))
            .then_with(|| a.point.rater().cmp(b.point.rater()))
            .then_with(|| a.point.source().device.cmp(&b.point.source().device))
    });

    // Single-cursor walk: first press opens, next press closes and is
    // consumed by the pairing, a trailing press stays open.
    let mut rebuilt: Vec<P> = Vec::new();
    let mut open_cursor: Option<usize> = None;
    for entry in working {
        match open_cursor {
            None => {
                let mut point = entry.point;
                point.set_state(PointState::Open);
                rebuilt.push(point);
                open_cursor = Some(rebuilt.len() - 1);
            }
            Some(idx) => {
                let duration_ms = entry.point.timestamp().timestamp_millis()
                    - rebuilt[idx].timestamp().timestamp_millis();
                rebuilt[idx].set_state(PointState::Closed { duration_ms });
                open_cursor = None;
            }
        }
    }

    let target_count = rebuilt.len() + frozen.len();
    *points = others;
    points.extend(frozen);
    points.extend(rebuilt);
    canonical_sort(points);
    target_count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataPoint, PointStatus, Source, TrackedPoint};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn make_point(behavior: &str, ts_ms: i64, state: PointState) -> DataPoint {
        DataPoint {
            behavior_id: behavior.to_string(),
            timestamp: Utc.timestamp_millis_opt(ts_ms).unwrap(),
            state,
            source: Source {
                device: "clicker-07".to_string(),
                rater: "r1".to_string(),
            },
            abc: None,
            intensity: None,
            is_manual: false,
            status: PointStatus::Active,
        }
    }

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

    fn now() -> chrono::DateTime<Utc> {
        Utc.timestamp_millis_opt(99_000).unwrap()
    }

    #[test]
    fn test_press_stream_pairs_alternately() {
        let mut points = vec![
            make_point("B1", 1000, PointState::Open),
            make_point("B1", 2000, PointState::Open),
            make_point("B1", 5000, PointState::Open),
        ];
        rebuild_target(&mut points, "B1");

        // Two presses pair into one interval, the trailing press stays open
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].state, PointState::Closed { duration_ms: 1000 });
        assert_eq!(points[1].state, PointState::Open);
        assert_eq!(points[1].timestamp.timestamp_millis(), 5000);
    }

    #[test]
    fn test_closed_points_survive_via_markers() {
        let mut points = vec![
            make_point("B1", 1000, PointState::Closed { duration_ms: 500 }),
            make_point("B1", 3000, PointState::Closed { duration_ms: 200 }),
        ];
        rebuild_target(&mut points, "B1");

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].state, PointState::Closed { duration_ms: 500 });
        assert_eq!(points[1].state, PointState::Closed { duration_ms: 200 });
    }

    #[test]
    fn test_unrepresentable_stop_drops_marker() {
        // A stored duration whose stop instant cannot be represented must
        // not abort the rebuild; the press re-pairs as an open interval
        let mut points = vec![make_point(
            "B1",
            1000,
            PointState::Closed {
                duration_ms: i64::MAX,
            },
        )];
        rebuild_target(&mut points, "B1");

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].state, PointState::Open);

        let once = points.clone();
        rebuild_target(&mut points, "B1");
        assert_eq!(points, once);
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let mut points = vec![
            make_point("B1", 1000, PointState::Closed { duration_ms: 500 }),
            make_point("B1", 2000, PointState::Open),
            make_point("B1", 4000, PointState::Open),
            make_point("B1", 9000, PointState::Open),
        ];
        rebuild_target(&mut points, "B1");
        let once = points.clone();

        rebuild_target(&mut points, "B1");
        assert_eq!(points, once);
    }

    #[test]
    fn test_rebuild_is_order_invariant() {
        let base = vec![
            make_point("B1", 1000, PointState::Closed { duration_ms: 500 }),
            make_point("B1", 2000, PointState::Open),
            make_point("B1", 4000, PointState::Open),
        ];

        let mut forward = base.clone();
        let mut reversed: Vec<DataPoint> = base.iter().rev().cloned().collect();
        let mut rotated = vec![base[2].clone(), base[0].clone(), base[1].clone()];

        rebuild_target(&mut forward, "B1");
        rebuild_target(&mut reversed, "B1");
        rebuild_target(&mut rotated, "B1");

        assert_eq!(forward, reversed);
        assert_eq!(forward, rotated);
    }

    #[test]
    fn test_replayed_closed_event_collapses() {
        // An already-closed point replayed with redo_durations and the same
        // duration converges to the same single closed point
        let mut points = vec![make_point("B1", 1000, PointState::Closed { duration_ms: 500 })];
        let event = make_event("B1", 1000).with_duration_ms(500);

        let count = rebuild_with_event(&mut points, &event, event.timestamp.unwrap(), now());

        assert_eq!(count, 1);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].state, PointState::Closed { duration_ms: 500 });
        assert_eq!(points[0].timestamp.timestamp_millis(), 1000);
    }

    #[test]
    fn test_tombstoned_points_keep_their_pairing() {
        let mut deleted = make_point("B1", 1000, PointState::Closed { duration_ms: 700 });
        deleted.tombstone("r2", now());
        let mut points = vec![
            deleted.clone(),
            make_point("B1", 2000, PointState::Open),
            make_point("B1", 6000, PointState::Open),
        ];
        rebuild_target(&mut points, "B1");

        // The deleted point is untouched and contributes nothing to pairing
        assert_eq!(points.len(), 2);
        assert_eq!(points[0], deleted);
        assert_eq!(points[1].state, PointState::Closed { duration_ms: 4000 });
    }

    #[test]
    fn test_other_targets_untouched() {
        let mut points = vec![
            make_point("B1", 1000, PointState::Open),
            make_point("B2", 1500, PointState::Open),
            make_point("B1", 3000, PointState::Open),
        ];
        rebuild_target(&mut points, "B1");

        assert_eq!(points.len(), 2);
        let b2: Vec<&DataPoint> = points.iter().filter(|p| p.behavior_id == "B2").collect();
        assert_eq!(b2.len(), 1);
        assert_eq!(b2[0].state, PointState::Open);
    }

    #[test]
    fn test_upsert_appends_fresh_press() {
        let mut points: Vec<DataPoint> = Vec::new();
        let event = make_event("B1", 4000).with_redo_durations();

        rebuild_with_event(&mut points, &event, event.timestamp.unwrap(), now());

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].state, PointState::Open);
    }

    #[test]
    fn test_upsert_removal_freezes_point() {
        let mut points = vec![
            make_point("B1", 1000, PointState::Closed { duration_ms: 500 }),
            make_point("B1", 3000, PointState::Open),
        ];
        let mut event = make_event("B1", 1000);
        event.remove = true;

        rebuild_with_event(&mut points, &event, event.timestamp.unwrap(), now());

        assert_eq!(points.len(), 2);
        assert!(points[0].is_deleted());
        // The frozen point keeps its duration; the live press stays open
        assert_eq!(points[0].state, PointState::Closed { duration_ms: 500 });
        assert_eq!(points[1].state, PointState::Open);
    }
}
