//! Canonical report types
//!
//! This module defines the stored shapes of the weekly report: behavior and
//! service points, their interval state, soft-delete tombstones, and the
//! week-scoped aggregate that owns them. Incoming events are defined
//! separately in [`crate::schema`]; the reconcilers bridge the two.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::raw_event::RawEvent;

/// Where a tracked occurrence came from: the emitting device and the team
/// member who recorded it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Device identifier (e.g. "clicker-07", "app:ios", "web")
    pub device: String,
    /// Rater (team member) identifier
    pub rater: String,
}

/// Antecedent/consequence observations attached to a behavior occurrence
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Abc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub antecedent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consequence: Option<String>,
}

/// Interval state of a point.
///
/// Discrete occurrences are `Count` and never move. Duration-tracked
/// occurrences start `Open` (stop time unknown) and become `Closed` once a
/// stop event pairs with them. An open point with a duration, or a closed
/// point without one, cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PointState {
    /// Discrete occurrence; no interval concept applies
    Count,
    /// Duration interval awaiting its stop
    Open,
    /// Completed interval
    Closed { duration_ms: i64 },
}

impl PointState {
    pub fn is_open(&self) -> bool {
        matches!(self, PointState::Open)
    }

    /// Duration of a closed interval, if this point has one
    pub fn duration_ms(&self) -> Option<i64> {
        match self {
            PointState::Closed { duration_ms } => Some(*duration_ms),
            _ => None,
        }
    }
}

/// Soft-delete marker: who requested the removal and when
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone {
    /// Rater who requested the removal
    pub by: String,
    /// When the removal was applied (epoch ms on the wire)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub at: DateTime<Utc>,
}

/// Retention status of a point. Deleted points are never spliced out of the
/// aggregate; read-side logic filters on this variant.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointStatus {
    #[default]
    Active,
    Deleted(Tombstone),
}

impl PointStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, PointStatus::Active)
    }
}

/// One behavior occurrence inside a weekly aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Behavior identifier
    pub behavior_id: String,
    /// When the occurrence happened (epoch ms on the wire)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Interval state
    #[serde(flatten)]
    pub state: PointState,
    /// Emitting device and rater
    pub source: Source,
    /// Antecedent/consequence observations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abc: Option<Abc>,
    /// Intensity rating (typically 1-5)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intensity: Option<u8>,
    /// Whether the occurrence was entered manually rather than tracked live
    #[serde(default)]
    pub is_manual: bool,
    /// Soft-delete status
    #[serde(default, skip_serializing_if = "PointStatus::is_active")]
    pub status: PointStatus,
}

/// One service occurrence inside a weekly aggregate; structurally parallel
/// to [`DataPoint`] with service-specific detail fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicePoint {
    /// Service identifier
    pub service_id: String,
    /// When the occurrence happened (epoch ms on the wire)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Interval state
    #[serde(flatten)]
    pub state: PointState,
    /// Emitting device and rater
    pub source: Source,
    /// Modifications/accommodations applied during delivery
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifications: Option<Vec<String>>,
    /// Progress note recorded with the session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    /// Whether the occurrence was entered manually rather than tracked live
    #[serde(default)]
    pub is_manual: bool,
    /// Soft-delete status
    #[serde(default, skip_serializing_if = "PointStatus::is_active")]
    pub status: PointStatus,
}

/// Common surface the reconcilers need from a point.
///
/// Behavior and service points carry different detail fields but identical
/// reconciliation semantics; every engine stage is generic over this trait
/// so the dedup/discrete/duration/rebuild logic exists exactly once.
pub trait TrackedPoint: Clone {
    /// Behavior or service identifier this point belongs to
    fn target_id(&self) -> &str;
    fn timestamp(&self) -> DateTime<Utc>;
    fn set_timestamp(&mut self, ts: DateTime<Utc>);
    fn state(&self) -> PointState;
    fn set_state(&mut self, state: PointState);
    fn source(&self) -> &Source;
    fn status(&self) -> &PointStatus;

    /// Attach a tombstone unless the point is already deleted
    fn tombstone(&mut self, by: &str, at: DateTime<Utc>);

    /// Overwrite detail fields with whatever the event carries; absent event
    /// fields never clear existing values. Returns whether anything changed.
    fn merge_event_details(&mut self, event: &RawEvent) -> bool;

    /// Build a fresh point from an event in the given interval state
    fn from_event(event: &RawEvent, timestamp: DateTime<Utc>, state: PointState) -> Self;

    fn rater(&self) -> &str {
        &self.source().rater
    }

    fn is_deleted(&self) -> bool {
        !self.status().is_active()
    }
}

impl TrackedPoint for DataPoint {
    fn target_id(&self) -> &str {
        &self.behavior_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn set_timestamp(&mut self, ts: DateTime<Utc>) {
        self.timestamp = ts;
    }

    fn state(&self) -> PointState {
        self.state
    }

    fn set_state(&mut self, state: PointState) {
        self.state = state;
    }

    fn source(&self) -> &Source {
        &self.source
    }

    fn status(&self) -> &PointStatus {
        &self.status
    }

    fn tombstone(&mut self, by: &str, at: DateTime<Utc>) {
        if self.status.is_active() {
            self.status = PointStatus::Deleted(Tombstone {
                by: by.to_string(),
                at,
            });
        }
    }

    fn merge_event_details(&mut self, event: &RawEvent) -> bool {
        let mut changed = false;
        if let Some(abc) = &event.abc {
            if self.abc.as_ref() != Some(abc) {
                self.abc = Some(abc.clone());
                changed = true;
            }
        }
        if let Some(intensity) = event.intensity {
            if self.intensity != Some(intensity) {
                self.intensity = Some(intensity);
                changed = true;
            }
        }
        changed
    }

    fn from_event(event: &RawEvent, timestamp: DateTime<Utc>, state: PointState) -> Self {
        DataPoint {
            behavior_id: event.target_id.clone(),
            timestamp,
            state,
            source: event.source.clone(),
            abc: event.abc.clone(),
            intensity: event.intensity,
            is_manual: event.is_manual,
            status: PointStatus::Active,
        }
    }
}

impl TrackedPoint for ServicePoint {
    fn target_id(&self) -> &str {
        &self.service_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn set_timestamp(&mut self, ts: DateTime<Utc>) {
        self.timestamp = ts;
    }

    fn state(&self) -> PointState {
        self.state
    }

    fn set_state(&mut self, state: PointState) {
        self.state = state;
    }

    fn source(&self) -> &Source {
        &self.source
    }

    fn status(&self) -> &PointStatus {
        &self.status
    }

    fn tombstone(&mut self, by: &str, at: DateTime<Utc>) {
        if self.status.is_active() {
            self.status = PointStatus::Deleted(Tombstone {
                by: by.to_string(),
                at,
            });
        }
    }

    fn merge_event_details(&mut self, event: &RawEvent) -> bool {
        let mut changed = false;
        if let Some(modifications) = &event.modifications {
            if self.modifications.as_ref() != Some(modifications) {
                self.modifications = Some(modifications.clone());
                changed = true;
            }
        }
        if let Some(progress) = &event.progress {
            if self.progress.as_ref() != Some(progress) {
                self.progress = Some(progress.clone());
                changed = true;
            }
        }
        changed
    }

    fn from_event(event: &RawEvent, timestamp: DateTime<Utc>, state: PointState) -> Self {
        ServicePoint {
            service_id: event.target_id.clone(),
            timestamp,
            state,
            source: event.source.clone(),
            modifications: event.modifications.clone(),
            progress: event.progress.clone(),
            is_manual: event.is_manual,
            status: PointStatus::Active,
        }
    }
}

/// The unit of persistence: all points for one student in one local week.
///
/// Created lazily on the first event for its window, mutated in place across
/// reconciliation cycles, and persisted between cycles by the external store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyAggregate {
    /// Student this report belongs to
    pub student_id: String,
    /// Local date the window starts on; half of the storage key
    pub week_start: NaiveDate,
    /// Window start instant, inclusive (epoch ms on the wire)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start: DateTime<Utc>,
    /// Window end instant, inclusive (epoch ms on the wire)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end: DateTime<Utc>,
    /// Behavior occurrences in this window
    #[serde(default)]
    pub behavior_points: Vec<DataPoint>,
    /// Service occurrences in this window
    #[serde(default)]
    pub service_points: Vec<ServicePoint>,
}

impl WeeklyAggregate {
    pub fn new(
        student_id: impl Into<String>,
        week_start: NaiveDate,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        WeeklyAggregate {
            student_id: student_id.into(),
            week_start,
            start,
            end,
            behavior_points: Vec::new(),
            service_points: Vec::new(),
        }
    }

    /// Whether a timestamp falls inside this window (bounds inclusive)
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }

    /// Behavior points that survive read-side tombstone filtering
    pub fn active_behavior_points(&self) -> impl Iterator<Item = &DataPoint> {
        self.behavior_points.iter().filter(|p| p.status.is_active())
    }

    /// Service points that survive read-side tombstone filtering
    pub fn active_service_points(&self) -> impl Iterator<Item = &ServicePoint> {
        self.service_points.iter().filter(|p| p.status.is_active())
    }

    /// Number of active occurrences recorded for one behavior
    pub fn behavior_count(&self, behavior_id: &str) -> usize {
        self.active_behavior_points()
            .filter(|p| p.behavior_id == behavior_id)
            .count()
    }

    /// Total closed-interval time for one behavior, in milliseconds
    pub fn behavior_duration_ms(&self, behavior_id: &str) -> i64 {
        self.active_behavior_points()
            .filter(|p| p.behavior_id == behavior_id)
            .filter_map(|p| p.state.duration_ms())
            .sum()
    }

    /// Total closed-interval time for one service, in milliseconds
    pub fn service_duration_ms(&self, service_id: &str) -> i64 {
        self.active_service_points()
            .filter(|p| p.service_id == service_id)
            .filter_map(|p| p.state.duration_ms())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_source(rater: &str) -> Source {
        Source {
            device: "clicker-07".to_string(),
            rater: rater.to_string(),
        }
    }

    fn make_point(behavior: &str, ts_ms: i64, state: PointState) -> DataPoint {
        DataPoint {
            behavior_id: behavior.to_string(),
            timestamp: Utc.timestamp_millis_opt(ts_ms).unwrap(),
            state,
            source: make_source("r1"),
            abc: None,
            intensity: None,
            is_manual: false,
            status: PointStatus::Active,
        }
    }

    #[test]
    fn test_point_state_serialization() {
        let point = make_point("B1", 1000, PointState::Closed { duration_ms: 500 });
        let json = serde_json::to_string(&point).unwrap();

        assert!(json.contains("\"state\":\"closed\""));
        assert!(json.contains("\"duration_ms\":500"));
        assert!(json.contains("\"timestamp\":1000"));
        // Active status is omitted from the wire
        assert!(!json.contains("status"));

        let parsed: DataPoint = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, point);
    }

    #[test]
    fn test_open_point_has_no_duration() {
        let point = make_point("B1", 1000, PointState::Open);
        let json = serde_json::to_string(&point).unwrap();

        assert!(json.contains("\"state\":\"open\""));
        assert!(!json.contains("duration_ms"));
        assert!(point.state.is_open());
        assert_eq!(point.state.duration_ms(), None);
    }

    #[test]
    fn test_tombstone_attaches_once() {
        let mut point = make_point("B1", 1000, PointState::Count);
        let first = Utc.timestamp_millis_opt(5000).unwrap();
        let second = Utc.timestamp_millis_opt(9000).unwrap();

        point.tombstone("r1", first);
        point.tombstone("r2", second);

        // The original tombstone survives a second removal request
        match &point.status {
            PointStatus::Deleted(t) => {
                assert_eq!(t.by, "r1");
                assert_eq!(t.at, first);
            }
            PointStatus::Active => panic!("expected deleted status"),
        }
    }

    #[test]
    fn test_tombstone_round_trip() {
        let mut point = make_point("B1", 1000, PointState::Count);
        point.tombstone("r1", Utc.timestamp_millis_opt(5000).unwrap());

        let json = serde_json::to_string(&point).unwrap();
        assert!(json.contains("\"deleted\""));
        assert!(json.contains("\"at\":5000"));

        let parsed: DataPoint = serde_json::from_str(&json).unwrap();
        assert!(parsed.is_deleted());
    }

    #[test]
    fn test_aggregate_totals_filter_tombstones() {
        let week_start = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 21, 23, 59, 59).unwrap();
        let mut aggregate = WeeklyAggregate::new("student-1", week_start, start, end);

        aggregate
            .behavior_points
            .push(make_point("B1", 1000, PointState::Closed { duration_ms: 500 }));
        aggregate
            .behavior_points
            .push(make_point("B1", 3000, PointState::Closed { duration_ms: 250 }));

        let mut deleted = make_point("B1", 5000, PointState::Closed { duration_ms: 900 });
        deleted.tombstone("r1", Utc.timestamp_millis_opt(6000).unwrap());
        aggregate.behavior_points.push(deleted);

        // Tombstoned points stay in the list but not in the totals
        assert_eq!(aggregate.behavior_points.len(), 3);
        assert_eq!(aggregate.behavior_count("B1"), 2);
        assert_eq!(aggregate.behavior_duration_ms("B1"), 750);
    }

    #[test]
    fn test_aggregate_contains_is_inclusive() {
        let week_start = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let start = Utc.timestamp_millis_opt(10_000).unwrap();
        let end = Utc.timestamp_millis_opt(20_000).unwrap();
        let aggregate = WeeklyAggregate::new("student-1", week_start, start, end);

        assert!(aggregate.contains(start));
        assert!(aggregate.contains(end));
        assert!(!aggregate.contains(Utc.timestamp_millis_opt(20_001).unwrap()));
        assert!(!aggregate.contains(Utc.timestamp_millis_opt(9_999).unwrap()));
    }
}
