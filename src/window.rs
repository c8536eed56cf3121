//! Week window resolution
//!
//! Aggregates are keyed by the local-calendar week an event falls into.
//! [`WindowPolicy`] makes the calendar rules explicit: which weekday opens
//! the week, the fixed UTC offset used to derive local days, whether the
//! weekend-boundary shift applies, and whether an open interval may be
//! closed by an event on a later local day.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ReconcileError;

/// Largest UTC offset a real timezone uses, in minutes (UTC+14 / UTC-12)
const MAX_OFFSET_MINUTES: i32 = 14 * 60;

/// Calendar rules for assigning events to weekly windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowPolicy {
    /// Weekday the reporting week opens on
    pub week_start: Weekday,
    /// Fixed offset from UTC used to derive local days, in minutes
    pub utc_offset_minutes: i32,
    /// Shift the window back one day when an event lands on the last day of
    /// the week, absorbing the weekend-boundary overlap into the prior week
    pub weekend_shift: bool,
    /// Allow an event on a later local day to close an interval opened
    /// earlier; same-day matching always applies first
    pub cross_day_close: bool,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        WindowPolicy {
            week_start: Weekday::Mon,
            utc_offset_minutes: 0,
            weekend_shift: true,
            cross_day_close: true,
        }
    }
}

impl WindowPolicy {
    pub fn validate(&self) -> Result<(), ReconcileError> {
        if self.utc_offset_minutes.abs() > MAX_OFFSET_MINUTES {
            return Err(ReconcileError::InvalidPolicy(format!(
                "utc_offset_minutes {} outside +/-{}",
                self.utc_offset_minutes, MAX_OFFSET_MINUTES
            )));
        }
        Ok(())
    }

    /// The event's wall-clock date under this policy's offset
    pub fn local_date(&self, ts: DateTime<Utc>) -> NaiveDate {
        (ts + Duration::minutes(self.utc_offset_minutes as i64)).date_naive()
    }

    /// Whether two instants fall on the same local day
    pub fn same_local_day(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        self.local_date(a) == self.local_date(b)
    }

    /// Resolve the weekly window an event belongs to.
    ///
    /// Walks back from the event's local date to the configured week-start
    /// weekday. When the weekend shift applies and the event lands on the
    /// last day of the week, the window starts one day earlier and spans
    /// eight local days so the event still falls inside it.
    pub fn window_for(&self, ts: DateTime<Utc>) -> WeekWindow {
        let date = self.local_date(ts);
        let days_back = (date.weekday().num_days_from_monday() as i64
            - self.week_start.num_days_from_monday() as i64)
            .rem_euclid(7);

        let on_last_day = days_back == 6;
        let (week_start, span_days) = if self.weekend_shift && on_last_day {
            (date - Duration::days(days_back + 1), 8)
        } else {
            (date - Duration::days(days_back), 7)
        };

        let start = self.local_midnight_utc(week_start);
        let end = start + Duration::days(span_days) - Duration::milliseconds(1);
        WeekWindow {
            week_start,
            start,
            end,
        }
    }

    /// 00:00 local time on the given date, expressed as a UTC instant
    fn local_midnight_utc(&self, date: NaiveDate) -> DateTime<Utc> {
        let naive = date.and_time(NaiveTime::MIN);
        DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc)
            - Duration::minutes(self.utc_offset_minutes as i64)
    }
}

/// One resolved weekly window: the storage key date plus inclusive bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekWindow {
    /// Local date the window starts on; half of the aggregate key
    pub week_start: NaiveDate,
    /// First instant inside the window
    pub start: DateTime<Utc>,
    /// Last instant inside the window
    pub end: DateTime<Utc>,
}

impl WeekWindow {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_midweek_event_maps_to_monday() {
        let policy = WindowPolicy::default();
        // Wednesday 2024-01-17
        let ts = Utc.with_ymd_and_hms(2024, 1, 17, 14, 0, 0).unwrap();
        let window = policy.window_for(ts);

        assert_eq!(window.week_start, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());
        assert!(window.contains(ts));
        assert!(window.contains(window.start));
        assert!(window.contains(window.end));
    }

    #[test]
    fn test_week_start_day_maps_to_itself() {
        let policy = WindowPolicy::default();
        // Monday 2024-01-15
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let window = policy.window_for(ts);
        assert_eq!(window.week_start, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn test_last_day_shifts_window_back() {
        let policy = WindowPolicy::default();
        // Sunday 2024-01-21, the last day of a Monday week
        let ts = Utc.with_ymd_and_hms(2024, 1, 21, 10, 0, 0).unwrap();
        let window = policy.window_for(ts);

        // Start moves back one day and the span widens to keep the event inside
        assert_eq!(window.week_start, NaiveDate::from_ymd_opt(2024, 1, 14).unwrap());
        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 1, 14, 0, 0, 0).unwrap());
        assert!(window.contains(ts));
    }

    #[test]
    fn test_weekend_shift_can_be_disabled() {
        let policy = WindowPolicy {
            weekend_shift: false,
            ..WindowPolicy::default()
        };
        let ts = Utc.with_ymd_and_hms(2024, 1, 21, 10, 0, 0).unwrap();
        let window = policy.window_for(ts);

        assert_eq!(window.week_start, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(window.end, Utc.with_ymd_and_hms(2024, 1, 21, 23, 59, 59).unwrap()
            + Duration::milliseconds(999));
        assert!(window.contains(ts));
    }

    #[test]
    fn test_offset_moves_day_boundary() {
        // UTC-5: 2024-01-16 03:00 UTC is still Monday the 15th locally
        let policy = WindowPolicy {
            utc_offset_minutes: -300,
            ..WindowPolicy::default()
        };
        let ts = Utc.with_ymd_and_hms(2024, 1, 16, 3, 0, 0).unwrap();

        assert_eq!(policy.local_date(ts), NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        let window = policy.window_for(ts);
        assert_eq!(window.week_start, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        // Window opens at local midnight, which is 05:00 UTC
        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 1, 15, 5, 0, 0).unwrap());
    }

    #[test]
    fn test_custom_week_start() {
        let policy = WindowPolicy {
            week_start: Weekday::Sun,
            ..WindowPolicy::default()
        };
        // Wednesday 2024-01-17 under a Sunday week opens on the 14th
        let ts = Utc.with_ymd_and_hms(2024, 1, 17, 14, 0, 0).unwrap();
        let window = policy.window_for(ts);
        assert_eq!(window.week_start, NaiveDate::from_ymd_opt(2024, 1, 14).unwrap());

        // Saturday is now the last day of the week and triggers the shift
        let sat = Utc.with_ymd_and_hms(2024, 1, 20, 14, 0, 0).unwrap();
        let shifted = policy.window_for(sat);
        assert_eq!(shifted.week_start, NaiveDate::from_ymd_opt(2024, 1, 13).unwrap());
        assert!(shifted.contains(sat));
    }

    #[test]
    fn test_same_local_day_respects_offset() {
        let policy = WindowPolicy {
            utc_offset_minutes: -300,
            ..WindowPolicy::default()
        };
        let late_evening = Utc.with_ymd_and_hms(2024, 1, 16, 3, 0, 0).unwrap();
        let afternoon = Utc.with_ymd_and_hms(2024, 1, 15, 20, 0, 0).unwrap();

        assert!(policy.same_local_day(late_evening, afternoon));
        assert!(!WindowPolicy::default().same_local_day(late_evening, afternoon));
    }

    #[test]
    fn test_validate_rejects_absurd_offset() {
        let policy = WindowPolicy {
            utc_offset_minutes: 30_000,
            ..WindowPolicy::default()
        };
        assert!(policy.validate().is_err());
        assert!(WindowPolicy::default().validate().is_ok());
    }
}
