//! Versioned raw event schema
//!
//! A [`RawEvent`] is one tracker action on the wire: a press, a manual entry,
//! a removal request, or a rebuild request. Producers emit batches of these;
//! the reconciliation pipeline folds them into weekly aggregates. The schema
//! is versioned so stored batches can be replayed against future releases.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{Abc, Source};

/// Current version tag for the raw event schema
pub const SCHEMA_VERSION: &str = "track.raw_event.v1";

/// Longest span an event may carry, in milliseconds (31 days; intervals
/// resolve within a single weekly window)
pub const MAX_DURATION_MS: i64 = 31 * 24 * 60 * 60 * 1000;

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

/// Schema-level validation failures for a single event
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unsupported schema version: {0}")]
    UnsupportedVersion(String),
    #[error("student_id is empty")]
    MissingStudentId,
    #[error("target_id is empty")]
    MissingTargetId,
    #[error("event has no timestamp")]
    MissingTimestamp,
    #[error("negative duration: {0} ms")]
    NegativeDuration(i64),
    #[error("duration too long: {0} ms")]
    ExcessiveDuration(i64),
    #[error("intensity {0} outside 1-5")]
    IntensityOutOfRange(u8),
}

/// One incoming tracker event.
///
/// `timestamp` is epoch milliseconds on the wire. Detail fields (`abc`,
/// `intensity`, `modifications`, `progress`) are optional and only ever
/// overwrite stored values when present. `remove` marks a soft-delete
/// request; `redo_durations` asks for a full interval rebuild of the target
/// instead of incremental pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Schema version tag; defaults to the current version when absent
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// Producer-assigned identifier, carried through skip reports
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
    /// Student the event belongs to
    pub student_id: String,
    /// Behavior or service identifier being tracked
    pub target_id: String,
    /// When the action happened (epoch ms on the wire)
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
    /// Explicit interval length for manually entered durations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    /// Emitting device and rater
    pub source: Source,
    /// Whether the event was entered manually rather than tracked live
    #[serde(default)]
    pub is_manual: bool,
    /// Antecedent/consequence observations (behavior targets only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abc: Option<Abc>,
    /// Intensity rating 1-5 (behavior targets only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intensity: Option<u8>,
    /// Soft-delete request for the matching point
    #[serde(default)]
    pub remove: bool,
    /// Request a deterministic rebuild of the target's intervals
    #[serde(default)]
    pub redo_durations: bool,
    /// Modifications/accommodations applied (service targets only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifications: Option<Vec<String>>,
    /// Progress note (service targets only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
}

impl RawEvent {
    /// A live tracker press for a target
    pub fn new(
        student_id: impl Into<String>,
        target_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        source: Source,
    ) -> Self {
        RawEvent {
            schema_version: SCHEMA_VERSION.to_string(),
            event_id: Some(Uuid::new_v4()),
            student_id: student_id.into(),
            target_id: target_id.into(),
            timestamp: Some(timestamp),
            duration_ms: None,
            source,
            is_manual: false,
            abc: None,
            intensity: None,
            remove: false,
            redo_durations: false,
            modifications: None,
            progress: None,
        }
    }

    /// A soft-delete request for the point matching this target and time
    pub fn removal(
        student_id: impl Into<String>,
        target_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        source: Source,
    ) -> Self {
        let mut event = RawEvent::new(student_id, target_id, timestamp, source);
        event.remove = true;
        event
    }

    pub fn with_event_id(mut self, event_id: Uuid) -> Self {
        self.event_id = Some(event_id);
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: i64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_manual(mut self) -> Self {
        self.is_manual = true;
        self
    }

    pub fn with_abc(mut self, abc: Abc) -> Self {
        self.abc = Some(abc);
        self
    }

    pub fn with_intensity(mut self, intensity: u8) -> Self {
        self.intensity = Some(intensity);
        self
    }

    pub fn with_redo_durations(mut self) -> Self {
        self.redo_durations = true;
        self
    }

    pub fn with_modifications(mut self, modifications: Vec<String>) -> Self {
        self.modifications = Some(modifications);
        self
    }

    pub fn with_progress(mut self, progress: impl Into<String>) -> Self {
        self.progress = Some(progress.into());
        self
    }

    /// Check schema-level shape; reconciliation-level problems (unknown
    /// targets, window mismatches) are reported by the pipeline instead.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ValidationError::UnsupportedVersion(
                self.schema_version.clone(),
            ));
        }
        if self.student_id.is_empty() {
            return Err(ValidationError::MissingStudentId);
        }
        if self.target_id.is_empty() {
            return Err(ValidationError::MissingTargetId);
        }
        if self.timestamp.is_none() {
            return Err(ValidationError::MissingTimestamp);
        }
        if let Some(duration_ms) = self.duration_ms {
            if duration_ms < 0 {
                return Err(ValidationError::NegativeDuration(duration_ms));
            }
            if duration_ms > MAX_DURATION_MS {
                return Err(ValidationError::ExcessiveDuration(duration_ms));
            }
        }
        if let Some(intensity) = self.intensity {
            if !(1..=5).contains(&intensity) {
                return Err(ValidationError::IntensityOutOfRange(intensity));
            }
        }
        Ok(())
    }
}
