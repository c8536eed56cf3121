//! Batch decoding for raw events
//!
//! Producers hand the engine whole batches, either as one JSON array or as
//! newline-delimited JSON with one event per line. The adapter decodes both
//! and offers a schema validation pass that reports per-event problems
//! without rejecting the rest of the batch.

use uuid::Uuid;

use crate::error::ReconcileError;
use crate::schema::raw_event::{RawEvent, ValidationError};

/// One schema problem found while validating a batch
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    /// Position of the offending event in the batch
    pub index: usize,
    /// Producer-assigned identifier, when the event carried one
    pub event_id: Option<Uuid>,
    pub error: ValidationError,
}

/// Decodes raw event batches from their wire forms
pub struct RawEventAdapter;

impl RawEventAdapter {
    /// Decode a batch serialized as a single JSON array
    pub fn parse_array(input: &str) -> Result<Vec<RawEvent>, ReconcileError> {
        let events: Vec<RawEvent> = serde_json::from_str(input)?;
        Ok(events)
    }

    /// Decode newline-delimited JSON, one event per line. Blank lines are
    /// ignored; a malformed line fails the whole batch with its line number.
    pub fn parse_ndjson(input: &str) -> Result<Vec<RawEvent>, ReconcileError> {
        let mut events = Vec::new();
        for (line_no, line) in input.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let event: RawEvent = serde_json::from_str(trimmed).map_err(|e| {
                ReconcileError::ParseError(format!("line {}: {}", line_no + 1, e))
            })?;
            events.push(event);
        }
        Ok(events)
    }

    /// Decode either wire form, sniffing on the first non-whitespace byte
    pub fn parse(input: &str) -> Result<Vec<RawEvent>, ReconcileError> {
        if input.trim_start().starts_with('[') {
            Self::parse_array(input)
        } else {
            Self::parse_ndjson(input)
        }
    }

    /// Run schema validation over a batch, collecting one issue per failing
    /// event. An empty result means the whole batch is well formed.
    pub fn validate_events(events: &[RawEvent]) -> Vec<ValidationIssue> {
        events
            .iter()
            .enumerate()
            .filter_map(|(index, event)| {
                event.validate().err().map(|error| ValidationIssue {
                    index,
                    event_id: event.event_id,
                    error,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::raw_event::SCHEMA_VERSION;
    use crate::types::Source;
    use chrono::{TimeZone, Utc};

    fn sample_event(target: &str) -> RawEvent {
        RawEvent::new(
            "student-1",
            target,
            Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap(),
            Source {
                device: "web".to_string(),
                rater: "r1".to_string(),
            },
        )
    }

    #[test]
    fn test_parse_array() {
        let batch = vec![sample_event("B1"), sample_event("B2")];
        let json = serde_json::to_string(&batch).unwrap();

        let parsed = RawEventAdapter::parse_array(&json).unwrap();
        assert_eq!(parsed, batch);
    }

    #[test]
    fn test_parse_ndjson_skips_blank_lines() {
        let input = concat!(
            r#"{"student_id":"s1","target_id":"B1","timestamp":1000,"source":{"device":"web","rater":"r1"}}"#,
            "\n\n",
            r#"{"student_id":"s1","target_id":"B2","timestamp":2000,"source":{"device":"web","rater":"r1"}}"#,
            "\n",
        );

        let parsed = RawEventAdapter::parse_ndjson(input).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].target_id, "B1");
        assert_eq!(parsed[1].target_id, "B2");
    }

    #[test]
    fn test_parse_ndjson_reports_line_number() {
        let input = concat!(
            r#"{"student_id":"s1","target_id":"B1","timestamp":1000,"source":{"device":"web","rater":"r1"}}"#,
            "\n",
            "not json\n",
        );

        let err = RawEventAdapter::parse_ndjson(input).unwrap_err();
        match err {
            ReconcileError::ParseError(msg) => assert!(msg.starts_with("line 2:")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_sniffs_format() {
        let array = r#"[{"student_id":"s1","target_id":"B1","timestamp":1000,"source":{"device":"web","rater":"r1"}}]"#;
        let ndjson =
            r#"{"student_id":"s1","target_id":"B1","timestamp":1000,"source":{"device":"web","rater":"r1"}}"#;

        assert_eq!(RawEventAdapter::parse(array).unwrap().len(), 1);
        assert_eq!(RawEventAdapter::parse(ndjson).unwrap().len(), 1);
    }

    #[test]
    fn test_validate_events_reports_offenders_only() {
        let mut bad = sample_event("B2");
        bad.schema_version = "track.raw_event.v9".to_string();
        let batch = vec![sample_event("B1"), bad, sample_event("B3")];

        let issues = RawEventAdapter::validate_events(&batch);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].index, 1);
        assert_eq!(
            issues[0].error,
            ValidationError::UnsupportedVersion("track.raw_event.v9".to_string())
        );
        assert_ne!(SCHEMA_VERSION, "track.raw_event.v9");
    }
}
