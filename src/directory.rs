//! Student directory and notification collaborators
//!
//! The engine does not own student configuration. A [`StudentDirectory`]
//! supplies the per-student catalog of tracked targets, which is what routes
//! each event to the behavior or service list and to the discrete or
//! duration reconciler. A [`NotificationSink`] receives committed behavior
//! points for fan-out to subscribed team members; delivery failures are the
//! caller's concern to log, never to retry inside the engine.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ReconcileError;
use crate::types::DataPoint;

/// Whether a target is a behavior or a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Behavior,
    Service,
}

/// One tracked target in a student's catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Behavior or service identifier
    pub id: String,
    pub kind: TargetKind,
    /// Duration-tracked targets run the interval state machine; the rest
    /// are discrete counts
    pub is_duration: bool,
}

impl CatalogEntry {
    pub fn behavior(id: impl Into<String>, is_duration: bool) -> Self {
        CatalogEntry {
            id: id.into(),
            kind: TargetKind::Behavior,
            is_duration,
        }
    }

    pub fn service(id: impl Into<String>, is_duration: bool) -> Self {
        CatalogEntry {
            id: id.into(),
            kind: TargetKind::Service,
            is_duration,
        }
    }
}

/// Source of per-student target catalogs
pub trait StudentDirectory {
    /// Fetch the catalog for one student. A student the directory does not
    /// know is an error, not an empty catalog.
    fn catalog(&self, student_id: &str) -> Result<Vec<CatalogEntry>, ReconcileError>;
}

/// In-memory directory backed by a plain map; the usual choice for tests
/// and for CLI runs where the catalog arrives as a JSON document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticDirectory {
    students: HashMap<String, Vec<CatalogEntry>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        StaticDirectory::default()
    }

    pub fn with_student(
        mut self,
        student_id: impl Into<String>,
        entries: Vec<CatalogEntry>,
    ) -> Self {
        self.students.insert(student_id.into(), entries);
        self
    }

    /// Parse a `{student_id: [entry, ...]}` document
    pub fn from_json(json: &str) -> Result<Self, ReconcileError> {
        let directory: StaticDirectory = serde_json::from_str(json)?;
        Ok(directory)
    }

    pub fn student_count(&self) -> usize {
        self.students.len()
    }
}

impl StudentDirectory for StaticDirectory {
    fn catalog(&self, student_id: &str) -> Result<Vec<CatalogEntry>, ReconcileError> {
        self.students.get(student_id).cloned().ok_or_else(|| {
            ReconcileError::MissingStudentContext {
                student_id: student_id.to_string(),
                reason: "student not in directory".to_string(),
            }
        })
    }
}

/// Receiver for committed behavior points
pub trait NotificationSink {
    fn notify(&mut self, student_id: &str, point: &DataPoint) -> Result<(), ReconcileError>;
}

/// Sink that drops every notification; for batch tooling and tests
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl NotificationSink for NullNotifier {
    fn notify(&mut self, _student_id: &str, _point: &DataPoint) -> Result<(), ReconcileError> {
        Ok(())
    }
}
