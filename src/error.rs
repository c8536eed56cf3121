//! Error types for Pointfold

use thiserror::Error;

/// Errors that can occur during reconciliation
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Event has no usable timestamp: {0}")]
    MissingTimestamp(String),

    #[error("Invalid event payload: {0}")]
    InvalidEvent(String),

    #[error("No student context for {student_id}: {reason}")]
    MissingStudentContext { student_id: String, reason: String },

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse event batch: {0}")]
    ParseError(String),

    #[error("Invalid window policy: {0}")]
    InvalidPolicy(String),
}

impl ReconcileError {
    /// Whether this condition skips a single event rather than aborting the batch.
    ///
    /// Per-event conditions are logged and surfaced in the batch summary;
    /// everything else propagates to the caller so the batch can be redelivered.
    pub fn is_per_event(&self) -> bool {
        matches!(
            self,
            ReconcileError::MissingTimestamp(_)
                | ReconcileError::InvalidEvent(_)
                | ReconcileError::MissingStudentContext { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_event_classification() {
        assert!(ReconcileError::MissingTimestamp("evt-1".to_string()).is_per_event());
        assert!(ReconcileError::InvalidEvent("duration out of range".to_string()).is_per_event());
        assert!(ReconcileError::MissingStudentContext {
            student_id: "s-1".to_string(),
            reason: "unknown student".to_string(),
        }
        .is_per_event());
        assert!(!ReconcileError::Persistence("write failed".to_string()).is_per_event());
    }
}
