//! # Pointfold
//!
//! Event reconciliation engine for week-scoped behavior and service
//! reports. Trackers emit raw events (button presses, manual entries,
//! service-duration logs, removal and rebuild requests); Pointfold folds a
//! delivery batch into per-student weekly aggregates: deduplicated,
//! interval-correct and safe to replay under at-least-once delivery.
//!
//! The engine is deliberately small at its edges. Persistence, student
//! configuration and notification fan-out are collaborator traits
//! ([`AggregateStore`], [`StudentDirectory`], [`NotificationSink`]) wired
//! into a [`Reconciler`], with in-memory implementations included for tests
//! and batch tooling.
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use pointfold::{
//!     CatalogEntry, MemoryStore, NullNotifier, RawEvent, Reconciler, Source, StaticDirectory,
//! };
//!
//! let directory = StaticDirectory::new()
//!     .with_student("student-1", vec![CatalogEntry::behavior("B1", true)]);
//! let mut engine = Reconciler::new(MemoryStore::new(), directory, NullNotifier);
//!
//! let source = Source {
//!     device: "web".to_string(),
//!     rater: "r1".to_string(),
//! };
//! let start = RawEvent::new(
//!     "student-1",
//!     "B1",
//!     Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
//!     source.clone(),
//! );
//! let stop = RawEvent::new(
//!     "student-1",
//!     "B1",
//!     Utc.with_ymd_and_hms(2024, 1, 15, 9, 45, 0).unwrap(),
//!     source,
//! );
//!
//! let summary = engine.reconcile(&[start, stop])?;
//! assert_eq!(summary.processed, 2);
//! assert_eq!(summary.aggregates_flushed, 1);
//! # Ok::<(), pointfold::ReconcileError>(())
//! ```

pub mod dedup;
pub mod directory;
pub mod discrete;
pub mod duration;
pub mod error;
pub mod pipeline;
pub mod rebuild;
pub mod schema;
pub mod store;
pub mod types;
pub mod window;

pub use directory::{
    CatalogEntry, NotificationSink, NullNotifier, StaticDirectory, StudentDirectory, TargetKind,
};
pub use error::ReconcileError;
pub use pipeline::{reconcile_events, BatchSummary, Reconciler, SkippedEvent};
pub use schema::{RawEvent, RawEventAdapter, ValidationError, ValidationIssue, SCHEMA_VERSION};
pub use store::{AggregateStore, MemoryStore, PointPatch};
pub use types::{
    Abc, DataPoint, PointState, PointStatus, ServicePoint, Source, Tombstone, TrackedPoint,
    WeeklyAggregate,
};
pub use window::{WeekWindow, WindowPolicy};

/// Crate version, straight from the package manifest
pub const POINTFOLD_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name advertised by the CLI and in diagnostics
pub const PRODUCER_NAME: &str = "pointfold";
