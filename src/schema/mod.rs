//! Wire schema for incoming events

pub mod adapter;
pub mod raw_event;

pub use adapter::{RawEventAdapter, ValidationIssue};
pub use raw_event::{MAX_DURATION_MS, RawEvent, SCHEMA_VERSION, ValidationError};
