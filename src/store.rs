//! Aggregate persistence seam
//!
//! The engine never talks to a database directly. An [`AggregateStore`]
//! loads and saves whole aggregates and supports field-level patches of a
//! single point list, which is how concurrent writers keep their blast
//! radius down: a reconciliation cycle that only touched behavior points
//! replaces only the behavior list, not the whole record.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::error::ReconcileError;
use crate::types::{DataPoint, ServicePoint, WeeklyAggregate};

/// Field-level update of one point list
#[derive(Debug, Clone, Copy)]
pub enum PointPatch<'a> {
    Behavior(&'a [DataPoint]),
    Service(&'a [ServicePoint]),
}

/// External persistence for weekly aggregates, keyed by student and week
pub trait AggregateStore {
    /// Fetch the aggregate for a key, or `None` if the week has no record yet
    fn load(
        &mut self,
        student_id: &str,
        week_start: NaiveDate,
    ) -> Result<Option<WeeklyAggregate>, ReconcileError>;

    /// Idempotent upsert of a whole aggregate
    fn save(&mut self, aggregate: &WeeklyAggregate) -> Result<(), ReconcileError>;

    /// Replace a single point list on an existing aggregate
    fn patch_points(
        &mut self,
        student_id: &str,
        week_start: NaiveDate,
        patch: PointPatch<'_>,
    ) -> Result<(), ReconcileError>;
}

/// In-memory store backed by an ordered map, so exported state is stable
/// across runs. Used by tests and by the CLI's state files.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    aggregates: BTreeMap<(String, NaiveDate), WeeklyAggregate>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn len(&self) -> usize {
        self.aggregates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aggregates.is_empty()
    }

    pub fn get(&self, student_id: &str, week_start: NaiveDate) -> Option<&WeeklyAggregate> {
        self.aggregates
            .get(&(student_id.to_string(), week_start))
    }

    pub fn aggregates(&self) -> impl Iterator<Item = &WeeklyAggregate> {
        self.aggregates.values()
    }

    /// Parse a state document: a JSON array of aggregates
    pub fn from_json(json: &str) -> Result<Self, ReconcileError> {
        let list: Vec<WeeklyAggregate> = serde_json::from_str(json)?;
        let mut store = MemoryStore::new();
        for aggregate in list {
            let key = (aggregate.student_id.clone(), aggregate.week_start);
            store.aggregates.insert(key, aggregate);
        }
        Ok(store)
    }

    /// Serialize every aggregate, ordered by student and week
    pub fn to_json(&self) -> Result<String, ReconcileError> {
        let list: Vec<&WeeklyAggregate> = self.aggregates.values().collect();
        let json = serde_json::to_string_pretty(&list)?;
        Ok(json)
    }
}

impl AggregateStore for MemoryStore {
    fn load(
        &mut self,
        student_id: &str,
        week_start: NaiveDate,
    ) -> Result<Option<WeeklyAggregate>, ReconcileError> {
        Ok(self
            .aggregates
            .get(&(student_id.to_string(), week_start))
            .cloned())
    }

    fn save(&mut self, aggregate: &WeeklyAggregate) -> Result<(), ReconcileError> {
        let key = (aggregate.student_id.clone(), aggregate.week_start);
        self.aggregates.insert(key, aggregate.clone());
        Ok(())
    }

    fn patch_points(
        &mut self,
        student_id: &str,
        week_start: NaiveDate,
        patch: PointPatch<'_>,
    ) -> Result<(), ReconcileError> {
        let key = (student_id.to_string(), week_start);
        let aggregate = self.aggregates.get_mut(&key).ok_or_else(|| {
            ReconcileError::Persistence(format!(
                "cannot patch missing aggregate {student_id}/{week_start}"
            ))
        })?;
        match patch {
            PointPatch::Behavior(points) => aggregate.behavior_points = points.to_vec(),
            PointPatch::Service(points) => aggregate.service_points = points.to_vec(),
        }
        Ok(())
    }
}
