//! Reconciliation pipeline
//!
//! Entry point for delivery batches. Events are applied strictly in order;
//! the pipeline holds one aggregate cycle at a time and reuses it across
//! consecutive events for the same student and window, so a burst of presses
//! costs one load and one write instead of one per event. Per-event problems
//! (no timestamp, out-of-range span, unknown student or target) are logged
//! and reported in the batch summary without stopping the batch; store
//! failures abort it, since silently dropping a committed reconciliation
//! would corrupt interval state.
//!
//! Notifications for committed behavior points are queued during the cycle
//! and delivered only after the cycle's write lands. A failed delivery is
//! logged and dropped, never retried here.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;
use uuid::Uuid;

use crate::dedup::{canonical_sort, dedup_points};
use crate::directory::{CatalogEntry, NotificationSink, StudentDirectory, TargetKind};
use crate::discrete::{merge_discrete, DiscreteOutcome};
use crate::duration::{apply_duration, DurationOutcome};
use crate::error::ReconcileError;
use crate::schema::raw_event::{MAX_DURATION_MS, RawEvent};
use crate::store::{AggregateStore, PointPatch};
use crate::types::{DataPoint, WeeklyAggregate};
use crate::window::WindowPolicy;

/// What one `reconcile` call did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    /// Events applied to an aggregate (including benign no-ops)
    pub processed: usize,
    /// Events dropped with a per-event recoverable problem
    pub skipped: Vec<SkippedEvent>,
    /// Aggregates actually written back to the store
    pub aggregates_flushed: usize,
}

impl BatchSummary {
    pub fn all_processed(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// One dropped event and why
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedEvent {
    /// Position of the event in the batch
    pub index: usize,
    /// Producer-assigned identifier, when the event carried one
    pub event_id: Option<Uuid>,
    pub reason: String,
}

/// One in-flight aggregate cycle: the held aggregate plus everything the
/// flush needs to know about what changed during it.
struct Cycle {
    aggregate: WeeklyAggregate,
    /// Fresh this cycle; flush saves the whole record instead of patching
    created: bool,
    dirty_behavior: bool,
    dirty_service: bool,
    catalog: Vec<CatalogEntry>,
    /// Behavior points to announce once the cycle's write lands
    pending: Vec<DataPoint>,
}

/// Stateful reconciliation engine owning its collaborators.
///
/// Construction wires in the store, directory and notifier once; every
/// [`reconcile`](Reconciler::reconcile) call then processes one delivery
/// batch. For one-shot use see [`reconcile_events`].
pub struct Reconciler<S, D, N> {
    store: S,
    directory: D,
    notifier: N,
    policy: WindowPolicy,
}

impl<S, D, N> Reconciler<S, D, N>
where
    S: AggregateStore,
    D: StudentDirectory,
    N: NotificationSink,
{
    pub fn new(store: S, directory: D, notifier: N) -> Self {
        Reconciler {
            store,
            directory,
            notifier,
            policy: WindowPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: WindowPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &WindowPolicy {
        &self.policy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Give the store back, typically to export state after a batch
    pub fn into_store(self) -> S {
        self.store
    }

    /// Apply one delivery batch in order and flush every touched aggregate
    pub fn reconcile(&mut self, events: &[RawEvent]) -> Result<BatchSummary, ReconcileError> {
        reconcile_events(
            &mut self.store,
            &self.directory,
            &mut self.notifier,
            &self.policy,
            events,
        )
    }
}

/// One-shot reconciliation of a batch against borrowed collaborators
pub fn reconcile_events<S, D, N>(
    store: &mut S,
    directory: &D,
    notifier: &mut N,
    policy: &WindowPolicy,
    events: &[RawEvent],
) -> Result<BatchSummary, ReconcileError>
where
    S: AggregateStore,
    D: StudentDirectory,
    N: NotificationSink,
{
    let now = Utc::now();
    let mut summary = BatchSummary::default();
    let mut held: Option<Cycle> = None;

    for (index, event) in events.iter().enumerate() {
        // Stage 1: order the event in time
        let Some(timestamp) = event.timestamp else {
            skip(
                &mut summary,
                index,
                event,
                &ReconcileError::MissingTimestamp(event.target_id.clone()),
            );
            continue;
        };

        // Event-supplied spans are bounded before any reconciler sees them
        if let Some(duration_ms) = event.duration_ms {
            if !(0..=MAX_DURATION_MS).contains(&duration_ms) {
                skip(
                    &mut summary,
                    index,
                    event,
                    &ReconcileError::InvalidEvent(format!(
                        "duration {duration_ms} ms outside 0..={MAX_DURATION_MS}"
                    )),
                );
                continue;
            }
        }

        // Stage 2: resolve the aggregate cycle, reusing the held one when
        // the event lands in the same student and window
        let reusable = held.as_ref().is_some_and(|cycle| {
            cycle.aggregate.student_id == event.student_id && cycle.aggregate.contains(timestamp)
        });
        if !reusable {
            // Catalog first: a context failure must not cost us the held
            // aggregate
            let catalog = match directory.catalog(&event.student_id) {
                Ok(catalog) => catalog,
                Err(err) => {
                    skip(&mut summary, index, event, &err);
                    continue;
                }
            };
            if let Some(cycle) = held.take() {
                summary.aggregates_flushed += flush(store, notifier, cycle)?;
            }
            held = Some(begin_cycle(store, policy, event, timestamp, catalog)?);
        }
        let Some(cycle) = held.as_mut() else {
            continue;
        };

        // Stage 3: route by catalog entry
        let Some(entry) = cycle
            .catalog
            .iter()
            .find(|entry| entry.id == event.target_id)
        else {
            let err = ReconcileError::MissingStudentContext {
                student_id: event.student_id.clone(),
                reason: format!("target {} not in catalog", event.target_id),
            };
            skip(&mut summary, index, event, &err);
            continue;
        };

        // Stage 4: apply through the matching reconciler
        match (entry.kind, entry.is_duration) {
            (TargetKind::Behavior, false) => {
                let outcome =
                    merge_discrete(&mut cycle.aggregate.behavior_points, event, timestamp, now);
                cycle.dirty_behavior |= outcome.is_dirty();
                if let Some(i) = outcome.notified_index() {
                    cycle.pending.push(cycle.aggregate.behavior_points[i].clone());
                }
                if outcome == DiscreteOutcome::SourceMismatch {
                    debug!(
                        "removal for {} at {} matched nothing",
                        event.target_id,
                        timestamp.timestamp_millis()
                    );
                }
            }
            (TargetKind::Behavior, true) => {
                let outcome = apply_duration(
                    &mut cycle.aggregate.behavior_points,
                    event,
                    timestamp,
                    now,
                    policy,
                );
                cycle.dirty_behavior |= outcome.is_dirty();
                if let Some(i) = outcome.notified_index() {
                    cycle.pending.push(cycle.aggregate.behavior_points[i].clone());
                }
                if let DurationOutcome::Rebuilt { target_points } = outcome {
                    debug!("rebuilt {} into {} points", event.target_id, target_points);
                }
            }
            (TargetKind::Service, false) => {
                let outcome =
                    merge_discrete(&mut cycle.aggregate.service_points, event, timestamp, now);
                cycle.dirty_service |= outcome.is_dirty();
            }
            (TargetKind::Service, true) => {
                let outcome = apply_duration(
                    &mut cycle.aggregate.service_points,
                    event,
                    timestamp,
                    now,
                    policy,
                );
                cycle.dirty_service |= outcome.is_dirty();
            }
        }
        summary.processed += 1;
    }

    // Stage 5: flush whatever is still held
    if let Some(cycle) = held.take() {
        summary.aggregates_flushed += flush(store, notifier, cycle)?;
    }

    Ok(summary)
}

fn skip(summary: &mut BatchSummary, index: usize, event: &RawEvent, error: &ReconcileError) {
    warn!("skipping event {index}: {error}");
    summary.skipped.push(SkippedEvent {
        index,
        event_id: event.event_id,
        reason: error.to_string(),
    });
}

/// Load or create the aggregate for an event's window and run the on-load
/// dedup pass. Duplicate removals count as changes to persist.
fn begin_cycle<S: AggregateStore>(
    store: &mut S,
    policy: &WindowPolicy,
    event: &RawEvent,
    timestamp: DateTime<Utc>,
    catalog: Vec<CatalogEntry>,
) -> Result<Cycle, ReconcileError> {
    let window = policy.window_for(timestamp);
    let (aggregate, created) = match store.load(&event.student_id, window.week_start)? {
        Some(aggregate) => (aggregate, false),
        None => (
            WeeklyAggregate::new(
                event.student_id.clone(),
                window.week_start,
                window.start,
                window.end,
            ),
            true,
        ),
    };

    let mut cycle = Cycle {
        aggregate,
        created,
        dirty_behavior: false,
        dirty_service: false,
        catalog,
        pending: Vec::new(),
    };

    let removed_behavior = dedup_points(&mut cycle.aggregate.behavior_points);
    let removed_service = dedup_points(&mut cycle.aggregate.service_points);
    if removed_behavior > 0 {
        debug!(
            "dropped {} duplicate behavior points for {}",
            removed_behavior, cycle.aggregate.student_id
        );
        cycle.dirty_behavior = true;
    }
    if removed_service > 0 {
        debug!(
            "dropped {} duplicate service points for {}",
            removed_service, cycle.aggregate.student_id
        );
        cycle.dirty_service = true;
    }

    Ok(cycle)
}

/// Persist a finished cycle. Fresh aggregates are saved whole; existing ones
/// get field-level patches of only the lists that changed. Queued
/// notifications go out after the write, and only then.
fn flush<S: AggregateStore, N: NotificationSink>(
    store: &mut S,
    notifier: &mut N,
    mut cycle: Cycle,
) -> Result<usize, ReconcileError> {
    if !cycle.dirty_behavior && !cycle.dirty_service {
        return Ok(0);
    }

    if cycle.dirty_behavior {
        canonical_sort(&mut cycle.aggregate.behavior_points);
    }
    if cycle.dirty_service {
        canonical_sort(&mut cycle.aggregate.service_points);
    }

    let student_id = cycle.aggregate.student_id.clone();
    let week_start = cycle.aggregate.week_start;
    if cycle.created {
        store.save(&cycle.aggregate)?;
    } else {
        if cycle.dirty_behavior {
            store.patch_points(
                &student_id,
                week_start,
                PointPatch::Behavior(&cycle.aggregate.behavior_points),
            )?;
        }
        if cycle.dirty_service {
            store.patch_points(
                &student_id,
                week_start,
                PointPatch::Service(&cycle.aggregate.service_points),
            )?;
        }
    }
    debug!("flushed aggregate {student_id}/{week_start}");

    for point in cycle.pending.drain(..) {
        if let Err(err) = notifier.notify(&student_id, &point) {
            warn!("notification for {student_id} failed: {err}");
        }
    }

    Ok(1)
}
