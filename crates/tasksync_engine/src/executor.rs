//! Applies a plan to both stores.
//!
//! Writes are not transactional across the two sides. Every successful
//! create, update or delete persists its mapping change before the next
//! item is attempted, so a failure mid-plan leaves the mappings of the
//! completed prefix in place and the next run picks up from there.

use crate::config::ApplyOptions;
use crate::conflict::{ConflictKey, ResolvedConflicts};
use crate::error::{SyncError, SyncResult};
use crate::mapping::{MappingStore, ScopeId, SyncRecord};
use crate::plan::{DeleteCandidate, SyncPlan, TaskPair};
use crate::redact::Redactor;
use crate::retry::{Idempotency, Retrier};
use crate::store::TaskStore;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tasksync_model::{CommonTask, Provenance, Side, TaskDate};
use tracing::{debug, info, warn};

/// Counts of what an apply did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplyOutcome {
    /// Auto-matched pairs linked.
    pub linked: usize,
    /// Tasks created on the left.
    pub created_left: usize,
    /// Tasks created on the right.
    pub created_right: usize,
    /// Tasks updated on the left.
    pub updated_left: usize,
    /// Tasks updated on the right.
    pub updated_right: usize,
    /// Tasks deleted on the left.
    pub deleted_left: usize,
    /// Tasks deleted on the right.
    pub deleted_right: usize,
    /// Unchanged pairs whose watermarks were refreshed.
    pub refreshed: usize,
    /// Conflicts left untouched.
    pub skipped_conflicts: usize,
}

impl ApplyOutcome {
    /// Number of task writes.
    pub fn writes(&self) -> usize {
        self.created_left
            + self.created_right
            + self.updated_left
            + self.updated_right
            + self.deleted_left
            + self.deleted_right
    }
}

/// Gives a recurring task without due date a due date of `today`.
///
/// Returns true if a date was synthesized.
fn anchor_recurrence(requires_anchor: bool, payload: &mut CommonTask, today: NaiveDate) -> bool {
    if !requires_anchor || payload.recurrence.is_none() || !payload.due.is_none() {
        return false;
    }
    payload.due = TaskDate::DateOnly(today);
    true
}

/// Writes plans to the two stores and keeps the mapping store current.
pub struct SyncExecutor<L: TaskStore, R: TaskStore, M: MappingStore> {
    left: Arc<L>,
    right: Arc<R>,
    mappings: Arc<M>,
    retrier: Arc<Retrier>,
    redactor: Redactor,
}

impl<L: TaskStore, R: TaskStore, M: MappingStore> SyncExecutor<L, R, M> {
    /// Creates an executor.
    pub fn new(left: Arc<L>, right: Arc<R>, mappings: Arc<M>, retrier: Arc<Retrier>) -> Self {
        Self {
            left,
            right,
            mappings,
            retrier,
            redactor: Redactor::default(),
        }
    }

    /// Sets the redactor used for logged failures.
    pub fn with_redactor(mut self, redactor: Redactor) -> Self {
        self.redactor = redactor;
        self
    }

    /// Applies `plan` with the resolved conflicts folded into the updates.
    ///
    /// Refuses before any write if conflicts are unresolved and
    /// `allow_conflicts` is not set.
    pub fn apply(
        &self,
        scope: &ScopeId,
        plan: &SyncPlan,
        resolved: &ResolvedConflicts,
        options: &ApplyOptions,
    ) -> SyncResult<ApplyOutcome> {
        if !resolved.unresolved.is_empty() && !options.allow_conflicts {
            return Err(SyncError::ConflictsPresent {
                count: resolved.unresolved.len(),
            });
        }

        let result = self.apply_unchecked(scope, plan, resolved, options);
        if let Err(e) = &result {
            warn!(scope = %scope, error = %self.redactor.redact(&e.to_string()), "apply stopped");
        }
        result
    }

    fn apply_unchecked(
        &self,
        scope: &ScopeId,
        plan: &SyncPlan,
        resolved: &ResolvedConflicts,
        options: &ApplyOptions,
    ) -> SyncResult<ApplyOutcome> {
        let now = Utc::now();
        let today = options.today();
        let mut outcome = ApplyOutcome {
            skipped_conflicts: resolved.unresolved.len() + resolved.skipped.len(),
            ..ApplyOutcome::default()
        };

        let unknown: HashSet<ConflictKey> =
            plan.unknown_direction.iter().map(ConflictKey::of).collect();
        let conflicted: HashSet<ConflictKey> = plan.conflicts.iter().map(ConflictKey::of).collect();

        for pair in &plan.auto_matched {
            let mut record = SyncRecord::new(&pair.left.id, &pair.right.id, scope.clone())
                .with_date_only(pair.left.due_is_date_only(), pair.left.start_is_date_only())
                .with_synced_at(now);
            // Without watermarks the next run compares own timestamps again.
            if !unknown.contains(&ConflictKey::of(pair)) {
                record = record.with_watermarks(pair.left.modified_at, pair.right.modified_at);
            }
            self.mappings.upsert(&record)?;
            outcome.linked += 1;
        }

        for task in &plan.create_right {
            self.create_right(scope, task, now)?;
            outcome.created_right += 1;
        }

        for task in &plan.create_left {
            self.create_left(scope, task, today, now)?;
            outcome.created_left += 1;
        }

        let mut touched: HashSet<ConflictKey> = HashSet::new();

        for pair in plan.update_right.iter().chain(&resolved.to_right) {
            self.update_right(scope, pair, now)?;
            touched.insert(ConflictKey::of(pair));
            outcome.updated_right += 1;
        }

        for pair in plan.update_left.iter().chain(&resolved.to_left) {
            self.update_left(scope, pair, today, now)?;
            touched.insert(ConflictKey::of(pair));
            outcome.updated_left += 1;
        }

        for pair in &plan.mapped_pairs {
            let key = ConflictKey::of(pair);
            if touched.contains(&key) || conflicted.contains(&key) || unknown.contains(&key) {
                continue;
            }
            if let Some(record) = self.mappings.get_by_left(&pair.left.id)? {
                let refreshed = record
                    .with_watermarks(pair.left.modified_at, pair.right.modified_at)
                    .with_synced_at(now);
                self.mappings.upsert(&refreshed)?;
                outcome.refreshed += 1;
            }
        }

        for candidate in &plan.delete_right {
            if self.delete(self.right.as_ref(), candidate)? {
                outcome.deleted_right += 1;
            }
            self.mappings.delete_by_left(&candidate.record.left_id)?;
        }

        for candidate in &plan.delete_left {
            if self.delete(self.left.as_ref(), candidate)? {
                outcome.deleted_left += 1;
            }
            self.mappings.delete_by_right(&candidate.record.right_id)?;
        }

        info!(
            scope = %scope,
            linked = outcome.linked,
            writes = outcome.writes(),
            refreshed = outcome.refreshed,
            skipped_conflicts = outcome.skipped_conflicts,
            "applied scope"
        );
        Ok(outcome)
    }

    fn create_right(&self, scope: &ScopeId, task: &CommonTask, now: DateTime<Utc>) -> SyncResult<()> {
        let payload = task.for_creation(Side::Right, scope.list_for(Side::Right));
        let receipt = self.retrier.run("create right", Idempotency::NonIdempotent, || {
            self.right.create(scope, &payload)
        })?;
        debug!(left = %task.id, right = %receipt.id, "created on right");
        let record = SyncRecord::new(&task.id, &receipt.id, scope.clone())
            .with_watermarks(task.modified_at, receipt.modified_at)
            .with_date_only(task.due_is_date_only(), task.start_is_date_only())
            .with_provenance(receipt.due_provenance)
            .with_synced_at(now);
        self.mappings.upsert(&record)
    }

    fn create_left(
        &self,
        scope: &ScopeId,
        task: &CommonTask,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> SyncResult<()> {
        let mut payload = task.for_creation(Side::Left, scope.list_for(Side::Left));
        let inferred = anchor_recurrence(self.left.requires_recurrence_anchor(), &mut payload, today);
        let receipt = self.retrier.run("create left", Idempotency::NonIdempotent, || {
            self.left.create(scope, &payload)
        })?;
        debug!(left = %receipt.id, right = %task.id, inferred, "created on left");
        let provenance = if inferred {
            Provenance::Inferred
        } else {
            receipt.due_provenance
        };
        let record = SyncRecord::new(&receipt.id, &task.id, scope.clone())
            .with_watermarks(receipt.modified_at, task.modified_at)
            .with_date_only(task.due_is_date_only(), task.start_is_date_only())
            .with_provenance(provenance)
            .with_synced_at(now);
        self.mappings.upsert(&record)
    }

    fn update_right(&self, scope: &ScopeId, pair: &TaskPair, now: DateTime<Utc>) -> SyncResult<()> {
        let existing = self.mappings.get_by_left(&pair.left.id)?;
        let provenance = existing
            .as_ref()
            .map_or(Provenance::UserSet, |r| r.due_provenance);

        let mut payload = pair.right.with_content_of(&pair.left);
        if provenance.is_inferred() {
            // A synthesized due never leaves the side that needed it.
            payload.due = TaskDate::None;
        }
        let receipt = self.retrier.run("update right", Idempotency::Idempotent, || {
            self.right.update(&payload)
        })?;
        debug!(left = %pair.left.id, right = %pair.right.id, "updated right");

        let record = existing
            .unwrap_or_else(|| SyncRecord::new(&pair.left.id, &pair.right.id, scope.clone()))
            .with_watermarks(pair.left.modified_at, receipt.modified_at)
            .with_date_only(pair.left.due_is_date_only(), pair.left.start_is_date_only())
            .with_synced_at(now);
        self.mappings.upsert(&record)
    }

    fn update_left(
        &self,
        scope: &ScopeId,
        pair: &TaskPair,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> SyncResult<()> {
        let existing = self.mappings.get_by_left(&pair.left.id)?;
        let was_inferred = existing
            .as_ref()
            .is_some_and(|r| r.due_provenance.is_inferred());

        let mut payload = pair.left.with_content_of(&pair.right);
        let mut provenance = Provenance::UserSet;
        if was_inferred && payload.due.is_none() {
            payload.due = pair.left.due.clone();
            provenance = Provenance::Inferred;
        }
        if anchor_recurrence(self.left.requires_recurrence_anchor(), &mut payload, today) {
            provenance = Provenance::Inferred;
        }

        let receipt = self.retrier.run("update left", Idempotency::Idempotent, || {
            self.left.update(&payload)
        })?;
        debug!(left = %pair.left.id, right = %pair.right.id, ?provenance, "updated left");

        let record = existing
            .unwrap_or_else(|| SyncRecord::new(&pair.left.id, &pair.right.id, scope.clone()))
            .with_watermarks(receipt.modified_at, pair.right.modified_at)
            .with_date_only(pair.right.due_is_date_only(), pair.right.start_is_date_only())
            .with_provenance(provenance)
            .with_synced_at(now);
        self.mappings.upsert(&record)
    }

    /// Deletes the candidate's surviving item. Returns true if a task was
    /// actually removed; an item that is already gone counts as done.
    fn delete<S: TaskStore + ?Sized>(&self, store: &S, candidate: &DeleteCandidate) -> SyncResult<bool> {
        let Some(target) = &candidate.target else {
            return Ok(false);
        };
        let label = format!("delete {}", store.side());
        match self
            .retrier
            .run(&label, Idempotency::Idempotent, || store.delete(&target.id))
        {
            Ok(()) => {
                debug!(side = %store.side(), id = %target.id, "deleted");
                Ok(true)
            }
            Err(e) if e.is_not_found() => {
                debug!(side = %store.side(), id = %target.id, "already gone");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_only_for_recurring_undated_tasks() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 20).unwrap();
        let mut task = CommonTask::new(Side::Left, "", "inbox", "Water plants")
            .with_recurrence(tasksync_model::Recurrence::Weekly(1));

        assert!(!anchor_recurrence(false, &mut task.clone(), today));
        assert!(anchor_recurrence(true, &mut task, today));
        assert_eq!(task.due, TaskDate::DateOnly(today));
        assert!(!anchor_recurrence(true, &mut task, today));

        let mut plain = CommonTask::new(Side::Left, "", "inbox", "Call mum");
        assert!(!anchor_recurrence(true, &mut plain, today));
        assert!(plain.due.is_none());
    }

    #[test]
    fn outcome_counts_writes() {
        let outcome = ApplyOutcome {
            linked: 3,
            created_left: 1,
            deleted_right: 2,
            refreshed: 5,
            ..ApplyOutcome::default()
        };
        assert_eq!(outcome.writes(), 3);
    }
}
