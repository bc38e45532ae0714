//! Reconciliation of two snapshots against the persisted mappings.
//!
//! ## Algorithm
//!
//! 1. Every mapping is probed against both snapshots. Resolving on both
//!    sides makes a mapped pair; a missing side makes the survivor a
//!    deletion candidate.
//! 2. Mapped pairs are compared against their watermarks. A side changed
//!    when its modification time is later than the watermark. Both changed
//!    with differing content is a conflict; exactly one changed updates the
//!    other side.
//! 3. Unmapped tasks are grouped by match key. A key with exactly one task
//!    per side is auto-matched, anything more is reported as ambiguous.
//! 4. One-sided keys become creates on the other side, except completed
//!    tasks.
//!
//! Whenever the direction of a change cannot be told, nothing is written.

use crate::conflict::{ConflictRecord, ConflictStore};
use crate::error::{SyncError, SyncResult};
use crate::mapping::{MappingStore, ScopeId, SyncRecord};
use crate::plan::{DeleteCandidate, SyncPlan, TaskPair};
use chrono::{Local, Utc};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tasksync_model::{match_key, tasks_differ, CommonTask};
use tracing::{debug, info, warn};

/// Which way a differing pair should flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Content is equal.
    NoOp,
    /// The left side wins.
    ToRight,
    /// The right side wins.
    ToLeft,
    /// Both sides changed.
    Conflict,
    /// Content differs but no side is clearly newer.
    Unknown,
}

/// Decides direction from the tasks' own timestamps only.
pub fn direct_direction(left: &CommonTask, right: &CommonTask, ignore_due: bool) -> Direction {
    if !tasks_differ(left, right, ignore_due) {
        return Direction::NoOp;
    }
    match (left.modified_at, right.modified_at) {
        (Some(l), Some(r)) if l > r => Direction::ToRight,
        (Some(l), Some(r)) if r > l => Direction::ToLeft,
        _ => Direction::Unknown,
    }
}

/// Decides direction for a mapped pair using its watermarks.
pub fn watermark_direction(left: &CommonTask, right: &CommonTask, record: &SyncRecord) -> Direction {
    let ignore_due = record.due_provenance.is_inferred();
    let (Some(seen_left), Some(seen_right)) = (record.last_seen_left, record.last_seen_right) else {
        return direct_direction(left, right, ignore_due);
    };
    if !tasks_differ(left, right, ignore_due) {
        return Direction::NoOp;
    }
    let left_changed = left.modified_at.is_some_and(|at| at > seen_left);
    let right_changed = right.modified_at.is_some_and(|at| at > seen_right);
    match (left_changed, right_changed) {
        (true, true) => Direction::Conflict,
        (true, false) => Direction::ToRight,
        (false, true) => Direction::ToLeft,
        (false, false) => Direction::NoOp,
    }
}

/// Indexes a snapshot by id, keeping the first task of a duplicated id.
fn index_snapshot<'a>(tasks: &'a [CommonTask], side: &str) -> BTreeMap<&'a str, &'a CommonTask> {
    let mut index = BTreeMap::new();
    for task in tasks {
        if index.contains_key(task.id.as_str()) {
            warn!(side, id = %task.id, "duplicate id in snapshot, keeping first");
            continue;
        }
        index.insert(task.id.as_str(), task);
    }
    index
}

fn push_direction(plan: &mut SyncPlan, pair: TaskPair, direction: Direction) {
    match direction {
        Direction::NoOp => {}
        Direction::ToRight => plan.update_right.push(pair),
        Direction::ToLeft => plan.update_left.push(pair),
        Direction::Conflict => plan.conflicts.push(pair),
        Direction::Unknown => plan.unknown_direction.push(pair),
    }
}

/// Computes the plan for one scope.
///
/// Pure and deterministic: records are processed by left id and match keys
/// in sorted order.
pub fn reconcile(left: &[CommonTask], right: &[CommonTask], records: &[SyncRecord]) -> SyncPlan {
    let left_index = index_snapshot(left, "left");
    let right_index = index_snapshot(right, "right");

    let mut records: Vec<&SyncRecord> = records.iter().collect();
    records.sort_by(|a, b| a.left_id.cmp(&b.left_id));

    let mut plan = SyncPlan::default();
    let mut mapped_left: HashSet<&str> = HashSet::new();
    let mut mapped_right: HashSet<&str> = HashSet::new();

    for record in records {
        mapped_left.insert(record.left_id.as_str());
        mapped_right.insert(record.right_id.as_str());

        let l = left_index.get(record.left_id.as_str()).copied();
        let r = right_index.get(record.right_id.as_str()).copied();
        match (l, r) {
            (Some(l), Some(r)) => {
                let pair = TaskPair::new(l.clone(), r.clone());
                let direction = watermark_direction(l, r, record);
                debug!(left = %l.id, right = %r.id, ?direction, "mapped pair");
                plan.mapped_pairs.push(pair.clone());
                push_direction(&mut plan, pair, direction);
            }
            (None, Some(r)) => {
                let candidate = DeleteCandidate {
                    record: record.clone(),
                    target: Some(r.clone()),
                };
                if r.completed {
                    plan.ignored_missing_completed.push(candidate);
                } else {
                    plan.delete_right.push(candidate);
                }
            }
            (Some(l), None) => {
                let candidate = DeleteCandidate {
                    record: record.clone(),
                    target: Some(l.clone()),
                };
                if l.completed {
                    plan.ignored_missing_completed.push(candidate);
                } else {
                    plan.delete_left.push(candidate);
                }
            }
            (None, None) => plan.delete_right.push(DeleteCandidate {
                record: record.clone(),
                target: None,
            }),
        }
    }

    let mut left_groups: BTreeMap<String, Vec<&CommonTask>> = BTreeMap::new();
    for task in left_index
        .values()
        .copied()
        .filter(|t| !mapped_left.contains(t.id.as_str()))
    {
        left_groups.entry(match_key(task)).or_default().push(task);
    }
    let mut right_groups: BTreeMap<String, Vec<&CommonTask>> = BTreeMap::new();
    for task in right_index
        .values()
        .copied()
        .filter(|t| !mapped_right.contains(t.id.as_str()))
    {
        right_groups.entry(match_key(task)).or_default().push(task);
    }

    let keys: BTreeSet<&String> = left_groups.keys().chain(right_groups.keys()).collect();
    for key in keys {
        match (left_groups.get(key), right_groups.get(key)) {
            (Some(ls), Some(rs)) => {
                if let ([l], [r]) = (ls.as_slice(), rs.as_slice()) {
                    let pair = TaskPair::new((*l).clone(), (*r).clone());
                    let direction = direct_direction(l, r, false);
                    debug!(key = %key, left = %l.id, right = %r.id, ?direction, "auto-matched");
                    plan.auto_matched.push(pair.clone());
                    push_direction(&mut plan, pair, direction);
                } else {
                    debug!(key = %key, left = ls.len(), right = rs.len(), "ambiguous key");
                    plan.ambiguous_keys.push(key.clone());
                }
            }
            (Some(ls), None) => plan
                .create_right
                .extend(ls.iter().filter(|t| !t.completed).map(|t| (*t).clone())),
            (None, Some(rs)) => plan
                .create_left
                .extend(rs.iter().filter(|t| !t.completed).map(|t| (*t).clone())),
            (None, None) => {}
        }
    }

    plan
}

/// Restores date-only due/start values on right tasks from the mapping flags.
///
/// The right side always reports a full timestamp, so a calendar day written
/// earlier comes back as local midnight.
pub fn apply_date_only_flags(right: &mut [CommonTask], records: &[SyncRecord]) {
    let flags: BTreeMap<&str, (bool, bool)> = records
        .iter()
        .map(|r| (r.right_id.as_str(), (r.date_only_due, r.date_only_start)))
        .collect();
    for task in right.iter_mut() {
        if let Some((due, start)) = flags.get(task.id.as_str()) {
            task.due = task.due.coerce_date_only(*due, &Local);
            task.start = task.start.coerce_date_only(*start, &Local);
        }
    }
}

fn check_one_to_one(records: &[SyncRecord]) -> SyncResult<()> {
    let mut lefts = HashSet::new();
    let mut rights = HashSet::new();
    for record in records {
        if !lefts.insert(record.left_id.as_str()) {
            return Err(SyncError::MappingConflict(format!(
                "left id {} is mapped twice",
                record.left_id
            )));
        }
        if !rights.insert(record.right_id.as_str()) {
            return Err(SyncError::MappingConflict(format!(
                "right id {} is mapped twice",
                record.right_id
            )));
        }
    }
    Ok(())
}

/// Reconciles scopes against injected mapping and conflict stores.
pub struct Reconciler<M: MappingStore, C: ConflictStore> {
    mappings: Arc<M>,
    conflicts: Arc<C>,
}

impl<M: MappingStore, C: ConflictStore> Reconciler<M, C> {
    /// Creates a reconciler.
    pub fn new(mappings: Arc<M>, conflicts: Arc<C>) -> Self {
        Self {
            mappings,
            conflicts,
        }
    }

    /// Plans one scope and rebuilds its conflict rows.
    pub fn plan(
        &self,
        scope: &ScopeId,
        left: &[CommonTask],
        right: &[CommonTask],
    ) -> SyncResult<SyncPlan> {
        let records = self.mappings.load(scope)?;
        check_one_to_one(&records)?;

        let mut right = right.to_vec();
        apply_date_only_flags(&mut right, &records);

        let plan = reconcile(left, &right, &records);

        let now = Utc::now();
        let rows: Vec<ConflictRecord> = plan
            .conflicts
            .iter()
            .map(|pair| ConflictRecord::from_pair(scope, pair, now))
            .collect();
        self.conflicts.replace_all(scope, &rows)?;

        let s = plan.summary();
        info!(
            scope = %scope,
            create_left = s.create_left,
            create_right = s.create_right,
            update_left = s.update_left,
            update_right = s.update_right,
            delete_left = s.delete_left,
            delete_right = s.delete_right,
            conflicts = s.conflicts,
            ambiguous = s.ambiguous_keys,
            unknown_direction = s.unknown_direction,
            "planned scope"
        );
        Ok(plan)
    }
}
