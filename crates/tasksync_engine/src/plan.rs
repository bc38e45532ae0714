//! The output of reconciliation.

use crate::mapping::SyncRecord;
use serde::Serialize;
use tasksync_model::CommonTask;

/// A left task and the right task it corresponds to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskPair {
    /// Left task.
    pub left: CommonTask,
    /// Right task.
    pub right: CommonTask,
}

impl TaskPair {
    /// Creates a pair.
    pub fn new(left: CommonTask, right: CommonTask) -> Self {
        Self { left, right }
    }
}

/// A mapped item whose counterpart disappeared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteCandidate {
    /// The mapping of the pair.
    pub record: SyncRecord,
    /// The surviving item to delete, if it still exists.
    pub target: Option<CommonTask>,
}

/// Everything one run intends to do for one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    /// Right tasks to create on the left.
    pub create_left: Vec<CommonTask>,
    /// Left tasks to create on the right.
    pub create_right: Vec<CommonTask>,
    /// Pairs where the right side wins.
    pub update_left: Vec<TaskPair>,
    /// Pairs where the left side wins.
    pub update_right: Vec<TaskPair>,
    /// Left items whose right counterpart was deleted.
    pub delete_left: Vec<DeleteCandidate>,
    /// Right items whose left counterpart was deleted.
    pub delete_right: Vec<DeleteCandidate>,
    /// Deletion candidates kept because the survivor is completed.
    pub ignored_missing_completed: Vec<DeleteCandidate>,
    /// Pairs changed on both sides since the last sync.
    pub conflicts: Vec<TaskPair>,
    /// Every pair whose mapping resolved on both sides.
    pub mapped_pairs: Vec<TaskPair>,
    /// Unmapped pairs matched by content key.
    pub auto_matched: Vec<TaskPair>,
    /// Match keys with more than one candidate on a side.
    pub ambiguous_keys: Vec<String>,
    /// Differing pairs where no side is clearly newer.
    pub unknown_direction: Vec<TaskPair>,
}

/// Bucket sizes of a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    /// Creates on the left.
    pub create_left: usize,
    /// Creates on the right.
    pub create_right: usize,
    /// Updates on the left.
    pub update_left: usize,
    /// Updates on the right.
    pub update_right: usize,
    /// Deletes on the left.
    pub delete_left: usize,
    /// Deletes on the right.
    pub delete_right: usize,
    /// Ignored deletions.
    pub ignored_missing_completed: usize,
    /// Conflicts.
    pub conflicts: usize,
    /// Mapped pairs.
    pub mapped_pairs: usize,
    /// Auto-matched pairs.
    pub auto_matched: usize,
    /// Ambiguous keys.
    pub ambiguous_keys: usize,
    /// Pairs with unknown direction.
    pub unknown_direction: usize,
}

impl PlanSummary {
    /// Total number of writes the plan would make.
    pub fn writes(&self) -> usize {
        self.create_left
            + self.create_right
            + self.update_left
            + self.update_right
            + self.delete_left
            + self.delete_right
    }
}

impl SyncPlan {
    /// Returns the bucket sizes.
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create_left: self.create_left.len(),
            create_right: self.create_right.len(),
            update_left: self.update_left.len(),
            update_right: self.update_right.len(),
            delete_left: self.delete_left.len(),
            delete_right: self.delete_right.len(),
            ignored_missing_completed: self.ignored_missing_completed.len(),
            conflicts: self.conflicts.len(),
            mapped_pairs: self.mapped_pairs.len(),
            auto_matched: self.auto_matched.len(),
            ambiguous_keys: self.ambiguous_keys.len(),
            unknown_direction: self.unknown_direction.len(),
        }
    }

    /// Returns true if the plan writes nothing.
    pub fn is_empty(&self) -> bool {
        self.summary().writes() == 0 && self.auto_matched.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasksync_model::Side;

    #[test]
    fn summary_counts() {
        let left = CommonTask::new(Side::Left, "l1", "inbox", "a");
        let right = CommonTask::new(Side::Right, "r1", "7", "a");
        let plan = SyncPlan {
            create_right: vec![left.clone()],
            update_left: vec![TaskPair::new(left.clone(), right.clone())],
            ambiguous_keys: vec!["a|0|none".into()],
            ..SyncPlan::default()
        };
        let summary = plan.summary();
        assert_eq!(summary.create_right, 1);
        assert_eq!(summary.update_left, 1);
        assert_eq!(summary.ambiguous_keys, 1);
        assert_eq!(summary.writes(), 2);
        assert!(!plan.is_empty());
        assert!(SyncPlan::default().is_empty());
    }
}
