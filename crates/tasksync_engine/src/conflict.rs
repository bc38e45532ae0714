//! Conflict rows, their store, and resolution policies.

use crate::config::ApplyOptions;
use crate::error::{SyncError, SyncResult};
use crate::mapping::ScopeId;
use crate::plan::TaskPair;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tasksync_model::{conflict_field_diffs, CommonTask, ConflictFieldDiff};

/// Identifies a conflicting pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConflictKey {
    /// Left task id.
    pub left_id: String,
    /// Right task id.
    pub right_id: String,
}

impl ConflictKey {
    /// Creates a key.
    pub fn new(left_id: impl Into<String>, right_id: impl Into<String>) -> Self {
        Self {
            left_id: left_id.into(),
            right_id: right_id.into(),
        }
    }

    /// Key of a pair.
    pub fn of(pair: &TaskPair) -> Self {
        Self::new(pair.left.id.clone(), pair.right.id.clone())
    }
}

/// One stored conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// Scope the pair belongs to.
    pub scope: ScopeId,
    /// Left task id.
    pub left_id: String,
    /// Right task id.
    pub right_id: String,
    /// When the conflict was detected.
    pub detected_at: DateTime<Utc>,
    /// Left task at detection time.
    pub left_snapshot: CommonTask,
    /// Right task at detection time.
    pub right_snapshot: CommonTask,
    /// Differing fields.
    pub diffs: Vec<ConflictFieldDiff>,
}

impl ConflictRecord {
    /// Builds a row from a conflicting pair.
    pub fn from_pair(scope: &ScopeId, pair: &TaskPair, detected_at: DateTime<Utc>) -> Self {
        Self {
            scope: scope.clone(),
            left_id: pair.left.id.clone(),
            right_id: pair.right.id.clone(),
            detected_at,
            left_snapshot: pair.left.clone(),
            right_snapshot: pair.right.clone(),
            diffs: conflict_field_diffs(&pair.left, &pair.right),
        }
    }

    /// Key of the row.
    pub fn key(&self) -> ConflictKey {
        ConflictKey::new(self.left_id.clone(), self.right_id.clone())
    }
}

/// Storage for the current conflict set.
///
/// The set is rebuilt for a scope on every run.
pub trait ConflictStore: Send + Sync {
    /// Removes all rows of a scope.
    fn clear(&self, scope: &ScopeId) -> SyncResult<()>;

    /// Inserts or replaces one row.
    fn upsert(&self, record: &ConflictRecord) -> SyncResult<()>;

    /// Replaces all rows of a scope.
    fn replace_all(&self, scope: &ScopeId, records: &[ConflictRecord]) -> SyncResult<()> {
        self.clear(scope)?;
        for record in records {
            self.upsert(record)?;
        }
        Ok(())
    }

    /// Lists rows, optionally restricted to one scope.
    fn list(&self, scope: Option<&ScopeId>) -> SyncResult<Vec<ConflictRecord>>;
}

/// An in-memory conflict store.
#[derive(Debug, Default)]
pub struct MemoryConflictStore {
    rows: RwLock<BTreeMap<ConflictKey, ConflictRecord>>,
}

impl MemoryConflictStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConflictStore for MemoryConflictStore {
    fn clear(&self, scope: &ScopeId) -> SyncResult<()> {
        self.rows.write().retain(|_, row| &row.scope != scope);
        Ok(())
    }

    fn upsert(&self, record: &ConflictRecord) -> SyncResult<()> {
        self.rows.write().insert(record.key(), record.clone());
        Ok(())
    }

    fn replace_all(&self, scope: &ScopeId, records: &[ConflictRecord]) -> SyncResult<()> {
        let mut rows = self.rows.write();
        rows.retain(|_, row| &row.scope != scope);
        for record in records {
            rows.insert(record.key(), record.clone());
        }
        Ok(())
    }

    fn list(&self, scope: Option<&ScopeId>) -> SyncResult<Vec<ConflictRecord>> {
        Ok(self
            .rows
            .read()
            .values()
            .filter(|row| scope.map_or(true, |s| &row.scope == s))
            .cloned()
            .collect())
    }
}

/// How conflicting pairs are settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Leave conflicts unresolved.
    #[default]
    None,
    /// The left side overwrites the right.
    FavorLeft,
    /// The right side overwrites the left.
    FavorRight,
    /// The strictly newer side wins; ties are skipped.
    LastWriteWins,
}

impl ConflictPolicy {
    /// Decides one conflicting pair.
    pub fn resolve(&self, pair: &TaskPair) -> Resolution {
        match self {
            ConflictPolicy::None => Resolution::Unresolved,
            ConflictPolicy::FavorLeft => Resolution::LeftWins,
            ConflictPolicy::FavorRight => Resolution::RightWins,
            ConflictPolicy::LastWriteWins => match (pair.left.modified_at, pair.right.modified_at) {
                (Some(l), Some(r)) if l > r => Resolution::LeftWins,
                (Some(l), Some(r)) if r > l => Resolution::RightWins,
                _ => Resolution::Skip,
            },
        }
    }

    /// Textual name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictPolicy::None => "none",
            ConflictPolicy::FavorLeft => "favor-left",
            ConflictPolicy::FavorRight => "favor-right",
            ConflictPolicy::LastWriteWins => "last-write-wins",
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictPolicy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(ConflictPolicy::None),
            "favor-left" | "left" => Ok(ConflictPolicy::FavorLeft),
            "favor-right" | "right" => Ok(ConflictPolicy::FavorRight),
            "last-write-wins" | "lww" => Ok(ConflictPolicy::LastWriteWins),
            other => Err(SyncError::Config(format!(
                "unknown conflict policy {other:?}"
            ))),
        }
    }
}

/// Outcome of applying a policy to one pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Write the left content to the right.
    LeftWins,
    /// Write the right content to the left.
    RightWins,
    /// Leave the pair alone this run.
    Skip,
    /// No policy applies.
    Unresolved,
}

/// Conflicts sorted by how they will be handled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedConflicts {
    /// Pairs whose left content goes to the right.
    pub to_right: Vec<TaskPair>,
    /// Pairs whose right content goes to the left.
    pub to_left: Vec<TaskPair>,
    /// Pairs skipped by last-write-wins.
    pub skipped: Vec<TaskPair>,
    /// Pairs no policy covers.
    pub unresolved: Vec<TaskPair>,
}

impl ResolvedConflicts {
    /// Number of pairs a policy settled.
    pub fn resolved_count(&self) -> usize {
        self.to_right.len() + self.to_left.len() + self.skipped.len()
    }
}

/// Applies the scope policy and per-pair overrides to a conflict list.
pub fn resolve_conflicts(conflicts: &[TaskPair], options: &ApplyOptions) -> ResolvedConflicts {
    let mut out = ResolvedConflicts::default();
    for pair in conflicts {
        match options.policy_for(&ConflictKey::of(pair)).resolve(pair) {
            Resolution::LeftWins => out.to_right.push(pair.clone()),
            Resolution::RightWins => out.to_left.push(pair.clone()),
            Resolution::Skip => out.skipped.push(pair.clone()),
            Resolution::Unresolved => out.unresolved.push(pair.clone()),
        }
    }
    out
}
