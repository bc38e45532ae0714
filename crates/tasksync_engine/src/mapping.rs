//! Persisted correspondence between left and right tasks.

use crate::error::SyncResult;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tasksync_model::{Provenance, Side};

/// One synced pairing of a left list and a right project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeId {
    /// List id on the left side.
    pub left_list_id: String,
    /// Project id on the right side.
    pub right_project_id: String,
}

impl ScopeId {
    /// Creates a scope id.
    pub fn new(left_list_id: impl Into<String>, right_project_id: impl Into<String>) -> Self {
        Self {
            left_list_id: left_list_id.into(),
            right_project_id: right_project_id.into(),
        }
    }

    /// The list/project id on `side`.
    pub fn list_for(&self, side: Side) -> &str {
        match side {
            Side::Left => &self.left_list_id,
            Side::Right => &self.right_project_id,
        }
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}→{}", self.left_list_id, self.right_project_id)
    }
}

/// A persisted 1:1 link between a left task and a right task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    /// Left task id. Unique across all records.
    pub left_id: String,
    /// Right task id. Unique across all records.
    pub right_id: String,
    /// Scope the pair belongs to.
    pub scope: ScopeId,
    /// Left modification time seen at the end of the last sync.
    pub last_seen_left: Option<DateTime<Utc>>,
    /// Right modification time seen at the end of the last sync.
    pub last_seen_right: Option<DateTime<Utc>>,
    /// The due date is a calendar day, not an instant.
    pub date_only_due: bool,
    /// The start date is a calendar day, not an instant.
    pub date_only_start: bool,
    /// Where the due date came from.
    pub due_provenance: Provenance,
    /// When the pair was last written by a sync.
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl SyncRecord {
    /// Creates a record without watermarks.
    pub fn new(left_id: impl Into<String>, right_id: impl Into<String>, scope: ScopeId) -> Self {
        Self {
            left_id: left_id.into(),
            right_id: right_id.into(),
            scope,
            last_seen_left: None,
            last_seen_right: None,
            date_only_due: false,
            date_only_start: false,
            due_provenance: Provenance::UserSet,
            last_synced_at: None,
        }
    }

    /// Sets both watermarks.
    pub fn with_watermarks(
        mut self,
        left: Option<DateTime<Utc>>,
        right: Option<DateTime<Utc>>,
    ) -> Self {
        self.last_seen_left = left;
        self.last_seen_right = right;
        self
    }

    /// Sets the date-only flags.
    pub fn with_date_only(mut self, due: bool, start: bool) -> Self {
        self.date_only_due = due;
        self.date_only_start = start;
        self
    }

    /// Sets the due provenance.
    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.due_provenance = provenance;
        self
    }

    /// Sets the last sync time.
    pub fn with_synced_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_synced_at = Some(at);
        self
    }
}

/// Storage for sync records.
///
/// Implementations keep `left_id` and `right_id` unique: an upsert evicts
/// any other record sharing either id.
pub trait MappingStore: Send + Sync {
    /// Loads all records of a scope.
    fn load(&self, scope: &ScopeId) -> SyncResult<Vec<SyncRecord>>;

    /// Loads every record of every scope.
    fn load_all(&self) -> SyncResult<Vec<SyncRecord>>;

    /// Inserts or replaces a record.
    fn upsert(&self, record: &SyncRecord) -> SyncResult<()>;

    /// Looks a record up by left id.
    fn get_by_left(&self, left_id: &str) -> SyncResult<Option<SyncRecord>>;

    /// Looks a record up by right id.
    fn get_by_right(&self, right_id: &str) -> SyncResult<Option<SyncRecord>>;

    /// Deletes the record with this left id, if any.
    fn delete_by_left(&self, left_id: &str) -> SyncResult<()>;

    /// Deletes the record with this right id, if any.
    fn delete_by_right(&self, right_id: &str) -> SyncResult<()>;
}

/// An in-memory mapping store.
#[derive(Debug, Default)]
pub struct MemoryMappingStore {
    records: RwLock<BTreeMap<String, SyncRecord>>,
}

impl MemoryMappingStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl MappingStore for MemoryMappingStore {
    fn load(&self, scope: &ScopeId) -> SyncResult<Vec<SyncRecord>> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| &r.scope == scope)
            .cloned()
            .collect())
    }

    fn load_all(&self) -> SyncResult<Vec<SyncRecord>> {
        Ok(self.records.read().values().cloned().collect())
    }

    fn upsert(&self, record: &SyncRecord) -> SyncResult<()> {
        let mut records = self.records.write();
        records.retain(|left_id, r| left_id != &record.left_id && r.right_id != record.right_id);
        records.insert(record.left_id.clone(), record.clone());
        Ok(())
    }

    fn get_by_left(&self, left_id: &str) -> SyncResult<Option<SyncRecord>> {
        Ok(self.records.read().get(left_id).cloned())
    }

    fn get_by_right(&self, right_id: &str) -> SyncResult<Option<SyncRecord>> {
        Ok(self
            .records
            .read()
            .values()
            .find(|r| r.right_id == right_id)
            .cloned())
    }

    fn delete_by_left(&self, left_id: &str) -> SyncResult<()> {
        self.records.write().remove(left_id);
        Ok(())
    }

    fn delete_by_right(&self, right_id: &str) -> SyncResult<()> {
        self.records.write().retain(|_, r| r.right_id != right_id);
        Ok(())
    }
}
