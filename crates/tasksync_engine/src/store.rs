//! Task store abstraction for the two sides.

use crate::error::{SyncError, SyncResult};
use crate::mapping::ScopeId;
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use tasksync_model::{CommonTask, Provenance, Side};

/// Result of a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReceipt {
    /// Id of the written task. New for creates.
    pub id: String,
    /// Modification time the store assigned.
    pub modified_at: Option<DateTime<Utc>>,
    /// Provenance of the due date as written.
    pub due_provenance: Provenance,
}

impl WriteReceipt {
    /// Creates a receipt for a user-set due date.
    pub fn new(id: impl Into<String>, modified_at: Option<DateTime<Utc>>) -> Self {
        Self {
            id: id.into(),
            modified_at,
            due_provenance: Provenance::UserSet,
        }
    }
}

/// One side of the sync.
///
/// This trait abstracts the platform adapters (local reminders, remote
/// API), allowing for different implementations.
pub trait TaskStore: Send + Sync {
    /// The side this store serves.
    fn side(&self) -> Side;

    /// Returns true if a recurring task must carry a due date on this side.
    fn requires_recurrence_anchor(&self) -> bool {
        false
    }

    /// Reads all tasks of the scope's list on this side.
    fn fetch(&self, scope: &ScopeId) -> SyncResult<Vec<CommonTask>>;

    /// Creates a task in the scope's list.
    fn create(&self, scope: &ScopeId, task: &CommonTask) -> SyncResult<WriteReceipt>;

    /// Overwrites the task with `task.id`.
    fn update(&self, task: &CommonTask) -> SyncResult<WriteReceipt>;

    /// Deletes the task with `id`. Fails with `NotFound` if it is gone.
    fn delete(&self, id: &str) -> SyncResult<()>;
}

/// Store operation, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// `fetch`
    Fetch,
    /// `create`
    Create,
    /// `update`
    Update,
    /// `delete`
    Delete,
}

/// Kind of injected failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A 503 from the server.
    Transient,
    /// A 401.
    NotAuthorized,
    /// The target is gone.
    NotFound,
}

impl FailureKind {
    fn to_error(self, op: StoreOp) -> SyncError {
        match self {
            FailureKind::Transient => SyncError::Server {
                status: 503,
                message: format!("injected failure on {op:?}"),
            },
            FailureKind::NotAuthorized => SyncError::NotAuthorized {
                message: format!("injected failure on {op:?}"),
            },
            FailureKind::NotFound => SyncError::not_found(format!("injected failure on {op:?}")),
        }
    }
}

/// An in-memory task store with failure injection, for testing.
#[derive(Debug)]
pub struct MemoryTaskStore {
    side: Side,
    requires_anchor: bool,
    tasks: RwLock<BTreeMap<String, CommonTask>>,
    clock: Mutex<DateTime<Utc>>,
    failures: Mutex<VecDeque<(StoreOp, FailureKind)>>,
    calls: Mutex<HashMap<StoreOp, u64>>,
    next_id: AtomicU64,
}

impl MemoryTaskStore {
    /// Creates an empty store for `side`.
    pub fn new(side: Side) -> Self {
        Self {
            side,
            requires_anchor: false,
            tasks: RwLock::new(BTreeMap::new()),
            clock: Mutex::new(Utc::now()),
            failures: Mutex::new(VecDeque::new()),
            calls: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Makes recurring tasks require a due date, like the reminder store.
    pub fn with_recurrence_anchor(mut self) -> Self {
        self.requires_anchor = true;
        self
    }

    /// Starts the write clock at `start`.
    pub fn with_clock(self, start: DateTime<Utc>) -> Self {
        *self.clock.lock() = start;
        self
    }

    /// Inserts a task as-is.
    pub fn insert(&self, task: CommonTask) {
        self.tasks.write().insert(task.id.clone(), task);
    }

    /// Returns a task by id.
    pub fn get(&self, id: &str) -> Option<CommonTask> {
        self.tasks.read().get(id).cloned()
    }

    /// Returns all tasks.
    pub fn all(&self) -> Vec<CommonTask> {
        self.tasks.read().values().cloned().collect()
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }

    /// Queues a failure for the next call of `op`.
    pub fn fail_next(&self, op: StoreOp, kind: FailureKind) {
        self.failures.lock().push_back((op, kind));
    }

    /// Number of calls made to `op`, failed ones included.
    pub fn calls(&self, op: StoreOp) -> u64 {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    fn enter(&self, op: StoreOp) -> SyncResult<()> {
        *self.calls.lock().entry(op).or_insert(0) += 1;
        let mut failures = self.failures.lock();
        if let Some(pos) = failures.iter().position(|(o, _)| *o == op) {
            if let Some((_, kind)) = failures.remove(pos) {
                return Err(kind.to_error(op));
            }
        }
        Ok(())
    }

    fn tick(&self) -> DateTime<Utc> {
        let mut clock = self.clock.lock();
        *clock += Duration::seconds(1);
        *clock
    }
}

impl TaskStore for MemoryTaskStore {
    fn side(&self) -> Side {
        self.side
    }

    fn requires_recurrence_anchor(&self) -> bool {
        self.requires_anchor
    }

    fn fetch(&self, scope: &ScopeId) -> SyncResult<Vec<CommonTask>> {
        self.enter(StoreOp::Fetch)?;
        let list = scope.list_for(self.side);
        Ok(self
            .tasks
            .read()
            .values()
            .filter(|t| t.list_id == list)
            .cloned()
            .collect())
    }

    fn create(&self, scope: &ScopeId, task: &CommonTask) -> SyncResult<WriteReceipt> {
        self.enter(StoreOp::Create)?;
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = format!("{}-{n}", self.side);
        let modified_at = self.tick();
        let mut stored = task.clone();
        stored.side = self.side;
        stored.id = id.clone();
        stored.list_id = scope.list_for(self.side).to_string();
        stored.modified_at = Some(modified_at);
        self.tasks.write().insert(id.clone(), stored);
        Ok(WriteReceipt::new(id, Some(modified_at)))
    }

    fn update(&self, task: &CommonTask) -> SyncResult<WriteReceipt> {
        self.enter(StoreOp::Update)?;
        let modified_at = self.tick();
        let mut tasks = self.tasks.write();
        let existing = tasks
            .get_mut(&task.id)
            .ok_or_else(|| SyncError::not_found(format!("{} task {}", self.side, task.id)))?;
        let list_id = existing.list_id.clone();
        *existing = task.clone();
        existing.side = self.side;
        existing.list_id = list_id;
        existing.modified_at = Some(modified_at);
        Ok(WriteReceipt::new(task.id.clone(), Some(modified_at)))
    }

    fn delete(&self, id: &str) -> SyncResult<()> {
        self.enter(StoreOp::Delete)?;
        self.tasks
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| SyncError::not_found(format!("{} task {id}", self.side)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> ScopeId {
        ScopeId::new("inbox", "7")
    }

    #[test]
    fn create_assigns_id_and_clock() {
        let start: DateTime<Utc> = "2026-01-20T09:00:00Z".parse().unwrap();
        let store = MemoryTaskStore::new(Side::Right).with_clock(start);
        let task = CommonTask::new(Side::Left, "", "inbox", "Call mum");

        let receipt = store.create(&scope(), &task).unwrap();
        assert_eq!(receipt.id, "right-1");
        assert_eq!(receipt.modified_at, Some(start + Duration::seconds(1)));

        let stored = store.get("right-1").unwrap();
        assert_eq!(stored.side, Side::Right);
        assert_eq!(stored.list_id, "7");
        assert_eq!(store.fetch(&scope()).unwrap().len(), 1);
    }

    #[test]
    fn update_and_delete_missing() {
        let store = MemoryTaskStore::new(Side::Left);
        let task = CommonTask::new(Side::Left, "l9", "inbox", "x");
        assert!(store.update(&task).unwrap_err().is_not_found());
        assert!(store.delete("l9").unwrap_err().is_not_found());
    }

    #[test]
    fn injected_failures_are_consumed_once() {
        let store = MemoryTaskStore::new(Side::Left);
        store.fail_next(StoreOp::Fetch, FailureKind::Transient);

        assert!(store.fetch(&scope()).unwrap_err().is_transient());
        assert!(store.fetch(&scope()).is_ok());
        assert_eq!(store.calls(StoreOp::Fetch), 2);
        assert_eq!(store.calls(StoreOp::Create), 0);
    }
}
