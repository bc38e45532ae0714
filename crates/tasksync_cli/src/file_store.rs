//! Task stores backed by JSON files.
//!
//! Each side keeps its own wire format: the left file holds reminder-style
//! records with calendar dates and a 0/1/5/9 priority, the right file holds
//! remote-style records with full timestamps and interval-based repeats.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tasksync_engine::{ScopeId, SyncError, SyncResult, TaskStore, WriteReceipt};
use tasksync_model::{
    normalize_due, priority_from_left, priority_to_left, Alarm, AlarmAnchor, CommonTask,
    Recurrence, RepeatRule, Side, TaskDate,
};
use tracing::debug;
use uuid::Uuid;

/// A record in one side's file.
pub trait WireTask: Serialize + DeserializeOwned + Send + Sync {
    /// Side the format belongs to.
    const SIDE: Side;

    /// Whether recurring tasks need a due date on this side.
    const REQUIRES_ANCHOR: bool;

    /// Record id.
    fn id(&self) -> &str;

    /// List or project the record belongs to.
    fn list(&self) -> &str;

    /// Converts to the canonical form.
    fn to_common(&self) -> SyncResult<CommonTask>;

    /// Converts from the canonical form.
    fn from_common(task: &CommonTask, id: String, list: String, modified: DateTime<Utc>) -> Self;

    /// Generates an id for a new record.
    fn new_id() -> String;
}

/// A reminder in the left file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeftReminder {
    /// Reminder id.
    pub id: String,
    /// List id.
    pub list: String,
    /// Title.
    pub title: String,
    /// Done flag.
    #[serde(default)]
    pub completed: bool,
    /// `YYYY-MM-DD` or RFC 3339.
    #[serde(default)]
    pub due: Option<String>,
    /// `YYYY-MM-DD` or RFC 3339.
    #[serde(default)]
    pub start: Option<String>,
    /// Last modification.
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
    /// Alarms.
    #[serde(default)]
    pub alarms: Vec<Alarm>,
    /// Recurrence rule.
    #[serde(default)]
    pub recurrence: Option<Recurrence>,
    /// 0 none, 1 high, 5 medium, 9 low.
    #[serde(default)]
    pub priority: i32,
    /// Notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Flag.
    #[serde(default)]
    pub flagged: bool,
    /// Completion time.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl WireTask for LeftReminder {
    const SIDE: Side = Side::Left;
    const REQUIRES_ANCHOR: bool = true;

    fn id(&self) -> &str {
        &self.id
    }

    fn list(&self) -> &str {
        &self.list
    }

    fn to_common(&self) -> SyncResult<CommonTask> {
        let mut task = CommonTask::new(Side::Left, &self.id, &self.list, &self.title)
            .with_completed(self.completed)
            .with_due(normalize_due(self.due.as_deref())?)
            .with_start(normalize_due(self.start.as_deref())?)
            .with_alarms(self.alarms.clone())
            .with_flagged(self.flagged);
        task.modified_at = self.modified;
        task.recurrence = self.recurrence;
        task.priority = Some(priority_from_left(self.priority));
        task.notes = self.notes.clone();
        task.completed_at = self.completed_at;
        Ok(task)
    }

    fn from_common(task: &CommonTask, id: String, list: String, modified: DateTime<Utc>) -> Self {
        Self {
            id,
            list,
            title: task.title.clone(),
            completed: task.completed,
            due: task.due.clone().into(),
            start: task.start.clone().into(),
            modified: Some(modified),
            alarms: task.alarms.clone(),
            recurrence: task.recurrence,
            priority: priority_to_left(task.priority_normalized()),
            notes: task.notes.clone(),
            flagged: task.flagged,
            completed_at: task.completed_at,
        }
    }

    fn new_id() -> String {
        Uuid::new_v4().to_string().to_uppercase()
    }
}

/// A reminder attached to a remote task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteReminder {
    /// Fixed trigger time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_at: Option<DateTime<Utc>>,
    /// Offset in seconds from `relative_to`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_seconds: Option<i64>,
    /// `due_date`, `start_date` or `end_date`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_to: Option<String>,
}

impl RemoteReminder {
    fn to_alarm(&self) -> Option<Alarm> {
        match (self.trigger_at, self.relative_seconds) {
            (Some(at), _) => Some(Alarm::absolute(at)),
            (None, Some(offset)) => Some(Alarm::relative(
                offset,
                AlarmAnchor::parse(self.relative_to.as_deref()),
            )),
            (None, None) => None,
        }
    }

    fn from_alarm(alarm: &Alarm) -> Self {
        match alarm {
            Alarm::Absolute { at } => Self {
                trigger_at: Some(*at),
                relative_seconds: None,
                relative_to: None,
            },
            Alarm::Relative {
                offset_seconds,
                anchor,
            } => Self {
                trigger_at: None,
                relative_seconds: Some(*offset_seconds),
                relative_to: Some(anchor.for_right_side().as_wire().to_string()),
            },
        }
    }
}

/// Task status on the remote side.
const STATUS_OPEN: i32 = 0;
const STATUS_DONE: i32 = 2;

/// A task in the right file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTask {
    /// Task id.
    pub id: String,
    /// Project id.
    pub project_id: String,
    /// Title.
    pub title: String,
    /// 0 open, 2 done.
    #[serde(default)]
    pub status: i32,
    /// Always a full timestamp.
    #[serde(default)]
    pub due_date: Option<String>,
    /// Always a full timestamp.
    #[serde(default)]
    pub start_date: Option<String>,
    /// Last modification.
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,
    /// Repeat interval in seconds.
    #[serde(default)]
    pub repeat_after: Option<i64>,
    /// Repeat mode, 1 for monthly.
    #[serde(default)]
    pub repeat_mode: Option<i64>,
    /// 0 to 3, larger is more urgent.
    #[serde(default)]
    pub priority: i32,
    /// Notes.
    #[serde(default)]
    pub content: Option<String>,
    /// Reminders.
    #[serde(default)]
    pub reminders: Vec<RemoteReminder>,
    /// Completion time.
    #[serde(default)]
    pub completed_time: Option<DateTime<Utc>>,
}

impl WireTask for RemoteTask {
    const SIDE: Side = Side::Right;
    const REQUIRES_ANCHOR: bool = false;

    fn id(&self) -> &str {
        &self.id
    }

    fn list(&self) -> &str {
        &self.project_id
    }

    fn to_common(&self) -> SyncResult<CommonTask> {
        let mut task = CommonTask::new(Side::Right, &self.id, &self.project_id, &self.title)
            .with_completed(self.status == STATUS_DONE)
            .with_due(normalize_due(self.due_date.as_deref())?)
            .with_start(normalize_due(self.start_date.as_deref())?)
            .with_alarms(self.reminders.iter().filter_map(RemoteReminder::to_alarm).collect());
        task.modified_at = self.modified_time;
        task.recurrence = RepeatRule::new(self.repeat_after, self.repeat_mode).to_recurrence();
        task.priority = Some(self.priority);
        task.notes = self.content.clone();
        task.completed_at = self.completed_time;
        Ok(task)
    }

    fn from_common(task: &CommonTask, id: String, list: String, modified: DateTime<Utc>) -> Self {
        let repeat = task
            .recurrence
            .as_ref()
            .and_then(RepeatRule::from_recurrence)
            .unwrap_or_default();
        Self {
            id,
            project_id: list,
            title: task.title.clone(),
            status: if task.completed { STATUS_DONE } else { STATUS_OPEN },
            due_date: task.due.to_local_wire_string(),
            start_date: task.start.to_local_wire_string(),
            modified_time: Some(modified),
            repeat_after: repeat.repeat_after,
            repeat_mode: repeat.repeat_mode,
            priority: task.priority_normalized().clamp(0, 3),
            content: task.notes.clone(),
            reminders: task.alarms.iter().map(RemoteReminder::from_alarm).collect(),
            completed_time: task.completed_at,
        }
    }

    fn new_id() -> String {
        Uuid::new_v4().simple().to_string()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(bound = "W: WireTask")]
struct StoreFile<W> {
    #[serde(default)]
    tasks: Vec<W>,
}

/// A task store persisted as one JSON file.
pub struct JsonFileStore<W: WireTask> {
    path: PathBuf,
    lock: Mutex<()>,
    _format: PhantomData<W>,
}

/// The left store.
pub type LeftFileStore = JsonFileStore<LeftReminder>;

/// The right store.
pub type RightFileStore = JsonFileStore<RemoteTask>;

impl<W: WireTask> JsonFileStore<W> {
    /// Opens the store at `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            _format: PhantomData,
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> SyncResult<Vec<W>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(serde_json::from_str::<StoreFile<W>>(&raw)?.tasks),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn write(&self, tasks: Vec<W>) -> SyncResult<()> {
        let json = serde_json::to_string_pretty(&StoreFile { tasks })?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        debug!(side = %W::SIDE, path = %self.path().display(), "wrote task file");
        Ok(())
    }

    fn io_error(&self, e: std::io::Error) -> SyncError {
        if W::SIDE == Side::Left && e.kind() == ErrorKind::PermissionDenied {
            SyncError::LocalStoreAccessDenied
        } else {
            SyncError::Io(e)
        }
    }
}

impl<W: WireTask> TaskStore for JsonFileStore<W> {
    fn side(&self) -> Side {
        W::SIDE
    }

    fn requires_recurrence_anchor(&self) -> bool {
        W::REQUIRES_ANCHOR
    }

    fn fetch(&self, scope: &ScopeId) -> SyncResult<Vec<CommonTask>> {
        let _guard = self.lock.lock();
        let list = scope.list_for(W::SIDE);
        self.read()?
            .iter()
            .filter(|t| t.list() == list)
            .map(W::to_common)
            .collect()
    }

    fn create(&self, scope: &ScopeId, task: &CommonTask) -> SyncResult<WriteReceipt> {
        let _guard = self.lock.lock();
        let mut tasks = self.read()?;
        let id = W::new_id();
        let now = Utc::now();
        tasks.push(W::from_common(
            task,
            id.clone(),
            scope.list_for(W::SIDE).to_string(),
            now,
        ));
        self.write(tasks)?;
        Ok(WriteReceipt::new(id, Some(now)))
    }

    fn update(&self, task: &CommonTask) -> SyncResult<WriteReceipt> {
        let _guard = self.lock.lock();
        let mut tasks = self.read()?;
        let slot = tasks
            .iter_mut()
            .find(|t| t.id() == task.id)
            .ok_or_else(|| SyncError::not_found(format!("{} task {}", W::SIDE, task.id)))?;
        let now = Utc::now();
        *slot = W::from_common(task, task.id.clone(), slot.list().to_string(), now);
        self.write(tasks)?;
        Ok(WriteReceipt::new(task.id.clone(), Some(now)))
    }

    fn delete(&self, id: &str) -> SyncResult<()> {
        let _guard = self.lock.lock();
        let mut tasks = self.read()?;
        let before = tasks.len();
        tasks.retain(|t| t.id() != id);
        if tasks.len() == before {
            return Err(SyncError::not_found(format!("{} task {id}", W::SIDE)));
        }
        self.write(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn scope() -> ScopeId {
        ScopeId::new("inbox", "7")
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = LeftFileStore::new(dir.path().join("left.json"));
        assert!(store.fetch(&scope()).unwrap().is_empty());
    }

    #[test]
    fn left_create_update_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LeftFileStore::new(dir.path().join("left.json"));
        let task = CommonTask::new(Side::Right, "r1", "7", "Buy milk").with_priority(3);

        let receipt = store.create(&scope(), &task).unwrap();
        let fetched = store.fetch(&scope()).unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, receipt.id);
        assert_eq!(fetched[0].list_id, "inbox");
        assert_eq!(fetched[0].priority, Some(3));
        assert_eq!(fetched[0].modified_at, receipt.modified_at);

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"priority\": 1"));

        let mut edited = fetched[0].clone();
        edited.title = "Buy oat milk".into();
        store.update(&edited).unwrap();
        assert_eq!(store.fetch(&scope()).unwrap()[0].title, "Buy oat milk");

        store.delete(&receipt.id).unwrap();
        assert!(store.delete(&receipt.id).unwrap_err().is_not_found());
    }

    #[test]
    fn remote_format_round_trips_calendar_day() {
        let dir = tempfile::tempdir().unwrap();
        let store = RightFileStore::new(dir.path().join("right.json"));
        let day = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let task = CommonTask::new(Side::Left, "l1", "inbox", "Water plants")
            .with_due(TaskDate::DateOnly(day))
            .with_recurrence(Recurrence::Weekly(2))
            .with_alarms(vec![Alarm::relative(-600, AlarmAnchor::Unanchored)]);

        store.create(&scope(), &task).unwrap();
        let fetched = store.fetch(&scope()).unwrap().remove(0);

        // Full timestamp on the wire; the mapping flag restores the day.
        assert!(!fetched.due.is_date_only());
        assert_eq!(
            fetched.due.coerce_date_only(true, &chrono::Local),
            TaskDate::DateOnly(day)
        );
        assert_eq!(fetched.recurrence, Some(Recurrence::Weekly(2)));
        assert_eq!(fetched.alarms, vec![Alarm::relative(-600, AlarmAnchor::Due)]);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["tasks"][0]["repeat_after"], 1_209_600);
        assert_eq!(raw["tasks"][0]["reminders"][0]["relative_to"], "due_date");
    }

    #[test]
    fn fetch_filters_by_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = RightFileStore::new(dir.path().join("right.json"));
        let task = CommonTask::new(Side::Left, "l1", "inbox", "Buy milk");
        store.create(&scope(), &task).unwrap();
        store.create(&ScopeId::new("work", "8"), &task).unwrap();

        assert_eq!(store.fetch(&scope()).unwrap().len(), 1);
        assert_eq!(store.fetch(&ScopeId::new("work", "8")).unwrap()[0].list_id, "8");
    }
}
