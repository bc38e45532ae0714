//! The canonical task record.

use crate::alarm::Alarm;
use crate::date::TaskDate;
use crate::recurrence::Recurrence;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two synchronized stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The local reminder collection.
    Left,
    /// The remote project-task API.
    Right,
}

impl Side {
    /// Returns the other side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task as seen by the sync engine, independent of the side it came from.
///
/// Instances are rebuilt from adapter data on every run and never persisted
/// except as conflict snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonTask {
    /// Side the task was read from.
    pub side: Side,
    /// Native id on that side.
    pub id: String,
    /// Native list/project id.
    pub list_id: String,
    /// Title.
    pub title: String,
    /// Completion flag.
    #[serde(default)]
    pub completed: bool,
    /// Due date.
    #[serde(default)]
    pub due: TaskDate,
    /// Start date.
    #[serde(default)]
    pub start: TaskDate,
    /// Last modification time reported by the store.
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
    /// Alarms.
    #[serde(default)]
    pub alarms: Vec<Alarm>,
    /// Recurrence rule.
    #[serde(default)]
    pub recurrence: Option<Recurrence>,
    /// Priority on the canonical scale.
    #[serde(default)]
    pub priority: Option<i32>,
    /// Free-text notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Flagged/starred.
    #[serde(default)]
    pub flagged: bool,
    /// Completion time.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl CommonTask {
    /// Creates an open task with no dates.
    pub fn new(
        side: Side,
        id: impl Into<String>,
        list_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            side,
            id: id.into(),
            list_id: list_id.into(),
            title: title.into(),
            completed: false,
            due: TaskDate::None,
            start: TaskDate::None,
            modified_at: None,
            alarms: Vec::new(),
            recurrence: None,
            priority: None,
            notes: None,
            flagged: false,
            completed_at: None,
        }
    }

    /// Sets the completion flag.
    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    /// Sets the due date.
    pub fn with_due(mut self, due: TaskDate) -> Self {
        self.due = due;
        self
    }

    /// Sets the start date.
    pub fn with_start(mut self, start: TaskDate) -> Self {
        self.start = start;
        self
    }

    /// Sets the modification time.
    pub fn with_modified_at(mut self, at: DateTime<Utc>) -> Self {
        self.modified_at = Some(at);
        self
    }

    /// Sets the alarms.
    pub fn with_alarms(mut self, alarms: Vec<Alarm>) -> Self {
        self.alarms = alarms;
        self
    }

    /// Sets the recurrence rule.
    pub fn with_recurrence(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = Some(recurrence);
        self
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Sets the notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Sets the flagged marker.
    pub fn with_flagged(mut self, flagged: bool) -> Self {
        self.flagged = flagged;
        self
    }

    /// Returns true if the due date has no time component.
    pub fn due_is_date_only(&self) -> bool {
        self.due.is_date_only()
    }

    /// Returns true if the start date has no time component.
    pub fn start_is_date_only(&self) -> bool {
        self.start.is_date_only()
    }

    /// Notes with absent treated as empty.
    pub fn notes_normalized(&self) -> &str {
        self.notes.as_deref().unwrap_or("")
    }

    /// Priority with absent treated as zero.
    pub fn priority_normalized(&self) -> i32 {
        self.priority.unwrap_or(0)
    }

    /// Copies the content of `source` onto this task, keeping identity.
    ///
    /// Used to build the payload for an update in the direction `source`
    /// wins.
    pub fn with_content_of(&self, source: &CommonTask) -> Self {
        Self {
            side: self.side,
            id: self.id.clone(),
            list_id: self.list_id.clone(),
            modified_at: self.modified_at,
            ..source.clone()
        }
    }

    /// Re-targets a copy of this task at another side and list, with no id.
    pub fn for_creation(&self, side: Side, list_id: &str) -> Self {
        Self {
            side,
            id: String::new(),
            list_id: list_id.to_string(),
            modified_at: None,
            ..self.clone()
        }
    }
}
