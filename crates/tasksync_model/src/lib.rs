//! # TaskSync Model
//!
//! Canonical task representation shared by both sides of a sync.
//!
//! This crate provides:
//! - `CommonTask`, the side-agnostic task record
//! - `TaskDate` and `Provenance` for due/start dates
//! - `Alarm` and alarm comparison sets
//! - `Recurrence` and the lossy bridge to the remote repeat encoding
//! - Match keys, content comparison and conflict field diffs
//!
//! This is a pure crate with no I/O operations. Everything here is
//! recomputed from live adapter data on every run.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod alarm;
mod compare;
mod date;
mod error;
mod priority;
mod recurrence;
mod task;

pub use alarm::{alarm_comparable_set, alarm_signature, Alarm, AlarmAnchor, AlarmKey};
pub use compare::{conflict_field_diffs, match_key, tasks_differ, ConflictFieldDiff};
pub use date::{
    normalize_due, normalize_due_for_match, parse_instant, Provenance, TaskDate, ZERO_DATE_SENTINEL,
};
pub use error::{ModelError, ModelResult};
pub use priority::{priority_from_left, priority_to_left};
pub use recurrence::{recurrence_signature, Recurrence, RepeatRule};
pub use task::{CommonTask, Side};
