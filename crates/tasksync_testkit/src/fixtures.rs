//! Task fixtures.
//!
//! Provides convenience constructors for tasks on both sides of the
//! default test scope.

use chrono::{DateTime, NaiveDate, Utc};
use tasksync_model::{CommonTask, Side, TaskDate};

/// Left list id of the default test scope.
pub const LEFT_LIST: &str = "inbox";

/// Right project id of the default test scope.
pub const RIGHT_PROJECT: &str = "7";

/// Parses an RFC 3339 instant.
///
/// # Panics
///
/// Panics if `s` is not a valid instant.
pub fn at(s: &str) -> DateTime<Utc> {
    s.parse().expect("Invalid RFC 3339 instant")
}

/// A calendar date.
///
/// # Panics
///
/// Panics if the date does not exist.
pub fn day(year: i32, month: u32, day: u32) -> TaskDate {
    TaskDate::DateOnly(NaiveDate::from_ymd_opt(year, month, day).expect("Invalid date"))
}

/// An open left task in the default list.
pub fn left_task(id: &str, title: &str) -> CommonTask {
    CommonTask::new(Side::Left, id, LEFT_LIST, title)
}

/// An open right task in the default project.
pub fn right_task(id: &str, title: &str) -> CommonTask {
    CommonTask::new(Side::Right, id, RIGHT_PROJECT, title)
}

/// The same content on the other side, with a new id.
pub fn mirror(task: &CommonTask, id: &str) -> CommonTask {
    let side = task.side.opposite();
    let list = match side {
        Side::Left => LEFT_LIST,
        Side::Right => RIGHT_PROJECT,
    };
    let mut copy = task.clone();
    copy.side = side;
    copy.id = id.to_string();
    copy.list_id = list.to_string();
    copy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirror_switches_side() {
        let task = left_task("l1", "Buy milk").with_modified_at(at("2026-01-20T09:00:00Z"));
        let copy = mirror(&task, "r1");
        assert_eq!(copy.side, Side::Right);
        assert_eq!(copy.list_id, RIGHT_PROJECT);
        assert_eq!(copy.title, "Buy milk");
        assert_eq!(copy.modified_at, task.modified_at);
    }

    #[test]
    fn day_is_date_only() {
        assert!(day(2026, 3, 1).is_date_only());
    }
}
