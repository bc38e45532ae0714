//! Property-based test generators using proptest.
//!
//! Provides strategies for generating tasks and snapshots. Snapshot ids
//! are unique within a snapshot.

use crate::fixtures::{LEFT_LIST, RIGHT_PROJECT};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use tasksync_model::{Alarm, AlarmAnchor, CommonTask, Recurrence, Side, TaskDate};

/// Base of generated timestamps (2026-01-01T00:00:00Z).
const BASE_EPOCH: i64 = 1_767_225_600;

fn base() -> DateTime<Utc> {
    Utc.timestamp_opt(BASE_EPOCH, 0).single().unwrap_or_default()
}

/// Strategy for titles drawn from a small vocabulary, so keys collide.
pub fn title_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Buy milk".to_string()),
        Just("buy milk".to_string()),
        Just("Call mum".to_string()),
        Just("Water plants".to_string()),
        prop::string::string_regex("[A-Z][a-z]{2,8}( [a-z]{2,6})?").expect("Invalid regex"),
    ]
}

/// Strategy for instants within a month of the base.
pub fn instant_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..30 * 86_400).prop_map(|secs| base() + Duration::seconds(secs))
}

/// Strategy for due and start dates.
pub fn task_date_strategy() -> impl Strategy<Value = TaskDate> {
    prop_oneof![
        Just(TaskDate::None),
        (0u64..60).prop_map(|d| {
            let first = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap_or_default();
            TaskDate::DateOnly(first + chrono::Days::new(d))
        }),
        instant_strategy().prop_map(|at| TaskDate::Instant(at.fixed_offset())),
    ]
}

/// Strategy for optional recurrence rules.
pub fn recurrence_strategy() -> impl Strategy<Value = Option<Recurrence>> {
    prop_oneof![
        3 => Just(None),
        1 => (1u32..4).prop_map(|n| Some(Recurrence::Daily(n))),
        1 => (1u32..3).prop_map(|n| Some(Recurrence::Weekly(n))),
        1 => Just(Some(Recurrence::Monthly(1))),
    ]
}

/// Strategy for alarms.
pub fn alarm_strategy() -> impl Strategy<Value = Alarm> {
    prop_oneof![
        instant_strategy().prop_map(Alarm::absolute),
        (-7200i64..0, prop_oneof![Just(AlarmAnchor::Due), Just(AlarmAnchor::Start)])
            .prop_map(|(offset, anchor)| Alarm::relative(offset, anchor)),
    ]
}

/// Strategy for a task on `side`, with a placeholder id.
pub fn task_strategy(side: Side) -> impl Strategy<Value = CommonTask> {
    let list = match side {
        Side::Left => LEFT_LIST,
        Side::Right => RIGHT_PROJECT,
    };
    (
        title_strategy(),
        any::<bool>(),
        task_date_strategy(),
        prop::option::of(instant_strategy()),
        prop::collection::vec(alarm_strategy(), 0..2),
        recurrence_strategy(),
        prop::option::of(0i32..4),
        prop::option::of("[a-z ]{0,12}"),
    )
        .prop_map(
            move |(title, completed, due, modified_at, alarms, recurrence, priority, notes)| {
                let mut task = CommonTask::new(side, "", list, title)
                    .with_completed(completed)
                    .with_due(due)
                    .with_alarms(alarms);
                task.modified_at = modified_at;
                task.recurrence = recurrence;
                task.priority = priority;
                task.notes = notes;
                task
            },
        )
}

/// Strategy for a snapshot of up to `max` tasks with ids `l0, l1, ...` or
/// `r0, r1, ...`.
pub fn snapshot_strategy(side: Side, max: usize) -> impl Strategy<Value = Vec<CommonTask>> {
    let prefix = match side {
        Side::Left => "l",
        Side::Right => "r",
    };
    prop::collection::vec(task_strategy(side), 0..=max).prop_map(move |tasks| {
        tasks
            .into_iter()
            .enumerate()
            .map(|(i, mut task)| {
                task.id = format!("{prefix}{i}");
                task
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;
    use std::collections::HashSet;

    #[test]
    fn snapshot_ids_are_unique() {
        let mut runner = TestRunner::default();
        for _ in 0..50 {
            let snapshot = snapshot_strategy(Side::Left, 8)
                .new_tree(&mut runner)
                .unwrap()
                .current();
            let ids: HashSet<_> = snapshot.iter().map(|t| t.id.clone()).collect();
            assert_eq!(ids.len(), snapshot.len());
            assert!(snapshot.iter().all(|t| t.list_id == LEFT_LIST));
        }
    }
}
