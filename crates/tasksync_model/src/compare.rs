//! Matching keys, content comparison and field diffs.

use crate::alarm::{alarm_comparable_set, alarm_signature};
use crate::recurrence::recurrence_signature;
use crate::task::CommonTask;
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

/// Key used to auto-match unmapped tasks: `title|completed|due`.
pub fn match_key(task: &CommonTask) -> String {
    format!(
        "{}|{}|{}",
        task.title.trim().to_lowercase(),
        if task.completed { "1" } else { "0" },
        task.due.match_form()
    )
}

/// Returns true if the two tasks differ in synced content.
///
/// Identity, side and timestamps are ignored. With `ignore_due` the due
/// date is excluded, which is how an inferred due is kept out of diffing.
pub fn tasks_differ(a: &CommonTask, b: &CommonTask, ignore_due: bool) -> bool {
    if a.title.trim().to_lowercase() != b.title.trim().to_lowercase() {
        return true;
    }
    if a.completed != b.completed {
        return true;
    }
    if !ignore_due && a.due.match_form() != b.due.match_form() {
        return true;
    }
    if alarm_comparable_set(a) != alarm_comparable_set(b) {
        return true;
    }
    if recurrence_signature(a.recurrence.as_ref()) != recurrence_signature(b.recurrence.as_ref()) {
        return true;
    }
    if a.priority_normalized() != b.priority_normalized() {
        return true;
    }
    if a.notes_normalized() != b.notes_normalized() {
        return true;
    }
    a.flagged != b.flagged
}

/// One differing field of a conflicting pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictFieldDiff {
    /// Field name.
    pub field: String,
    /// Normalized left value.
    pub left_value: String,
    /// Normalized right value.
    pub right_value: String,
}

/// Lists the fields that differ between a left and a right task.
///
/// Values are rendered in their normalized textual form. Fields are always
/// emitted in the same order.
///
/// Titles are compared case-sensitively here, unlike [`tasks_differ`], so a
/// report shows casing changes on pairs that conflict for other reasons.
pub fn conflict_field_diffs(left: &CommonTask, right: &CommonTask) -> Vec<ConflictFieldDiff> {
    let fields = [
        ("title", left.title.clone(), right.title.clone()),
        (
            "completed",
            left.completed.to_string(),
            right.completed.to_string(),
        ),
        ("due", left.due.as_normalized(), right.due.as_normalized()),
        (
            "dueDateOnly",
            left.due_is_date_only().to_string(),
            right.due_is_date_only().to_string(),
        ),
        ("start", left.start.as_normalized(), right.start.as_normalized()),
        (
            "startDateOnly",
            left.start_is_date_only().to_string(),
            right.start_is_date_only().to_string(),
        ),
        (
            "alarms",
            alarm_signature(&left.alarms),
            alarm_signature(&right.alarms),
        ),
        (
            "recurrence",
            recurrence_signature(left.recurrence.as_ref()),
            recurrence_signature(right.recurrence.as_ref()),
        ),
        (
            "priority",
            left.priority_normalized().to_string(),
            right.priority_normalized().to_string(),
        ),
        (
            "notes",
            left.notes_normalized().to_string(),
            right.notes_normalized().to_string(),
        ),
        ("flagged", left.flagged.to_string(), right.flagged.to_string()),
        (
            "modifiedAt",
            timestamp_or_nil(left),
            timestamp_or_nil(right),
        ),
    ];

    fields
        .into_iter()
        .filter(|(_, l, r)| l != r)
        .map(|(field, left_value, right_value)| ConflictFieldDiff {
            field: field.to_string(),
            left_value,
            right_value,
        })
        .collect()
}

fn timestamp_or_nil(task: &CommonTask) -> String {
    task.modified_at
        .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| "nil".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::{Alarm, AlarmAnchor};
    use crate::date::TaskDate;
    use crate::recurrence::Recurrence;
    use crate::task::Side;
    use proptest::prelude::*;

    fn left(title: &str) -> CommonTask {
        CommonTask::new(Side::Left, "l1", "inbox", title)
    }

    fn right(title: &str) -> CommonTask {
        CommonTask::new(Side::Right, "r1", "7", title)
    }

    #[test]
    fn match_key_format() {
        let task = left("  Buy Milk ")
            .with_completed(true)
            .with_due(TaskDate::parse("2026-01-20T00:00:00Z").unwrap());
        assert_eq!(match_key(&task), "buy milk|1|2026-01-20");
        assert_eq!(match_key(&left("x")), "x|0|none");
    }

    #[test]
    fn identical_content_does_not_differ() {
        let a = left("Buy milk").with_notes("");
        let b = right("buy milk").with_priority(0);
        assert!(!tasks_differ(&a, &b, false));
    }

    #[test]
    fn each_field_counts() {
        let base = left("Buy milk");
        let other = right("Buy milk");
        assert!(tasks_differ(&base, &other.clone().with_completed(true), false));
        assert!(tasks_differ(&base, &other.clone().with_flagged(true), false));
        assert!(tasks_differ(&base, &other.clone().with_notes("2%"), false));
        assert!(tasks_differ(&base, &other.clone().with_priority(3), false));
        assert!(tasks_differ(
            &base,
            &other.clone().with_recurrence(Recurrence::Daily(1)),
            false
        ));
        assert!(tasks_differ(
            &base,
            &other.clone().with_alarms(vec![Alarm::relative(0, AlarmAnchor::Due)]),
            false
        ));
    }

    #[test]
    fn ignore_due_skips_only_due() {
        let a = left("Buy milk").with_due(TaskDate::parse("2026-01-20").unwrap());
        let b = right("Buy milk");
        assert!(tasks_differ(&a, &b, false));
        assert!(!tasks_differ(&a, &b, true));
        assert!(tasks_differ(&a, &b.with_flagged(true), true));
    }

    #[test]
    fn title_case_only_shows_in_diffs() {
        let l = left("Buy milk");
        let r = right("buy MILK");
        assert!(!tasks_differ(&l, &r, false));
        let fields: Vec<_> = conflict_field_diffs(&l, &r).into_iter().map(|d| d.field).collect();
        assert_eq!(fields, vec!["title"]);
    }

    #[test]
    fn diffs_for_title_and_due() {
        let a = left("Buy milk").with_due(TaskDate::parse("2026-01-20").unwrap());
        let b = right("Buy oat milk").with_due(TaskDate::parse("2026-01-21").unwrap());
        let diffs = conflict_field_diffs(&a, &b);
        let fields: Vec<_> = diffs.iter().map(|d| d.field.as_str()).collect();
        assert_eq!(fields, vec!["title", "due"]);
        assert_eq!(diffs[1].left_value, "2026-01-20");
        assert_eq!(diffs[1].right_value, "2026-01-21");
    }

    #[test]
    fn diffs_include_date_only_flag_change() {
        let a = left("Buy milk").with_due(TaskDate::parse("2026-01-20").unwrap());
        let b = right("Buy milk").with_due(TaskDate::parse("2026-01-20T09:00:00Z").unwrap());
        let fields: Vec<_> = conflict_field_diffs(&a, &b)
            .into_iter()
            .map(|d| d.field)
            .collect();
        assert_eq!(fields, vec!["due", "dueDateOnly"]);
    }

    #[test]
    fn diffs_render_missing_timestamp_as_nil() {
        let at = "2026-01-20T09:00:00Z".parse().unwrap();
        let a = left("x").with_modified_at(at);
        let b = right("x");
        let diffs = conflict_field_diffs(&a, &b);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].field, "modifiedAt");
        assert_eq!(diffs[0].left_value, "2026-01-20T09:00:00Z");
        assert_eq!(diffs[0].right_value, "nil");
    }

    fn arb_task(side: Side) -> impl Strategy<Value = CommonTask> {
        (
            "[a-c]{1,3}",
            any::<bool>(),
            prop::option::of(0..4i32),
            prop::option::of("[xy]{0,2}"),
            any::<bool>(),
            prop::option::of(1u32..3),
        )
            .prop_map(move |(title, completed, priority, notes, flagged, daily)| {
                let mut task = CommonTask::new(side, "id", "list", title).with_completed(completed);
                task.priority = priority;
                task.notes = notes;
                task.flagged = flagged;
                task.recurrence = daily.map(Recurrence::Daily);
                task
            })
    }

    proptest! {
        #[test]
        fn tasks_differ_is_symmetric(a in arb_task(Side::Left), b in arb_task(Side::Right), ignore in any::<bool>()) {
            prop_assert_eq!(tasks_differ(&a, &b, ignore), tasks_differ(&b, &a, ignore));
        }

        #[test]
        fn no_diffs_iff_equal_content(a in arb_task(Side::Left), b in arb_task(Side::Right)) {
            let diffs = conflict_field_diffs(&a, &b);
            if diffs.is_empty() {
                prop_assert!(!tasks_differ(&a, &b, false));
            }
        }
    }
}
