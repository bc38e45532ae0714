//! Alarms and their comparable forms.

use crate::task::CommonTask;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// The date field a relative alarm is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmAnchor {
    /// Relative to the due date.
    Due,
    /// Relative to the start date.
    Start,
    /// Relative to the end date.
    End,
    /// No anchor given.
    Unanchored,
}

impl AlarmAnchor {
    /// Parses a wire anchor name. Unknown names are `Unanchored`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("due") | Some("due_date") => Self::Due,
            Some("start") | Some("start_date") => Self::Start,
            Some("end") | Some("end_date") => Self::End,
            _ => Self::Unanchored,
        }
    }

    /// Returns the wire name.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Due => "due_date",
            Self::Start => "start_date",
            Self::End => "end_date",
            Self::Unanchored => "none",
        }
    }

    /// Anchor used when writing to the remote side, which requires one.
    pub fn for_right_side(&self) -> Self {
        match self {
            Self::Unanchored => Self::Due,
            other => *other,
        }
    }
}

impl fmt::Display for AlarmAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// A task alarm.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alarm {
    /// Fires at a fixed instant.
    Absolute {
        /// Trigger time.
        at: DateTime<Utc>,
    },
    /// Fires at an offset from one of the task's dates.
    Relative {
        /// Offset in seconds, negative for "before".
        offset_seconds: i64,
        /// The date the offset applies to.
        anchor: AlarmAnchor,
    },
}

impl Alarm {
    /// Creates an absolute alarm.
    pub fn absolute(at: DateTime<Utc>) -> Self {
        Self::Absolute { at }
    }

    /// Creates a relative alarm.
    pub fn relative(offset_seconds: i64, anchor: AlarmAnchor) -> Self {
        Self::Relative {
            offset_seconds,
            anchor,
        }
    }

    /// Reduces the alarm to its comparable form against `task`'s dates.
    pub fn comparable(&self, task: &CommonTask) -> AlarmKey {
        match self {
            Self::Absolute { at } => AlarmKey::Abs(*at),
            Self::Relative {
                offset_seconds,
                anchor,
            } => {
                let base = match anchor {
                    AlarmAnchor::Start => &task.start,
                    _ => &task.due,
                };
                // Offsets that overflow the calendar stay relative.
                let trigger = base.instant_utc().and_then(|at| {
                    Duration::try_seconds(*offset_seconds)
                        .and_then(|offset| at.checked_add_signed(offset))
                });
                match trigger {
                    Some(at) => AlarmKey::Abs(at),
                    None => AlarmKey::Rel {
                        anchor: *anchor,
                        offset_seconds: *offset_seconds,
                    },
                }
            }
        }
    }

    fn signature(&self) -> String {
        match self {
            Self::Absolute { at } => format!("absolute|none|{}|none", at.timestamp()),
            Self::Relative {
                offset_seconds,
                anchor,
            } => format!("relative|{}|none|{}", anchor.as_wire(), offset_seconds),
        }
    }
}

/// Comparable alarm form.
///
/// Two alarm lists are equal when their key sets are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AlarmKey {
    /// Resolved trigger instant.
    Abs(DateTime<Utc>),
    /// Unresolvable relative alarm.
    Rel {
        /// Anchor field.
        anchor: AlarmAnchor,
        /// Offset in seconds.
        offset_seconds: i64,
    },
}

/// Computes the comparable alarm set of a task.
pub fn alarm_comparable_set(task: &CommonTask) -> BTreeSet<AlarmKey> {
    task.alarms.iter().map(|alarm| alarm.comparable(task)).collect()
}

/// Stable textual signature of an alarm list, independent of order.
pub fn alarm_signature(alarms: &[Alarm]) -> String {
    let mut parts: Vec<String> = alarms.iter().map(Alarm::signature).collect();
    parts.sort();
    parts.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date::TaskDate;
    use crate::task::Side;

    fn task_due(due: &str) -> CommonTask {
        CommonTask::new(Side::Left, "l1", "list", "Pay rent").with_due(TaskDate::parse(due).unwrap())
    }

    #[test]
    fn anchor_parsing() {
        assert_eq!(AlarmAnchor::parse(Some("due_date")), AlarmAnchor::Due);
        assert_eq!(AlarmAnchor::parse(Some("START")), AlarmAnchor::Start);
        assert_eq!(AlarmAnchor::parse(Some("end")), AlarmAnchor::End);
        assert_eq!(AlarmAnchor::parse(Some("created")), AlarmAnchor::Unanchored);
        assert_eq!(AlarmAnchor::parse(None), AlarmAnchor::Unanchored);
        assert_eq!(AlarmAnchor::Unanchored.for_right_side(), AlarmAnchor::Due);
    }

    #[test]
    fn relative_alarm_resolves_against_timed_due() {
        let left = task_due("2026-01-20T10:00:00Z")
            .with_alarms(vec![Alarm::relative(-900, AlarmAnchor::Due)]);
        let at = "2026-01-20T09:45:00Z".parse::<DateTime<Utc>>().unwrap();
        let right = task_due("2026-01-20T10:00:00Z").with_alarms(vec![Alarm::absolute(at)]);

        assert_eq!(alarm_comparable_set(&left), alarm_comparable_set(&right));
    }

    #[test]
    fn date_only_anchor_stays_relative() {
        let task = task_due("2026-01-20").with_alarms(vec![Alarm::relative(3600, AlarmAnchor::Due)]);
        let set = alarm_comparable_set(&task);
        assert_eq!(
            set.into_iter().collect::<Vec<_>>(),
            vec![AlarmKey::Rel {
                anchor: AlarmAnchor::Due,
                offset_seconds: 3600
            }]
        );
    }

    #[test]
    fn out_of_range_offset_stays_relative() {
        // Too large for a duration, then representable but past the calendar.
        for offset in [i64::MAX, 9_000_000_000_000] {
            let task = task_due("2026-01-20T10:00:00Z")
                .with_alarms(vec![Alarm::relative(offset, AlarmAnchor::Due)]);
            assert!(alarm_comparable_set(&task).contains(&AlarmKey::Rel {
                anchor: AlarmAnchor::Due,
                offset_seconds: offset
            }));

            let other = task_due("2026-01-20T10:00:00Z");
            assert!(crate::compare::tasks_differ(&task, &other, false));
        }
    }

    #[test]
    fn start_anchor_uses_start_date() {
        let task = task_due("2026-01-20T10:00:00Z")
            .with_start(TaskDate::parse("2026-01-19T08:00:00Z").unwrap())
            .with_alarms(vec![Alarm::relative(0, AlarmAnchor::Start)]);
        let expected = "2026-01-19T08:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert!(alarm_comparable_set(&task).contains(&AlarmKey::Abs(expected)));
    }

    #[test]
    fn signature_is_order_independent() {
        let at = "2026-01-20T09:45:00Z".parse::<DateTime<Utc>>().unwrap();
        let a = vec![Alarm::absolute(at), Alarm::relative(-60, AlarmAnchor::Start)];
        let b = vec![Alarm::relative(-60, AlarmAnchor::Start), Alarm::absolute(at)];
        assert_eq!(alarm_signature(&a), alarm_signature(&b));
        assert!(alarm_signature(&a).contains("relative|start_date|none|-60"));
        assert_eq!(alarm_signature(&[]), "");
    }

    #[test]
    fn alarm_serde_is_tagged() {
        let json = serde_json::to_string(&Alarm::relative(-300, AlarmAnchor::Due)).unwrap();
        assert!(json.contains("\"kind\":\"relative\""));
        let back: Alarm = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Alarm::relative(-300, AlarmAnchor::Due));
    }
}
