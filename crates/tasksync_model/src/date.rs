//! Due/start dates and their normalized forms.
//!
//! The remote side transports every date as a string and cannot tell
//! "no specific time" apart from "exactly midnight". `TaskDate` keeps that
//! distinction as a real type instead of a string plus side flags.

use crate::error::{ModelError, ModelResult};
use chrono::{
    DateTime, Duration, FixedOffset, Local, NaiveDate, Offset, SecondsFormat, TimeZone, Timelike,
    Utc,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of the "no date" value the remote API uses instead of null.
pub const ZERO_DATE_SENTINEL: &str = "0001-01-01T00:00:00";

const NONE_FORM: &str = "none";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// A due or start date.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Option<String>", into = "Option<String>")]
pub enum TaskDate {
    /// No date set.
    #[default]
    None,
    /// A calendar day without a time of day.
    DateOnly(NaiveDate),
    /// A specific instant, keeping the offset it was written with.
    Instant(DateTime<FixedOffset>),
}

impl TaskDate {
    /// Parses a wire value.
    ///
    /// Empty strings and the zero-date sentinel become `TaskDate::None`,
    /// `YYYY-MM-DD` becomes `DateOnly`, RFC 3339 becomes `Instant`.
    pub fn parse(raw: &str) -> ModelResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with(ZERO_DATE_SENTINEL) {
            return Ok(Self::None);
        }
        if raw.len() == 10 {
            return NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .map(Self::DateOnly)
                .map_err(|_| ModelError::invalid_date(raw));
        }
        DateTime::parse_from_rfc3339(raw)
            .map(Self::Instant)
            .map_err(|_| ModelError::invalid_date(raw))
    }

    /// Returns true if no date is set.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns true for a calendar day without time.
    pub fn is_date_only(&self) -> bool {
        matches!(self, Self::DateOnly(_))
    }

    /// Returns the instant in UTC, if this is a timed value.
    ///
    /// Date-only values deliberately do not resolve: their absolute position
    /// depends on the reader's time zone.
    pub fn instant_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Instant(at) => Some(at.with_timezone(&Utc)),
            _ => None,
        }
    }

    /// Display/storage form: `"none"`, the date, or the RFC 3339 instant.
    pub fn as_normalized(&self) -> String {
        match self {
            Self::None => NONE_FORM.to_string(),
            Self::DateOnly(date) => date.format(DATE_FORMAT).to_string(),
            Self::Instant(at) => at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        }
    }

    /// Equality form used for matching and diffing only.
    ///
    /// An instant at exactly midnight UTC collapses to its date, every other
    /// instant is rendered in UTC with whole seconds.
    pub fn match_form(&self) -> String {
        match self {
            Self::None => NONE_FORM.to_string(),
            Self::DateOnly(date) => date.format(DATE_FORMAT).to_string(),
            Self::Instant(at) => {
                let at_utc_midnight = at.offset().local_minus_utc() == 0
                    && at.num_seconds_from_midnight() == 0
                    && at.nanosecond() == 0;
                if at_utc_midnight {
                    at.date_naive().format(DATE_FORMAT).to_string()
                } else {
                    at.with_timezone(&Utc)
                        .to_rfc3339_opts(SecondsFormat::Secs, true)
                }
            }
        }
    }

    /// Renders the value for a field that always carries a full timestamp.
    ///
    /// Date-only values are anchored to midnight in `tz`, not UTC midnight,
    /// so the day does not shift when displayed in that zone.
    pub fn to_wire_string<Tz: TimeZone>(&self, tz: &Tz) -> Option<String> {
        match self {
            Self::None => None,
            Self::Instant(at) => Some(at.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::DateOnly(date) => {
                let midnight = local_midnight(*date, tz)?;
                let fixed = midnight.offset().fix();
                Some(
                    midnight
                        .with_timezone(&fixed)
                        .to_rfc3339_opts(SecondsFormat::Secs, false),
                )
            }
        }
    }

    /// Same as [`TaskDate::to_wire_string`] in the process time zone.
    pub fn to_local_wire_string(&self) -> Option<String> {
        self.to_wire_string(&Local)
    }

    /// Reinterprets an instant as a calendar day when `date_only` is set.
    ///
    /// Used with the date-only flag persisted in the mapping, since the remote
    /// wire value cannot carry it.
    pub fn coerce_date_only<Tz: TimeZone>(&self, date_only: bool, tz: &Tz) -> TaskDate {
        match self {
            Self::Instant(at) if date_only => Self::DateOnly(at.with_timezone(tz).date_naive()),
            other => other.clone(),
        }
    }
}

impl fmt::Display for TaskDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_normalized())
    }
}

impl TryFrom<Option<String>> for TaskDate {
    type Error = ModelError;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        normalize_due(value.as_deref())
    }
}

impl From<TaskDate> for Option<String> {
    fn from(value: TaskDate) -> Self {
        match value {
            TaskDate::None => None,
            other => Some(other.as_normalized()),
        }
    }
}

fn local_midnight<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Option<DateTime<Tz>> {
    let naive = date.and_hms_opt(0, 0, 0)?;
    tz.from_local_datetime(&naive).earliest().or_else(|| {
        // Midnight can fall into a DST gap; the first valid minute after it
        // is still on the same day.
        tz.from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
    })
}

/// Where a due date came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Set by the user on one of the sides.
    #[default]
    UserSet,
    /// Synthesized by the engine to anchor a recurrence.
    Inferred,
}

impl Provenance {
    /// Builds a provenance from the persisted `inferred_due` flag.
    pub fn from_inferred_flag(inferred: bool) -> Self {
        if inferred {
            Self::Inferred
        } else {
            Self::UserSet
        }
    }

    /// Returns true for an engine-synthesized date.
    pub fn is_inferred(&self) -> bool {
        matches!(self, Self::Inferred)
    }
}

/// Normalizes a raw due/start value.
///
/// `None`, the empty string and the zero-date sentinel all map to
/// `TaskDate::None`.
pub fn normalize_due(raw: Option<&str>) -> ModelResult<TaskDate> {
    match raw {
        None => Ok(TaskDate::None),
        Some(value) => TaskDate::parse(value),
    }
}

/// Normalizes a raw value straight to its matching form.
pub fn normalize_due_for_match(raw: Option<&str>) -> ModelResult<String> {
    normalize_due(raw).map(|date| date.match_form())
}

/// Parses an RFC 3339 modification timestamp.
pub fn parse_instant(raw: &str) -> ModelResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|at| at.with_timezone(&Utc))
        .map_err(|_| ModelError::invalid_date(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn none_like_values() {
        assert_eq!(normalize_due(None).unwrap(), TaskDate::None);
        assert_eq!(normalize_due(Some("")).unwrap(), TaskDate::None);
        assert_eq!(
            normalize_due(Some("0001-01-01T00:00:00Z")).unwrap(),
            TaskDate::None
        );
        assert_eq!(normalize_due(None).unwrap().as_normalized(), "none");
    }

    #[test]
    fn parses_date_only_and_instants() {
        assert_eq!(
            normalize_due(Some("2026-01-20")).unwrap(),
            TaskDate::DateOnly(date(2026, 1, 20))
        );
        let due = normalize_due(Some("2026-01-20T10:30:00.250Z")).unwrap();
        assert!(matches!(due, TaskDate::Instant(_)));
        assert!(!due.is_date_only());
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            normalize_due(Some("next tuesday")),
            Err(ModelError::InvalidDate { .. })
        ));
        assert!(normalize_due(Some("2026-13-45")).is_err());
    }

    #[test]
    fn match_form_collapses_utc_midnight() {
        let a = normalize_due_for_match(Some("2026-01-20T00:00:00Z")).unwrap();
        let b = normalize_due_for_match(Some("2026-01-20")).unwrap();
        assert_eq!(a, "2026-01-20");
        assert_eq!(a, b);
        assert_eq!(normalize_due_for_match(None).unwrap(), "none");
    }

    #[test]
    fn match_form_keeps_non_utc_midnight_as_instant() {
        let form = normalize_due_for_match(Some("2026-01-20T00:00:00+11:00")).unwrap();
        assert_eq!(form, "2026-01-19T13:00:00Z");

        let form = normalize_due_for_match(Some("2026-01-20T10:30:00.900Z")).unwrap();
        assert_eq!(form, "2026-01-20T10:30:00Z");
    }

    #[test]
    fn wire_string_uses_zone_midnight() {
        let melbourne = FixedOffset::east_opt(11 * 3600).unwrap();
        let due = TaskDate::DateOnly(date(2026, 1, 20));
        assert_eq!(
            due.to_wire_string(&melbourne).as_deref(),
            Some("2026-01-20T00:00:00+11:00")
        );
        assert_eq!(
            due.to_wire_string(&Utc).as_deref(),
            Some("2026-01-20T00:00:00+00:00")
        );
        assert_eq!(TaskDate::None.to_wire_string(&Utc), None);

        let timed = TaskDate::parse("2026-01-20T10:30:00Z").unwrap();
        assert_eq!(
            timed.to_wire_string(&melbourne).as_deref(),
            Some("2026-01-20T10:30:00Z")
        );
    }

    #[test]
    fn coerce_date_only_uses_zone_day() {
        let melbourne = FixedOffset::east_opt(11 * 3600).unwrap();
        let wire = TaskDate::parse("2026-01-20T00:00:00+11:00").unwrap();
        assert_eq!(
            wire.coerce_date_only(true, &melbourne),
            TaskDate::DateOnly(date(2026, 1, 20))
        );
        assert_eq!(wire.coerce_date_only(false, &melbourne), wire);
    }

    #[test]
    fn serde_uses_wire_strings() {
        let due = TaskDate::DateOnly(date(2026, 1, 20));
        assert_eq!(serde_json::to_string(&due).unwrap(), "\"2026-01-20\"");
        assert_eq!(serde_json::to_string(&TaskDate::None).unwrap(), "null");

        let back: TaskDate = serde_json::from_str("\"2026-01-20T09:00:00Z\"").unwrap();
        assert!(back.instant_utc().is_some());
        let none: TaskDate = serde_json::from_str("null").unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn provenance_flag() {
        assert!(Provenance::from_inferred_flag(true).is_inferred());
        assert_eq!(Provenance::from_inferred_flag(false), Provenance::UserSet);
    }

    #[test]
    fn parse_instant_normalizes_to_utc() {
        let at = parse_instant("2026-01-20T10:00:00+01:00").unwrap();
        assert_eq!(at.to_rfc3339(), "2026-01-20T09:00:00+00:00");
        assert!(parse_instant("yesterday").is_err());
    }
}
