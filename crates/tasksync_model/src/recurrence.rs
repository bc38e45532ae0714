//! Canonical recurrence and the bridge to the remote repeat encoding.
//!
//! The remote side only knows "repeat after N seconds" plus a monthly mode.
//! The bridge is one-directional and lossy:
//!
//! | canonical      | wire `(repeat_after, repeat_mode)` |
//! |----------------|------------------------------------|
//! | `Daily(n)`     | `(n * 86400, 0)`                   |
//! | `Weekly(n)`    | `(n * 604800, 0)`                  |
//! | `Monthly(_)`   | `(0, 1)`, interval dropped         |
//! | `Yearly(_)`    | not representable                  |
//!
//! Reading back, whole weeks win over whole days, so `Daily(7)` comes back
//! as `Weekly(1)`. Finer granularity is never inferred.

use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds in one day.
pub const SECONDS_PER_DAY: i64 = 86_400;
/// Seconds in one week.
pub const SECONDS_PER_WEEK: i64 = 7 * SECONDS_PER_DAY;
/// Remote repeat mode for "repeat after N seconds".
pub const REPEAT_MODE_DEFAULT: i64 = 0;
/// Remote repeat mode for "same day every month".
pub const REPEAT_MODE_MONTHLY: i64 = 1;

/// A recurrence rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "frequency", content = "interval", rename_all = "lowercase")]
pub enum Recurrence {
    /// Every n days.
    Daily(u32),
    /// Every n weeks.
    Weekly(u32),
    /// Every n months.
    Monthly(u32),
    /// Every n years.
    Yearly(u32),
}

impl Recurrence {
    /// Builds a rule from a frequency name and interval.
    pub fn from_parts(frequency: &str, interval: i64) -> ModelResult<Self> {
        let n = u32::try_from(interval)
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ModelError::InvalidInterval { interval })?;
        match frequency.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily(n)),
            "weekly" => Ok(Self::Weekly(n)),
            "monthly" => Ok(Self::Monthly(n)),
            "yearly" => Ok(Self::Yearly(n)),
            _ => Err(ModelError::UnknownFrequency {
                value: frequency.to_string(),
            }),
        }
    }

    /// Frequency name.
    pub fn frequency(&self) -> &'static str {
        match self {
            Self::Daily(_) => "daily",
            Self::Weekly(_) => "weekly",
            Self::Monthly(_) => "monthly",
            Self::Yearly(_) => "yearly",
        }
    }

    /// Interval in units of the frequency.
    pub fn interval(&self) -> u32 {
        match self {
            Self::Daily(n) | Self::Weekly(n) | Self::Monthly(n) | Self::Yearly(n) => *n,
        }
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.frequency(), self.interval())
    }
}

/// Signature used for comparison: `"frequency|interval"` or `"none"`.
pub fn recurrence_signature(recurrence: Option<&Recurrence>) -> String {
    match recurrence {
        Some(r) => r.to_string(),
        None => "none".to_string(),
    }
}

/// Remote repeat fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RepeatRule {
    /// Repeat interval in seconds.
    pub repeat_after: Option<i64>,
    /// Repeat mode; 1 is monthly, anything else is time-based.
    pub repeat_mode: Option<i64>,
}

impl RepeatRule {
    /// Creates a rule from raw wire fields.
    pub fn new(repeat_after: Option<i64>, repeat_mode: Option<i64>) -> Self {
        Self {
            repeat_after,
            repeat_mode,
        }
    }

    /// Decodes the wire fields.
    ///
    /// Any mode other than monthly is treated as time-based. A time-based
    /// interval that is not a whole number of days yields no recurrence.
    pub fn to_recurrence(&self) -> Option<Recurrence> {
        if self.repeat_mode == Some(REPEAT_MODE_MONTHLY) {
            return Some(Recurrence::Monthly(1));
        }
        let after = self.repeat_after.filter(|s| *s > 0)?;
        if after % SECONDS_PER_WEEK == 0 {
            return u32::try_from(after / SECONDS_PER_WEEK)
                .ok()
                .map(Recurrence::Weekly);
        }
        if after % SECONDS_PER_DAY == 0 {
            return u32::try_from(after / SECONDS_PER_DAY)
                .ok()
                .map(Recurrence::Daily);
        }
        None
    }

    /// Encodes a canonical rule. Returns `None` when it cannot be expressed.
    pub fn from_recurrence(recurrence: &Recurrence) -> Option<Self> {
        match recurrence {
            Recurrence::Daily(n) => Some(Self::new(
                Some(i64::from(*n) * SECONDS_PER_DAY),
                Some(REPEAT_MODE_DEFAULT),
            )),
            Recurrence::Weekly(n) => Some(Self::new(
                Some(i64::from(*n) * SECONDS_PER_WEEK),
                Some(REPEAT_MODE_DEFAULT),
            )),
            Recurrence::Monthly(_) => Some(Self::new(Some(0), Some(REPEAT_MODE_MONTHLY))),
            Recurrence::Yearly(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(after: Option<i64>, mode: Option<i64>) -> Option<Recurrence> {
        RepeatRule::new(after, mode).to_recurrence()
    }

    #[test]
    fn decode_table() {
        assert_eq!(decode(Some(86_400), None), Some(Recurrence::Daily(1)));
        assert_eq!(decode(Some(0), Some(1)), Some(Recurrence::Monthly(1)));
        assert_eq!(decode(Some(259_200), Some(0)), Some(Recurrence::Daily(3)));
        assert_eq!(decode(Some(1_209_600), None), Some(Recurrence::Weekly(2)));
        assert_eq!(decode(Some(100_000), Some(0)), None);
    }

    #[test]
    fn decode_edge_cases() {
        assert_eq!(decode(None, None), None);
        assert_eq!(decode(Some(-86_400), Some(0)), None);
        // Unknown modes fall back to time-based decoding.
        assert_eq!(decode(Some(0), Some(7)), None);
        assert_eq!(decode(Some(172_800), Some(7)), Some(Recurrence::Daily(2)));
    }

    #[test]
    fn encode_is_lossy() {
        let rule = RepeatRule::from_recurrence(&Recurrence::Monthly(3)).unwrap();
        assert_eq!(rule.to_recurrence(), Some(Recurrence::Monthly(1)));

        let rule = RepeatRule::from_recurrence(&Recurrence::Daily(7)).unwrap();
        assert_eq!(rule.to_recurrence(), Some(Recurrence::Weekly(1)));

        assert_eq!(RepeatRule::from_recurrence(&Recurrence::Yearly(1)), None);
    }

    #[test]
    fn from_parts_validates() {
        assert_eq!(
            Recurrence::from_parts("Weekly", 2).unwrap(),
            Recurrence::Weekly(2)
        );
        assert!(matches!(
            Recurrence::from_parts("hourly", 1),
            Err(ModelError::UnknownFrequency { .. })
        ));
        assert!(matches!(
            Recurrence::from_parts("daily", 0),
            Err(ModelError::InvalidInterval { interval: 0 })
        ));
    }

    #[test]
    fn signatures() {
        assert_eq!(recurrence_signature(Some(&Recurrence::Daily(3))), "daily|3");
        assert_eq!(recurrence_signature(None), "none");
    }

    #[test]
    fn serde_shape() {
        let json = serde_json::to_string(&Recurrence::Weekly(2)).unwrap();
        assert_eq!(json, r#"{"frequency":"weekly","interval":2}"#);
    }
}
