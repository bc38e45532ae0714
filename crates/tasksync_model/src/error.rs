//! Error types for the task model.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur while normalizing native task data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// A date or timestamp string could not be parsed.
    #[error("invalid date value: {value:?}")]
    InvalidDate {
        /// The raw value.
        value: String,
    },

    /// A recurrence frequency name is not one of daily/weekly/monthly/yearly.
    #[error("unknown recurrence frequency: {value:?}")]
    UnknownFrequency {
        /// The raw frequency name.
        value: String,
    },

    /// A recurrence interval must be at least one.
    #[error("recurrence interval must be positive, got {interval}")]
    InvalidInterval {
        /// The rejected interval.
        interval: i64,
    },
}

impl ModelError {
    pub(crate) fn invalid_date(value: impl Into<String>) -> Self {
        Self::InvalidDate {
            value: value.into(),
        }
    }
}
