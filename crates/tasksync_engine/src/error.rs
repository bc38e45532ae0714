//! Error types for the sync engine.

use crate::redact::Redactor;
use tasksync_model::ModelError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Connection failure, timeout or unreachable host.
    #[error("network error: {message}")]
    Network {
        /// Error message.
        message: String,
    },

    /// The remote side asked us to slow down (HTTP 429).
    #[error("rate limited by remote service")]
    RateLimited,

    /// The remote side failed with a server error.
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status.
        status: u16,
        /// Redacted response body.
        message: String,
    },

    /// Credentials were rejected (HTTP 401/403).
    #[error("not authorized: {message}")]
    NotAuthorized {
        /// Redacted response body.
        message: String,
    },

    /// The target item does not exist.
    #[error("not found: {message}")]
    NotFound {
        /// What was looked up.
        message: String,
    },

    /// Access to the local reminder store was denied.
    #[error("access to the local task store was denied")]
    LocalStoreAccessDenied,

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Apply refused because unresolved conflicts exist.
    #[error("{count} unresolved conflict(s); rerun with a resolution policy or allow conflicts")]
    ConflictsPresent {
        /// Number of unresolved conflicts.
        count: usize,
    },

    /// The persisted mapping set violates the one-to-one invariant.
    #[error("mapping conflict: {0}")]
    MappingConflict(String),

    /// SQLite error.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed task data.
    #[error("invalid task data: {0}")]
    Model(#[from] ModelError),

    /// Invalid state transition.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

impl SyncError {
    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Classifies a failed HTTP response.
    ///
    /// The body is redacted before it is kept in the error. Returns `None`
    /// for statuses that are not failures.
    pub fn from_http_status(status: u16, body: &str, redactor: &Redactor) -> Option<Self> {
        let message = redactor.redact(body.trim());
        let err = match status {
            401 | 403 => Self::NotAuthorized { message },
            404 => Self::NotFound { message },
            429 => Self::RateLimited,
            400..=599 => Self::Server { status, message },
            _ => return None,
        };
        Some(err)
    }

    /// Returns true if the failure is transient and the call may be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } | Self::RateLimited => true,
            Self::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns true for a not-found failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Short message suitable for showing to an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotAuthorized { .. } => "Authentication failed. Check the API token.",
            Self::NotFound { .. } => "A task or project could not be found on the server.",
            Self::RateLimited => "The server is busy. Try again shortly.",
            Self::Server { status, .. } if *status >= 500 => {
                "The server had a problem. Try again later."
            }
            Self::Network { .. } => "The server could not be reached.",
            Self::LocalStoreAccessDenied => "Access to reminders was denied.",
            Self::ConflictsPresent { .. } => "Conflicts need to be resolved before applying.",
            _ => "Sync failed.",
        }
    }
}
