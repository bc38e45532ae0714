//! Bounded retry of store calls.

use crate::config::RetryConfig;
use crate::error::SyncResult;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Whether a call may be safely repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Idempotency {
    /// Reads, updates and deletes.
    Idempotent,
    /// Creates. Repeating one could duplicate the item.
    NonIdempotent,
}

/// Runs store calls with exponential backoff on transient failures.
#[derive(Debug, Default)]
pub struct Retrier {
    config: RetryConfig,
    retries: AtomicU64,
}

impl Retrier {
    /// Creates a retrier.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            retries: AtomicU64::new(0),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Total number of retries performed so far.
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Runs `call`, retrying transient failures of idempotent calls.
    ///
    /// Non-idempotent calls run exactly once.
    pub fn run<T, F>(&self, label: &str, idempotency: Idempotency, mut call: F) -> SyncResult<T>
    where
        F: FnMut() -> SyncResult<T>,
    {
        let max_attempts = match idempotency {
            Idempotency::Idempotent => self.config.max_attempts.max(1),
            Idempotency::NonIdempotent => 1,
        };

        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let delay = self.config.delay_for_attempt(attempt);
                debug!(label, attempt, ?delay, "retrying after backoff");
                std::thread::sleep(delay);
                self.retries.fetch_add(1, Ordering::Relaxed);
            }

            match call() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt + 1 < max_attempts => {
                    warn!(label, attempt, error = %e, "transient failure");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use std::cell::Cell;
    use std::time::Duration;

    fn fast() -> Retrier {
        Retrier::new(
            RetryConfig::default()
                .with_initial_delay(Duration::ZERO)
                .with_jitter(0.0),
        )
    }

    #[test]
    fn retries_transient_until_success() {
        let retrier = fast();
        let calls = Cell::new(0);
        let result = retrier.run("update", Idempotency::Idempotent, || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(SyncError::RateLimited)
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 3);
        assert_eq!(retrier.retries(), 2);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let retrier = fast();
        let calls = Cell::new(0);
        let result: SyncResult<()> = retrier.run("fetch", Idempotency::Idempotent, || {
            calls.set(calls.get() + 1);
            Err(SyncError::network("timeout"))
        });
        assert!(matches!(result, Err(SyncError::Network { .. })));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn does_not_retry_permanent_failures() {
        let retrier = fast();
        let calls = Cell::new(0);
        let result: SyncResult<()> = retrier.run("update", Idempotency::Idempotent, || {
            calls.set(calls.get() + 1);
            Err(SyncError::NotAuthorized {
                message: String::new(),
            })
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn never_retries_creates() {
        let retrier = fast();
        let calls = Cell::new(0);
        let result: SyncResult<()> = retrier.run("create", Idempotency::NonIdempotent, || {
            calls.set(calls.get() + 1);
            Err(SyncError::Server {
                status: 503,
                message: String::new(),
            })
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
        assert_eq!(retrier.retries(), 0);
    }
}
