//! Configuration for the sync engine.

use crate::conflict::{ConflictKey, ConflictPolicy};
use crate::mapping::ScopeId;
use chrono::NaiveDate;
use rand::Rng;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for sync runs.
#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    /// Scopes to sync, in order.
    pub scopes: Vec<ScopeId>,
    /// Retry configuration for store calls.
    pub retry: RetryConfig,
    /// Options applied when writing a plan.
    pub apply: ApplyOptions,
    /// Where to write the conflict report, if anywhere.
    pub conflict_report_path: Option<PathBuf>,
    /// Compute plans without writing to either side.
    pub dry_run: bool,
    /// Secrets to scrub from errors, logs and reports.
    pub secrets: Vec<String>,
}

impl SyncConfig {
    /// Creates a configuration for a single scope.
    pub fn new(scope: ScopeId) -> Self {
        Self {
            scopes: vec![scope],
            ..Self::default()
        }
    }

    /// Adds a scope.
    pub fn with_scope(mut self, scope: ScopeId) -> Self {
        self.scopes.push(scope);
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the apply options.
    pub fn with_apply(mut self, apply: ApplyOptions) -> Self {
        self.apply = apply;
        self
    }

    /// Sets the conflict report path.
    pub fn with_conflict_report(mut self, path: impl Into<PathBuf>) -> Self {
        self.conflict_report_path = Some(path.into());
        self
    }

    /// Enables or disables dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Adds a secret to redact.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secrets.push(secret.into());
        self
    }
}

/// Options controlling how a plan is applied.
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Apply the rest of the plan even if conflicts stay unresolved.
    pub allow_conflicts: bool,
    /// Scope-wide conflict policy.
    pub policy: ConflictPolicy,
    /// Per-pair policies, taking precedence over `policy`.
    pub overrides: BTreeMap<ConflictKey, ConflictPolicy>,
    /// Date used for inferred due dates. Defaults to the local date.
    pub today: Option<NaiveDate>,
}

impl ApplyOptions {
    /// Creates default options (policy `none`, conflicts refused).
    pub fn new() -> Self {
        Self::default()
    }

    /// Allows applying with unresolved conflicts.
    pub fn with_allow_conflicts(mut self, allow: bool) -> Self {
        self.allow_conflicts = allow;
        self
    }

    /// Sets the scope-wide policy.
    pub fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets a per-pair policy.
    pub fn with_override(mut self, key: ConflictKey, policy: ConflictPolicy) -> Self {
        self.overrides.insert(key, policy);
        self
    }

    /// Pins the date used for inferred due dates.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Returns the date used for inferred due dates.
    pub fn today(&self) -> NaiveDate {
        self.today
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    /// Policy effective for one pair.
    pub fn policy_for(&self, key: &ConflictKey) -> ConflictPolicy {
        self.overrides.get(key).copied().unwrap_or(self.policy)
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap on the backoff delay before jitter.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Relative jitter applied to each delay; 0.15 means ±15%.
    pub jitter: f64,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(800),
            max_delay: Duration::from_secs(6),
            backoff_multiplier: 2.0,
            jitter: 0.15,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter: 0.0,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Sets the relative jitter.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Calculates the delay before a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_secs_f64()
            * self
                .backoff_multiplier
                .powi(attempt.saturating_sub(1) as i32);
        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        if self.jitter > 0.0 {
            let factor = rand::thread_rng().gen_range(1.0 - self.jitter..=1.0 + self.jitter);
            Duration::from_secs_f64(delay_secs * factor)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_builder() {
        let scope = ScopeId::new("inbox", "7");
        let config = SyncConfig::new(scope.clone())
            .with_scope(ScopeId::new("work", "9"))
            .with_dry_run(true)
            .with_secret("tok")
            .with_conflict_report("/tmp/conflicts.json");

        assert_eq!(config.scopes.len(), 2);
        assert_eq!(config.scopes[0], scope);
        assert!(config.dry_run);
        assert_eq!(config.secrets, vec!["tok".to_string()]);
        assert!(config.conflict_report_path.is_some());
    }

    #[test]
    fn apply_options_override_wins() {
        let key = ConflictKey::new("l1", "r1");
        let options = ApplyOptions::new()
            .with_policy(ConflictPolicy::FavorLeft)
            .with_override(key.clone(), ConflictPolicy::FavorRight);

        assert_eq!(options.policy_for(&key), ConflictPolicy::FavorRight);
        assert_eq!(
            options.policy_for(&ConflictKey::new("l2", "r2")),
            ConflictPolicy::FavorLeft
        );
    }

    #[test]
    fn default_retry_policy() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.initial_delay, Duration::from_millis(800));
        assert_eq!(config.max_delay, Duration::from_secs(6));
    }

    #[test]
    fn retry_delay_calculation() {
        let config = RetryConfig::default();

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);

        let delay1 = config.delay_for_attempt(1);
        assert!(delay1 >= Duration::from_millis(680));
        assert!(delay1 <= Duration::from_millis(920));

        let delay2 = config.delay_for_attempt(2);
        assert!(delay2 >= Duration::from_millis(1360));
        assert!(delay2 <= Duration::from_millis(1840));
    }

    #[test]
    fn retry_delay_respects_max() {
        let config = RetryConfig::new(10).with_backoff_multiplier(10.0);

        let delay = config.delay_for_attempt(5);
        assert!(delay <= Duration::from_millis(6900));
        assert!(delay >= Duration::from_millis(5100));
    }

    #[test]
    fn no_jitter_is_exact() {
        let config = RetryConfig::default().with_jitter(0.0);
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(3200));
    }
}
