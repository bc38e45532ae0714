//! Configuration file.
//!
//! ```json
//! {
//!   "database": "tasksync.db",
//!   "left_store": "reminders.json",
//!   "right_store": "remote.json",
//!   "scopes": [{ "left_list": "inbox", "right_project": "7" }],
//!   "policy": "none",
//!   "conflict_report": "conflicts.json",
//!   "secrets": ["..."]
//! }
//! ```
//!
//! Relative paths are resolved against the directory of the file.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tasksync_engine::{
    ApplyOptions, ConflictKey, ConflictPolicy, RetryConfig, ScopeId, SyncConfig, SyncError,
    SyncResult,
};

/// One scope entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ScopeEntry {
    /// Left list id.
    pub left_list: String,
    /// Right project id.
    pub right_project: String,
}

/// A per-pair policy.
#[derive(Debug, Clone, Deserialize)]
pub struct OverrideEntry {
    /// Left task id.
    pub left_id: String,
    /// Right task id.
    pub right_id: String,
    /// Policy name.
    pub policy: String,
}

/// Retry settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryEntry {
    /// Attempts including the first.
    pub max_attempts: u32,
    /// First backoff delay.
    pub initial_delay_ms: u64,
    /// Backoff cap.
    pub max_delay_ms: u64,
}

impl Default for RetryEntry {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            initial_delay_ms: defaults.initial_delay.as_millis() as u64,
            max_delay_ms: defaults.max_delay.as_millis() as u64,
        }
    }
}

/// The parsed configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    /// SQLite database holding mappings and conflicts.
    pub database: PathBuf,
    /// JSON file of the left store.
    pub left_store: PathBuf,
    /// JSON file of the right store.
    pub right_store: PathBuf,
    /// Scopes to sync.
    pub scopes: Vec<ScopeEntry>,
    /// Scope-wide conflict policy.
    #[serde(default)]
    pub policy: Option<String>,
    /// Per-pair policies.
    #[serde(default)]
    pub overrides: Vec<OverrideEntry>,
    /// Where to write the conflict report.
    #[serde(default)]
    pub conflict_report: Option<PathBuf>,
    /// Retry settings.
    #[serde(default)]
    pub retry: RetryEntry,
    /// Values to redact from output.
    #[serde(default)]
    pub secrets: Vec<String>,
}

impl CliConfig {
    /// Reads and validates a configuration file.
    pub fn load(path: &Path) -> SyncResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: CliConfig = serde_json::from_str(&raw)?;
        if config.scopes.is_empty() {
            return Err(SyncError::Config("no scopes configured".into()));
        }
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.database = base.join(&config.database);
        config.left_store = base.join(&config.left_store);
        config.right_store = base.join(&config.right_store);
        config.conflict_report = config.conflict_report.map(|p| base.join(p));
        Ok(config)
    }

    /// Builds the engine configuration.
    pub fn to_sync_config(&self) -> SyncResult<SyncConfig> {
        let mut apply = ApplyOptions::new();
        if let Some(policy) = &self.policy {
            apply = apply.with_policy(policy.parse()?);
        }
        for entry in &self.overrides {
            let policy: ConflictPolicy = entry.policy.parse()?;
            apply = apply.with_override(ConflictKey::new(&entry.left_id, &entry.right_id), policy);
        }

        let retry = RetryConfig::new(self.retry.max_attempts)
            .with_initial_delay(Duration::from_millis(self.retry.initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.retry.max_delay_ms));

        let mut config = SyncConfig::default().with_retry(retry).with_apply(apply);
        for scope in &self.scopes {
            config = config.with_scope(ScopeId::new(&scope.left_list, &scope.right_project));
        }
        if let Some(path) = &self.conflict_report {
            config = config.with_conflict_report(path);
        }
        for secret in &self.secrets {
            config = config.with_secret(secret);
        }
        Ok(config)
    }
}
