//! Apply command implementation.

use super::open_engine;
use crate::config::CliConfig;
use serde::Serialize;
use std::path::Path;
use tasksync_engine::{ApplyOutcome, ConflictKey, ConflictPolicy, SyncError};

/// Outcome of one scope.
#[derive(Debug, Serialize)]
pub struct ScopeApply {
    /// Scope label.
    pub scope: String,
    /// What was written.
    pub outcome: ApplyOutcome,
}

/// Parses `LEFT_ID:RIGHT_ID=POLICY`.
pub fn parse_resolution(raw: &str) -> Result<(ConflictKey, ConflictPolicy), SyncError> {
    let invalid = || SyncError::Config(format!("expected LEFT_ID:RIGHT_ID=POLICY, got {raw:?}"));
    let (ids, policy) = raw.rsplit_once('=').ok_or_else(invalid)?;
    let (left, right) = ids.split_once(':').ok_or_else(invalid)?;
    if left.is_empty() || right.is_empty() {
        return Err(invalid());
    }
    Ok((ConflictKey::new(left, right), policy.parse()?))
}

/// Runs the apply command.
pub fn run(
    config_path: &Path,
    allow_conflicts: bool,
    policy: Option<&str>,
    resolutions: &[String],
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::load(config_path)?;
    let mut sync = config.to_sync_config()?;
    sync.apply.allow_conflicts = allow_conflicts;
    if let Some(policy) = policy {
        sync.apply.policy = policy.parse()?;
    }
    for raw in resolutions {
        let (key, policy) = parse_resolution(raw)?;
        sync.apply.overrides.insert(key, policy);
    }
    let report_path = sync.conflict_report_path.clone();
    let engine = open_engine(&config, sync)?;

    let result = match engine.run() {
        Ok(result) => result,
        Err(e) => {
            eprintln!("{}", e.user_message());
            if let (SyncError::ConflictsPresent { .. }, Some(path)) = (&e, &report_path) {
                eprintln!("Conflict report: {}", path.display());
            }
            return Err(e.into());
        }
    };

    let scopes: Vec<ScopeApply> = result
        .scopes
        .iter()
        .filter_map(|s| {
            s.outcome.map(|outcome| ScopeApply {
                scope: s.scope.to_string(),
                outcome,
            })
        })
        .collect();

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&scopes)?);
        }
        _ => {
            for scope in &scopes {
                let o = &scope.outcome;
                println!(
                    "Scope {}: {} created, {} updated, {} deleted, {} linked, {} conflict(s) skipped",
                    scope.scope,
                    o.created_left + o.created_right,
                    o.updated_left + o.updated_right,
                    o.deleted_left + o.deleted_right,
                    o.linked,
                    o.skipped_conflicts
                );
            }
            println!("Done in {:.2?}", result.duration);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_resolution() {
        let (key, policy) = parse_resolution("ABC-1:9f3e=favor-right").unwrap();
        assert_eq!(key, ConflictKey::new("ABC-1", "9f3e"));
        assert_eq!(policy, ConflictPolicy::FavorRight);
    }

    #[test]
    fn rejects_malformed_resolution() {
        assert!(parse_resolution("l1=favor-left").is_err());
        assert!(parse_resolution("l1:r1").is_err());
        assert!(parse_resolution(":r1=lww").is_err());
        assert!(parse_resolution("l1:r1=maybe").is_err());
    }
}
