//! Plan command implementation.

use super::open_engine;
use crate::config::CliConfig;
use serde::Serialize;
use std::path::Path;
use tasksync_engine::{ConflictKey, PlanSummary, ScopeRunResult};

/// Ids of one pair.
#[derive(Debug, Serialize)]
pub struct PairIds {
    /// Left task id.
    pub left_id: String,
    /// Right task id.
    pub right_id: String,
}

impl From<ConflictKey> for PairIds {
    fn from(key: ConflictKey) -> Self {
        Self {
            left_id: key.left_id,
            right_id: key.right_id,
        }
    }
}

/// Plan of one scope.
#[derive(Debug, Serialize)]
pub struct ScopePlan {
    /// Scope label.
    pub scope: String,
    /// Bucket sizes.
    pub summary: PlanSummary,
    /// Keys that matched several tasks on a side.
    pub ambiguous_keys: Vec<String>,
    /// Differing pairs with no clear direction.
    pub unknown_direction: Vec<PairIds>,
    /// Conflicts a policy settles.
    pub resolved_conflicts: Vec<PairIds>,
    /// Conflicts that block the apply.
    pub unresolved_conflicts: Vec<PairIds>,
}

impl From<&ScopeRunResult> for ScopePlan {
    fn from(result: &ScopeRunResult) -> Self {
        let planned = &result.planned;
        let resolved = &planned.resolved;
        Self {
            scope: result.scope.to_string(),
            summary: result.summary,
            ambiguous_keys: planned.plan.ambiguous_keys.clone(),
            unknown_direction: planned
                .plan
                .unknown_direction
                .iter()
                .map(|p| ConflictKey::of(p).into())
                .collect(),
            resolved_conflicts: resolved
                .to_left
                .iter()
                .chain(&resolved.to_right)
                .chain(&resolved.skipped)
                .map(|p| ConflictKey::of(p).into())
                .collect(),
            unresolved_conflicts: resolved
                .unresolved
                .iter()
                .map(|p| ConflictKey::of(p).into())
                .collect(),
        }
    }
}

/// Runs the plan command.
pub fn run(config_path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::load(config_path)?;
    let sync = config.to_sync_config()?.with_dry_run(true);
    let engine = open_engine(&config, sync)?;

    let result = engine.run()?;
    let scopes: Vec<ScopePlan> = result.scopes.iter().map(ScopePlan::from).collect();

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&scopes)?);
        }
        _ => {
            for scope in &scopes {
                print_text_output(scope);
            }
        }
    }

    Ok(())
}

fn print_text_output(plan: &ScopePlan) {
    let s = &plan.summary;
    println!("Scope {}", plan.scope);
    println!("  create left:    {}", s.create_left);
    println!("  create right:   {}", s.create_right);
    println!("  update left:    {}", s.update_left);
    println!("  update right:   {}", s.update_right);
    println!("  delete left:    {}", s.delete_left);
    println!("  delete right:   {}", s.delete_right);
    println!("  auto-matched:   {}", s.auto_matched);
    println!("  kept completed: {}", s.ignored_missing_completed);
    println!(
        "  conflicts:      {} ({} unresolved)",
        s.conflicts,
        plan.unresolved_conflicts.len()
    );
    for pair in &plan.unresolved_conflicts {
        println!("    {} <-> {}", pair.left_id, pair.right_id);
    }
    if !plan.ambiguous_keys.is_empty() {
        println!("  ambiguous keys:");
        for key in &plan.ambiguous_keys {
            println!("    {key}");
        }
    }
    if !plan.unknown_direction.is_empty() {
        println!("  no clear direction:");
        for pair in &plan.unknown_direction {
            println!("    {} <-> {}", pair.left_id, pair.right_id);
        }
    }
}
