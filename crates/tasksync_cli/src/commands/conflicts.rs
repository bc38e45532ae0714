//! Conflicts command implementation.

use crate::config::CliConfig;
use std::path::Path;
use tasksync_engine::{ConflictStore, Redactor, SqliteStore};

/// Runs the conflicts command.
pub fn run(config_path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::load(config_path)?;
    let redactor = Redactor::new(config.secrets.iter().cloned());
    let store = SqliteStore::open(&config.database)?;
    let rows = store.list(None)?;

    match format {
        "json" => {
            println!("{}", redactor.redact(&serde_json::to_string_pretty(&rows)?));
        }
        _ => {
            if rows.is_empty() {
                println!("No conflicts.");
            }
            for row in &rows {
                println!(
                    "{} <-> {} [{}] detected {}",
                    row.left_id, row.right_id, row.scope, row.detected_at
                );
                for diff in &row.diffs {
                    println!(
                        "  {}: {:?} vs {:?}",
                        diff.field,
                        redactor.redact(&diff.left_value),
                        redactor.redact(&diff.right_value)
                    );
                }
            }
        }
    }

    Ok(())
}
