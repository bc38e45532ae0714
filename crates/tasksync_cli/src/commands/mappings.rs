//! Mappings command implementation.

use crate::config::CliConfig;
use std::path::Path;
use tasksync_engine::{MappingStore, SqliteStore};

/// Runs the mappings command.
pub fn run(config_path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::load(config_path)?;
    let store = SqliteStore::open(&config.database)?;
    let records = store.load_all()?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            println!("{} mapping(s)", records.len());
            for r in &records {
                let seen = |at: Option<chrono::DateTime<chrono::Utc>>| {
                    at.map_or_else(|| "-".to_string(), |at| at.to_rfc3339())
                };
                println!(
                    "{} <-> {} [{}] left {} right {}{}",
                    r.left_id,
                    r.right_id,
                    r.scope,
                    seen(r.last_seen_left),
                    seen(r.last_seen_right),
                    if r.due_provenance.is_inferred() {
                        " (inferred due)"
                    } else {
                        ""
                    }
                );
            }
        }
    }

    Ok(())
}
