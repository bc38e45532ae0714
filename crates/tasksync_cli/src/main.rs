//! TaskSync CLI
//!
//! Two-way sync between a reminder list and a remote task project, over
//! JSON-file stores.
//!
//! # Commands
//!
//! - `plan` - Show what a sync would do, without writing
//! - `apply` - Run the sync
//! - `conflicts` - List conflicts found by the last run
//! - `mappings` - List linked task pairs

mod commands;
mod config;
mod file_store;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// TaskSync command-line tools.
#[derive(Parser)]
#[command(name = "tasksync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what a sync would do, without writing
    Plan {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run the sync
    Apply {
        /// Apply the rest of the plan even if conflicts stay unresolved
        #[arg(short, long)]
        allow_conflicts: bool,

        /// Conflict policy (none, favor-left, favor-right, last-write-wins)
        #[arg(short, long)]
        policy: Option<String>,

        /// Per-pair policy as LEFT_ID:RIGHT_ID=POLICY (repeatable)
        #[arg(short, long)]
        resolve: Vec<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List conflicts found by the last run
    Conflicts {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List linked task pairs
    Mappings {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Plan { format } => {
            let path = cli.config.ok_or("Configuration file required for plan")?;
            commands::plan::run(&path, &format)?;
        }
        Commands::Apply {
            allow_conflicts,
            policy,
            resolve,
            format,
        } => {
            let path = cli.config.ok_or("Configuration file required for apply")?;
            commands::apply::run(&path, allow_conflicts, policy.as_deref(), &resolve, &format)?;
        }
        Commands::Conflicts { format } => {
            let path = cli.config.ok_or("Configuration file required for conflicts")?;
            commands::conflicts::run(&path, &format)?;
        }
        Commands::Mappings { format } => {
            let path = cli.config.ok_or("Configuration file required for mappings")?;
            commands::mappings::run(&path, &format)?;
        }
        Commands::Version => {
            println!("TaskSync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
