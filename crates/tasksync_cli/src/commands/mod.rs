//! CLI command implementations.

pub mod apply;
pub mod conflicts;
pub mod mappings;
pub mod plan;

use crate::config::CliConfig;
use crate::file_store::{LeftFileStore, RightFileStore};
use std::sync::Arc;
use tasksync_engine::{SqliteStore, SyncConfig, SyncEngine, SyncResult};

/// The engine the commands run.
pub type CliEngine = SyncEngine<LeftFileStore, RightFileStore, SqliteStore, SqliteStore>;

/// Opens the stores named in `config` and builds an engine over them.
pub fn open_engine(config: &CliConfig, sync: SyncConfig) -> SyncResult<CliEngine> {
    let db = Arc::new(SqliteStore::open(&config.database)?);
    Ok(SyncEngine::new(
        sync,
        Arc::new(LeftFileStore::new(&config.left_store)),
        Arc::new(RightFileStore::new(&config.right_store)),
        Arc::clone(&db),
        db,
    ))
}
