//! SQLite-backed mapping and conflict stores.

use crate::conflict::{ConflictRecord, ConflictStore};
use crate::error::SyncResult;
use crate::mapping::{MappingStore, ScopeId, SyncRecord};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tasksync_model::{parse_instant, Provenance};
use tracing::debug;

const SCHEMA_VERSION: i64 = 1;

const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS task_sync_map (
    left_id TEXT NOT NULL,
    right_id TEXT NOT NULL,
    left_list_id TEXT NOT NULL,
    right_project_id TEXT NOT NULL,
    last_seen_left TEXT,
    last_seen_right TEXT,
    date_only_due INTEGER NOT NULL DEFAULT 0,
    date_only_start INTEGER NOT NULL DEFAULT 0,
    inferred_due INTEGER NOT NULL DEFAULT 0,
    last_synced_at TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_task_sync_map_left ON task_sync_map(left_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_task_sync_map_right ON task_sync_map(right_id);
CREATE INDEX IF NOT EXISTS idx_task_sync_map_scope
    ON task_sync_map(left_list_id, right_project_id);

CREATE TABLE IF NOT EXISTS task_conflicts (
    left_id TEXT NOT NULL,
    right_id TEXT NOT NULL,
    left_list_id TEXT NOT NULL,
    right_project_id TEXT NOT NULL,
    detected_at TEXT NOT NULL,
    left_json TEXT NOT NULL,
    right_json TEXT NOT NULL,
    diffs_json TEXT NOT NULL,
    PRIMARY KEY (left_id, right_id)
);
";

const RECORD_COLUMNS: &str = "left_id, right_id, left_list_id, right_project_id, \
     last_seen_left, last_seen_right, date_only_due, date_only_start, inferred_due, last_synced_at";

const CONFLICT_COLUMNS: &str = "left_id, right_id, left_list_id, right_project_id, \
     detected_at, left_json, right_json, diffs_json";

/// Mapping and conflict storage in one SQLite database.
///
/// The connection is serialized behind a mutex.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path`.
    pub fn open(path: &Path) -> SyncResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> SyncResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> SyncResult<Self> {
        apply_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn query_records(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> SyncResult<Vec<SyncRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let raws = stmt
            .query_map(args, RawRecord::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawRecord::into_record).collect()
    }
}

fn apply_migrations(conn: &Connection) -> SyncResult<()> {
    let current: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if current < SCHEMA_VERSION {
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(SCHEMA_V1)?;
        tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        tx.commit()?;
        debug!(from = current, to = SCHEMA_VERSION, "migrated sync database");
    }
    Ok(())
}

fn format_instant(at: Option<DateTime<Utc>>) -> Option<String> {
    at.map(|at| at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

fn parse_optional(raw: Option<String>) -> SyncResult<Option<DateTime<Utc>>> {
    Ok(raw.as_deref().map(parse_instant).transpose()?)
}

struct RawRecord {
    left_id: String,
    right_id: String,
    left_list_id: String,
    right_project_id: String,
    last_seen_left: Option<String>,
    last_seen_right: Option<String>,
    date_only_due: bool,
    date_only_start: bool,
    inferred_due: bool,
    last_synced_at: Option<String>,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            left_id: row.get(0)?,
            right_id: row.get(1)?,
            left_list_id: row.get(2)?,
            right_project_id: row.get(3)?,
            last_seen_left: row.get(4)?,
            last_seen_right: row.get(5)?,
            date_only_due: row.get(6)?,
            date_only_start: row.get(7)?,
            inferred_due: row.get(8)?,
            last_synced_at: row.get(9)?,
        })
    }

    fn into_record(self) -> SyncResult<SyncRecord> {
        Ok(SyncRecord {
            left_id: self.left_id,
            right_id: self.right_id,
            scope: ScopeId::new(self.left_list_id, self.right_project_id),
            last_seen_left: parse_optional(self.last_seen_left)?,
            last_seen_right: parse_optional(self.last_seen_right)?,
            date_only_due: self.date_only_due,
            date_only_start: self.date_only_start,
            due_provenance: Provenance::from_inferred_flag(self.inferred_due),
            last_synced_at: parse_optional(self.last_synced_at)?,
        })
    }
}

struct RawConflict {
    left_id: String,
    right_id: String,
    left_list_id: String,
    right_project_id: String,
    detected_at: String,
    left_json: String,
    right_json: String,
    diffs_json: String,
}

impl RawConflict {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            left_id: row.get(0)?,
            right_id: row.get(1)?,
            left_list_id: row.get(2)?,
            right_project_id: row.get(3)?,
            detected_at: row.get(4)?,
            left_json: row.get(5)?,
            right_json: row.get(6)?,
            diffs_json: row.get(7)?,
        })
    }

    fn into_record(self) -> SyncResult<ConflictRecord> {
        Ok(ConflictRecord {
            scope: ScopeId::new(self.left_list_id, self.right_project_id),
            left_id: self.left_id,
            right_id: self.right_id,
            detected_at: parse_instant(&self.detected_at)?,
            left_snapshot: serde_json::from_str(&self.left_json)?,
            right_snapshot: serde_json::from_str(&self.right_json)?,
            diffs: serde_json::from_str(&self.diffs_json)?,
        })
    }
}

fn insert_conflict(conn: &Connection, record: &ConflictRecord) -> SyncResult<()> {
    conn.execute(
        &format!("INSERT OR REPLACE INTO task_conflicts ({CONFLICT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
        params![
            record.left_id,
            record.right_id,
            record.scope.left_list_id,
            record.scope.right_project_id,
            record.detected_at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            serde_json::to_string(&record.left_snapshot)?,
            serde_json::to_string(&record.right_snapshot)?,
            serde_json::to_string(&record.diffs)?,
        ],
    )?;
    Ok(())
}

impl MappingStore for SqliteStore {
    fn load(&self, scope: &ScopeId) -> SyncResult<Vec<SyncRecord>> {
        self.query_records(
            &format!(
                "SELECT {RECORD_COLUMNS} FROM task_sync_map \
                 WHERE left_list_id = ?1 AND right_project_id = ?2 ORDER BY left_id"
            ),
            &[&scope.left_list_id, &scope.right_project_id],
        )
    }

    fn load_all(&self) -> SyncResult<Vec<SyncRecord>> {
        self.query_records(
            &format!("SELECT {RECORD_COLUMNS} FROM task_sync_map ORDER BY left_id"),
            &[],
        )
    }

    fn upsert(&self, record: &SyncRecord) -> SyncResult<()> {
        // REPLACE drops any row that collides on either unique index.
        self.conn.lock().execute(
            &format!(
                "INSERT OR REPLACE INTO task_sync_map ({RECORD_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            params![
                record.left_id,
                record.right_id,
                record.scope.left_list_id,
                record.scope.right_project_id,
                format_instant(record.last_seen_left),
                format_instant(record.last_seen_right),
                record.date_only_due,
                record.date_only_start,
                record.due_provenance.is_inferred(),
                format_instant(record.last_synced_at),
            ],
        )?;
        Ok(())
    }

    fn get_by_left(&self, left_id: &str) -> SyncResult<Option<SyncRecord>> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM task_sync_map WHERE left_id = ?1"),
                params![left_id],
                RawRecord::from_row,
            )
            .optional()?;
        raw.map(RawRecord::into_record).transpose()
    }

    fn get_by_right(&self, right_id: &str) -> SyncResult<Option<SyncRecord>> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM task_sync_map WHERE right_id = ?1"),
                params![right_id],
                RawRecord::from_row,
            )
            .optional()?;
        raw.map(RawRecord::into_record).transpose()
    }

    fn delete_by_left(&self, left_id: &str) -> SyncResult<()> {
        self.conn
            .lock()
            .execute("DELETE FROM task_sync_map WHERE left_id = ?1", params![left_id])?;
        Ok(())
    }

    fn delete_by_right(&self, right_id: &str) -> SyncResult<()> {
        self.conn
            .lock()
            .execute("DELETE FROM task_sync_map WHERE right_id = ?1", params![right_id])?;
        Ok(())
    }
}

impl ConflictStore for SqliteStore {
    fn clear(&self, scope: &ScopeId) -> SyncResult<()> {
        self.conn.lock().execute(
            "DELETE FROM task_conflicts WHERE left_list_id = ?1 AND right_project_id = ?2",
            params![scope.left_list_id, scope.right_project_id],
        )?;
        Ok(())
    }

    fn upsert(&self, record: &ConflictRecord) -> SyncResult<()> {
        insert_conflict(&self.conn.lock(), record)
    }

    fn replace_all(&self, scope: &ScopeId, records: &[ConflictRecord]) -> SyncResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM task_conflicts WHERE left_list_id = ?1 AND right_project_id = ?2",
            params![scope.left_list_id, scope.right_project_id],
        )?;
        for record in records {
            insert_conflict(&tx, record)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn list(&self, scope: Option<&ScopeId>) -> SyncResult<Vec<ConflictRecord>> {
        let conn = self.conn.lock();
        let raws = match scope {
            Some(scope) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {CONFLICT_COLUMNS} FROM task_conflicts \
                     WHERE left_list_id = ?1 AND right_project_id = ?2 ORDER BY left_id"
                ))?;
                let rows = stmt
                    .query_map(
                        params![scope.left_list_id, scope.right_project_id],
                        RawConflict::from_row,
                    )?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {CONFLICT_COLUMNS} FROM task_conflicts ORDER BY left_id"
                ))?;
                let rows = stmt
                    .query_map([], RawConflict::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        raws.into_iter().map(RawConflict::into_record).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::TaskPair;
    use tasksync_model::{CommonTask, Side};

    fn scope() -> ScopeId {
        ScopeId::new("inbox", "7")
    }

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn mapping_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.db");
        let record = SyncRecord::new("l1", "r1", scope())
            .with_watermarks(Some(at("2026-01-20T09:00:00.250Z")), None)
            .with_date_only(true, false)
            .with_provenance(Provenance::Inferred)
            .with_synced_at(at("2026-01-20T09:05:00Z"));

        {
            let store = SqliteStore::open(&path).unwrap();
            MappingStore::upsert(&store, &record).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let loaded = store.load(&scope()).unwrap();
        assert_eq!(loaded, vec![record.clone()]);
        assert_eq!(store.get_by_right("r1").unwrap(), Some(record));
        assert!(store.get_by_left("nope").unwrap().is_none());
    }

    #[test]
    fn upsert_evicts_rows_sharing_either_id() {
        let store = SqliteStore::open_in_memory().unwrap();
        MappingStore::upsert(&store, &SyncRecord::new("l1", "r1", scope())).unwrap();
        MappingStore::upsert(&store, &SyncRecord::new("l2", "r2", scope())).unwrap();
        MappingStore::upsert(&store, &SyncRecord::new("l1", "r2", scope())).unwrap();

        let all = store.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].left_id, "l1");
        assert_eq!(all[0].right_id, "r2");
    }

    #[test]
    fn delete_by_either_id() {
        let store = SqliteStore::open_in_memory().unwrap();
        MappingStore::upsert(&store, &SyncRecord::new("l1", "r1", scope())).unwrap();
        MappingStore::upsert(&store, &SyncRecord::new("l2", "r2", scope())).unwrap();
        store.delete_by_left("l1").unwrap();
        store.delete_by_right("r2").unwrap();
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn conflicts_replace_per_scope() {
        let store = SqliteStore::open_in_memory().unwrap();
        let pair = TaskPair::new(
            CommonTask::new(Side::Left, "l1", "inbox", "Buy milk"),
            CommonTask::new(Side::Right, "r1", "7", "Buy oat milk"),
        );
        let row = ConflictRecord::from_pair(&scope(), &pair, at("2026-01-20T09:00:00Z"));
        let other_scope = ScopeId::new("work", "8");
        let mut other = pair.clone();
        other.left.id = "l2".into();
        other.right.id = "r2".into();
        let other_row = ConflictRecord::from_pair(&other_scope, &other, at("2026-01-20T09:00:00Z"));

        store.replace_all(&scope(), &[row.clone()]).unwrap();
        ConflictStore::upsert(&store, &other_row).unwrap();
        assert_eq!(store.list(Some(&scope())).unwrap(), vec![row]);
        assert_eq!(store.list(None).unwrap().len(), 2);

        store.replace_all(&scope(), &[]).unwrap();
        assert!(store.list(Some(&scope())).unwrap().is_empty());
        assert_eq!(store.list(None).unwrap(), vec![other_row]);
    }

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();
        apply_migrations(&conn).unwrap();
        let version: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }
}
