//! # TaskSync Engine
//!
//! Reconciliation and apply engine for two-way task sync.
//!
//! This crate provides:
//! - Three-way reconciliation of two task snapshots against stored mappings
//! - Mapping and conflict stores (in-memory and SQLite)
//! - Conflict policies and the machine-readable conflict report
//! - Plan execution with bounded retry and incremental mapping persistence
//! - Secret redaction for errors, logs and reports
//! - The sync state machine (idle → fetching → planning → applying → synced)
//!
//! ## Architecture
//!
//! Each run handles one scope (a left list paired with a right project) at
//! a time:
//! 1. Fetch both sides
//! 2. Reconcile against the scope's mappings into a [`SyncPlan`]
//! 3. Resolve conflicts by policy, refusing the apply if any remain
//! 4. Apply creates, updates and deletes, persisting mappings as it goes
//!
//! ## Key Invariants
//!
//! - A task id appears in at most one mapping per side
//! - Reconciliation is pure and deterministic for a given input
//! - Unresolved conflicts block every write of their scope unless allowed
//! - Creates are never retried
//! - Watermarks only advance for pairs that were in sync or written

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod conflict;
mod error;
mod executor;
mod mapping;
mod plan;
mod reconcile;
mod redact;
mod report;
mod retry;
mod sqlite;
mod state;
mod store;

pub use config::{ApplyOptions, RetryConfig, SyncConfig};
pub use conflict::{
    resolve_conflicts, ConflictKey, ConflictPolicy, ConflictRecord, ConflictStore,
    MemoryConflictStore, Resolution, ResolvedConflicts,
};
pub use error::{SyncError, SyncResult};
pub use executor::{ApplyOutcome, SyncExecutor};
pub use mapping::{MappingStore, MemoryMappingStore, ScopeId, SyncRecord};
pub use plan::{DeleteCandidate, PlanSummary, SyncPlan, TaskPair};
pub use reconcile::{
    apply_date_only_flags, direct_direction, reconcile, watermark_direction, Direction, Reconciler,
};
pub use redact::Redactor;
pub use report::{ConflictReport, ConflictReportEntry, ScopeLabels};
pub use retry::{Idempotency, Retrier};
pub use sqlite::SqliteStore;
pub use state::{PlannedScope, ScopeRunResult, SyncEngine, SyncRunResult, SyncState, SyncStats};
pub use store::{FailureKind, MemoryTaskStore, StoreOp, TaskStore, WriteReceipt};
