//! Sync engine state machine.

use crate::config::SyncConfig;
use crate::conflict::{resolve_conflicts, ConflictStore, ResolvedConflicts};
use crate::error::{SyncError, SyncResult};
use crate::executor::{ApplyOutcome, SyncExecutor};
use crate::mapping::{MappingStore, ScopeId};
use crate::plan::{PlanSummary, SyncPlan};
use crate::reconcile::Reconciler;
use crate::redact::Redactor;
use crate::report::ConflictReport;
use crate::retry::{Idempotency, Retrier};
use crate::store::TaskStore;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Engine is idle, not syncing.
    Idle,
    /// Engine is reading both sides.
    Fetching,
    /// Engine is reconciling.
    Planning,
    /// Engine is writing the plan.
    Applying,
    /// Engine has completed a run.
    Synced,
    /// Engine encountered an error.
    Error,
}

impl SyncState {
    /// Returns true if the engine is in an active sync state.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SyncState::Fetching | SyncState::Planning | SyncState::Applying
        )
    }

    /// Returns true if the engine can start a new run.
    pub fn can_start_sync(&self) -> bool {
        matches!(self, SyncState::Idle | SyncState::Synced | SyncState::Error)
    }
}

/// Statistics about sync runs.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Scopes planned and applied without error.
    pub scopes_synced: u64,
    /// Tasks created on either side.
    pub tasks_created: u64,
    /// Tasks updated on either side.
    pub tasks_updated: u64,
    /// Tasks deleted on either side.
    pub tasks_deleted: u64,
    /// Conflicts detected, resolved or not.
    pub conflicts_encountered: u64,
    /// Retried store calls.
    pub retries: u64,
    /// Last successful scope sync.
    pub last_sync_time: Option<DateTime<Utc>>,
    /// Last error message, redacted.
    pub last_error: Option<String>,
}

/// A planned scope, ready to apply.
#[derive(Debug, Clone)]
pub struct PlannedScope {
    /// The scope.
    pub scope: ScopeId,
    /// Reconciliation output.
    pub plan: SyncPlan,
    /// The plan's conflicts sorted by policy.
    pub resolved: ResolvedConflicts,
}

/// Result of one scope.
#[derive(Debug, Clone)]
pub struct ScopeRunResult {
    /// The scope.
    pub scope: ScopeId,
    /// Plan counts.
    pub summary: PlanSummary,
    /// The plan and its resolved conflicts.
    pub planned: PlannedScope,
    /// What the apply did. `None` on a dry run.
    pub outcome: Option<ApplyOutcome>,
}

/// Result of a run over all configured scopes.
#[derive(Debug, Clone)]
pub struct SyncRunResult {
    /// Per-scope results, in configuration order.
    pub scopes: Vec<ScopeRunResult>,
    /// Unresolved conflicts of all scopes.
    pub report: ConflictReport,
    /// Whether every scope completed.
    pub success: bool,
    /// Duration of the run.
    pub duration: Duration,
}

/// The sync engine drives fetch, plan and apply for each scope.
pub struct SyncEngine<L, R, M, C>
where
    L: TaskStore,
    R: TaskStore,
    M: MappingStore,
    C: ConflictStore,
{
    config: SyncConfig,
    left: Arc<L>,
    right: Arc<R>,
    reconciler: Reconciler<M, C>,
    executor: SyncExecutor<L, R, M>,
    retrier: Arc<Retrier>,
    redactor: Redactor,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
}

impl<L, R, M, C> SyncEngine<L, R, M, C>
where
    L: TaskStore,
    R: TaskStore,
    M: MappingStore,
    C: ConflictStore,
{
    /// Creates a new sync engine.
    pub fn new(config: SyncConfig, left: Arc<L>, right: Arc<R>, mappings: Arc<M>, conflicts: Arc<C>) -> Self {
        let retrier = Arc::new(Retrier::new(config.retry.clone()));
        let redactor = Redactor::new(config.secrets.iter().cloned());
        let executor = SyncExecutor::new(
            Arc::clone(&left),
            Arc::clone(&right),
            Arc::clone(&mappings),
            Arc::clone(&retrier),
        )
        .with_redactor(redactor.clone());
        Self {
            reconciler: Reconciler::new(mappings, conflicts),
            config,
            left,
            right,
            executor,
            retrier,
            redactor,
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        let mut stats = self.stats.read().clone();
        stats.retries = self.retrier.retries();
        stats
    }

    /// Gets the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Sets the state.
    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    fn ensure_can_start(&self) -> SyncResult<()> {
        let state = self.state();
        if state.can_start_sync() {
            Ok(())
        } else {
            Err(SyncError::InvalidStateTransition {
                from: format!("{state:?}"),
                to: "sync".into(),
            })
        }
    }

    /// Fetches both sides of `scope` and reconciles them.
    ///
    /// Rebuilds the scope's conflict rows as a side effect. Writes nothing
    /// to either task store.
    pub fn plan_scope(&self, scope: &ScopeId) -> SyncResult<PlannedScope> {
        self.ensure_can_start()?;
        let result = self.plan_scope_inner(scope);
        match &result {
            Ok(_) => self.set_state(SyncState::Idle),
            Err(e) => self.handle_error(e),
        }
        result
    }

    fn plan_scope_inner(&self, scope: &ScopeId) -> SyncResult<PlannedScope> {
        self.set_state(SyncState::Fetching);
        let left = self
            .retrier
            .run("fetch left", Idempotency::Idempotent, || self.left.fetch(scope))?;
        let right = self
            .retrier
            .run("fetch right", Idempotency::Idempotent, || self.right.fetch(scope))?;

        self.set_state(SyncState::Planning);
        let plan = self.reconciler.plan(scope, &left, &right)?;
        let apply = &self.config.apply;
        let resolved = resolve_conflicts(&plan.conflicts, apply);
        if !plan.conflicts.is_empty() {
            info!(
                scope = %scope,
                resolved = resolved.resolved_count(),
                unresolved = resolved.unresolved.len(),
                policy = %apply.policy,
                "conflicts detected"
            );
        }
        self.stats.write().conflicts_encountered += plan.conflicts.len() as u64;

        Ok(PlannedScope {
            scope: scope.clone(),
            plan,
            resolved,
        })
    }

    /// Applies a planned scope.
    ///
    /// Fails with [`SyncError::ConflictsPresent`] before any write if
    /// conflicts are unresolved and the options do not allow them.
    pub fn apply_scope(&self, planned: &PlannedScope) -> SyncResult<ApplyOutcome> {
        self.ensure_can_start()?;
        self.set_state(SyncState::Applying);
        let result = self.executor.apply(
            &planned.scope,
            &planned.plan,
            &planned.resolved,
            &self.config.apply,
        );
        match &result {
            Ok(outcome) => {
                self.set_state(SyncState::Synced);
                let mut stats = self.stats.write();
                stats.scopes_synced += 1;
                stats.tasks_created += (outcome.created_left + outcome.created_right) as u64;
                stats.tasks_updated += (outcome.updated_left + outcome.updated_right) as u64;
                stats.tasks_deleted += (outcome.deleted_left + outcome.deleted_right) as u64;
                stats.last_sync_time = Some(Utc::now());
                stats.last_error = None;
            }
            Err(e) => self.handle_error(e),
        }
        result
    }

    /// Plans `scope` and, unless this is a dry run, applies it.
    pub fn run_scope(&self, scope: &ScopeId) -> SyncResult<ScopeRunResult> {
        let planned = self.plan_scope(scope)?;
        let outcome = if self.config.dry_run {
            None
        } else {
            Some(self.apply_scope(&planned)?)
        };
        Ok(ScopeRunResult {
            scope: scope.clone(),
            summary: planned.plan.summary(),
            planned,
            outcome,
        })
    }

    /// Runs every configured scope in order.
    ///
    /// Stops at the first failing scope. The conflict report, if
    /// configured, is written either way and covers every scope planned
    /// so far.
    pub fn run(&self) -> SyncResult<SyncRunResult> {
        let start = Instant::now();
        let mut report = ConflictReport::new(Utc::now());
        let mut scopes = Vec::with_capacity(self.config.scopes.len());
        let mut failure = None;

        for scope in &self.config.scopes {
            let planned = match self.plan_scope(scope) {
                Ok(planned) => planned,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            };
            report.extend(scope, &planned.resolved.unresolved);

            let outcome = if self.config.dry_run {
                None
            } else {
                match self.apply_scope(&planned) {
                    Ok(outcome) => Some(outcome),
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            };
            scopes.push(ScopeRunResult {
                scope: scope.clone(),
                summary: planned.plan.summary(),
                planned,
                outcome,
            });
        }

        if let Some(path) = &self.config.conflict_report_path {
            report.write_to(path, &self.redactor)?;
            info!(path = %path.display(), conflicts = report.conflict_count, "wrote conflict report");
        }

        if let Some(e) = failure {
            return Err(e);
        }
        Ok(SyncRunResult {
            scopes,
            report,
            success: true,
            duration: start.elapsed(),
        })
    }

    /// Handles an error by updating state and stats.
    fn handle_error(&self, error: &SyncError) {
        self.set_state(SyncState::Error);
        let message = self.redactor.redact(&error.to_string());
        warn!(error = %message, "sync failed");
        self.stats.write().last_error = Some(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::conflict::MemoryConflictStore;
    use crate::mapping::MemoryMappingStore;
    use crate::store::{FailureKind, MemoryTaskStore, StoreOp};
    use tasksync_model::{CommonTask, Side};

    type MemEngine = SyncEngine<MemoryTaskStore, MemoryTaskStore, MemoryMappingStore, MemoryConflictStore>;

    fn scope() -> ScopeId {
        ScopeId::new("inbox", "7")
    }

    fn engine(config: SyncConfig) -> (MemEngine, Arc<MemoryTaskStore>, Arc<MemoryTaskStore>) {
        let left = Arc::new(MemoryTaskStore::new(Side::Left));
        let right = Arc::new(MemoryTaskStore::new(Side::Right));
        let engine = SyncEngine::new(
            config.with_retry(RetryConfig::no_retry()),
            Arc::clone(&left),
            Arc::clone(&right),
            Arc::new(MemoryMappingStore::new()),
            Arc::new(MemoryConflictStore::new()),
        );
        (engine, left, right)
    }

    #[test]
    fn sync_state_checks() {
        assert!(!SyncState::Idle.is_active());
        assert!(SyncState::Fetching.is_active());
        assert!(SyncState::Applying.is_active());
        assert!(SyncState::Idle.can_start_sync());
        assert!(SyncState::Error.can_start_sync());
        assert!(!SyncState::Planning.can_start_sync());
    }

    #[test]
    fn engine_initial_state() {
        let (engine, _, _) = engine(SyncConfig::new(scope()));
        assert_eq!(engine.state(), SyncState::Idle);
        assert_eq!(engine.stats().scopes_synced, 0);
    }

    #[test]
    fn run_creates_missing_tasks() {
        let (engine, left, right) = engine(SyncConfig::new(scope()));
        left.insert(CommonTask::new(Side::Left, "l1", "inbox", "Buy milk"));

        let result = engine.run().unwrap();
        assert!(result.success);
        assert_eq!(result.scopes[0].outcome.unwrap().created_right, 1);
        assert_eq!(right.len(), 1);
        assert_eq!(engine.state(), SyncState::Synced);
        assert_eq!(engine.stats().tasks_created, 1);
    }

    #[test]
    fn dry_run_writes_nothing() {
        let (engine, left, right) = engine(SyncConfig::new(scope()).with_dry_run(true));
        left.insert(CommonTask::new(Side::Left, "l1", "inbox", "Buy milk"));

        let result = engine.run().unwrap();
        assert_eq!(result.scopes[0].summary.create_right, 1);
        assert!(result.scopes[0].outcome.is_none());
        assert!(right.is_empty());
        assert_eq!(right.calls(StoreOp::Create), 0);
    }

    #[test]
    fn fetch_failure_sets_error_state() {
        let (engine, left, _) = engine(SyncConfig::new(scope()).with_secret("hunter2"));
        left.fail_next(StoreOp::Fetch, FailureKind::NotAuthorized);

        let err = engine.run().unwrap_err();
        assert!(matches!(err, SyncError::NotAuthorized { .. }));
        assert_eq!(engine.state(), SyncState::Error);
        assert!(engine.stats().last_error.is_some());

        // Recovers on the next run.
        assert!(engine.run().is_ok());
        assert_eq!(engine.state(), SyncState::Synced);
    }
}
