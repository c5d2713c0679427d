//! Workflow engine.
//!
//! Owns every [`WorkflowRun`] through the run store. Start, terminate and
//! step persistence are read-modify-write cycles guarded by a per-id async
//! mutex; running steps across processes is guarded by store claims.

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use orderflow_checkpoint::RunStore;
use orderflow_config::Config;
use orderflow_core::{
    ActivityExecutor, ActivityRecord, ActivityRegistry, EngineError, RunStatus, WorkflowRun,
    WorkflowRunSummary, WorkflowType,
};
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::activities::{ActivityGroup, register_builtin_activities};
use crate::definition::{WorkflowCatalog, WorkflowDefinition};

/// Poll interval of [`WorkflowEngine::wait_for_completion`].
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Optional filters for [`WorkflowEngine::list`].
#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    pub workflow_type: Option<WorkflowType>,
    pub status: Option<RunStatus>,
}

impl RunFilter {
    fn matches(&self, run: &WorkflowRun) -> bool {
        self.workflow_type.is_none_or(|t| t == run.workflow_type)
            && self.status.is_none_or(|s| s == run.status)
    }
}

/// Held per-id lock. The map entry is dropped with the last holder.
pub(crate) struct RunLock<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RunLock<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold their own clone, so a count of 1 is the map's alone.
        self.locks
            .remove_if(&self.id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// The workflow engine.
pub struct WorkflowEngine {
    pub(crate) store: Arc<dyn RunStore>,
    pub(crate) executor: ActivityExecutor,
    pub(crate) catalog: WorkflowCatalog,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn RunStore>,
        registry: Arc<ActivityRegistry>,
        catalog: WorkflowCatalog,
    ) -> Self {
        Self {
            store,
            executor: ActivityExecutor::new(registry),
            catalog,
            locks: DashMap::new(),
        }
    }

    /// Build an engine with the built-in activities and the configured workflows.
    pub fn from_config(config: &Config, store: Arc<dyn RunStore>) -> Result<Self, EngineError> {
        let registry = Arc::new(ActivityRegistry::new());
        register_builtin_activities(
            &registry,
            Duration::from_millis(config.activities.simulated_delay_ms),
        )?;
        info!(
            "Registered activities: {}",
            registry.list_names().join(", ")
        );
        Ok(Self::new(store, registry, WorkflowCatalog::from_config(config)))
    }

    pub fn catalog(&self) -> &WorkflowCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &Arc<ActivityRegistry> {
        self.executor.registry()
    }

    /// Registered activity groups: built-in groups in declaration order,
    /// then any others by name.
    pub fn activity_groups(&self) -> Vec<String> {
        let registered = self.registry().list_groups();
        let mut groups: Vec<String> = ActivityGroup::ALL
            .iter()
            .map(|g| g.name().to_string())
            .filter(|name| registered.contains(name))
            .collect();
        for name in registered {
            if !groups.contains(&name) {
                groups.push(name);
            }
        }
        groups
    }

    /// Where runs are persisted.
    pub fn store_location(&self) -> String {
        self.store.location()
    }

    pub fn store(&self) -> &Arc<dyn RunStore> {
        &self.store
    }

    pub fn definition(&self, workflow_type: WorkflowType) -> &WorkflowDefinition {
        self.catalog.get(workflow_type)
    }

    /// Serialize read-modify-write cycles on the run stored under `id`.
    pub(crate) async fn lock_run(&self, id: &str) -> RunLock<'_> {
        let lock = self.locks.entry(id.to_string()).or_default().clone();
        RunLock {
            locks: &self.locks,
            id: id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Start a new run. A terminal previous run with the same id is archived.
    pub async fn start(
        &self,
        id: &str,
        workflow_type: WorkflowType,
        input: Value,
    ) -> Result<WorkflowRun, EngineError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(EngineError::InvalidArgument(
                "workflow id must not be empty".to_string(),
            ));
        }

        let _guard = self.lock_run(id).await;

        if let Some(previous) = self.store.get(id).await? {
            if !previous.status.is_terminal() {
                return Err(EngineError::DuplicateRunId(id.to_string()));
            }
            self.store.archive(&previous).await?;
            debug!(
                "Archived previous run {} of '{}' ({})",
                previous.run_id, id, previous.status
            );
        }

        let definition = self.definition(workflow_type);
        let run = WorkflowRun::new(id, workflow_type, definition.task_queue.clone(), input);
        self.store.save(&run).await?;

        info!(
            workflow_id = %run.id,
            run_id = %run.run_id,
            "Started {} on task queue {}",
            workflow_type,
            run.task_queue
        );
        Ok(run)
    }

    pub async fn get(&self, id: &str) -> Result<WorkflowRun, EngineError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    /// Previous executions of an id, oldest first.
    pub async fn history(&self, id: &str) -> Result<Vec<WorkflowRun>, EngineError> {
        Ok(self.store.archived(id).await?)
    }

    /// Mark a Running run Terminated.
    ///
    /// An attempt already in flight is allowed to finish and its record is
    /// kept; no later step or retry starts.
    pub async fn terminate(
        &self,
        id: &str,
        reason: Option<&str>,
    ) -> Result<WorkflowRun, EngineError> {
        let _guard = self.lock_run(id).await;

        let mut run = self.get(id).await?;
        if run.status.is_terminal() {
            return Err(EngineError::InvalidState {
                id: id.to_string(),
                status: run.status,
            });
        }

        let reason = reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or("Terminated by operator");
        run.close(RunStatus::Terminated, Some(reason.to_string()));
        self.store.save(&run).await?;

        warn!(workflow_id = %id, "Workflow terminated: {}", reason);
        Ok(run)
    }

    /// Summaries of current runs, oldest first.
    pub async fn list(&self, filter: &RunFilter) -> Result<Vec<WorkflowRunSummary>, EngineError> {
        let mut runs: Vec<_> = self
            .store
            .list()
            .await?
            .iter()
            .filter(|r| filter.matches(r))
            .map(WorkflowRun::summary)
            .collect();
        runs.sort_by_key(|r| r.start_time);
        Ok(runs)
    }

    /// Execute the remaining steps of a run.
    ///
    /// Returns the latest snapshot. A snapshot still `Running` means the
    /// drive stopped for `shutdown` and can be resumed later.
    pub async fn drive(
        &self,
        id: &str,
        shutdown: &CancellationToken,
    ) -> Result<WorkflowRun, EngineError> {
        crate::driver::drive(self, id, shutdown).await
    }

    /// Wait until a run reaches a terminal status.
    pub async fn wait_for_completion(
        &self,
        id: &str,
        timeout: Duration,
    ) -> Result<WorkflowRun, EngineError> {
        tokio::time::timeout(timeout, self.poll_until_terminal(id))
            .await
            .map_err(|_| {
                EngineError::Timeout(format!("run '{}' still running after {:?}", id, timeout))
            })?
    }

    async fn poll_until_terminal(&self, id: &str) -> Result<WorkflowRun, EngineError> {
        loop {
            let run = self.get(id).await?;
            if run.status.is_terminal() {
                return Ok(run);
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    /// Store the record of step `index`, provided the run is still the same
    /// execution. The record is kept even when the run was terminated meanwhile.
    pub(crate) async fn persist_step(
        &self,
        id: &str,
        run_id: Uuid,
        index: usize,
        record: &ActivityRecord,
    ) -> Result<(), EngineError> {
        let _guard = self.lock_run(id).await;

        let mut run = self.get(id).await?;
        if run.run_id != run_id {
            debug!("Run '{}' was replaced, dropping step update", id);
            return Ok(());
        }
        run.put_step(index, record.clone());
        self.store.save(&run).await?;
        Ok(())
    }

    /// Close a run that is still Running. Returns the stored snapshot either way.
    pub(crate) async fn close_if_running(
        &self,
        id: &str,
        run_id: Uuid,
        status: RunStatus,
        error: Option<String>,
    ) -> Result<WorkflowRun, EngineError> {
        let _guard = self.lock_run(id).await;

        let mut run = self.get(id).await?;
        if run.run_id != run_id || run.status.is_terminal() {
            return Ok(run);
        }
        run.close(status, error);
        self.store.save(&run).await?;
        Ok(run)
    }
}
