//! Step-by-step execution of a run.

use async_trait::async_trait;
use orderflow_core::{
    ActivityRecord, ActivityStatus, AttemptObserver, EngineError, RunStatus, WorkflowRun,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::engine::WorkflowEngine;

/// Persists every attempt of one step and vetoes retries once the run is
/// no longer Running or the worker is shutting down.
struct StepObserver<'a> {
    engine: &'a WorkflowEngine,
    id: &'a str,
    run_id: Uuid,
    index: usize,
    shutdown: &'a CancellationToken,
}

impl<'a> StepObserver<'a> {
    async fn persist(&self, record: &ActivityRecord) {
        if let Err(e) = self
            .engine
            .persist_step(self.id, self.run_id, self.index, record)
            .await
        {
            warn!(workflow_id = %self.id, "Failed to persist step {}: {}", record.name, e);
        }
    }
}

#[async_trait]
impl<'a> AttemptObserver for StepObserver<'a> {
    async fn attempt_started(&self, record: &ActivityRecord) {
        self.persist(record).await;
    }

    async fn attempt_finished(&self, record: &ActivityRecord) {
        self.persist(record).await;
    }

    async fn should_continue(&self) -> bool {
        if self.shutdown.is_cancelled() {
            return false;
        }
        match self.engine.get(self.id).await {
            Ok(run) => run.run_id == self.run_id && run.status == RunStatus::Running,
            Err(e) => {
                warn!(workflow_id = %self.id, "Cannot read run state: {}", e);
                false
            }
        }
    }
}

/// Run the remaining steps of `id`, strictly in declaration order.
///
/// Stops between steps when the run leaves `Running` or `shutdown` fires.
/// Resumes at the first step that has not Succeeded. A step whose attempt
/// was in flight during a crash runs again under the same attempt number; a
/// step already recorded Failed closes the run without running again.
pub(crate) async fn drive(
    engine: &WorkflowEngine,
    id: &str,
    shutdown: &CancellationToken,
) -> Result<WorkflowRun, EngineError> {
    let initial = engine.get(id).await?;
    let run_id = initial.run_id;
    let definition = engine.definition(initial.workflow_type).clone();
    let resume_at = initial.completed_steps();
    if resume_at > 0 && !initial.status.is_terminal() {
        info!(
            workflow_id = %id,
            "Resuming {} at step {} of {}",
            initial.workflow_type,
            resume_at + 1,
            definition.steps.len()
        );
    }

    loop {
        let run = engine.get(id).await?;
        if run.run_id != run_id || run.status.is_terminal() {
            return Ok(run);
        }
        if shutdown.is_cancelled() {
            info!(workflow_id = %id, "Shutdown requested, leaving run for resume");
            return Ok(run);
        }

        let index = run.completed_steps();
        let Some(activity) = definition.steps.get(index) else {
            let run = engine
                .close_if_running(id, run_id, RunStatus::Completed, None)
                .await?;
            info!(workflow_id = %id, "{} finished: {}", run.workflow_type, run.status);
            return Ok(run);
        };

        let mut record = match run.steps.get(index) {
            Some(existing) if existing.name == *activity => existing.clone(),
            _ => ActivityRecord::new(activity.as_str()),
        };
        if record.status == ActivityStatus::Failed {
            let e = EngineError::ActivityFailed {
                activity: record.name.clone(),
                last_error_kind: record.last_error_kind.clone().unwrap_or_default(),
                attempts: record.attempt,
                message: record.last_error.clone().unwrap_or_default(),
            };
            error!(workflow_id = %id, "Workflow failed before restart: {}", e);
            return engine
                .close_if_running(id, run_id, RunStatus::Failed, Some(e.to_string()))
                .await;
        }

        let observer = StepObserver {
            engine,
            id,
            run_id,
            index,
            shutdown,
        };
        let result = engine
            .executor
            .execute(&mut record, &run.input, &definition.options, &observer)
            .await;

        match result {
            // The observer already saved it; saving again surfaces store errors.
            Ok(_) => engine.persist_step(id, run_id, index, &record).await?,
            Err(EngineError::Interrupted(reason)) => {
                info!(workflow_id = %id, "Step {} interrupted: {}", activity, reason);
                return engine.get(id).await;
            }
            Err(e @ EngineError::ActivityFailed { .. }) => {
                error!(workflow_id = %id, "Workflow failed: {}", e);
                return engine
                    .close_if_running(id, run_id, RunStatus::Failed, Some(e.to_string()))
                    .await;
            }
            Err(e) => return Err(e),
        }
    }
}
