//! Worker pool for one task queue.

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use orderflow_checkpoint::RecoveryManager;
use orderflow_core::RunStatus;
use orderflow_engine::WorkflowEngine;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::WorkerOptions;
use crate::error::WorkerError;

/// Polls the run store and drives runs of one task queue concurrently.
pub struct WorkerPool {
    engine: Arc<WorkflowEngine>,
    recovery: RecoveryManager,
    options: WorkerOptions,
    label: String,
    semaphore: Arc<Semaphore>,
    running: AtomicBool,
    /// Ids currently driven by this pool.
    in_flight: Arc<Mutex<HashSet<String>>>,
    total_driven: Arc<AtomicU64>,
}

impl WorkerPool {
    /// Create a pool. Fails when no workflow is routed to the task queue.
    pub fn new(engine: Arc<WorkflowEngine>, options: WorkerOptions) -> Result<Self, WorkerError> {
        let definitions = engine.catalog().for_queue(&options.task_queue);
        if definitions.is_empty() {
            return Err(WorkerError::UnknownTaskQueue(options.task_queue));
        }
        let label = definitions
            .iter()
            .map(|d| match d.workflow_type.type_name().strip_suffix("Workflow") {
                Some(short) => short.to_string(),
                None => d.workflow_type.type_name().to_string(),
            })
            .collect::<Vec<_>>()
            .join("/");

        Ok(Self {
            recovery: RecoveryManager::new(engine.store().clone()),
            engine,
            label,
            semaphore: Arc::new(Semaphore::new(options.max_concurrent_runs)),
            options,
            running: AtomicBool::new(false),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            total_driven: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Workflow kinds served, e.g. `Order`.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn options(&self) -> &WorkerOptions {
        &self.options
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Runs driven to a stop (terminal or parked) since start.
    pub fn total_driven(&self) -> u64 {
        self.total_driven.load(Ordering::SeqCst)
    }

    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Poll until `shutdown` fires, then wait for every driven run to park.
    pub async fn run_loop(self: Arc<Self>, shutdown: CancellationToken) -> Result<(), WorkerError> {
        self.running.store(true, Ordering::SeqCst);
        info!(
            task_queue = %self.options.task_queue,
            identity = %self.options.identity,
            "{} worker started (max {} concurrent runs)",
            self.label,
            self.options.max_concurrent_runs
        );

        let mut tasks = JoinSet::new();
        while !shutdown.is_cancelled() {
            if let Err(e) = self.poll_once(&shutdown, &mut tasks).await {
                error!(task_queue = %self.options.task_queue, "Poll failed: {}", e);
            }
            // Reap finished drives so the set does not grow.
            while tasks.try_join_next().is_some() {}

            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(self.options.poll_interval) => {}
            }
        }

        info!(
            task_queue = %self.options.task_queue,
            "{} worker shutting down, waiting for {} run(s)",
            self.label,
            tasks.len()
        );
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("Run task panicked: {}", e);
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("{} worker stopped gracefully", self.label);
        Ok(())
    }

    /// Claim and spawn every runnable run there is a free slot for.
    async fn poll_once(
        &self,
        shutdown: &CancellationToken,
        tasks: &mut JoinSet<()>,
    ) -> Result<(), WorkerError> {
        for candidate in self.recovery.runnable(&self.options.task_queue).await? {
            if shutdown.is_cancelled() {
                break;
            }
            let id = candidate.run.id;
            if self.is_in_flight(&id) {
                continue;
            }
            let Ok(permit) = self.semaphore.clone().try_acquire_owned() else {
                debug!("All {} slots busy", self.options.max_concurrent_runs);
                break;
            };

            let claimed = self
                .engine
                .store()
                .try_claim(&id, &self.options.identity, self.options.claim_lease)
                .await?;
            if !claimed {
                debug!("Run '{}' was claimed by another worker", id);
                continue;
            }

            if candidate.resume_at > 0 {
                info!(workflow_id = %id, "Picked up run at step {}", candidate.resume_at + 1);
            } else {
                info!(workflow_id = %id, "Picked up run");
            }
            self.mark_in_flight(&id);
            tasks.spawn(self.drive_task(id, permit, shutdown.clone()));
        }
        Ok(())
    }

    /// Drive one run while keeping its claim fresh, then release it.
    fn drive_task(
        &self,
        id: String,
        permit: OwnedSemaphorePermit,
        shutdown: CancellationToken,
    ) -> impl Future<Output = ()> + Send + 'static {
        let engine = self.engine.clone();
        let identity = self.options.identity.clone();
        let heartbeat = self.options.heartbeat_interval();
        let in_flight = self.in_flight.clone();
        let total_driven = self.total_driven.clone();

        async move {
            let drive = engine.drive(&id, &shutdown);
            tokio::pin!(drive);
            let mut ticker = tokio::time::interval(heartbeat);
            ticker.tick().await;

            let result = loop {
                tokio::select! {
                    result = &mut drive => break result,
                    _ = ticker.tick() => {
                        match engine.store().refresh_claim(&id, &identity).await {
                            Ok(true) => {}
                            Ok(false) => warn!(workflow_id = %id, "Claim lost to another worker"),
                            Err(e) => warn!(workflow_id = %id, "Claim refresh failed: {}", e),
                        }
                    }
                }
            };

            match result {
                Ok(run) if run.status == RunStatus::Running => {
                    info!(workflow_id = %id, "Run parked at step {}", run.completed_steps() + 1)
                }
                Ok(run) => info!(workflow_id = %id, "Run finished: {}", run.status),
                Err(e) => error!(workflow_id = %id, "Drive failed: {}", e),
            }

            if let Err(e) = engine.store().release(&id, &identity).await {
                warn!(workflow_id = %id, "Failed to release claim: {}", e);
            }
            if let Ok(mut set) = in_flight.lock() {
                set.remove(&id);
            }
            total_driven.fetch_add(1, Ordering::SeqCst);
            drop(permit);
        }
    }

    fn is_in_flight(&self, id: &str) -> bool {
        self.in_flight.lock().map(|s| s.contains(id)).unwrap_or(false)
    }

    fn mark_in_flight(&self, id: &str) {
        if let Ok(mut set) = self.in_flight.lock() {
            set.insert(id.to_string());
        }
    }
}
