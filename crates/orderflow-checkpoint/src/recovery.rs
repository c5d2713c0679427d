//! Recovery of runs left Running by a stopped or crashed worker.

use std::sync::Arc;

use chrono::Utc;
use orderflow_core::{RunStatus, WorkflowRun};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::store::RunStore;

/// A run a worker may pick up, with the step it resumes at.
#[derive(Debug, Clone)]
pub struct RecoveryCandidate {
    pub run: WorkflowRun,
    /// Index of the first step that has not Succeeded.
    pub resume_at: usize,
}

/// Finds runnable runs for a task queue.
pub struct RecoveryManager {
    store: Arc<dyn RunStore>,
}

impl RecoveryManager {
    pub fn new(store: Arc<dyn RunStore>) -> Self {
        Self { store }
    }

    /// Running runs on `task_queue` that are unclaimed or whose claim is stale,
    /// oldest first.
    pub async fn runnable(&self, task_queue: &str) -> Result<Vec<RecoveryCandidate>, StoreError> {
        let now = Utc::now();
        let mut candidates = Vec::new();

        for run in self.store.list().await? {
            if run.status != RunStatus::Running || run.task_queue != task_queue {
                continue;
            }
            if let Some(claim) = self.store.claim(&run.id).await? {
                if !claim.is_stale(now) {
                    debug!("Run '{}' is claimed by {}", run.id, claim.worker);
                    continue;
                }
            }

            let resume_at = run.completed_steps();
            if resume_at > 0 {
                info!(
                    "Run '{}' resumable at step {} ({} completed)",
                    run.id, resume_at, resume_at
                );
            }
            candidates.push(RecoveryCandidate { run, resume_at });
        }

        Ok(candidates)
    }
}
