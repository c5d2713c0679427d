//! Worker options.

use std::time::Duration;

use orderflow_config::Config;

/// Settings of one worker pool.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub task_queue: String,
    /// Name written into claims.
    pub identity: String,
    pub max_concurrent_runs: usize,
    pub poll_interval: Duration,
    pub claim_lease: Duration,
}

impl WorkerOptions {
    /// Options for `task_queue` from the `[worker]` and `[store]` sections.
    pub fn from_config(config: &Config, task_queue: impl Into<String>) -> Self {
        let task_queue = task_queue.into();
        let identity = config
            .worker
            .identity
            .clone()
            .unwrap_or_else(|| default_identity(&task_queue));
        Self {
            task_queue,
            identity,
            max_concurrent_runs: config.worker.max_concurrent_runs.max(1) as usize,
            poll_interval: Duration::from_millis(config.worker.poll_interval_ms.max(1)),
            claim_lease: Duration::from_secs(config.store.claim_lease_secs.max(1)),
        }
    }

    /// How often a held claim is refreshed.
    pub fn heartbeat_interval(&self) -> Duration {
        (self.claim_lease / 3).max(Duration::from_millis(100))
    }
}

fn default_identity(task_queue: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", task_queue, std::process::id(), &suffix[..8])
}
