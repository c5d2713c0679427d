//! `worker` subcommand.

use std::sync::Arc;

use tracing::info;

use orderflow_config::Config;
use orderflow_worker::{ShutdownSignal, WorkerOptions, WorkerPool};

use crate::server::build_engine;

/// Serve one task queue until SIGINT/SIGTERM, then wait for in-flight runs.
pub(crate) async fn run_worker(
    config: Config,
    task_queue: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = build_engine(&config).await?;
    let options = WorkerOptions::from_config(&config, task_queue);
    let pool = Arc::new(WorkerPool::new(engine, options)?);

    let signal = ShutdownSignal::new();
    signal.install()?;

    info!(
        "{} worker listening on task queue {} (press Ctrl+C to stop)",
        pool.label(),
        pool.options().task_queue
    );
    pool.run_loop(signal.token()).await?;
    Ok(())
}
