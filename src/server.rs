//! Process setup shared by every subcommand, and the `serve` command.

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use orderflow_api::{ApiConfig, ApiServer};
use orderflow_checkpoint::open_store;
use orderflow_config::{Config, ConfigLoader, ConfigValidator, StoreBackend, orderflow_dir};
use orderflow_engine::WorkflowEngine;
use orderflow_worker::{ShutdownSignal, WorkerOptions, WorkerPool};

/// Initialize tracing with console and file output.
///
/// Log files are written to ~/.orderflow/logs/ with daily rotation.
pub(crate) fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = orderflow_dir().join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("orderflow")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Flushes the file writer on exit; must outlive the subscriber.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

/// Load and validate the configuration. A missing file yields the defaults.
pub(crate) fn load_config(path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_or_default(path)?;
    if !path.exists() {
        info!("No config at {}, using defaults", path.display());
    }
    for warning in ConfigValidator::validate(&config)?.into_result()? {
        warn!("Config {}: {}", warning.path, warning.message);
    }
    Ok(config)
}

/// Open the configured run store and build the engine on top of it.
pub(crate) async fn build_engine(
    config: &Config,
) -> Result<Arc<WorkflowEngine>, Box<dyn std::error::Error>> {
    let store = open_store(config).await?;
    info!("Run store: {}", store.location());
    Ok(Arc::new(WorkflowEngine::from_config(config, store)?))
}

/// Run the HTTP API in the foreground, optionally with embedded workers.
pub(crate) async fn run_server(
    config: Config,
    host: String,
    port: u16,
    with_workers: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting orderflow v{}", env!("CARGO_PKG_VERSION"));

    if config.store.backend == StoreBackend::Memory && !with_workers {
        warn!("Memory store without embedded workers: started runs will never execute");
    }

    let engine = build_engine(&config).await?;
    let signal = ShutdownSignal::new();
    signal.install()?;

    let mut workers = Vec::new();
    if with_workers {
        for queue in engine.catalog().task_queues() {
            let pool = Arc::new(WorkerPool::new(
                engine.clone(),
                WorkerOptions::from_config(&config, &queue),
            )?);
            workers.push(tokio::spawn(pool.run_loop(signal.token())));
        }
    }

    let token = signal.token();
    let server = ApiServer::new(ApiConfig::new(host, port), engine);
    let served = server.run(async move { token.cancelled().await }).await;

    // Stop embedded workers even when the server exited on its own.
    signal.request_shutdown();
    for result in futures::future::join_all(workers).await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Worker failed: {}", e),
            Err(e) => error!("Worker task panicked: {}", e),
        }
    }

    served?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_shipped_config_matches_defaults() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/default.toml");
        let config = load_config(&path).unwrap();
        let defaults = Config::default();

        assert_eq!(config.server.port, defaults.server.port);
        assert_eq!(config.store.backend, StoreBackend::File);
        assert_eq!(config.retry.maximum_attempts, defaults.retry.maximum_attempts);
        assert_eq!(config.queues.order, "my-task-queue");
        assert_eq!(config.queues.invoice, "invoice-task-queue");
        assert_eq!(
            config.activities.simulated_delay_ms,
            defaults.activities.simulated_delay_ms
        );
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let config = load_config(Path::new("does/not/exist.toml")).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.worker.max_concurrent_runs, 4);
    }

    #[tokio::test]
    async fn test_build_engine_with_memory_store() {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Memory;
        let engine = build_engine(&config).await.unwrap();
        assert_eq!(engine.store_location(), "memory");
        assert_eq!(engine.registry().len(), 5);
    }
}
