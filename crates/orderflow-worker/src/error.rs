//! Worker errors.

use orderflow_checkpoint::StoreError;
use orderflow_core::EngineError;
use thiserror::Error;

/// Worker error types.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// No workflow is routed to this task queue.
    #[error("No workflow is registered on task queue '{0}'")]
    UnknownTaskQueue(String),

    /// Engine error.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// OS signal handlers could not be installed.
    #[error("Signal setup failed: {0}")]
    SignalSetup(String),
}
