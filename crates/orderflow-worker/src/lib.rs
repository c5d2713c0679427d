//! # Orderflow Worker
//!
//! Serves one task queue: polls the run store for runnable runs, claims
//! them and drives each on its own task until shutdown.

pub mod config;
pub mod error;
pub mod pool;
pub mod signal;

pub use config::WorkerOptions;
pub use error::WorkerError;
pub use pool::WorkerPool;
pub use signal::ShutdownSignal;
