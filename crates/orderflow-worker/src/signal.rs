//! OS signal handling for worker processes.

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::WorkerError;

/// Cancels a token on SIGINT or SIGTERM (Ctrl+C elsewhere).
#[derive(Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token cancelled once a shutdown signal arrives.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Request shutdown without an OS signal.
    pub fn request_shutdown(&self) {
        self.token.cancel();
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Set up OS signal handlers (Unix only).
    #[cfg(unix)]
    pub fn install(&self) -> Result<(), WorkerError> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm =
            signal(SignalKind::terminate()).map_err(|e| WorkerError::SignalSetup(e.to_string()))?;
        let mut sigint =
            signal(SignalKind::interrupt()).map_err(|e| WorkerError::SignalSetup(e.to_string()))?;

        let handler = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM"),
                _ = sigint.recv() => info!("Received SIGINT"),
            }
            handler.request_shutdown();
        });

        info!("OS signal handlers installed (SIGTERM, SIGINT)");
        Ok(())
    }

    /// Set up OS signal handlers (non-Unix fallback).
    #[cfg(not(unix))]
    pub fn install(&self) -> Result<(), WorkerError> {
        let handler = self.clone();

        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received Ctrl+C");
                handler.request_shutdown();
            }
        });

        info!("OS signal handlers installed (Ctrl+C only)");
        Ok(())
    }
}
