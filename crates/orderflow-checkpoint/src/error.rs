//! Store errors.

use orderflow_core::EngineError;
use thiserror::Error;

/// Run store error types.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Run not found.
    #[error("Run not found: {0}")]
    NotFound(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Claim file could not be read or written.
    #[error("Claim error: {0}")]
    Claim(String),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => EngineError::NotFound(id),
            other => EngineError::EngineUnavailable(other.to_string()),
        }
    }
}
