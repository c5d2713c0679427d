//! Engine error types.

use thiserror::Error;

use crate::run::RunStatus;

/// Errors surfaced by the engine and its building blocks.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// A run with this id is still Running.
    #[error("Workflow run already running: {0}")]
    DuplicateRunId(String),

    /// No run with this id.
    #[error("Workflow run not found: {0}")]
    NotFound(String),

    /// The run is in a state that does not allow the operation.
    #[error("Workflow run {id} is already {status}")]
    InvalidState { id: String, status: RunStatus },

    /// The retry policy gave up on an activity.
    #[error("Activity {activity} failed after {attempts} attempt(s) ({last_error_kind}): {message}")]
    ActivityFailed {
        activity: String,
        last_error_kind: String,
        attempts: u32,
        message: String,
    },

    /// A caller gave up waiting for a run to reach a terminal status.
    ///
    /// Not used for attempts: an attempt that overruns its start-to-close
    /// timeout fails with the `Timeout` activity error kind and, once retries
    /// are exhausted, surfaces as `ActivityFailed`.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The run store cannot be reached.
    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Caller supplied an empty or malformed argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Activity name registered twice.
    #[error("Activity already registered: {0}")]
    AlreadyRegistered(String),

    /// Execution stopped by termination or worker shutdown before the step finished.
    #[error("Execution interrupted: {0}")]
    Interrupted(String),
}

impl EngineError {
    /// Short machine-readable kind, used in logs and API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateRunId(_) => "DuplicateRunId",
            Self::NotFound(_) => "NotFound",
            Self::InvalidState { .. } => "InvalidState",
            Self::ActivityFailed { .. } => "ActivityFailed",
            Self::Timeout(_) => "Timeout",
            Self::EngineUnavailable(_) => "EngineUnavailable",
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::AlreadyRegistered(_) => "AlreadyRegistered",
            Self::Interrupted(_) => "Interrupted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_failed_display() {
        let err = EngineError::ActivityFailed {
            activity: "ChargeCustomer".to_string(),
            last_error_kind: "Timeout".to_string(),
            attempts: 3,
            message: "attempt exceeded 30s".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("ChargeCustomer"));
        assert!(display.contains("3 attempt"));
        assert!(display.contains("Timeout"));
        assert_eq!(err.kind(), "ActivityFailed");
    }

    #[test]
    fn test_wait_timeout_is_distinct_from_attempt_timeout() {
        let wait = EngineError::Timeout("run 'order-001' still running after 5s".to_string());
        assert_eq!(wait.kind(), "Timeout");
        assert_eq!(wait.to_string(), "Timed out: run 'order-001' still running after 5s");

        let attempt = EngineError::ActivityFailed {
            activity: "ShipOrder".to_string(),
            last_error_kind: crate::activity::error_kinds::TIMEOUT.to_string(),
            attempts: 3,
            message: "attempt exceeded 30s".to_string(),
        };
        assert_eq!(attempt.kind(), "ActivityFailed");
    }

    #[test]
    fn test_invalid_state_display() {
        let err = EngineError::InvalidState {
            id: "order-001".to_string(),
            status: RunStatus::Completed,
        };
        assert_eq!(err.to_string(), "Workflow run order-001 is already Completed");
    }
}
