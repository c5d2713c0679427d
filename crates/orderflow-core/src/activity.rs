//! Activity trait and activity-level errors.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Well-known error kinds.
pub mod error_kinds {
    /// An attempt exceeded its start-to-close timeout.
    pub const TIMEOUT: &str = "Timeout";
    /// Listed as non-retryable in the default policy.
    pub const INVALID_OPERATION: &str = "InvalidOperation";
    /// The registry has no activity under the requested name.
    pub const ACTIVITY_NOT_REGISTERED: &str = "ActivityNotRegistered";
}

/// Failure of a single activity attempt.
///
/// `kind` is what the retry policy matches against; `non_retryable` forces
/// an immediate failure regardless of policy.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ActivityError {
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub non_retryable: bool,
}

impl ActivityError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            non_retryable: false,
        }
    }

    /// An error that must not be retried.
    pub fn non_retryable(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            non_retryable: true,
            ..Self::new(kind, message)
        }
    }

    pub fn timeout(limit: Duration) -> Self {
        Self::new(
            error_kinds::TIMEOUT,
            format!("attempt exceeded start-to-close timeout of {:?}", limit),
        )
    }

    pub fn not_registered(name: &str) -> Self {
        Self::non_retryable(
            error_kinds::ACTIVITY_NOT_REGISTERED,
            format!("activity '{}' is not registered", name),
        )
    }
}

/// A unit of side-effecting work invoked by name.
#[async_trait]
pub trait Activity: Send + Sync {
    /// Unique activity name, e.g. `ChargeCustomer`.
    fn name(&self) -> &str;

    /// Group the activity belongs to, e.g. `OrderActivities`.
    fn group(&self) -> &str;

    /// Execute one attempt.
    async fn execute(&self, input: Value) -> Result<Value, ActivityError>;
}

/// Activity backed by an async closure.
pub struct FnActivity<F> {
    name: String,
    group: String,
    func: F,
}

impl<F, Fut> FnActivity<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ActivityError>> + Send,
{
    pub fn new(name: impl Into<String>, group: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            func,
        }
    }
}

#[async_trait]
impl<F, Fut> Activity for FnActivity<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ActivityError>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn group(&self) -> &str {
        &self.group
    }

    async fn execute(&self, input: Value) -> Result<Value, ActivityError> {
        (self.func)(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let err = ActivityError::new("Transient", "network blip");
        assert!(!err.non_retryable);
        assert_eq!(err.to_string(), "Transient: network blip");

        let err = ActivityError::not_registered("Refund");
        assert!(err.non_retryable);
        assert_eq!(err.kind, error_kinds::ACTIVITY_NOT_REGISTERED);

        let err = ActivityError::timeout(Duration::from_secs(30));
        assert_eq!(err.kind, "Timeout");
        assert!(!err.non_retryable);
    }

    #[tokio::test]
    async fn test_fn_activity_executes_closure() {
        let activity = FnActivity::new("Echo", "TestActivities", |input: Value| async move {
            Ok(input)
        });
        assert_eq!(activity.name(), "Echo");
        assert_eq!(activity.group(), "TestActivities");
        let out = activity.execute(serde_json::json!({"a": 1})).await.unwrap();
        assert_eq!(out["a"], 1);
    }
}
