//! Activity executor - runs one activity invocation under its retry policy.

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::activity::ActivityError;
use crate::error::EngineError;
use crate::policy::{ActivityOptions, RetryDecision};
use crate::registry::ActivityRegistry;
use crate::run::ActivityRecord;

/// Hooks called around every attempt.
///
/// The engine uses these to persist the record as it changes and to stop
/// retrying once a run has been terminated.
#[async_trait]
pub trait AttemptObserver: Send + Sync {
    /// The record has just entered `Running` for a new attempt.
    async fn attempt_started(&self, _record: &ActivityRecord) {}

    /// The attempt ended; the record is `Succeeded`, `Failed` or waiting for a retry.
    async fn attempt_finished(&self, _record: &ActivityRecord) {}

    /// Asked before each retry. Returning `false` abandons the invocation.
    async fn should_continue(&self) -> bool {
        true
    }
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl AttemptObserver for NoopObserver {}

/// Runs activities from a registry with retries and per-attempt timeouts.
#[derive(Clone)]
pub struct ActivityExecutor {
    registry: Arc<ActivityRegistry>,
}

impl ActivityExecutor {
    pub fn new(registry: Arc<ActivityRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ActivityRegistry> {
        &self.registry
    }

    /// Execute the activity named by `record` until it succeeds or the
    /// policy gives up.
    ///
    /// The record is updated in place. A record carried over from a previous
    /// process keeps counting attempts from where it stopped; one left Running
    /// is repeated under the same number.
    pub async fn execute(
        &self,
        record: &mut ActivityRecord,
        input: &Value,
        options: &ActivityOptions,
        observer: &dyn AttemptObserver,
    ) -> Result<Value, EngineError> {
        let policy = &options.retry_policy;
        let scheduled_at = Instant::now();

        loop {
            record.begin_attempt();
            observer.attempt_started(record).await;
            debug!(activity = %record.name, attempt = record.attempt, "Starting attempt");

            let outcome = match tokio::time::timeout(
                options.start_to_close_timeout,
                self.registry.invoke(&record.name, input.clone()),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ActivityError::timeout(options.start_to_close_timeout)),
            };

            let error = match outcome {
                Ok(output) => {
                    record.succeed();
                    observer.attempt_finished(record).await;
                    info!(activity = %record.name, attempt = record.attempt, "Activity succeeded");
                    return Ok(output);
                }
                Err(error) => error,
            };

            let decision = if error.non_retryable {
                RetryDecision::Fail
            } else {
                policy.decide(record.attempt, &error.kind, scheduled_at.elapsed())
            };

            match decision {
                RetryDecision::Fail => {
                    record.fail(&error);
                    observer.attempt_finished(record).await;
                    warn!(
                        activity = %record.name,
                        attempt = record.attempt,
                        kind = %error.kind,
                        "Activity failed: {}",
                        error.message
                    );
                    return Err(EngineError::ActivityFailed {
                        activity: record.name.clone(),
                        last_error_kind: error.kind,
                        attempts: record.attempt,
                        message: error.message,
                    });
                }
                RetryDecision::Retry { after } => {
                    record.await_retry(&error);
                    observer.attempt_finished(record).await;
                    warn!(
                        activity = %record.name,
                        attempt = record.attempt,
                        kind = %error.kind,
                        "Attempt failed, retrying in {:?}: {}",
                        after,
                        error.message
                    );

                    if !observer.should_continue().await {
                        return Err(self.interrupted(record));
                    }
                    tokio::time::sleep(after).await;
                    if !observer.should_continue().await {
                        return Err(self.interrupted(record));
                    }
                }
            }
        }
    }

    /// Execute a fresh invocation of `name` without an observer.
    pub async fn execute_activity(
        &self,
        name: &str,
        input: &Value,
        options: &ActivityOptions,
    ) -> Result<Value, EngineError> {
        let mut record = ActivityRecord::new(name);
        self.execute(&mut record, input, options, &NoopObserver).await
    }

    fn interrupted(&self, record: &ActivityRecord) -> EngineError {
        info!(activity = %record.name, attempt = record.attempt, "Retries abandoned");
        EngineError::Interrupted(format!(
            "{} stopped after attempt {}",
            record.name, record.attempt
        ))
    }
}
