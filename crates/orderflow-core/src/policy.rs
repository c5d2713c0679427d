//! Retry and timeout policy.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::activity::error_kinds;

/// Exponent cap; keeps `coefficient^n` finite for unlimited-attempt policies.
const MAX_BACKOFF_EXPONENT: i32 = 30;

/// Retry policy attached to an activity invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub maximum_interval: Duration,
    /// 0 means unlimited.
    pub maximum_attempts: u32,
    pub non_retryable_error_kinds: BTreeSet<String>,
    pub backoff_coefficient: f64,
    /// Total budget across all attempts and backoffs.
    #[serde(default)]
    pub schedule_to_close_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            maximum_interval: Duration::from_secs(10),
            maximum_attempts: 3,
            non_retryable_error_kinds: BTreeSet::from([error_kinds::INVALID_OPERATION.to_string()]),
            backoff_coefficient: 2.0,
            schedule_to_close_timeout: None,
        }
    }
}

/// Outcome of evaluating a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { after: Duration },
    Fail,
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT as u32) as i32;
        let secs = self.initial_interval.as_secs_f64() * self.backoff_coefficient.powi(exponent);
        let max = self.maximum_interval;
        if !secs.is_finite() || secs >= max.as_secs_f64() {
            return max;
        }
        Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(max)
    }

    pub fn is_non_retryable(&self, kind: &str) -> bool {
        self.non_retryable_error_kinds.contains(kind)
    }

    /// Decide whether attempt number `attempt` (1-based), which failed with
    /// `kind`, should be retried.
    pub fn decide(&self, attempt: u32, kind: &str, elapsed: Duration) -> RetryDecision {
        if self.is_non_retryable(kind) {
            return RetryDecision::Fail;
        }
        if self.maximum_attempts != 0 && attempt >= self.maximum_attempts {
            return RetryDecision::Fail;
        }
        let after = self.backoff(attempt);
        if let Some(budget) = self.schedule_to_close_timeout {
            if elapsed.saturating_add(after) > budget {
                return RetryDecision::Fail;
            }
        }
        RetryDecision::Retry { after }
    }
}

/// Options attached to every activity invocation of a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityOptions {
    /// Per-attempt deadline.
    pub start_to_close_timeout: Duration,
    pub retry_policy: RetryPolicy,
}

impl Default for ActivityOptions {
    fn default() -> Self {
        Self {
            start_to_close_timeout: Duration::from_secs(30),
            retry_policy: RetryPolicy::default(),
        }
    }
}
