//! Tests for the activity executor.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use serde_json::json;

use super::*;
use crate::activity::error_kinds;
use crate::policy::RetryPolicy;
use crate::run::ActivityStatus;

/// Registry with a single activity that fails `failures` times with `kind`,
/// then succeeds. Returns the attempt start instants.
fn flaky_registry(
    failures: u32,
    kind: &'static str,
) -> (Arc<ActivityRegistry>, Arc<Mutex<Vec<Instant>>>) {
    let registry = Arc::new(ActivityRegistry::new());
    let starts = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(AtomicU32::new(0));

    let recorded = starts.clone();
    registry
        .register_fn("Flaky", "TestActivities", move |input: Value| {
            let recorded = recorded.clone();
            let calls = calls.clone();
            async move {
                recorded.lock().unwrap().push(Instant::now());
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= failures {
                    Err(ActivityError::new(kind, format!("failure #{}", n)))
                } else {
                    Ok(json!({ "input": input, "calls": n }))
                }
            }
        })
        .unwrap();
    (registry, starts)
}

#[derive(Default)]
struct RecordingObserver {
    started: Mutex<Vec<u32>>,
    finished: Mutex<Vec<ActivityStatus>>,
    stop: AtomicBool,
}

#[async_trait]
impl AttemptObserver for RecordingObserver {
    async fn attempt_started(&self, record: &ActivityRecord) {
        self.started.lock().unwrap().push(record.attempt);
    }

    async fn attempt_finished(&self, record: &ActivityRecord) {
        self.finished.lock().unwrap().push(record.status);
    }

    async fn should_continue(&self) -> bool {
        !self.stop.load(Ordering::SeqCst)
    }
}

#[tokio::test(start_paused = true)]
async fn test_retries_with_exponential_backoff() {
    let (registry, starts) = flaky_registry(2, "Transient");
    let executor = ActivityExecutor::new(registry);
    let observer = RecordingObserver::default();
    let mut record = ActivityRecord::new("Flaky");

    let output = executor
        .execute(&mut record, &json!("order-001"), &ActivityOptions::default(), &observer)
        .await
        .unwrap();

    assert_eq!(output["calls"], 3);
    assert_eq!(record.attempt, 3);
    assert_eq!(record.status, ActivityStatus::Succeeded);
    assert_eq!(record.last_error_kind.as_deref(), Some("Transient"));

    let starts = starts.lock().unwrap();
    assert_eq!(starts.len(), 3);
    let first_gap = starts[1] - starts[0];
    let second_gap = starts[2] - starts[1];
    assert!(first_gap >= Duration::from_secs(1) && first_gap < Duration::from_millis(1_100));
    assert!(second_gap >= Duration::from_secs(2) && second_gap < Duration::from_millis(2_100));

    assert_eq!(*observer.started.lock().unwrap(), vec![1, 2, 3]);
    assert_eq!(
        *observer.finished.lock().unwrap(),
        vec![
            ActivityStatus::Pending,
            ActivityStatus::Pending,
            ActivityStatus::Succeeded
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_fails_after_maximum_attempts() {
    let (registry, starts) = flaky_registry(u32::MAX, "Transient");
    let executor = ActivityExecutor::new(registry);
    let mut record = ActivityRecord::new("Flaky");

    let err = executor
        .execute(&mut record, &json!(null), &ActivityOptions::default(), &NoopObserver)
        .await
        .unwrap_err();

    match err {
        EngineError::ActivityFailed {
            activity,
            last_error_kind,
            attempts,
            ..
        } => {
            assert_eq!(activity, "Flaky");
            assert_eq!(last_error_kind, "Transient");
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(record.status, ActivityStatus::Failed);
    assert_eq!(starts.lock().unwrap().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_kind_fails_on_first_attempt() {
    let (registry, starts) = flaky_registry(u32::MAX, error_kinds::INVALID_OPERATION);
    let executor = ActivityExecutor::new(registry);

    let err = executor
        .execute_activity("Flaky", &json!(null), &ActivityOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::ActivityFailed { attempts: 1, .. }));
    assert_eq!(starts.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_activity_fails_without_retry() {
    let executor = ActivityExecutor::new(Arc::new(ActivityRegistry::new()));

    let err = executor
        .execute_activity("Missing", &json!(null), &ActivityOptions::default())
        .await
        .unwrap_err();

    match err {
        EngineError::ActivityFailed {
            last_error_kind,
            attempts,
            ..
        } => {
            assert_eq!(last_error_kind, error_kinds::ACTIVITY_NOT_REGISTERED);
            assert_eq!(attempts, 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_retryable() {
    let registry = Arc::new(ActivityRegistry::new());
    registry
        .register_fn("Slow", "TestActivities", |_| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(json!(null))
        })
        .unwrap();
    let executor = ActivityExecutor::new(registry);
    let options = ActivityOptions {
        start_to_close_timeout: Duration::from_secs(30),
        retry_policy: RetryPolicy {
            maximum_attempts: 2,
            ..Default::default()
        },
    };

    let started = Instant::now();
    let err = executor
        .execute_activity("Slow", &json!(null), &options)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::ActivityFailed { ref last_error_kind, attempts: 2, .. }
            if last_error_kind == error_kinds::TIMEOUT
    ));
    // Two 30s attempts plus one 1s backoff.
    assert!(started.elapsed() >= Duration::from_secs(61));
}

#[tokio::test(start_paused = true)]
async fn test_observer_can_stop_retries() {
    let (registry, starts) = flaky_registry(u32::MAX, "Transient");
    let executor = ActivityExecutor::new(registry);
    let observer = RecordingObserver::default();
    observer.stop.store(true, Ordering::SeqCst);
    let mut record = ActivityRecord::new("Flaky");

    let err = executor
        .execute(&mut record, &json!(null), &ActivityOptions::default(), &observer)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Interrupted(_)));
    assert_eq!(starts.lock().unwrap().len(), 1);
    // The failed attempt is kept, not marked Failed.
    assert_eq!(record.status, ActivityStatus::Pending);
    assert_eq!(record.attempt, 1);
}

#[tokio::test(start_paused = true)]
async fn test_resumed_record_continues_attempt_count() {
    let (registry, _starts) = flaky_registry(u32::MAX, "Transient");
    let executor = ActivityExecutor::new(registry);
    let mut record = ActivityRecord::new("Flaky");
    record.begin_attempt();
    record.await_retry(&ActivityError::new("Transient", "before restart"));

    let err = executor
        .execute(&mut record, &json!(null), &ActivityOptions::default(), &NoopObserver)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::ActivityFailed { attempts: 3, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_interrupted_attempt_runs_again_under_same_number() {
    let (registry, starts) = flaky_registry(u32::MAX, "Transient");
    let executor = ActivityExecutor::new(registry);
    let mut record = ActivityRecord::new("Flaky");
    // Attempt 3 was in flight when the process stopped.
    record.attempt = 3;
    record.status = ActivityStatus::Running;

    let err = executor
        .execute(&mut record, &json!(null), &ActivityOptions::default(), &NoopObserver)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::ActivityFailed { attempts: 3, .. }));
    assert_eq!(starts.lock().unwrap().len(), 1);
    assert_eq!(record.attempt, 3);
    assert_eq!(record.status, ActivityStatus::Failed);
}
