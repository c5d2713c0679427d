//! Tests for the worker pool.

use std::time::Duration;

use orderflow_checkpoint::{MemoryRunStore, RunStore};
use orderflow_config::Config;
use orderflow_core::{ActivityRegistry, ActivityStatus, WorkflowType};
use orderflow_engine::{WorkflowCatalog, register_builtin_activities};
use serde_json::{Value, json};
use tokio::sync::Notify;

use super::*;

fn fast_config() -> Config {
    let mut config = Config::default();
    config.activities.simulated_delay_ms = 1;
    config.worker.poll_interval_ms = 10;
    config.worker.identity = Some("test-worker".to_string());
    config
}

fn engine(config: &Config) -> Arc<WorkflowEngine> {
    Arc::new(WorkflowEngine::from_config(config, Arc::new(MemoryRunStore::new())).unwrap())
}

fn pool(engine: &Arc<WorkflowEngine>, config: &Config, queue: &str) -> Arc<WorkerPool> {
    Arc::new(WorkerPool::new(engine.clone(), WorkerOptions::from_config(config, queue)).unwrap())
}

async fn wait_for_status(engine: &WorkflowEngine, id: &str, status: RunStatus) {
    for _ in 0..400 {
        if engine.get(id).await.map(|r| r.status == status).unwrap_or(false) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("run '{id}' never reached {status}");
}

#[test]
fn test_unknown_task_queue_rejected() {
    let config = fast_config();
    let engine = engine(&config);
    let result = WorkerPool::new(engine, WorkerOptions::from_config(&config, "nobody-listens"));
    assert!(matches!(result, Err(WorkerError::UnknownTaskQueue(q)) if q == "nobody-listens"));
}

#[test]
fn test_pool_label_and_slots() {
    let config = fast_config();
    let engine = engine(&config);
    let order = pool(&engine, &config, "my-task-queue");
    assert_eq!(order.label(), "Order");
    assert_eq!(order.available_slots(), 4);
    assert!(!order.is_running());

    let invoice = pool(&engine, &config, "invoice-task-queue");
    assert_eq!(invoice.label(), "Invoice");
}

#[tokio::test]
async fn test_pool_drives_runs_on_its_queue_only() {
    let config = fast_config();
    let engine = engine(&config);
    engine
        .start("order-001", WorkflowType::Order, json!("order-001"))
        .await
        .unwrap();
    engine
        .start("invoice-001", WorkflowType::Invoice, json!("invoice-001"))
        .await
        .unwrap();

    let pool = pool(&engine, &config, "my-task-queue");
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(pool.clone().run_loop(shutdown.clone()));

    wait_for_status(&engine, "order-001", RunStatus::Completed).await;
    shutdown.cancel();
    handle.await.unwrap().unwrap();

    assert_eq!(pool.total_driven(), 1);
    assert!(!pool.is_running());
    assert_eq!(
        engine.get("invoice-001").await.unwrap().status,
        RunStatus::Running
    );
    assert!(engine.store().claim("order-001").await.unwrap().is_none());
}

#[tokio::test]
async fn test_pool_skips_runs_claimed_elsewhere() {
    let config = fast_config();
    let engine = engine(&config);
    engine
        .start("order-001", WorkflowType::Order, json!("order-001"))
        .await
        .unwrap();
    engine
        .store()
        .try_claim("order-001", "other-worker", Duration::from_secs(60))
        .await
        .unwrap();

    let pool = pool(&engine, &config, "my-task-queue");
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(pool.clone().run_loop(shutdown.clone()));
    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown.cancel();
    handle.await.unwrap().unwrap();

    let run = engine.get("order-001").await.unwrap();
    assert_eq!(run.status, RunStatus::Running);
    assert!(run.steps.is_empty());
}

#[tokio::test]
async fn test_shutdown_waits_for_in_flight_attempt() {
    let config = fast_config();
    let registry = Arc::new(ActivityRegistry::new());
    let gate = Arc::new(Notify::new());
    {
        let gate = gate.clone();
        registry
            .register_fn("ChargeCustomer", "OrderActivities", move |input: Value| {
                let gate = gate.clone();
                async move {
                    gate.notified().await;
                    Ok(input)
                }
            })
            .unwrap();
    }
    // Remaining activities are the built-ins; skip the one replaced above.
    let builtins = ActivityRegistry::new();
    register_builtin_activities(&builtins, Duration::from_millis(1)).unwrap();
    for name in builtins.list_names() {
        if name != "ChargeCustomer" {
            registry.register(builtins.get(&name).unwrap()).unwrap();
        }
    }
    let engine = Arc::new(WorkflowEngine::new(
        Arc::new(MemoryRunStore::new()),
        registry,
        WorkflowCatalog::from_config(&config),
    ));
    engine
        .start("order-001", WorkflowType::Order, json!("order-001"))
        .await
        .unwrap();

    let pool = pool(&engine, &config, "my-task-queue");
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(pool.clone().run_loop(shutdown.clone()));

    let mut in_flight = false;
    for _ in 0..400 {
        let run = engine.get("order-001").await.unwrap();
        if run.steps.first().is_some_and(|s| s.status == ActivityStatus::Running) {
            in_flight = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(in_flight);

    shutdown.cancel();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!handle.is_finished());

    gate.notify_one();
    handle.await.unwrap().unwrap();

    // The in-flight step finished; the run is parked for the next worker.
    let run = engine.get("order-001").await.unwrap();
    assert_eq!(run.status, RunStatus::Running);
    assert_eq!(run.steps.len(), 1);
    assert_eq!(run.steps[0].status, ActivityStatus::Succeeded);
    assert!(engine.store().claim("order-001").await.unwrap().is_none());
}
