//! Tests for run stores.

use super::*;
use orderflow_core::{ActivityRecord, RunStatus, WorkflowType};
use serde_json::json;
use tempfile::TempDir;

fn order_run(id: &str) -> WorkflowRun {
    WorkflowRun::new(id, WorkflowType::Order, "my-task-queue", json!(id))
}

#[tokio::test]
async fn test_memory_store_save_and_get() {
    let store = MemoryRunStore::new();
    let run = order_run("order-001");
    store.save(&run).await.unwrap();

    let loaded = store.get("order-001").await.unwrap().unwrap();
    assert_eq!(loaded.run_id, run.run_id);
    assert!(store.get("order-002").await.unwrap().is_none());
    assert_eq!(store.location(), "memory");
}

#[tokio::test]
async fn test_memory_store_claims() {
    let store = MemoryRunStore::new();
    let lease = Duration::from_secs(60);

    assert!(store.try_claim("order-001", "worker-a", lease).await.unwrap());
    assert!(!store.try_claim("order-001", "worker-b", lease).await.unwrap());
    // Re-claiming by the holder succeeds.
    assert!(store.try_claim("order-001", "worker-a", lease).await.unwrap());
    assert!(!store.refresh_claim("order-001", "worker-b").await.unwrap());

    store.release("order-001", "worker-b").await.unwrap();
    assert!(store.claim("order-001").await.unwrap().is_some());
    store.release("order-001", "worker-a").await.unwrap();
    assert!(store.claim("order-001").await.unwrap().is_none());
    assert!(store.try_claim("order-001", "worker-b", lease).await.unwrap());
}

#[tokio::test]
async fn test_file_store_save_and_get() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileRunStore::new(temp_dir.path()).await.unwrap();

    let mut run = order_run("order-001");
    let mut step = ActivityRecord::new("ChargeCustomer");
    step.begin_attempt();
    step.succeed();
    run.put_step(0, step);
    store.save(&run).await.unwrap();

    assert!(temp_dir.path().join("runs/order-001.json").exists());
    let loaded = store.get("order-001").await.unwrap().unwrap();
    assert_eq!(loaded, run);
    assert_eq!(loaded.completed_steps(), 1);
}

#[tokio::test]
async fn test_file_store_get_nonexistent() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileRunStore::new(temp_dir.path()).await.unwrap();
    assert!(store.get("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_file_store_list_sorted_and_skips_garbage() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileRunStore::new(temp_dir.path()).await.unwrap();

    let first = order_run("order-001");
    let mut second = order_run("order-002");
    second.created_at = first.created_at + chrono::Duration::seconds(5);
    store.save(&second).await.unwrap();
    store.save(&first).await.unwrap();
    std::fs::write(temp_dir.path().join("runs/broken.json"), "{not json").unwrap();

    let runs = store.list().await.unwrap();
    let ids: Vec<_> = runs.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["order-001", "order-002"]);
}

#[tokio::test]
async fn test_file_store_archive() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileRunStore::new(temp_dir.path()).await.unwrap();

    let mut old = order_run("order-001");
    old.close(RunStatus::Completed, None);
    store.save(&old).await.unwrap();
    store.archive(&old).await.unwrap();

    let replacement = order_run("order-001");
    store.save(&replacement).await.unwrap();

    let archived = store.archived("order-001").await.unwrap();
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].run_id, old.run_id);
    assert_eq!(
        store.get("order-001").await.unwrap().unwrap().run_id,
        replacement.run_id
    );
}

#[tokio::test]
async fn test_file_store_claim_exclusive() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileRunStore::new(temp_dir.path()).await.unwrap();
    let lease = Duration::from_secs(60);

    assert!(store.try_claim("order-001", "worker-a", lease).await.unwrap());
    assert!(!store.try_claim("order-001", "worker-b", lease).await.unwrap());
    assert!(store.refresh_claim("order-001", "worker-a").await.unwrap());

    store.release("order-001", "worker-a").await.unwrap();
    assert!(!temp_dir.path().join("claims/order-001.claim").exists());
}

#[tokio::test]
async fn test_file_store_steals_stale_claim() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileRunStore::new(temp_dir.path()).await.unwrap();

    let mut stale = Claim::new("order-001", "worker-a", Duration::from_secs(60));
    stale.claimed_at = Utc::now() - chrono::Duration::seconds(120);
    std::fs::write(
        temp_dir.path().join("claims/order-001.claim"),
        serde_json::to_string(&stale).unwrap(),
    )
    .unwrap();

    assert!(store
        .try_claim("order-001", "worker-b", Duration::from_secs(60))
        .await
        .unwrap());
    let claim = store.claim("order-001").await.unwrap().unwrap();
    assert_eq!(claim.worker, "worker-b");
    // The previous holder can no longer refresh.
    assert!(!store.refresh_claim("order-001", "worker-a").await.unwrap());
}

#[tokio::test]
async fn test_two_stores_share_a_root() {
    let temp_dir = TempDir::new().unwrap();
    let api = FileRunStore::new(temp_dir.path()).await.unwrap();
    let worker = FileRunStore::new(temp_dir.path()).await.unwrap();

    api.save(&order_run("order-001")).await.unwrap();
    let seen = worker.get("order-001").await.unwrap();
    assert!(seen.is_some());
}

#[test]
fn test_encode_id() {
    assert_eq!(FileRunStore::encode_id("order-001"), "order-001");
    assert_eq!(FileRunStore::encode_id("order_001"), "order_001");
    assert_eq!(FileRunStore::encode_id("order/../x"), "order%2F%2E%2E%2Fx");
    assert_eq!(FileRunStore::encode_id("a:b"), "a%3Ab");
    assert_eq!(FileRunStore::encode_id("a%3Ab"), "a%253Ab");
    assert_eq!(FileRunStore::encode_id("café"), "caf%C3%A9");
}

#[tokio::test]
async fn test_file_store_keeps_similar_ids_apart() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileRunStore::new(temp_dir.path()).await.unwrap();
    let ids = ["a.1", "a_1", "a/1", "a:1", "a%2E1"];
    for id in ids {
        store.save(&order_run(id)).await.unwrap();
    }

    for id in ids {
        let loaded = store.get(id).await.unwrap().unwrap();
        assert_eq!(loaded.id, id);
    }
    assert_eq!(store.list().await.unwrap().len(), ids.len());

    let lease = Duration::from_secs(60);
    assert!(store.try_claim("a.1", "worker-a", lease).await.unwrap());
    assert!(store.try_claim("a_1", "worker-b", lease).await.unwrap());
}

#[tokio::test]
async fn test_file_store_get_ignores_file_of_other_id() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileRunStore::new(temp_dir.path()).await.unwrap();
    // A file whose content belongs to another id, e.g. from an older layout.
    let stray = serde_json::to_string(&order_run("order.1")).unwrap();
    std::fs::write(temp_dir.path().join("runs/order_1.json"), stray).unwrap();

    assert!(store.get("order_1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_open_store_memory_backend() {
    let mut config = Config::default();
    config.store.backend = StoreBackend::Memory;
    let store = open_store(&config).await.unwrap();
    assert_eq!(store.location(), "memory");
}

#[tokio::test]
async fn test_open_store_file_backend() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.store.path = Some(temp_dir.path().to_path_buf());
    let store = open_store(&config).await.unwrap();
    assert_eq!(store.location(), temp_dir.path().display().to_string());
    assert!(temp_dir.path().join("claims").is_dir());
}
