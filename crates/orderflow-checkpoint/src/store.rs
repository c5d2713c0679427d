//! Run storage.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use orderflow_config::{Config, ConfigLoader, StoreBackend};
use orderflow_core::WorkflowRun;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::claim::Claim;
use crate::error::StoreError;

/// Run storage trait.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Save (insert or overwrite) the current record for `run.id`.
    async fn save(&self, run: &WorkflowRun) -> Result<(), StoreError>;

    /// Get the current record for an id.
    async fn get(&self, id: &str) -> Result<Option<WorkflowRun>, StoreError>;

    /// List every current record, oldest first.
    async fn list(&self) -> Result<Vec<WorkflowRun>, StoreError>;

    /// Keep a copy of a superseded run.
    async fn archive(&self, run: &WorkflowRun) -> Result<(), StoreError>;

    /// Archived runs for an id, oldest first.
    async fn archived(&self, id: &str) -> Result<Vec<WorkflowRun>, StoreError>;

    /// Take the claim on a run. Succeeds when unclaimed, stale, or already
    /// held by `worker`.
    async fn try_claim(&self, id: &str, worker: &str, lease: Duration)
    -> Result<bool, StoreError>;

    /// Extend a held claim. Returns false when `worker` no longer holds it.
    async fn refresh_claim(&self, id: &str, worker: &str) -> Result<bool, StoreError>;

    /// Drop the claim if `worker` holds it.
    async fn release(&self, id: &str, worker: &str) -> Result<(), StoreError>;

    /// Current claim on a run, if any.
    async fn claim(&self, id: &str) -> Result<Option<Claim>, StoreError>;

    /// Human-readable location of the store.
    fn location(&self) -> String;
}

/// Open the store selected by the configuration.
pub async fn open_store(config: &Config) -> Result<Arc<dyn RunStore>, StoreError> {
    match config.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory run store");
            Ok(Arc::new(MemoryRunStore::new()))
        }
        StoreBackend::File => {
            let root = ConfigLoader::store_root(config);
            info!("Using file run store at {}", root.display());
            Ok(Arc::new(FileRunStore::new(root).await?))
        }
    }
}

/// In-memory run store for tests and single-process use.
pub struct MemoryRunStore {
    runs: RwLock<HashMap<String, WorkflowRun>>,
    archive: RwLock<Vec<WorkflowRun>>,
    claims: Mutex<HashMap<String, Claim>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
            archive: RwLock::new(Vec::new()),
            claims: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryRunStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn save(&self, run: &WorkflowRun) -> Result<(), StoreError> {
        let mut runs = self.runs.write().await;
        runs.insert(run.id.clone(), run.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<WorkflowRun>, StoreError> {
        let runs = self.runs.read().await;
        Ok(runs.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<WorkflowRun>, StoreError> {
        let runs = self.runs.read().await;
        let mut all: Vec<_> = runs.values().cloned().collect();
        all.sort_by_key(|r| r.created_at);
        Ok(all)
    }

    async fn archive(&self, run: &WorkflowRun) -> Result<(), StoreError> {
        self.archive.write().await.push(run.clone());
        Ok(())
    }

    async fn archived(&self, id: &str) -> Result<Vec<WorkflowRun>, StoreError> {
        let archive = self.archive.read().await;
        Ok(archive.iter().filter(|r| r.id == id).cloned().collect())
    }

    async fn try_claim(
        &self,
        id: &str,
        worker: &str,
        lease: Duration,
    ) -> Result<bool, StoreError> {
        let mut claims = self.claims.lock().await;
        if let Some(existing) = claims.get(id) {
            if !existing.is_held_by(worker) && !existing.is_stale(Utc::now()) {
                return Ok(false);
            }
        }
        claims.insert(id.to_string(), Claim::new(id, worker, lease));
        Ok(true)
    }

    async fn refresh_claim(&self, id: &str, worker: &str) -> Result<bool, StoreError> {
        let mut claims = self.claims.lock().await;
        match claims.get_mut(id) {
            Some(claim) if claim.is_held_by(worker) => {
                claim.refresh();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, id: &str, worker: &str) -> Result<(), StoreError> {
        let mut claims = self.claims.lock().await;
        if claims.get(id).is_some_and(|c| c.is_held_by(worker)) {
            claims.remove(id);
        }
        Ok(())
    }

    async fn claim(&self, id: &str) -> Result<Option<Claim>, StoreError> {
        Ok(self.claims.lock().await.get(id).cloned())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

/// File system based run store shared by every process pointing at the same root.
///
/// ```text
/// {root}/
/// ├── runs/{encoded id}.json
/// ├── archive/{encoded id}_{run_id}.json
/// └── claims/{encoded id}.claim
/// ```
pub struct FileRunStore {
    root: PathBuf,
}

impl FileRunStore {
    /// Create a file-based store, creating its directories.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        for dir in ["runs", "archive", "claims"] {
            fs::create_dir_all(root.join(dir)).await?;
        }
        debug!("FileRunStore initialized at {:?}", root);
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Encode an id as a file name stem.
    ///
    /// ASCII alphanumerics, `-` and `_` are kept; every other byte becomes
    /// `%XX`. Distinct ids always map to distinct stems.
    fn encode_id(id: &str) -> String {
        let mut stem = String::with_capacity(id.len());
        for byte in id.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                stem.push(byte as char);
            } else {
                stem.push_str(&format!("%{:02X}", byte));
            }
        }
        stem
    }

    fn run_path(&self, id: &str) -> PathBuf {
        self.root
            .join("runs")
            .join(format!("{}.json", Self::encode_id(id)))
    }

    fn archive_path(&self, run: &WorkflowRun) -> PathBuf {
        self.root.join("archive").join(format!(
            "{}_{}.json",
            Self::encode_id(&run.id),
            run.run_id
        ))
    }

    fn claim_path(&self, id: &str) -> PathBuf {
        self.root
            .join("claims")
            .join(format!("{}.claim", Self::encode_id(id)))
    }

    /// Write through a temp file and rename so readers never see a partial file.
    async fn write_atomic(path: &Path, content: &[u8]) -> Result<(), StoreError> {
        let tmp = path.with_extension(format!("tmp-{}", Uuid::new_v4()));
        fs::write(&tmp, content).await?;
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
        serde_json::to_string_pretty(value)
            .map_err(|e| StoreError::Serialization(format!("Failed to serialize: {}", e)))
    }

    async fn read_run(path: &Path) -> Result<Option<WorkflowRun>, StoreError> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let run = serde_json::from_str(&content).map_err(|e| {
            StoreError::Serialization(format!("Failed to deserialize {:?}: {}", path, e))
        })?;
        Ok(Some(run))
    }

    /// Read every `*.json` run in a directory, skipping unreadable files.
    async fn read_dir_runs(dir: &Path) -> Result<Vec<WorkflowRun>, StoreError> {
        let mut runs = Vec::new();
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(runs),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match Self::read_run(&path).await {
                Ok(Some(run)) => runs.push(run),
                Ok(None) => {}
                Err(e) => warn!("Skipping run file {:?}: {}", path, e),
            }
        }

        runs.sort_by_key(|r| r.created_at);
        Ok(runs)
    }

    async fn read_claim(&self, id: &str) -> Result<Option<Claim>, StoreError> {
        let content = match fs::read_to_string(self.claim_path(id)).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&content) {
            Ok(claim) => Ok(Some(claim)),
            Err(e) => {
                warn!("Unreadable claim for {}: {}", id, e);
                Ok(None)
            }
        }
    }

    /// Create the claim file only if it does not exist.
    ///
    /// The claim is written to a temp file and hard-linked into place, so the
    /// claim file appears atomically with its full content.
    async fn create_claim(&self, claim: &Claim) -> Result<bool, StoreError> {
        let path = self.claim_path(&claim.run_id);
        let tmp = path.with_extension(format!("tmp-{}", Uuid::new_v4()));
        fs::write(&tmp, Self::to_json(claim)?).await?;

        let linked = fs::hard_link(&tmp, &path).await;
        let _ = fs::remove_file(&tmp).await;
        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(StoreError::Claim(format!("{:?}: {}", path, e))),
        }
    }
}

#[async_trait]
impl RunStore for FileRunStore {
    async fn save(&self, run: &WorkflowRun) -> Result<(), StoreError> {
        let path = self.run_path(&run.id);
        Self::write_atomic(&path, Self::to_json(run)?.as_bytes()).await?;
        debug!("Saved run '{}' ({}) to {:?}", run.id, run.status, path);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<WorkflowRun>, StoreError> {
        let run = Self::read_run(&self.run_path(id)).await?;
        Ok(run.filter(|r| r.id == id))
    }

    async fn list(&self) -> Result<Vec<WorkflowRun>, StoreError> {
        Self::read_dir_runs(&self.root.join("runs")).await
    }

    async fn archive(&self, run: &WorkflowRun) -> Result<(), StoreError> {
        let path = self.archive_path(run);
        Self::write_atomic(&path, Self::to_json(run)?.as_bytes()).await?;
        debug!("Archived run '{}' ({}) to {:?}", run.id, run.run_id, path);
        Ok(())
    }

    async fn archived(&self, id: &str) -> Result<Vec<WorkflowRun>, StoreError> {
        let runs = Self::read_dir_runs(&self.root.join("archive")).await?;
        Ok(runs.into_iter().filter(|r| r.id == id).collect())
    }

    async fn try_claim(
        &self,
        id: &str,
        worker: &str,
        lease: Duration,
    ) -> Result<bool, StoreError> {
        let claim = Claim::new(id, worker, lease);
        if self.create_claim(&claim).await? {
            return Ok(true);
        }

        match self.read_claim(id).await? {
            Some(existing) if existing.is_held_by(worker) => {
                Self::write_atomic(&self.claim_path(id), Self::to_json(&claim)?.as_bytes())
                    .await?;
                Ok(true)
            }
            Some(existing) if !existing.is_stale(Utc::now()) => Ok(false),
            stale => {
                if let Some(old) = stale {
                    info!("Taking over stale claim on '{}' from {}", id, old.worker);
                }
                match fs::remove_file(self.claim_path(id)).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                // Another worker may win the race to recreate it.
                self.create_claim(&claim).await
            }
        }
    }

    async fn refresh_claim(&self, id: &str, worker: &str) -> Result<bool, StoreError> {
        match self.read_claim(id).await? {
            Some(mut claim) if claim.is_held_by(worker) => {
                claim.refresh();
                Self::write_atomic(&self.claim_path(id), Self::to_json(&claim)?.as_bytes())
                    .await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, id: &str, worker: &str) -> Result<(), StoreError> {
        if self
            .read_claim(id)
            .await?
            .is_some_and(|c| c.is_held_by(worker))
        {
            match fs::remove_file(self.claim_path(id)).await {
                Ok(()) => debug!("Released claim on '{}'", id),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn claim(&self, id: &str) -> Result<Option<Claim>, StoreError> {
        self.read_claim(id).await
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
