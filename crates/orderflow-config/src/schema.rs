//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub queues: QueuesConfig,

    #[serde(default)]
    pub activities: ActivitiesConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Run one embedded worker per task queue inside the API process.
    #[serde(default)]
    pub embedded_workers: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            embedded_workers: false,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Run store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// JSON files shared by every process pointing at the same directory.
    #[default]
    File,
    /// Process-local, lost on exit.
    Memory,
}

/// Run store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Root directory for the file backend (supports `~`).
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Seconds after which a worker's claim on a run is considered stale.
    #[serde(default = "default_claim_lease_secs")]
    pub claim_lease_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: None,
            claim_lease_secs: default_claim_lease_secs(),
        }
    }
}

fn default_claim_lease_secs() -> u64 {
    60
}

/// Activity retry and timeout policy applied to every workflow step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,

    #[serde(default = "default_maximum_interval_ms")]
    pub maximum_interval_ms: u64,

    #[serde(default = "default_backoff_coefficient")]
    pub backoff_coefficient: f64,

    /// 0 means unlimited.
    #[serde(default = "default_maximum_attempts")]
    pub maximum_attempts: u32,

    #[serde(default = "default_non_retryable_error_kinds")]
    pub non_retryable_error_kinds: Vec<String>,

    #[serde(default = "default_start_to_close_timeout_secs")]
    pub start_to_close_timeout_secs: u64,

    /// Overall budget for all attempts of one step.
    #[serde(default)]
    pub schedule_to_close_timeout_secs: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_initial_interval_ms(),
            maximum_interval_ms: default_maximum_interval_ms(),
            backoff_coefficient: default_backoff_coefficient(),
            maximum_attempts: default_maximum_attempts(),
            non_retryable_error_kinds: default_non_retryable_error_kinds(),
            start_to_close_timeout_secs: default_start_to_close_timeout_secs(),
            schedule_to_close_timeout_secs: None,
        }
    }
}

fn default_initial_interval_ms() -> u64 {
    1000
}

fn default_maximum_interval_ms() -> u64 {
    10_000
}

fn default_backoff_coefficient() -> f64 {
    2.0
}

fn default_maximum_attempts() -> u32 {
    3
}

fn default_non_retryable_error_kinds() -> Vec<String> {
    vec!["InvalidOperation".to_string()]
}

fn default_start_to_close_timeout_secs() -> u64 {
    30
}

/// Worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Maximum runs a single worker drives at once.
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: u32,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Worker identity; defaults to `<task queue>-<pid>-<random suffix>` when unset.
    #[serde(default)]
    pub identity: Option<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: default_max_concurrent_runs(),
            poll_interval_ms: default_poll_interval_ms(),
            identity: None,
        }
    }
}

fn default_max_concurrent_runs() -> u32 {
    4
}

fn default_poll_interval_ms() -> u64 {
    200
}

/// Task queue names per workflow type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuesConfig {
    #[serde(default = "default_order_queue")]
    pub order: String,

    #[serde(default = "default_invoice_queue")]
    pub invoice: String,
}

impl Default for QueuesConfig {
    fn default() -> Self {
        Self {
            order: default_order_queue(),
            invoice: default_invoice_queue(),
        }
    }
}

fn default_order_queue() -> String {
    "my-task-queue".to_string()
}

fn default_invoice_queue() -> String {
    "invoice-task-queue".to_string()
}

/// Built-in activity settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivitiesConfig {
    /// Simulated I/O time of every built-in activity.
    #[serde(default = "default_simulated_delay_ms")]
    pub simulated_delay_ms: u64,
}

impl Default for ActivitiesConfig {
    fn default() -> Self {
        Self {
            simulated_delay_ms: default_simulated_delay_ms(),
        }
    }
}

fn default_simulated_delay_ms() -> u64 {
    500
}

/// Default home directory for orderflow state (`~/.orderflow`).
pub fn orderflow_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".orderflow"))
        .unwrap_or_else(|| PathBuf::from("/tmp/orderflow"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_defaults_match_workflow_policy() {
        let retry = RetryConfig::default();
        assert_eq!(retry.initial_interval_ms, 1000);
        assert_eq!(retry.maximum_interval_ms, 10_000);
        assert_eq!(retry.maximum_attempts, 3);
        assert_eq!(retry.start_to_close_timeout_secs, 30);
        assert_eq!(retry.non_retryable_error_kinds, vec!["InvalidOperation"]);
        assert!(retry.schedule_to_close_timeout_secs.is_none());
    }

    #[test]
    fn test_queue_defaults() {
        let queues = QueuesConfig::default();
        assert_eq!(queues.order, "my-task-queue");
        assert_eq!(queues.invoice, "invoice-task-queue");
    }

    #[test]
    fn test_store_backend_serde() {
        let backend: StoreBackend = toml::from_str::<StoreConfig>("backend = \"memory\"")
            .unwrap()
            .backend;
        assert_eq!(backend, StoreBackend::Memory);
        assert_eq!(StoreConfig::default().backend, StoreBackend::File);
    }

    #[test]
    fn test_orderflow_dir() {
        assert!(orderflow_dir().ends_with(".orderflow") || orderflow_dir().ends_with("orderflow"));
    }
}
