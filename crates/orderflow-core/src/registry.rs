//! Activity registry.
//!
//! Maps activity names to handlers. Populated at startup and shared via
//! `Arc` by every run afterwards.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

use crate::activity::{Activity, ActivityError, FnActivity};
use crate::error::EngineError;

/// Thread-safe name → activity map.
pub struct ActivityRegistry {
    activities: DashMap<String, Arc<dyn Activity>>,
}

impl ActivityRegistry {
    pub fn new() -> Self {
        Self {
            activities: DashMap::new(),
        }
    }

    /// Register an activity.
    ///
    /// Returns an error if an activity with the same name is already registered.
    pub fn register(&self, activity: Arc<dyn Activity>) -> Result<(), EngineError> {
        let name = activity.name().to_string();
        if self.activities.contains_key(&name) {
            return Err(EngineError::AlreadyRegistered(name));
        }
        debug!(activity = %name, group = %activity.group(), "Registered activity");
        self.activities.insert(name, activity);
        Ok(())
    }

    /// Register an async closure under `name`.
    pub fn register_fn<F, Fut>(
        &self,
        name: impl Into<String>,
        group: impl Into<String>,
        func: F,
    ) -> Result<(), EngineError>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ActivityError>> + Send + 'static,
    {
        self.register(Arc::new(FnActivity::new(name, group, func)))
    }

    /// Invoke one attempt of the named activity. No retries happen here.
    pub async fn invoke(&self, name: &str, input: Value) -> Result<Value, ActivityError> {
        // Clone the Arc so no map guard is held across the await.
        let activity = self
            .get(name)
            .ok_or_else(|| ActivityError::not_registered(name))?;
        activity.execute(input).await
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Activity>> {
        self.activities.get(name).map(|a| a.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.activities.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.activities.iter().map(|a| a.key().clone()).collect();
        names.sort();
        names
    }

    /// Distinct group names, sorted.
    pub fn list_groups(&self) -> Vec<String> {
        self.activities
            .iter()
            .map(|a| a.value().group().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }
}

impl Default for ActivityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::error_kinds;
    use serde_json::json;

    fn echo_registry() -> ActivityRegistry {
        let registry = ActivityRegistry::new();
        registry
            .register_fn("Echo", "TestActivities", |input: Value| async move { Ok(input) })
            .unwrap();
        registry
    }

    #[test]
    fn test_registry_new() {
        let registry = ActivityRegistry::default();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_register_duplicate() {
        let registry = echo_registry();
        let result =
            registry.register_fn("Echo", "Other", |input: Value| async move { Ok(input) });
        assert!(matches!(result, Err(EngineError::AlreadyRegistered(name)) if name == "Echo"));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_invoke_registered() {
        let registry = echo_registry();
        let out = registry.invoke("Echo", json!("order-001")).await.unwrap();
        assert_eq!(out, json!("order-001"));
    }

    #[tokio::test]
    async fn test_invoke_unknown_is_non_retryable() {
        let registry = echo_registry();
        let err = registry.invoke("Missing", json!(null)).await.unwrap_err();
        assert_eq!(err.kind, error_kinds::ACTIVITY_NOT_REGISTERED);
        assert!(err.non_retryable);
    }

    #[test]
    fn test_list_names_and_groups() {
        let registry = echo_registry();
        registry
            .register_fn("Alpha", "OtherActivities", |_| async { Ok(json!(null)) })
            .unwrap();
        registry
            .register_fn("Beta", "TestActivities", |_| async { Ok(json!(null)) })
            .unwrap();

        assert_eq!(registry.list_names(), vec!["Alpha", "Beta", "Echo"]);
        assert_eq!(registry.list_groups(), vec!["OtherActivities", "TestActivities"]);
        assert!(registry.contains("Beta"));
        assert!(!registry.contains("Gamma"));
    }
}
