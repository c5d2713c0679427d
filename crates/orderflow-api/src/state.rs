//! Application state.

use std::sync::Arc;

use orderflow_engine::WorkflowEngine;

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
}

impl AppState {
    pub fn new(engine: Arc<WorkflowEngine>) -> Self {
        Self { engine }
    }
}
