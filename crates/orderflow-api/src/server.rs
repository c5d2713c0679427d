//! API server.

use std::net::SocketAddr;
use std::sync::Arc;

use orderflow_engine::WorkflowEngine;
use tokio::net::TcpListener;
use tracing::info;

use crate::error::ApiError;
use crate::http::routes::create_router;
use crate::state::AppState;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl ApiConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Serves the workflow API over HTTP.
pub struct ApiServer {
    config: ApiConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: ApiConfig, engine: Arc<WorkflowEngine>) -> Self {
        Self {
            config,
            state: AppState::new(engine),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Serve until `shutdown` resolves.
    pub async fn run(
        &self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ApiError> {
        let app = create_router(self.state.clone());

        let addr: SocketAddr = self
            .addr()
            .parse()
            .map_err(|_| ApiError::InvalidAddress(self.addr()))?;
        let listener = TcpListener::bind(addr).await?;

        info!("API server listening on http://{}", addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("API server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderflow_checkpoint::MemoryRunStore;
    use orderflow_config::Config;

    #[test]
    fn test_api_config_default() {
        let config = ApiConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_api_server_addr() {
        let engine = WorkflowEngine::from_config(&Config::default(), Arc::new(MemoryRunStore::new()))
            .unwrap();
        let server = ApiServer::new(ApiConfig::new("0.0.0.0", 5000), Arc::new(engine));
        assert_eq!(server.addr(), "0.0.0.0:5000");
    }

    #[tokio::test]
    async fn test_api_server_rejects_bad_address() {
        let engine = WorkflowEngine::from_config(&Config::default(), Arc::new(MemoryRunStore::new()))
            .unwrap();
        let server = ApiServer::new(ApiConfig::new("not an address", 1), Arc::new(engine));
        let result = server.run(async {}).await;
        assert!(matches!(result, Err(ApiError::InvalidAddress(_))));
    }
}
