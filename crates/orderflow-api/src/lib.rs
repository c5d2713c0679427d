//! # Orderflow API
//!
//! HTTP surface over the workflow engine. Handlers validate identifiers,
//! call [`orderflow_engine::WorkflowEngine`] and map the result onto the
//! JSON response shapes; no business logic lives here.
//!
//! All routes are mounted under `/api/temporal`:
//!
//! - `POST   /start-order`, `/start-invoice`, `/start-both`
//! - `GET    /workflows`, `/workflows/{workflowId}`
//! - `DELETE /workflows/{workflowId}`
//! - `GET    /health`

pub mod error;
pub mod http;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use http::routes::create_router;
pub use server::{ApiConfig, ApiServer};
pub use state::AppState;
