//! Route configuration.

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::state::AppState;

/// Build the router with every endpoint under `/api/temporal`.
pub fn create_router(state: AppState) -> Router {
    let temporal = Router::new()
        .route("/start-order", post(handlers::start_order))
        .route("/start-invoice", post(handlers::start_invoice))
        .route("/start-both", post(handlers::start_both))
        .route("/workflows", get(handlers::list_workflows))
        .route(
            "/workflows/{workflow_id}",
            get(handlers::get_workflow).delete(handlers::terminate_workflow),
        )
        .route("/health", get(handlers::health))
        .with_state(state);

    Router::new()
        .nest("/api/temporal", temporal)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
