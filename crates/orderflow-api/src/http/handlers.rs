//! Workflow API handlers.
//!
//! Start failures, including bodies that do not parse, answer `400` with
//! `success: false` and a message.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use orderflow_core::{EngineError, WorkflowRun, WorkflowType};
use orderflow_engine::RunFilter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::error::ApiError;
use crate::state::AppState;

/// Body of `start-order` and `start-invoice`. The invoice endpoint reads
/// its id from `orderId` as well.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartWorkflowRequest {
    pub order_id: String,
}

/// Body of `start-both`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartBothRequest {
    pub order_id: String,
    pub invoice_id: String,
}

/// Result of a start or terminate request.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResponse {
    pub success: bool,
    pub message: String,
    pub workflow_id: String,
    pub task_queue: String,
    pub workflow_type: String,
}

/// One row of the workflow list.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInfo {
    pub id: String,
    pub status: String,
    #[serde(rename = "type")]
    pub workflow_type: String,
    pub start_time: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowListResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    pub workflows: Vec<WorkflowInfo>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    /// Where the engine persists runs.
    pub temporal_server: String,
    pub available_workflows: Vec<String>,
    pub available_activities: Vec<String>,
}

fn require_id(field: &str, value: &str) -> Result<String, EngineError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(EngineError::InvalidArgument(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

async fn start_run(
    state: &AppState,
    field: &str,
    id: &str,
    workflow_type: WorkflowType,
) -> Result<WorkflowRun, EngineError> {
    let id = require_id(field, id)?;
    state
        .engine
        .start(&id, workflow_type, Value::String(id.clone()))
        .await
}

fn started(label: &str, run: &WorkflowRun) -> (StatusCode, Json<WorkflowResponse>) {
    (
        StatusCode::OK,
        Json(WorkflowResponse {
            success: true,
            message: format!("{} workflow started successfully: {}", label, run.id),
            workflow_id: run.id.clone(),
            task_queue: run.task_queue.clone(),
            workflow_type: run.workflow_type.type_name().to_string(),
        }),
    )
}

fn start_failed(
    label: &str,
    id: &str,
    workflow_type: WorkflowType,
    e: &EngineError,
) -> (StatusCode, Json<WorkflowResponse>) {
    error!(workflow_id = %id, "Failed to start {} workflow: {}", label, e);
    (
        StatusCode::BAD_REQUEST,
        Json(WorkflowResponse {
            success: false,
            message: format!("Failed to start {} workflow: {}", label, e),
            workflow_id: id.to_string(),
            task_queue: String::new(),
            workflow_type: workflow_type.type_name().to_string(),
        }),
    )
}

/// A start body that did not parse, answered in the start response shape.
fn invalid_body(
    workflow_type: String,
    rejection: &JsonRejection,
) -> (StatusCode, Json<WorkflowResponse>) {
    error!("Rejected start request: {}", rejection.body_text());
    (
        StatusCode::BAD_REQUEST,
        Json(WorkflowResponse {
            success: false,
            message: format!("Invalid request body: {}", rejection.body_text()),
            workflow_type,
            ..Default::default()
        }),
    )
}

/// POST /api/temporal/start-order
pub async fn start_order(
    State(state): State<AppState>,
    payload: Result<Json<StartWorkflowRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return invalid_body(WorkflowType::Order.type_name().to_string(), &rejection);
        }
    };
    info!("Starting Order workflow: {}", request.order_id);
    match start_run(&state, "orderId", &request.order_id, WorkflowType::Order).await {
        Ok(run) => started("Order", &run),
        Err(e) => start_failed("Order", &request.order_id, WorkflowType::Order, &e),
    }
}

/// POST /api/temporal/start-invoice
pub async fn start_invoice(
    State(state): State<AppState>,
    payload: Result<Json<StartWorkflowRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return invalid_body(WorkflowType::Invoice.type_name().to_string(), &rejection);
        }
    };
    info!("Starting Invoice workflow: {}", request.order_id);
    match start_run(&state, "orderId", &request.order_id, WorkflowType::Invoice).await {
        Ok(run) => started("Invoice", &run),
        Err(e) => start_failed("Invoice", &request.order_id, WorkflowType::Invoice, &e),
    }
}

/// POST /api/temporal/start-both
///
/// Starts the order run first. When the invoice start fails afterwards the
/// order run stays started.
pub async fn start_both(
    State(state): State<AppState>,
    payload: Result<Json<StartBothRequest>, JsonRejection>,
) -> impl IntoResponse {
    let types = format!(
        "{},{}",
        WorkflowType::Order.type_name(),
        WorkflowType::Invoice.type_name()
    );
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return invalid_body(types, &rejection),
    };
    info!(
        "Starting both Order and Invoice workflows: {}, {}",
        request.order_id, request.invoice_id
    );
    let ids = format!("{},{}", request.order_id, request.invoice_id);

    let result = async {
        require_id("orderId", &request.order_id)?;
        require_id("invoiceId", &request.invoice_id)?;
        let order = start_run(&state, "orderId", &request.order_id, WorkflowType::Order).await?;
        let invoice =
            start_run(&state, "invoiceId", &request.invoice_id, WorkflowType::Invoice).await?;
        Ok::<_, EngineError>((order, invoice))
    }
    .await;

    match result {
        Ok((order, invoice)) => (
            StatusCode::OK,
            Json(WorkflowResponse {
                success: true,
                message: format!(
                    "Both Order and Invoice workflows started successfully: {}, {}",
                    order.id, invoice.id
                ),
                workflow_id: format!("{},{}", order.id, invoice.id),
                task_queue: format!("{},{}", order.task_queue, invoice.task_queue),
                workflow_type: types,
            }),
        ),
        Err(e) => {
            error!("Failed to start workflows {}: {}", ids, e);
            (
                StatusCode::BAD_REQUEST,
                Json(WorkflowResponse {
                    success: false,
                    message: format!("Failed to start workflows: {}", e),
                    workflow_id: ids,
                    task_queue: String::new(),
                    workflow_type: types,
                }),
            )
        }
    }
}

/// GET /api/temporal/workflows
pub async fn list_workflows(State(state): State<AppState>) -> impl IntoResponse {
    match state.engine.list(&RunFilter::default()).await {
        Ok(runs) => {
            let workflows: Vec<WorkflowInfo> = runs
                .into_iter()
                .map(|r| WorkflowInfo {
                    id: r.id,
                    status: r.status.to_string(),
                    workflow_type: r.workflow_type.type_name().to_string(),
                    start_time: r.start_time,
                })
                .collect();
            (
                StatusCode::OK,
                Json(WorkflowListResponse {
                    success: true,
                    message: String::new(),
                    count: workflows.len(),
                    workflows,
                }),
            )
        }
        Err(e) => {
            error!("Failed to retrieve workflow list: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(WorkflowListResponse {
                    success: false,
                    message: format!("Failed to retrieve workflow list: {}", e),
                    workflows: Vec::new(),
                    count: 0,
                }),
            )
        }
    }
}

/// GET /api/temporal/workflows/{workflowId}
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
) -> Result<Json<WorkflowRun>, ApiError> {
    Ok(Json(state.engine.get(&workflow_id).await?))
}

/// DELETE /api/temporal/workflows/{workflowId}
///
/// Answers with the operator command; the run itself is left alone.
pub async fn terminate_workflow(Path(workflow_id): Path<String>) -> impl IntoResponse {
    info!("Terminating workflow: {}", workflow_id);
    Json(WorkflowResponse {
        success: true,
        message: format!(
            "Workflow termination command: orderflow workflow terminate --workflow-id {}",
            workflow_id
        ),
        workflow_id,
        ..Default::default()
    })
}

/// GET /api/temporal/health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "Healthy".to_string(),
        timestamp: Utc::now(),
        temporal_server: state.engine.store_location(),
        available_workflows: WorkflowType::ALL
            .iter()
            .map(|t| t.type_name().to_string())
            .collect(),
        available_activities: state.engine.activity_groups(),
    })
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
