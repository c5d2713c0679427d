//! Persisted workflow run model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::activity::ActivityError;
use crate::error::EngineError;

/// Workflow type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowType {
    /// Charge, ship, notify.
    #[serde(rename = "OrderWorkflow")]
    Order,
    /// Generate, email.
    #[serde(rename = "InvoiceWorkflow")]
    Invoice,
}

impl WorkflowType {
    /// All known workflow types.
    pub const ALL: [WorkflowType; 2] = [WorkflowType::Order, WorkflowType::Invoice];

    /// Type name as reported to clients.
    pub fn type_name(&self) -> &'static str {
        match self {
            WorkflowType::Order => "OrderWorkflow",
            WorkflowType::Invoice => "InvoiceWorkflow",
        }
    }
}

impl fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl FromStr for WorkflowType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "order" | "orderworkflow" => Ok(WorkflowType::Order),
            "invoice" | "invoiceworkflow" => Ok(WorkflowType::Invoice),
            other => Err(EngineError::InvalidArgument(format!(
                "unknown workflow type '{}'",
                other
            ))),
        }
    }
}

/// Run status.
///
/// A run is created directly in `Running`; the other three states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Terminated,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Running => "Running",
            RunStatus::Completed => "Completed",
            RunStatus::Failed => "Failed",
            RunStatus::Terminated => "Terminated",
        };
        f.write_str(s)
    }
}

impl FromStr for RunStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            "terminated" => Ok(RunStatus::Terminated),
            other => Err(EngineError::InvalidArgument(format!(
                "unknown run status '{}'",
                other
            ))),
        }
    }
}

/// Activity invocation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityStatus {
    /// Waiting for its first attempt or for a retry.
    Pending,
    /// An attempt is in flight.
    Running,
    Succeeded,
    Failed,
}

/// One activity invocation inside a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Activity name.
    pub name: String,
    /// Current attempt number; 0 only before the first attempt starts.
    pub attempt: u32,
    pub status: ActivityStatus,
    /// Start of the first attempt.
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl ActivityRecord {
    /// Create a record for an invocation that has not started yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attempt: 0,
            status: ActivityStatus::Pending,
            started_at: None,
            finished_at: None,
            last_error_kind: None,
            last_error: None,
        }
    }

    /// Mark the start of the next attempt.
    ///
    /// A record still `Running` was interrupted mid-attempt (the process
    /// died); that attempt is executed again under the same number.
    pub fn begin_attempt(&mut self) {
        if self.status != ActivityStatus::Running || self.attempt == 0 {
            self.attempt += 1;
        }
        self.status = ActivityStatus::Running;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
    }

    /// Mark the invocation succeeded.
    pub fn succeed(&mut self) {
        self.status = ActivityStatus::Succeeded;
        self.finished_at = Some(Utc::now());
    }

    /// Record a failed attempt that will be retried.
    pub fn await_retry(&mut self, error: &ActivityError) {
        self.status = ActivityStatus::Pending;
        self.last_error_kind = Some(error.kind.clone());
        self.last_error = Some(error.message.clone());
    }

    /// Mark the invocation terminally failed.
    pub fn fail(&mut self, error: &ActivityError) {
        self.status = ActivityStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.last_error_kind = Some(error.kind.clone());
        self.last_error = Some(error.message.clone());
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == ActivityStatus::Succeeded
    }
}

/// One execution of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    /// Caller-supplied id, unique among Running runs.
    pub id: String,
    /// Unique per execution; distinguishes reuses of the same id.
    pub run_id: Uuid,
    pub workflow_type: WorkflowType,
    pub task_queue: String,
    /// Workflow argument (the order or invoice id).
    pub input: serde_json::Value,
    pub status: RunStatus,
    /// Invocations in execution order.
    pub steps: Vec<ActivityRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowRun {
    /// Create a new run in `Running` state with no steps.
    pub fn new(
        id: impl Into<String>,
        workflow_type: WorkflowType,
        task_queue: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            run_id: Uuid::new_v4(),
            workflow_type,
            task_queue: task_queue.into(),
            input,
            status: RunStatus::Running,
            steps: Vec::new(),
            created_at: now,
            updated_at: now,
            closed_at: None,
            error: None,
        }
    }

    /// Number of leading steps that have Succeeded.
    pub fn completed_steps(&self) -> usize {
        self.steps.iter().take_while(|s| s.is_succeeded()).count()
    }

    /// Move to a terminal status.
    pub fn close(&mut self, status: RunStatus, error: Option<String>) {
        let now = Utc::now();
        self.status = status;
        self.error = error;
        self.updated_at = now;
        self.closed_at = Some(now);
    }

    /// Store `record` at `index`, appending when it is the next step.
    pub fn put_step(&mut self, index: usize, record: ActivityRecord) {
        if index < self.steps.len() {
            self.steps[index] = record;
        } else {
            self.steps.push(record);
        }
        self.updated_at = Utc::now();
    }

    pub fn summary(&self) -> WorkflowRunSummary {
        WorkflowRunSummary {
            id: self.id.clone(),
            run_id: self.run_id,
            workflow_type: self.workflow_type,
            status: self.status,
            task_queue: self.task_queue.clone(),
            start_time: self.created_at,
            close_time: self.closed_at,
        }
    }
}

/// Lightweight view returned by `list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRunSummary {
    pub id: String,
    pub run_id: Uuid,
    pub workflow_type: WorkflowType,
    pub status: RunStatus,
    pub task_queue: String,
    pub start_time: DateTime<Utc>,
    pub close_time: Option<DateTime<Utc>>,
}
