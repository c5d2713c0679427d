//! # Orderflow Core
//!
//! Building blocks shared by the engine, the workers and the API:
//!
//! - [`registry::ActivityRegistry`] maps activity names to handlers
//! - [`policy::RetryPolicy`] decides retry-or-fail after a failed attempt
//! - [`executor::ActivityExecutor`] runs one activity under a policy
//! - [`run`] holds the persisted data model (`WorkflowRun`, `ActivityRecord`)

pub mod activity;
pub mod error;
pub mod executor;
pub mod policy;
pub mod registry;
pub mod run;

pub use activity::{error_kinds, Activity, ActivityError, FnActivity};
pub use error::EngineError;
pub use executor::{ActivityExecutor, AttemptObserver, NoopObserver};
pub use policy::{ActivityOptions, RetryDecision, RetryPolicy};
pub use registry::ActivityRegistry;
pub use run::{
    ActivityRecord, ActivityStatus, RunStatus, WorkflowRun, WorkflowRunSummary, WorkflowType,
};
