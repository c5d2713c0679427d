//! # Orderflow Engine
//!
//! Runs the order and invoice workflows on top of the activity executor and
//! the run store.
//!
//! - [`definition`] declares the step sequence and options of each workflow
//! - [`activities`] holds the built-in simulated activities
//! - [`engine::WorkflowEngine`] is the start/get/terminate/list/drive surface

pub mod activities;
pub mod definition;
mod driver;
pub mod engine;

pub use activities::{register_builtin_activities, ActivityGroup};
pub use definition::{WorkflowCatalog, WorkflowDefinition};
pub use engine::{RunFilter, WorkflowEngine};
