//! Workflow definitions.

use std::collections::BTreeSet;
use std::time::Duration;

use orderflow_config::Config;
use orderflow_core::{ActivityOptions, RetryPolicy, WorkflowType};

use crate::activities::names;

/// A fixed sequence of activities run on one task queue.
#[derive(Debug, Clone)]
pub struct WorkflowDefinition {
    pub workflow_type: WorkflowType,
    pub task_queue: String,
    /// Activity names in execution order.
    pub steps: Vec<String>,
    /// Options shared by every step.
    pub options: ActivityOptions,
}

impl WorkflowDefinition {
    /// Charge the customer, ship the order, send the confirmation email.
    pub fn order(task_queue: impl Into<String>, options: ActivityOptions) -> Self {
        Self {
            workflow_type: WorkflowType::Order,
            task_queue: task_queue.into(),
            steps: vec![
                names::CHARGE_CUSTOMER.to_string(),
                names::SHIP_ORDER.to_string(),
                names::SEND_CONFIRMATION_EMAIL.to_string(),
            ],
            options,
        }
    }

    /// Generate the invoice, email it.
    pub fn invoice(task_queue: impl Into<String>, options: ActivityOptions) -> Self {
        Self {
            workflow_type: WorkflowType::Invoice,
            task_queue: task_queue.into(),
            steps: vec![
                names::GENERATE_INVOICE.to_string(),
                names::SEND_INVOICE_EMAIL.to_string(),
            ],
            options,
        }
    }
}

/// The set of workflows the engine knows about.
#[derive(Debug, Clone)]
pub struct WorkflowCatalog {
    order: WorkflowDefinition,
    invoice: WorkflowDefinition,
}

impl WorkflowCatalog {
    pub fn new(order: WorkflowDefinition, invoice: WorkflowDefinition) -> Self {
        Self { order, invoice }
    }

    /// Build both definitions from the `[queues]` and `[retry]` sections.
    pub fn from_config(config: &Config) -> Self {
        let options = activity_options(config);
        Self::new(
            WorkflowDefinition::order(&config.queues.order, options.clone()),
            WorkflowDefinition::invoice(&config.queues.invoice, options),
        )
    }

    pub fn get(&self, workflow_type: WorkflowType) -> &WorkflowDefinition {
        match workflow_type {
            WorkflowType::Order => &self.order,
            WorkflowType::Invoice => &self.invoice,
        }
    }

    /// Definitions served by a task queue.
    pub fn for_queue(&self, task_queue: &str) -> Vec<&WorkflowDefinition> {
        [&self.order, &self.invoice]
            .into_iter()
            .filter(|d| d.task_queue == task_queue)
            .collect()
    }

    /// Every configured task queue, deduplicated.
    pub fn task_queues(&self) -> Vec<String> {
        [&self.order, &self.invoice]
            .into_iter()
            .map(|d| d.task_queue.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl Default for WorkflowCatalog {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Activity options from the `[retry]` section.
pub fn activity_options(config: &Config) -> ActivityOptions {
    let retry = &config.retry;
    ActivityOptions {
        start_to_close_timeout: Duration::from_secs(retry.start_to_close_timeout_secs),
        retry_policy: RetryPolicy {
            initial_interval: Duration::from_millis(retry.initial_interval_ms),
            maximum_interval: Duration::from_millis(retry.maximum_interval_ms),
            maximum_attempts: retry.maximum_attempts,
            non_retryable_error_kinds: retry.non_retryable_error_kinds.iter().cloned().collect(),
            backoff_coefficient: retry.backoff_coefficient,
            schedule_to_close_timeout: retry.schedule_to_close_timeout_secs.map(Duration::from_secs),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_matches_built_in_workflows() {
        let catalog = WorkflowCatalog::default();

        let order = catalog.get(WorkflowType::Order);
        assert_eq!(order.task_queue, "my-task-queue");
        assert_eq!(
            order.steps,
            vec!["ChargeCustomer", "ShipOrder", "SendConfirmationEmail"]
        );

        let invoice = catalog.get(WorkflowType::Invoice);
        assert_eq!(invoice.task_queue, "invoice-task-queue");
        assert_eq!(invoice.steps, vec!["GenerateInvoice", "SendInvoiceEmail"]);
    }

    #[test]
    fn test_default_options_match_default_policy() {
        let options = activity_options(&Config::default());
        assert_eq!(options, ActivityOptions::default());
    }

    #[test]
    fn test_for_queue() {
        let catalog = WorkflowCatalog::default();
        let defs = catalog.for_queue("invoice-task-queue");
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].workflow_type, WorkflowType::Invoice);
        assert!(catalog.for_queue("nope").is_empty());
        assert_eq!(catalog.task_queues(), vec!["invoice-task-queue", "my-task-queue"]);
    }
}
