//! Built-in simulated activities.
//!
//! Each one logs a start line, waits for the configured delay and logs a
//! success line. The input is the order or invoice id as a JSON string.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use orderflow_core::{Activity, ActivityError, ActivityRegistry, EngineError, error_kinds};
use serde_json::{Value, json};
use tracing::info;

/// Activity names.
pub mod names {
    pub const CHARGE_CUSTOMER: &str = "ChargeCustomer";
    pub const SHIP_ORDER: &str = "ShipOrder";
    pub const SEND_CONFIRMATION_EMAIL: &str = "SendConfirmationEmail";
    pub const GENERATE_INVOICE: &str = "GenerateInvoice";
    pub const SEND_INVOICE_EMAIL: &str = "SendInvoiceEmail";
}

/// Activity groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityGroup {
    Order,
    Invoice,
}

impl ActivityGroup {
    pub const ALL: [ActivityGroup; 2] = [ActivityGroup::Order, ActivityGroup::Invoice];

    pub fn name(&self) -> &'static str {
        match self {
            ActivityGroup::Order => "OrderActivities",
            ActivityGroup::Invoice => "InvoiceActivities",
        }
    }

    /// Output field carrying the entity id.
    fn id_field(&self) -> &'static str {
        match self {
            ActivityGroup::Order => "orderId",
            ActivityGroup::Invoice => "invoiceId",
        }
    }
}

/// One simulated I/O operation.
struct SimulatedActivity {
    name: &'static str,
    group: ActivityGroup,
    delay: Duration,
    started: fn(&str) -> String,
    finished: fn(&str) -> String,
}

#[async_trait]
impl Activity for SimulatedActivity {
    fn name(&self) -> &str {
        self.name
    }

    fn group(&self) -> &str {
        self.group.name()
    }

    async fn execute(&self, input: Value) -> Result<Value, ActivityError> {
        let id = input.as_str().filter(|s| !s.trim().is_empty()).ok_or_else(|| {
            ActivityError::non_retryable(
                error_kinds::INVALID_OPERATION,
                format!("{} expects a non-empty id, got {}", self.name, input),
            )
        })?;

        info!(activity = self.name, "{}", (self.started)(id));
        tokio::time::sleep(self.delay).await;
        info!(activity = self.name, "{}", (self.finished)(id));

        Ok(json!({
            self.group.id_field(): id,
            "activity": self.name,
        }))
    }
}

fn builtin_activities(delay: Duration) -> Vec<SimulatedActivity> {
    vec![
        SimulatedActivity {
            name: names::CHARGE_CUSTOMER,
            group: ActivityGroup::Order,
            delay,
            started: |id| format!("Processing payment for order {}...", id),
            finished: |id| format!("Payment processed successfully for order {}", id),
        },
        SimulatedActivity {
            name: names::SHIP_ORDER,
            group: ActivityGroup::Order,
            delay,
            started: |id| format!("Processing shipping for order {}...", id),
            finished: |id| format!("Order shipped successfully: {}", id),
        },
        SimulatedActivity {
            name: names::SEND_CONFIRMATION_EMAIL,
            group: ActivityGroup::Order,
            delay,
            started: |id| format!("Sending confirmation email for order {}...", id),
            finished: |id| format!("Confirmation email sent successfully for order {}", id),
        },
        SimulatedActivity {
            name: names::GENERATE_INVOICE,
            group: ActivityGroup::Invoice,
            delay,
            started: |id| format!("Generating invoice document: {}", id),
            finished: |id| format!("Invoice document generated successfully: {}", id),
        },
        SimulatedActivity {
            name: names::SEND_INVOICE_EMAIL,
            group: ActivityGroup::Invoice,
            delay,
            started: |id| format!("Sending invoice email for: {}", id),
            finished: |id| format!("Invoice email sent successfully: {}", id),
        },
    ]
}

/// Register the five built-in activities, each waiting `delay` per attempt.
pub fn register_builtin_activities(
    registry: &ActivityRegistry,
    delay: Duration,
) -> Result<(), EngineError> {
    for activity in builtin_activities(delay) {
        registry.register(Arc::new(activity))?;
    }
    Ok(())
}
