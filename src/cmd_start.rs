//! `start` subcommand: start one order and one invoice run.

use std::io::{self, BufRead, Write};

use serde_json::Value;

use orderflow_config::Config;
use orderflow_core::WorkflowType;

use crate::server::build_engine;

const DEFAULT_ORDER_ID: &str = "order-001";
const DEFAULT_INVOICE_ID: &str = "invoice-001";

/// Start both workflows, prompting on stdin for ids not given as flags.
pub(crate) async fn run_start(
    config: Config,
    order_id: Option<String>,
    invoice_id: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("orderflow workflow starter");
    println!("==========================");

    let engine = build_engine(&config).await?;
    println!("Run store: {}", engine.store_location());

    let (order_id, invoice_id) = {
        let mut input = io::stdin().lock();
        (
            resolve_id(order_id, "Enter Order ID", DEFAULT_ORDER_ID, &mut input)?,
            resolve_id(invoice_id, "Enter Invoice ID", DEFAULT_INVOICE_ID, &mut input)?,
        )
    };

    println!("\nStarting workflows...");

    println!("Starting Order workflow: {}", order_id);
    engine
        .start(&order_id, WorkflowType::Order, Value::String(order_id.clone()))
        .await?;

    println!("Starting Invoice workflow: {}", invoice_id);
    engine
        .start(
            &invoice_id,
            WorkflowType::Invoice,
            Value::String(invoice_id.clone()),
        )
        .await?;

    println!("\nWorkflows started successfully!");
    println!("Remember to start the workers:");
    for (n, queue) in engine.catalog().task_queues().iter().enumerate() {
        println!("   Terminal {}: orderflow worker --task-queue {}", n + 1, queue);
    }
    Ok(())
}

/// Use the flag when given, otherwise prompt. A blank answer or EOF picks `default`.
fn resolve_id(
    flag: Option<String>,
    prompt: &str,
    default: &str,
    input: &mut impl BufRead,
) -> io::Result<String> {
    if let Some(id) = flag.filter(|id| !id.trim().is_empty()) {
        return Ok(id.trim().to_string());
    }

    print!("{} (e.g., {}): ", prompt, default);
    io::stdout().flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let line = line.trim();
    Ok(if line.is_empty() {
        default.to_string()
    } else {
        line.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_flag_wins_over_prompt() {
        let mut input = Cursor::new("typed\n");
        let id = resolve_id(Some(" order-7 ".into()), "Order", "order-001", &mut input).unwrap();
        assert_eq!(id, "order-7");
    }

    #[test]
    fn test_prompt_reads_line() {
        let mut input = Cursor::new("order-42\n");
        let id = resolve_id(None, "Order", "order-001", &mut input).unwrap();
        assert_eq!(id, "order-42");
    }

    #[test]
    fn test_blank_or_eof_uses_default() {
        let mut blank = Cursor::new("   \n");
        assert_eq!(
            resolve_id(None, "Order", "order-001", &mut blank).unwrap(),
            "order-001"
        );

        let mut eof = Cursor::new("");
        assert_eq!(
            resolve_id(None, "Invoice", "invoice-001", &mut eof).unwrap(),
            "invoice-001"
        );
    }
}
