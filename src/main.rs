//! orderflow - durable order fulfillment and invoice workflows.
//!
//! Main entry point for the API server, the workers and the operator CLI.

mod cli;
mod cmd_start;
mod cmd_worker;
mod cmd_workflow;
mod server;

use clap::Parser;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    server::init_tracing()?;

    let cli = Cli::parse();
    let mut config = server::load_config(&cli.config)?;
    if let Some(store) = cli.store {
        config.store.backend = store.into();
    }

    match cli.command {
        Commands::Serve {
            host,
            port,
            with_workers,
        } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let with_workers = with_workers || config.server.embedded_workers;
            server::run_server(config, host, port, with_workers).await
        }
        Commands::Worker { task_queue } => cmd_worker::run_worker(config, task_queue).await,
        Commands::Start {
            order_id,
            invoice_id,
        } => cmd_start::run_start(config, order_id, invoice_id).await,
        Commands::Workflow { action } => {
            cmd_workflow::handle_workflow_command(config, action).await
        }
    }
}
