//! CLI definitions for orderflow.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use orderflow_config::StoreBackend;

/// orderflow CLI.
#[derive(Parser)]
#[command(name = "orderflow")]
#[command(about = "Durable order fulfillment and invoice workflows")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", global = true)]
    pub config: PathBuf,

    /// Override the configured run store backend
    #[arg(long, value_enum, global = true)]
    pub store: Option<StoreArg>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub(crate) enum StoreArg {
    File,
    Memory,
}

impl From<StoreArg> for StoreBackend {
    fn from(arg: StoreArg) -> Self {
        match arg {
            StoreArg::File => StoreBackend::File,
            StoreArg::Memory => StoreBackend::Memory,
        }
    }
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the HTTP API
    Serve {
        /// Server host (defaults to the configured one)
        #[arg(long)]
        host: Option<String>,

        /// Server port (defaults to the configured one)
        #[arg(long)]
        port: Option<u16>,

        /// Also run one worker per task queue in this process
        #[arg(long)]
        with_workers: bool,
    },

    /// Run a worker for one task queue until SIGINT/SIGTERM
    Worker {
        /// Task queue to serve, e.g. my-task-queue or invoice-task-queue
        #[arg(long)]
        task_queue: String,
    },

    /// Start an order and an invoice workflow
    Start {
        /// Order id (prompted for when absent)
        #[arg(long)]
        order_id: Option<String>,

        /// Invoice id (prompted for when absent)
        #[arg(long)]
        invoice_id: Option<String>,
    },

    /// Operator commands
    Workflow {
        #[command(subcommand)]
        action: WorkflowAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum WorkflowAction {
    /// List runs
    List {
        /// Filter by workflow type (order, invoice)
        #[arg(long = "type")]
        workflow_type: Option<String>,

        /// Filter by status (running, completed, failed, terminated)
        #[arg(long)]
        status: Option<String>,

        /// Output format (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Show one run with its steps
    Show {
        /// Workflow id
        workflow_id: String,
    },

    /// Terminate a running run
    Terminate {
        #[arg(long)]
        workflow_id: String,

        /// Reason recorded on the run
        #[arg(long)]
        reason: Option<String>,
    },
}
