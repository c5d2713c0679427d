//! `workflow` subcommands for operators.

use orderflow_config::Config;
use orderflow_core::{RunStatus, WorkflowRun, WorkflowRunSummary, WorkflowType};
use orderflow_engine::RunFilter;

use crate::cli::WorkflowAction;
use crate::server::build_engine;

/// Handle workflow subcommands.
pub(crate) async fn handle_workflow_command(
    config: Config,
    action: WorkflowAction,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = build_engine(&config).await?;
    match action {
        WorkflowAction::List {
            workflow_type,
            status,
            format,
        } => {
            let filter = RunFilter {
                workflow_type: workflow_type
                    .as_deref()
                    .map(str::parse::<WorkflowType>)
                    .transpose()?,
                status: status.as_deref().map(str::parse::<RunStatus>).transpose()?,
            };
            let runs = engine.list(&filter).await?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&runs)?);
            } else {
                print_table(&runs);
            }
        }
        WorkflowAction::Show { workflow_id } => {
            let run = engine.get(&workflow_id).await?;
            print_run(&run);
            let history = engine.history(&workflow_id).await?;
            if !history.is_empty() {
                println!("Previous runs: {}", history.len());
                for old in &history {
                    println!("  {}  {}", old.run_id, old.status);
                }
            }
        }
        WorkflowAction::Terminate {
            workflow_id,
            reason,
        } => {
            let run = engine.terminate(&workflow_id, reason.as_deref()).await?;
            println!(
                "Workflow {} terminated: {}",
                run.id,
                run.error.as_deref().unwrap_or_default()
            );
        }
    }
    Ok(())
}

fn print_table(runs: &[WorkflowRunSummary]) {
    if runs.is_empty() {
        println!("No workflows found.");
        return;
    }
    println!(
        "{:<24} {:<16} {:<11} {:<20} {}",
        "ID", "TYPE", "STATUS", "TASK QUEUE", "STARTED"
    );
    println!("{}", "-".repeat(96));
    for run in runs {
        println!(
            "{:<24} {:<16} {:<11} {:<20} {}",
            run.id,
            run.workflow_type.type_name(),
            run.status.to_string(),
            run.task_queue,
            run.start_time.format("%Y-%m-%d %H:%M:%S")
        );
    }
}

fn print_run(run: &WorkflowRun) {
    println!("Workflow:   {}", run.id);
    println!("Run:        {}", run.run_id);
    println!("Type:       {}", run.workflow_type);
    println!("Task queue: {}", run.task_queue);
    println!("Status:     {}", run.status);
    println!("Started:    {}", run.created_at.to_rfc3339());
    if let Some(closed) = run.closed_at {
        println!("Closed:     {}", closed.to_rfc3339());
    }
    if let Some(error) = &run.error {
        println!("Error:      {}", error);
    }
    println!("Steps:");
    for (n, step) in run.steps.iter().enumerate() {
        println!(
            "  {}. {:<24} {:<10} attempt {}",
            n + 1,
            step.name,
            format!("{:?}", step.status),
            step.attempt
        );
        if let Some(error) = &step.last_error {
            println!("     last error: {}", error);
        }
    }
}
