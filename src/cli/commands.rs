// ABOUTME: Command implementations for the provisioner CLI
// ABOUTME: Lists steps, prints execution plans and drives provisioning runs

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::config::Settings;
use crate::engine::WorkflowEngine;
use crate::runner::{LocalRunner, OutputSink, Runner};

/// Print every registered step
pub fn list_steps(engine: &WorkflowEngine) -> Result<()> {
    for step in engine.registry().steps() {
        let depends = step.depends();
        if depends.is_empty() {
            println!("{:<16} {}", step.name(), step.description());
        } else {
            println!(
                "{:<16} {} (after: {})",
                step.name(),
                step.description(),
                depends.join(", ")
            );
        }
    }
    Ok(())
}

/// Print the execution order for the requested steps
pub fn print_plan(engine: &WorkflowEngine, steps: &[String]) -> Result<()> {
    let plan = engine.plan(steps)?;

    for (position, step) in plan.steps().iter().enumerate() {
        println!(
            "{:>2}. {:<16} [{}] {}",
            position + 1,
            step.name(),
            step.target(),
            step.description()
        );
    }
    Ok(())
}

/// Plan, validate and run the requested steps
pub async fn run_steps(
    engine: &WorkflowEngine,
    settings: &Settings,
    steps: &[String],
    local: bool,
    run_id: Option<String>,
) -> Result<()> {
    let run_id = run_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let mut config = settings
        .build_context(run_id.clone())
        .context("Failed to build execution context")?;

    let runner: Arc<dyn Runner> = if local {
        Arc::new(LocalRunner::new())
    } else {
        Arc::new(settings.ssh_runner())
    };
    config.set_runner(runner);

    let plan = engine.plan(steps)?;
    engine.validate(&plan, &config)?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            interrupt.cancel();
        }
    });

    info!("Starting run {} for {} steps", run_id, plan.len());
    let report = engine
        .run(&plan, &cancel, &OutputSink::stdout(), &mut config)
        .await;

    println!("Run {} finished with status: {}", report.run_id, report.status);
    for outcome in &report.steps {
        println!("  Step '{}': {}", outcome.step, outcome.status);
        if let Some(ref error) = outcome.error {
            println!("    Error: {}", error);
        }
    }

    report.into_result()?;
    Ok(())
}
