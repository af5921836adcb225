// ABOUTME: Workflow engine that plans, validates and runs provisioning steps
// ABOUTME: Runs steps in dependency order and rolls completed steps back in reverse on failure

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::dependency::{DependencyGraph, ExecutionPlan};
use super::error::{ConfigurationError, Result};
use super::result::{StepFailure, StepOutcome, StepStatus, WorkflowReport};
use super::scheduler::{NodeScheduler, Phase};
use crate::context::{Config, Node, NodeState};
use crate::runner::OutputSink;
use crate::steps::{Step, StepError, StepRegistry, StepTarget};

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Upper bound on concurrent per-node invocations of one step
    pub max_parallel_nodes: usize,
    /// Limit for a single step run or rollback, including all of its node invocations
    pub step_timeout: Option<Duration>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_parallel_nodes: 8,
            step_timeout: None,
        }
    }
}

pub struct WorkflowEngine {
    registry: StepRegistry,
    settings: EngineSettings,
    scheduler: NodeScheduler,
}

impl WorkflowEngine {
    pub fn new(registry: StepRegistry) -> Self {
        Self::with_settings(registry, EngineSettings::default())
    }

    pub fn with_settings(registry: StepRegistry, settings: EngineSettings) -> Self {
        let scheduler = NodeScheduler::new(settings.max_parallel_nodes);
        Self {
            registry,
            settings,
            scheduler,
        }
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Resolve the requested steps and their dependencies into an execution order
    #[instrument(skip(self))]
    pub fn plan<S: AsRef<str> + Debug>(&self, requested: &[S]) -> Result<ExecutionPlan> {
        let graph = DependencyGraph::resolve(&self.registry, requested)?;
        let plan = graph.execution_plan();

        info!(
            "Execution plan: {} steps in {} batches: {:?}",
            plan.len(),
            plan.batches.len(),
            plan.order()
        );
        Ok(plan)
    }

    /// Check that the context can satisfy every planned step before anything runs
    pub fn validate(&self, plan: &ExecutionPlan, config: &Config) -> Result<()> {
        if config.runner().is_none() {
            return Err(ConfigurationError::MissingRunner);
        }

        for step in plan.steps() {
            if let Some(kind) = step.required_config() {
                if !config.has_block(kind) {
                    return Err(ConfigurationError::MissingConfig {
                        step: step.name().to_string(),
                        kind,
                    });
                }
            }
        }

        Ok(())
    }

    /// Plan, validate and run in one call
    pub async fn execute<S: AsRef<str> + Debug>(
        &self,
        requested: &[S],
        cancel: &CancellationToken,
        out: &OutputSink,
        config: &mut Config,
    ) -> Result<WorkflowReport> {
        let plan = self.plan(requested)?;
        self.validate(&plan, config)?;
        Ok(self.run(&plan, cancel, out, config).await)
    }

    /// Run a validated plan.
    ///
    /// Stops at the first failing step and rolls back the steps that completed,
    /// most recent first. The rollback sweep keeps going past individual
    /// rollback failures and is not stopped by `cancel`.
    #[instrument(skip_all, fields(run_id = %config.run_id, steps = plan.len()))]
    pub async fn run(
        &self,
        plan: &ExecutionPlan,
        cancel: &CancellationToken,
        out: &OutputSink,
        config: &mut Config,
    ) -> WorkflowReport {
        let mut report = WorkflowReport::new(config.run_id.clone());
        report.steps = plan
            .steps()
            .iter()
            .map(|step| StepOutcome::new(step.name()))
            .collect();

        let mut completed: Vec<Arc<dyn Step>> = Vec::new();

        for step in plan.steps() {
            let name = step.name().to_string();

            if cancel.is_cancelled() {
                warn!("Run cancelled before step '{}'", name);
                if let Some(outcome) = report.outcome_mut(&name) {
                    outcome.mark_completed(StepStatus::Cancelled, None);
                }
                report.failure = Some(StepFailure {
                    step: name.clone(),
                    error: StepError::Cancelled { step: name },
                });
                break;
            }

            let invocations = match step.target() {
                StepTarget::Cluster => 1,
                target => target_nodes(target, config).len(),
            };
            if let Some(outcome) = report.outcome_mut(&name) {
                outcome.mark_started(invocations);
            }

            info!("Running step '{}': {}", name, step.description());
            match self.invoke(step, Phase::Run, cancel, out, config).await {
                Ok(()) => {
                    info!("Step '{}' completed", name);
                    if let Some(outcome) = report.outcome_mut(&name) {
                        outcome.mark_completed(StepStatus::Completed, None);
                    }
                    completed.push(Arc::clone(step));
                }
                Err(e) => {
                    let status = if e.is_cancelled() {
                        StepStatus::Cancelled
                    } else {
                        StepStatus::Failed
                    };
                    error!("Step '{}' failed: {}", name, e);
                    if let Some(outcome) = report.outcome_mut(&name) {
                        outcome.mark_completed(status, Some(e.to_string()));
                    }
                    report.failure = Some(StepFailure {
                        step: name,
                        error: e,
                    });
                    break;
                }
            }
        }

        if report.failure.is_some() && !completed.is_empty() {
            self.roll_back(&completed, out, config, &mut report).await;
        }

        report.finish();
        info!("Run finished with status: {}", report.status);
        report
    }

    async fn roll_back(
        &self,
        completed: &[Arc<dyn Step>],
        out: &OutputSink,
        config: &mut Config,
        report: &mut WorkflowReport,
    ) {
        // Compensation must run even when the failure was a cancellation
        let cancel = CancellationToken::new();

        for step in completed.iter().rev() {
            let name = step.name().to_string();
            warn!("Rolling back step '{}'", name);

            let result = self.invoke(step, Phase::Rollback, &cancel, out, config).await;
            let status = match result {
                Ok(()) => StepStatus::RolledBack,
                Err(e) => {
                    error!("Rollback of step '{}' failed: {}", name, e);
                    report.rollback_errors.push(e);
                    StepStatus::RollbackFailed
                }
            };

            if let Some(outcome) = report.outcome_mut(&name) {
                outcome.status = status;
            }
            report.rolled_back.push(name);
        }
    }

    /// Run or roll back one step under its own cancellation scope and time limit
    async fn invoke(
        &self,
        step: &Arc<dyn Step>,
        phase: Phase,
        cancel: &CancellationToken,
        out: &OutputSink,
        config: &mut Config,
    ) -> std::result::Result<(), StepError> {
        let scope = cancel.child_token();
        let invocation = self.dispatch(step, phase, &scope, out, config);
        tokio::pin!(invocation);

        let Some(limit) = self.settings.step_timeout else {
            return invocation.await;
        };

        tokio::select! {
            result = &mut invocation => result,
            _ = tokio::time::sleep(limit) => {
                warn!("Step '{}' exceeded {:?}, cancelling", step.name(), limit);
                scope.cancel();
                if let Err(e) = invocation.await {
                    debug!("Step '{}' stopped after timeout: {}", step.name(), e);
                }
                Err(StepError::Timeout {
                    step: step.name().to_string(),
                    after: limit,
                })
            }
        }
    }

    async fn dispatch(
        &self,
        step: &Arc<dyn Step>,
        phase: Phase,
        cancel: &CancellationToken,
        out: &OutputSink,
        config: &mut Config,
    ) -> std::result::Result<(), StepError> {
        let target = step.target();
        if !target.fans_out() {
            return match phase {
                Phase::Run => step.run(cancel, out, config).await,
                Phase::Rollback => step.rollback(cancel, out, config).await,
            };
        }

        let nodes = target_nodes(target, config);
        if nodes.is_empty() {
            return match phase {
                Phase::Run => Err(StepError::NoTargets {
                    step: step.name().to_string(),
                    target,
                }),
                Phase::Rollback => Ok(()),
            };
        }

        let fan_out = self
            .scheduler
            .run_on_nodes(Arc::clone(step), nodes, phase, cancel, out, config)
            .await;

        if phase == Phase::Run {
            for (node, result) in &fan_out.results {
                let state = match result {
                    Ok(()) => NodeState::Active,
                    Err(e) if e.is_cancelled() => continue,
                    Err(_) => NodeState::Failed,
                };
                config.nodes.mark_state(&node.private_ip, state);
            }
        }

        fan_out.into_result()
    }
}

fn target_nodes(target: StepTarget, config: &Config) -> Vec<Node> {
    let nodes = match target {
        StepTarget::Cluster => Vec::new(),
        StepTarget::Masters => config.masters(),
        StepTarget::Workers => config.workers(),
        StepTarget::AllNodes => config.all_nodes(),
    };
    nodes.into_iter().cloned().collect()
}
