// ABOUTME: Provisioning step abstraction and the built-in step catalog
// ABOUTME: Steps render a script template and hand it to the context's runner

pub mod docker;
pub mod error;
pub mod prometheus;
pub mod registry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::context::Config;
use crate::engine::error::ConfigurationError;
use crate::runner::{Command, OutputSink};
use crate::template::TemplateStore;

pub use error::{Result, StepError};
pub use registry::StepRegistry;

/// Which nodes a step runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepTarget {
    /// Once for the whole cluster
    #[default]
    Cluster,
    Masters,
    Workers,
    AllNodes,
}

impl StepTarget {
    pub fn fans_out(&self) -> bool {
        !matches!(self, StepTarget::Cluster)
    }
}

impl fmt::Display for StepTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StepTarget::Cluster => "cluster",
            StepTarget::Masters => "masters",
            StepTarget::Workers => "workers",
            StepTarget::AllNodes => "nodes",
        };
        f.write_str(label)
    }
}

/// A named, dependency-aware unit of provisioning work.
///
/// Implementations are immutable after construction. `run` must not invoke
/// the runner when its script fails to render, and `rollback` must be safe to
/// call for a step whose `run` never succeeded.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Names of steps that must complete before this one
    fn depends(&self) -> Vec<String>;

    fn target(&self) -> StepTarget {
        StepTarget::Cluster
    }

    /// Kind of the configuration block this step reads, checked before the run starts
    fn required_config(&self) -> Option<&'static str> {
        None
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        out: &OutputSink,
        config: &mut Config,
    ) -> Result<()>;

    async fn rollback(
        &self,
        _cancel: &CancellationToken,
        _out: &OutputSink,
        _config: &mut Config,
    ) -> Result<()> {
        Ok(())
    }
}

/// Register every built-in step. Fails if a step's template was not loaded.
pub fn register_all(
    registry: &mut StepRegistry,
    store: &TemplateStore,
) -> std::result::Result<(), ConfigurationError> {
    prometheus::init(registry, store)?;
    docker::init(registry, store)?;
    Ok(())
}

/// Send a rendered script to the context's runner, targeting the current node if any
pub(crate) async fn execute_script(
    step: &str,
    script: String,
    cancel: &CancellationToken,
    out: &OutputSink,
    config: &Config,
) -> Result<()> {
    let runner = config.runner().ok_or_else(|| StepError::NoRunner {
        step: step.to_string(),
    })?;

    let mut command = Command::new(script, out.clone());
    if let Some(ref node) = config.node {
        debug!("Step '{}' targeting node {}", step, node.id);
        command = command.on_host(node.address());
    }

    runner
        .run(cancel, command)
        .await
        .map_err(|e| StepError::from_runner(step, e))
}
