// ABOUTME: Step that installs the docker engine on every node
// ABOUTME: Runs once per node and uninstalls docker again when the run is rolled back

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::error::{Result, StepError};
use super::registry::StepRegistry;
use super::{execute_script, Step, StepTarget};
use crate::context::{ClusterView, Config, ConfigBlock, DockerConfig};
use crate::engine::error::ConfigurationError;
use crate::runner::OutputSink;
use crate::template::{ScriptTemplate, TemplateStore};

pub const STEP_NAME: &str = "docker";
pub const ROLLBACK_TEMPLATE: &str = "docker_rollback";

pub struct DockerStep {
    script: ScriptTemplate,
    rollback_script: ScriptTemplate,
}

#[derive(Serialize)]
struct ScriptData<'a> {
    #[serde(flatten)]
    docker: &'a DockerConfig,
    #[serde(flatten)]
    cluster: ClusterView<'a>,
}

impl DockerStep {
    pub fn new(script: ScriptTemplate, rollback_script: ScriptTemplate) -> Self {
        Self {
            script,
            rollback_script,
        }
    }

    fn render(&self, template: &ScriptTemplate, config: &Config) -> Result<String> {
        let docker = config
            .block::<DockerConfig>()
            .map_err(|source| StepError::MissingConfig {
                step: STEP_NAME.to_string(),
                source,
            })?;

        let data = ScriptData {
            docker,
            cluster: config.template_view(),
        };
        template.render(&data).map_err(|source| StepError::Render {
            step: STEP_NAME.to_string(),
            source,
        })
    }
}

/// Register the step using the loaded `docker` and `docker_rollback` templates
pub fn init(registry: &mut StepRegistry, store: &TemplateStore) -> std::result::Result<(), ConfigurationError> {
    let lookup = |name: &str| {
        store
            .get_template(name)
            .ok_or_else(|| ConfigurationError::MissingTemplate {
                step: name.to_string(),
            })
    };

    let script = lookup(STEP_NAME)?;
    let rollback_script = lookup(ROLLBACK_TEMPLATE)?;

    registry.add_step(Arc::new(DockerStep::new(script, rollback_script)))
}

#[async_trait]
impl Step for DockerStep {
    fn name(&self) -> &str {
        STEP_NAME
    }

    fn description(&self) -> &str {
        "Install docker engine"
    }

    fn depends(&self) -> Vec<String> {
        Vec::new()
    }

    fn target(&self) -> StepTarget {
        StepTarget::AllNodes
    }

    fn required_config(&self) -> Option<&'static str> {
        Some(DockerConfig::KIND)
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        out: &OutputSink,
        config: &mut Config,
    ) -> Result<()> {
        let script = self.render(&self.script, config)?;

        if let Some(ref node) = config.node {
            info!("Installing docker on {}", node.id);
        }
        execute_script(STEP_NAME, script, cancel, out, config).await
    }

    async fn rollback(
        &self,
        cancel: &CancellationToken,
        out: &OutputSink,
        config: &mut Config,
    ) -> Result<()> {
        let script = self.render(&self.rollback_script, config)?;

        if let Some(ref node) = config.node {
            warn!("Removing docker from {}", node.id);
        }
        execute_script(STEP_NAME, script, cancel, out, config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Node;
    use crate::runner::{CaptureBuffer, Command, Runner, RunnerError};
    use std::sync::Mutex;

    #[derive(Default)]
    struct HostRecorder {
        calls: Mutex<Vec<(Option<String>, String)>>,
    }

    #[async_trait]
    impl Runner for HostRecorder {
        async fn run(
            &self,
            _cancel: &CancellationToken,
            command: Command,
        ) -> std::result::Result<(), RunnerError> {
            self.calls
                .lock()
                .unwrap()
                .push((command.host.clone(), command.script.clone()));
            Ok(())
        }
    }

    fn step() -> DockerStep {
        DockerStep::new(
            ScriptTemplate::parse("docker", "install {{version}} on {{node.private_ip}}").unwrap(),
            ScriptTemplate::parse("docker_rollback", "remove docker from {{node.private_ip}}")
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_run_targets_current_node() {
        let runner = Arc::new(HostRecorder::default());
        let mut config = Config::default();
        config.insert_block(DockerConfig::default()).unwrap();
        config.set_runner(runner.clone());

        let mut node_config = config.for_node(&Node::worker("w1", "10.0.1.1"));
        step()
            .run(&CancellationToken::new(), &CaptureBuffer::new().sink(), &mut node_config)
            .await
            .unwrap();

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.as_deref(), Some("10.0.1.1"));
        assert_eq!(calls[0].1, "install 24.0.7 on 10.0.1.1");
    }

    #[tokio::test]
    async fn test_rollback_renders_uninstall_script() {
        let runner = Arc::new(HostRecorder::default());
        let mut config = Config::default();
        config.insert_block(DockerConfig::default()).unwrap();
        config.set_runner(runner.clone());

        let mut node_config = config.for_node(&Node::master("m1", "10.0.0.1"));
        step()
            .rollback(&CancellationToken::new(), &OutputSink::discard(), &mut node_config)
            .await
            .unwrap();

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0].1, "remove docker from 10.0.0.1");
    }

    #[tokio::test]
    async fn test_render_failure_skips_runner() {
        let runner = Arc::new(HostRecorder::default());
        let mut config = Config::default();
        config.insert_block(DockerConfig::default()).unwrap();
        config.set_runner(runner.clone());

        // No current node, so `node.private_ip` is missing in strict mode
        let err = step()
            .run(&CancellationToken::new(), &OutputSink::discard(), &mut config)
            .await
            .unwrap_err();

        assert!(matches!(err, StepError::Render { .. }));
        assert!(runner.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_block() {
        let mut config = Config::default();
        let err = step()
            .run(&CancellationToken::new(), &OutputSink::discard(), &mut config)
            .await
            .unwrap_err();

        assert!(matches!(err, StepError::MissingConfig { .. }));
    }
}
