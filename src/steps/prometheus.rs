// ABOUTME: Step that installs the prometheus operator on the cluster
// ABOUTME: Renders the prometheus template from the run's prometheus configuration block

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::error::{Result, StepError};
use super::registry::StepRegistry;
use super::{execute_script, Step};
use crate::context::{ClusterView, Config, ConfigBlock, PrometheusConfig};
use crate::engine::error::ConfigurationError;
use crate::runner::OutputSink;
use crate::template::{ScriptTemplate, TemplateStore};

pub const STEP_NAME: &str = "prometheus";

pub struct PrometheusStep {
    script: ScriptTemplate,
}

#[derive(Serialize)]
struct ScriptData<'a> {
    #[serde(flatten)]
    prometheus: &'a PrometheusConfig,
    #[serde(flatten)]
    cluster: ClusterView<'a>,
}

impl PrometheusStep {
    pub fn new(script: ScriptTemplate) -> Self {
        Self { script }
    }

    pub fn script(&self) -> &ScriptTemplate {
        &self.script
    }
}

/// Register the step using the loaded `prometheus` template
pub fn init(registry: &mut StepRegistry, store: &TemplateStore) -> std::result::Result<(), ConfigurationError> {
    let script = store
        .get_template(STEP_NAME)
        .ok_or_else(|| ConfigurationError::MissingTemplate {
            step: STEP_NAME.to_string(),
        })?;

    registry.add_step(Arc::new(PrometheusStep::new(script)))
}

#[async_trait]
impl Step for PrometheusStep {
    fn name(&self) -> &str {
        STEP_NAME
    }

    fn description(&self) -> &str {
        "Install prometheus"
    }

    fn depends(&self) -> Vec<String> {
        Vec::new()
    }

    fn required_config(&self) -> Option<&'static str> {
        Some(PrometheusConfig::KIND)
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        out: &OutputSink,
        config: &mut Config,
    ) -> Result<()> {
        let prometheus = config
            .block::<PrometheusConfig>()
            .map_err(|source| StepError::MissingConfig {
                step: STEP_NAME.to_string(),
                source,
            })?;

        let data = ScriptData {
            prometheus,
            cluster: config.template_view(),
        };
        let script = self.script.render(&data).map_err(|source| StepError::Render {
            step: STEP_NAME.to_string(),
            source,
        })?;

        info!(
            "Installing prometheus on port {} (rbac: {})",
            prometheus.port, prometheus.rbac_enabled
        );
        execute_script(STEP_NAME, script, cancel, out, config).await
    }
}
