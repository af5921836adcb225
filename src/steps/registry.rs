// ABOUTME: Catalog of provisioning steps keyed by unique step name
// ABOUTME: Built once at startup and handed to the workflow engine

use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::Step;
use crate::engine::error::ConfigurationError;

#[derive(Default, Clone)]
pub struct StepRegistry {
    steps: IndexMap<String, Arc<dyn Step>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a step. Names are unique across the catalog.
    pub fn add_step(&mut self, step: Arc<dyn Step>) -> Result<(), ConfigurationError> {
        let name = step.name().to_string();
        if self.steps.contains_key(&name) {
            return Err(ConfigurationError::DuplicateStep { name });
        }

        debug!("Registered step '{}'", name);
        self.steps.insert(name, step);
        Ok(())
    }

    pub fn get_step(&self, name: &str) -> Option<Arc<dyn Step>> {
        self.steps.get(name).cloned()
    }

    /// Step names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.steps.keys().map(|k| k.as_str()).collect()
    }

    pub fn steps(&self) -> impl Iterator<Item = &Arc<dyn Step>> {
        self.steps.values()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepRegistry")
            .field("steps", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Config;
    use crate::runner::OutputSink;
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    struct NamedStep(&'static str);

    #[async_trait]
    impl Step for NamedStep {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "test step"
        }

        fn depends(&self) -> Vec<String> {
            Vec::new()
        }

        async fn run(
            &self,
            _cancel: &CancellationToken,
            _out: &OutputSink,
            _config: &mut Config,
        ) -> crate::steps::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_add_and_get_step() {
        let mut registry = StepRegistry::new();
        registry.add_step(Arc::new(NamedStep("kubelet"))).unwrap();
        registry.add_step(Arc::new(NamedStep("cni"))).unwrap();

        assert_eq!(registry.names(), vec!["kubelet", "cni"]);
        assert_eq!(registry.get_step("cni").unwrap().name(), "cni");
        assert!(registry.get_step("etcd").is_none());
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let mut registry = StepRegistry::new();
        registry.add_step(Arc::new(NamedStep("kubelet"))).unwrap();

        let err = registry.add_step(Arc::new(NamedStep("kubelet"))).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::DuplicateStep {
                name: "kubelet".to_string()
            }
        );
        assert_eq!(registry.len(), 1);
    }
}
