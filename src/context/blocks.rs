// ABOUTME: Typed configuration blocks that individual steps read from the context
// ABOUTME: Each block has a stable kind key and renders into its step's template

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt::Debug;

/// A step-specific configuration value stored in the run context.
///
/// `KIND` is the key the block is stored under and the name steps use to
/// declare it as required.
pub trait ConfigBlock: Any + Send + Sync + Debug {
    const KIND: &'static str;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrometheusConfig {
    pub port: String,
    pub rbac_enabled: bool,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            port: "30900".to_string(),
            rbac_enabled: false,
        }
    }
}

impl ConfigBlock for PrometheusConfig {
    const KIND: &'static str = "prometheus";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    pub version: String,
    pub release_channel: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            version: "24.0.7".to_string(),
            release_channel: "stable".to_string(),
        }
    }
}

impl ConfigBlock for DockerConfig {
    const KIND: &'static str = "docker";
}
