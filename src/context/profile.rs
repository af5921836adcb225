// ABOUTME: Base cluster profile the run was started from
// ABOUTME: Deserialized from settings and exposed to step templates

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub name: String,
    pub provider: String,
    pub region: String,
    pub kube_version: String,
    pub rbac_enabled: bool,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            provider: "baremetal".to_string(),
            region: String::new(),
            kube_version: "1.28".to_string(),
            rbac_enabled: true,
        }
    }
}
