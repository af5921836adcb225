// ABOUTME: Per-run execution context shared across provisioning steps
// ABOUTME: Holds the node inventory, the active runner and typed step configuration

pub mod blocks;
pub mod config;
pub mod error;
pub mod node;
pub mod profile;

pub use blocks::{ConfigBlock, DockerConfig, PrometheusConfig};
pub use config::{ClusterView, Config};
pub use error::{ContextError, Result};
pub use node::{Node, NodeInventory, NodeState, Role};
pub use profile::Profile;
