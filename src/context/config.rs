// ABOUTME: Mutable per-run context threaded through every step invocation
// ABOUTME: Carries run identity, profile, node inventory, the runner and config blocks

use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::blocks::ConfigBlock;
use super::error::{ContextError, Result};
use super::node::{Node, NodeInventory};
use super::profile::Profile;
use crate::runner::Runner;

/// Execution context for one provisioning run.
///
/// Cluster-wide steps receive `&mut Config` so changes they make (for example
/// adding discovered nodes) are visible to later steps. Per-node invocations
/// get a [`Config::for_node`] snapshot instead.
#[derive(Clone)]
pub struct Config {
    pub cluster_name: String,
    pub run_id: String,
    pub profile: Profile,
    pub nodes: NodeInventory,
    /// Target of the current per-node invocation
    pub node: Option<Node>,
    runner: Option<Arc<dyn Runner>>,
    blocks: HashMap<&'static str, Arc<dyn Any + Send + Sync>>,
}

impl Config {
    pub fn new(cluster_name: impl Into<String>, run_id: impl Into<String>, profile: Profile) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            run_id: run_id.into(),
            profile,
            nodes: NodeInventory::new(),
            node: None,
            runner: None,
            blocks: HashMap::new(),
        }
    }

    pub fn add_master(&mut self, node: Node) {
        self.nodes.add_master(node);
    }

    pub fn add_worker(&mut self, node: Node) {
        self.nodes.add_worker(node);
    }

    pub fn masters(&self) -> Vec<&Node> {
        self.nodes.masters()
    }

    pub fn workers(&self) -> Vec<&Node> {
        self.nodes.workers()
    }

    pub fn all_nodes(&self) -> Vec<&Node> {
        self.nodes.all()
    }

    pub fn active_masters(&self) -> Vec<&Node> {
        self.nodes.active_masters()
    }

    pub fn first_master(&self) -> Option<&Node> {
        self.nodes.first_master()
    }

    /// Replace the active runner
    pub fn set_runner(&mut self, runner: Arc<dyn Runner>) {
        self.runner = Some(runner);
    }

    pub fn runner(&self) -> Option<Arc<dyn Runner>> {
        self.runner.clone()
    }

    /// Store a configuration block. Each kind may be set once per run.
    pub fn insert_block<B: ConfigBlock>(&mut self, block: B) -> Result<()> {
        if self.blocks.contains_key(B::KIND) {
            return Err(ContextError::DuplicateBlock { kind: B::KIND });
        }
        self.blocks.insert(B::KIND, Arc::new(block));
        Ok(())
    }

    pub fn block<B: ConfigBlock>(&self) -> Result<&B> {
        self.blocks
            .get(B::KIND)
            .and_then(|block| block.downcast_ref::<B>())
            .ok_or(ContextError::MissingBlock { kind: B::KIND })
    }

    pub fn has_block(&self, kind: &str) -> bool {
        self.blocks.contains_key(kind)
    }

    pub fn block_kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<&'static str> = self.blocks.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    /// Snapshot of this context targeting a single node
    pub fn for_node(&self, node: &Node) -> Config {
        let mut snapshot = self.clone();
        snapshot.node = Some(node.clone());
        snapshot
    }

    /// Run-level values every template can reference
    pub fn template_view(&self) -> ClusterView<'_> {
        ClusterView {
            cluster_name: &self.cluster_name,
            run_id: &self.run_id,
            profile: &self.profile,
            masters: self.nodes.masters(),
            master_ips: self
                .nodes
                .masters()
                .into_iter()
                .map(|node| node.private_ip.as_str())
                .collect(),
            workers: self.nodes.workers(),
            node: self.node.as_ref(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("", uuid::Uuid::new_v4().to_string(), Profile::default())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("cluster_name", &self.cluster_name)
            .field("run_id", &self.run_id)
            .field("profile", &self.profile)
            .field("nodes", &self.nodes)
            .field("node", &self.node)
            .field("has_runner", &self.runner.is_some())
            .field("blocks", &self.block_kinds())
            .finish()
    }
}

/// Serializable view of the context used as template data
#[derive(Debug, Serialize)]
pub struct ClusterView<'a> {
    pub cluster_name: &'a str,
    pub run_id: &'a str,
    pub profile: &'a Profile,
    pub masters: Vec<&'a Node>,
    /// Private addresses of the masters, for `{{join}}`
    pub master_ips: Vec<&'a str>,
    pub workers: Vec<&'a Node>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<&'a Node>,
}
