// ABOUTME: Cluster node model and the role-grouped node inventory
// ABOUTME: Nodes are keyed by private address and kept in insertion order

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Master,
    Worker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    #[default]
    Pending,
    Active,
    Failed,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub private_ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub state: NodeState,
}

impl Node {
    pub fn new(id: impl Into<String>, private_ip: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            private_ip: private_ip.into(),
            public_ip: None,
            role,
            state: NodeState::Pending,
        }
    }

    pub fn master(id: impl Into<String>, private_ip: impl Into<String>) -> Self {
        Self::new(id, private_ip, Role::Master)
    }

    pub fn worker(id: impl Into<String>, private_ip: impl Into<String>) -> Self {
        Self::new(id, private_ip, Role::Worker)
    }

    pub fn with_public_ip(mut self, public_ip: impl Into<String>) -> Self {
        self.public_ip = Some(public_ip.into());
        self
    }

    pub fn with_state(mut self, state: NodeState) -> Self {
        self.state = state;
        self
    }

    /// Address a runner should connect to
    pub fn address(&self) -> &str {
        self.public_ip.as_deref().unwrap_or(&self.private_ip)
    }
}

/// Masters and workers of one cluster.
///
/// Adding a node whose private address is already known replaces the existing
/// entry in place, so discovery can be re-run without duplicating nodes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NodeInventory {
    masters: IndexMap<String, Node>,
    workers: IndexMap<String, Node>,
}

impl NodeInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_master(&mut self, mut node: Node) {
        node.role = Role::Master;
        self.workers.shift_remove(&node.private_ip);
        self.masters.insert(node.private_ip.clone(), node);
    }

    pub fn add_worker(&mut self, mut node: Node) {
        node.role = Role::Worker;
        self.masters.shift_remove(&node.private_ip);
        self.workers.insert(node.private_ip.clone(), node);
    }

    pub fn masters(&self) -> Vec<&Node> {
        self.masters.values().collect()
    }

    pub fn workers(&self) -> Vec<&Node> {
        self.workers.values().collect()
    }

    /// Masters first, then workers
    pub fn all(&self) -> Vec<&Node> {
        self.masters.values().chain(self.workers.values()).collect()
    }

    pub fn active_masters(&self) -> Vec<&Node> {
        self.masters
            .values()
            .filter(|node| node.state == NodeState::Active)
            .collect()
    }

    pub fn first_master(&self) -> Option<&Node> {
        self.masters.values().next()
    }

    pub fn get(&self, private_ip: &str) -> Option<&Node> {
        self.masters
            .get(private_ip)
            .or_else(|| self.workers.get(private_ip))
    }

    /// Update a node's state, returning false when the node is unknown
    pub fn mark_state(&mut self, private_ip: &str, state: NodeState) -> bool {
        match self
            .masters
            .get_mut(private_ip)
            .or_else(|| self.workers.get_mut(private_ip))
        {
            Some(node) => {
                node.state = state;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.masters.len() + self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masters.is_empty() && self.workers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups_keep_insertion_order() {
        let mut inventory = NodeInventory::new();
        inventory.add_worker(Node::worker("w2", "10.0.1.2"));
        inventory.add_master(Node::master("m1", "10.0.0.1"));
        inventory.add_worker(Node::worker("w1", "10.0.1.1"));

        let workers: Vec<&str> = inventory.workers().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(workers, vec!["w2", "w1"]);

        let all: Vec<&str> = inventory.all().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(all, vec!["m1", "w2", "w1"]);
        assert_eq!(inventory.len(), 3);
    }

    #[test]
    fn test_same_address_replaces_node() {
        let mut inventory = NodeInventory::new();
        inventory.add_worker(Node::worker("old", "10.0.1.5"));
        inventory.add_worker(Node::worker("new", "10.0.1.5"));

        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory.get("10.0.1.5").unwrap().id, "new");
    }

    #[test]
    fn test_promoting_worker_moves_it_between_groups() {
        let mut inventory = NodeInventory::new();
        inventory.add_worker(Node::worker("n1", "10.0.0.9"));
        inventory.add_master(Node::worker("n1", "10.0.0.9"));

        assert!(inventory.workers().is_empty());
        assert_eq!(inventory.masters()[0].role, Role::Master);
    }

    #[test]
    fn test_active_masters_and_mark_state() {
        let mut inventory = NodeInventory::new();
        inventory.add_master(Node::master("m1", "10.0.0.1"));
        inventory.add_master(Node::master("m2", "10.0.0.2").with_state(NodeState::Active));

        assert_eq!(inventory.active_masters().len(), 1);
        assert!(inventory.mark_state("10.0.0.1", NodeState::Active));
        assert_eq!(inventory.active_masters().len(), 2);
        assert!(!inventory.mark_state("10.9.9.9", NodeState::Failed));

        assert_eq!(inventory.first_master().unwrap().id, "m1");
    }

    #[test]
    fn test_address_prefers_public_ip() {
        let node = Node::worker("w", "10.0.1.1");
        assert_eq!(node.address(), "10.0.1.1");
        assert_eq!(node.with_public_ip("203.0.113.4").address(), "203.0.113.4");
    }
}
