// ABOUTME: Dependency resolution and execution ordering for provisioning steps
// ABOUTME: Pulls in declared dependencies, rejects cycles and produces a deterministic order

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::NodeIndex;
use petgraph::{Direction, Graph};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::error::{ConfigurationError, Result};
use crate::steps::{Step, StepRegistry};

/// Graph of the steps needed for a run, edges pointing from a dependency to
/// the step that needs it. Node indices follow discovery order.
pub struct DependencyGraph {
    graph: Graph<String, ()>,
    steps: Vec<Arc<dyn Step>>,
}

/// Steps of one run in execution order
#[derive(Clone)]
pub struct ExecutionPlan {
    steps: Vec<Arc<dyn Step>>,
    /// Groups of steps whose dependencies are satisfied by earlier groups
    pub batches: Vec<Vec<String>>,
}

impl DependencyGraph {
    /// Resolve the requested step names, plus everything they depend on
    pub fn resolve<S: AsRef<str>>(registry: &StepRegistry, requested: &[S]) -> Result<Self> {
        let mut graph = Graph::new();
        let mut step_indices = HashMap::new();
        let mut steps: Vec<Arc<dyn Step>> = Vec::new();

        let mut queue: VecDeque<(String, Option<String>)> = requested
            .iter()
            .map(|name| (name.as_ref().to_string(), None))
            .collect();

        while let Some((name, required_by)) = queue.pop_front() {
            if step_indices.contains_key(&name) {
                continue;
            }

            let step = registry.get_step(&name).ok_or_else(|| match required_by {
                Some(step) => ConfigurationError::UnknownDependency {
                    step,
                    dependency: name.clone(),
                },
                None => ConfigurationError::UnknownStep { name: name.clone() },
            })?;

            for dependency in step.depends() {
                if dependency == name {
                    return Err(ConfigurationError::SelfDependency { step: name });
                }
                queue.push_back((dependency, Some(name.clone())));
            }

            let index = graph.add_node(name.clone());
            step_indices.insert(name, index);
            steps.push(step);
        }

        for (index, step) in steps.iter().enumerate() {
            let step_node = NodeIndex::new(index);
            for dependency in step.depends() {
                if let Some(&dep_node) = step_indices.get(&dependency) {
                    graph.update_edge(dep_node, step_node, ());
                }
            }
        }

        let resolved = Self { graph, steps };
        resolved.check_cycles()?;

        debug!("Resolved {} steps", resolved.steps.len());
        Ok(resolved)
    }

    fn check_cycles(&self) -> Result<()> {
        match toposort(&self.graph, None) {
            Ok(_) => Ok(()),
            Err(cycle) => Err(ConfigurationError::CircularDependency {
                steps: self.cycle_through(cycle.node_id()),
            }),
        }
    }

    /// Walk dependencies inside the strongly connected component of `start`
    /// until a step repeats, returning the cycle as `a -> b -> a`
    fn cycle_through(&self, start: NodeIndex) -> Vec<String> {
        let component: HashSet<NodeIndex> = tarjan_scc(&self.graph)
            .into_iter()
            .find(|component| component.contains(&start))
            .unwrap_or_default()
            .into_iter()
            .collect();

        let mut path = vec![start];
        let mut current = start;
        loop {
            let next = self
                .graph
                .neighbors_directed(current, Direction::Incoming)
                .filter(|node| component.contains(node))
                .min_by_key(|node| node.index());

            let Some(next) = next else {
                break;
            };

            if let Some(position) = path.iter().position(|&node| node == next) {
                path.drain(..position);
                path.push(next);
                break;
            }

            path.push(next);
            current = next;
        }

        path.into_iter()
            .map(|node| self.graph[node].clone())
            .collect()
    }

    /// Order steps so each runs after its dependencies.
    ///
    /// Among steps that are ready at the same time, the one discovered first
    /// (requested steps before their dependencies) goes first.
    pub fn execution_plan(&self) -> ExecutionPlan {
        let count = self.steps.len();
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|node| {
                self.graph
                    .neighbors_directed(node, Direction::Incoming)
                    .count()
            })
            .collect();

        let mut ready: BTreeSet<usize> = (0..count).filter(|&i| in_degree[i] == 0).collect();
        let mut level = vec![0usize; count];
        let mut order = Vec::with_capacity(count);

        while let Some(index) = ready.pop_first() {
            order.push(index);

            for dependent in self
                .graph
                .neighbors_directed(NodeIndex::new(index), Direction::Outgoing)
            {
                let dependent = dependent.index();
                level[dependent] = level[dependent].max(level[index] + 1);
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        let batch_count = order.iter().map(|&i| level[i] + 1).max().unwrap_or(0);
        let mut batches = vec![Vec::new(); batch_count];
        for &index in &order {
            batches[level[index]].push(self.graph[NodeIndex::new(index)].clone());
        }

        ExecutionPlan {
            steps: order
                .into_iter()
                .map(|index| Arc::clone(&self.steps[index]))
                .collect(),
            batches,
        }
    }
}

impl ExecutionPlan {
    pub fn steps(&self) -> &[Arc<dyn Step>] {
        &self.steps
    }

    /// Step names in execution order
    pub fn order(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Debug for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionPlan")
            .field("order", &self.order())
            .field("batches", &self.batches)
            .finish()
    }
}
