// ABOUTME: Per-node fan-out of a step with a bound on concurrent invocations
// ABOUTME: One failing node cancels its siblings so a step succeeds on all nodes or fails

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, error, info};

use crate::context::{Config, Node};
use crate::runner::{OutputSink, RunnerError};
use crate::steps::{Step, StepError};

/// Which side of a step is being invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Run,
    Rollback,
}

pub struct NodeScheduler {
    max_parallel: usize,
    semaphore: Arc<Semaphore>,
}

impl NodeScheduler {
    pub fn new(max_parallel: usize) -> Self {
        let max_parallel = max_parallel.max(1);
        Self {
            max_parallel,
            semaphore: Arc::new(Semaphore::new(max_parallel)),
        }
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Invoke `step` once per node, each on its own snapshot of `base`.
    ///
    /// During `Phase::Run` the first node to fail cancels the remaining
    /// invocations. Rollback invocations are independent of each other. Every
    /// invocation is awaited before returning. Dropping the returned future
    /// aborts the invocations still in flight.
    pub async fn run_on_nodes(
        &self,
        step: Arc<dyn Step>,
        nodes: Vec<Node>,
        phase: Phase,
        cancel: &CancellationToken,
        out: &OutputSink,
        base: &Config,
    ) -> FanOut {
        info!(
            "Fanning out step '{}' to {} nodes ({:?})",
            step.name(),
            nodes.len(),
            phase
        );

        let group = cancel.child_token();
        let handles: Vec<_> = nodes
            .iter()
            .map(|node| {
                let semaphore = Arc::clone(&self.semaphore);
                let step = Arc::clone(&step);
                let group = group.clone();
                let out = out.clone();
                let node = node.clone();
                let mut config = base.for_node(&node);

                AbortOnDropHandle::new(tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.map_err(|_| StepError::Cancelled {
                        step: step.name().to_string(),
                    })?;

                    if group.is_cancelled() {
                        return Err(StepError::Cancelled {
                            step: step.name().to_string(),
                        });
                    }

                    debug!("Invoking step '{}' on node {}", step.name(), node.id);
                    let result = match phase {
                        Phase::Run => step.run(&group, &out, &mut config).await,
                        Phase::Rollback => step.rollback(&group, &out, &mut config).await,
                    };

                    if let Err(ref e) = result {
                        error!("Step '{}' failed on node {}: {}", step.name(), node.id, e);
                        if phase == Phase::Run && !e.is_cancelled() {
                            group.cancel();
                        }
                    }
                    result
                }))
            })
            .collect();

        let results = join_all(handles).await;

        let results = nodes
            .into_iter()
            .zip(results)
            .map(|(node, result)| {
                let result = result.unwrap_or_else(|join_error| {
                    Err(StepError::Execution {
                        step: step.name().to_string(),
                        source: RunnerError::Join(join_error),
                    })
                });
                (node, result)
            })
            .collect();

        FanOut { results }
    }
}

/// Per-node results of one fan-out, in node order
#[derive(Debug)]
pub struct FanOut {
    pub results: Vec<(Node, Result<(), StepError>)>,
}

impl FanOut {
    /// The first error in node order that is not a cancellation, falling back
    /// to the first cancellation
    pub fn into_result(self) -> Result<(), StepError> {
        let mut first_error: Option<StepError> = None;
        for (_, result) in self.results {
            let Err(error) = result else {
                continue;
            };

            match first_error {
                None => first_error = Some(error),
                Some(ref current) if current.is_cancelled() && !error.is_cancelled() => {
                    first_error = Some(error)
                }
                Some(_) => {}
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
