// ABOUTME: Workflow engine for provisioning runs
// ABOUTME: Handles dependency planning, per-node fan-out, execution and rollback

pub mod dependency;
pub mod error;
pub mod executor;
pub mod result;
pub mod scheduler;

pub use dependency::{DependencyGraph, ExecutionPlan};
pub use error::{ConfigurationError, Result, WorkflowError};
pub use executor::{EngineSettings, WorkflowEngine};
pub use result::{RunStatus, StepFailure, StepOutcome, StepStatus, WorkflowReport};
pub use scheduler::{FanOut, NodeScheduler, Phase};
