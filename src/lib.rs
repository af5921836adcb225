// ABOUTME: Main library module for the provisioner step execution core
// ABOUTME: Exports templates, runners, the execution context, steps and the workflow engine

pub mod cli;
pub mod context;
pub mod engine;
pub mod runner;
pub mod steps;
pub mod template;

// Re-export commonly used types
pub use context::{Config, Node, Profile};
pub use engine::{ConfigurationError, WorkflowEngine, WorkflowError, WorkflowReport};
pub use runner::{Runner, RunnerError};
pub use steps::{Step, StepError, StepRegistry};
pub use template::TemplateStore;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
