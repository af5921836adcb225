// ABOUTME: Error types for step catalog setup, planning and workflow execution
// ABOUTME: Separates fatal configuration problems from failures of a running workflow

use thiserror::Error;

use crate::steps::StepError;

/// Fatal setup or planning problem.
///
/// Raised while building the step catalog or planning a run, before any step
/// executes. Startup should abort on it.
#[must_use]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Step '{name}' is already registered")]
    DuplicateStep { name: String },

    #[error("Template for step '{step}' is not loaded")]
    MissingTemplate { step: String },

    #[error("Unknown step: {name}")]
    UnknownStep { name: String },

    #[error("Step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("Step '{step}' depends on itself")]
    SelfDependency { step: String },

    #[error("Circular dependency detected: {}", .steps.join(" -> "))]
    CircularDependency { steps: Vec<String> },

    #[error("Step '{step}' requires configuration block '{kind}'")]
    MissingConfig { step: String, kind: &'static str },

    #[error("No runner configured for this run")]
    MissingRunner,
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Step '{step}' failed: {source}{}", describe_rollback(.rollback_errors))]
    StepFailed {
        step: String,
        source: StepError,
        rollback_errors: Vec<StepError>,
    },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

fn describe_rollback(errors: &[StepError]) -> String {
    if errors.is_empty() {
        return String::new();
    }

    let details: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    format!("; rollback failed: {}", details.join("; "))
}

pub type Result<T> = std::result::Result<T, ConfigurationError>;
