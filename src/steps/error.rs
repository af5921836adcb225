// ABOUTME: Error type for a single step's run or rollback
// ABOUTME: Every variant names the step it came from

use std::time::Duration;
use thiserror::Error;

use super::StepTarget;
use crate::context::ContextError;
use crate::runner::RunnerError;
use crate::template::TemplateError;

#[derive(Error, Debug)]
pub enum StepError {
    #[error("Step '{step}' could not render its script: {source}")]
    Render {
        step: String,
        source: TemplateError,
    },

    #[error("Step '{step}' failed: {source}")]
    Execution {
        step: String,
        source: RunnerError,
    },

    #[error("Step '{step}' is missing configuration: {source}")]
    MissingConfig {
        step: String,
        source: ContextError,
    },

    #[error("Step '{step}' has no runner to execute with")]
    NoRunner { step: String },

    #[error("Step '{step}' was cancelled")]
    Cancelled { step: String },

    #[error("Step '{step}' timed out after {after:?}")]
    Timeout { step: String, after: Duration },

    #[error("Step '{step}' has no {target} to run on")]
    NoTargets { step: String, target: StepTarget },
}

impl StepError {
    /// Wrap a runner failure, keeping cancellation distinguishable
    pub fn from_runner(step: &str, source: RunnerError) -> Self {
        match source {
            RunnerError::Cancelled => StepError::Cancelled {
                step: step.to_string(),
            },
            source => StepError::Execution {
                step: step.to_string(),
                source,
            },
        }
    }

    pub fn step(&self) -> &str {
        match self {
            StepError::Render { step, .. }
            | StepError::Execution { step, .. }
            | StepError::MissingConfig { step, .. }
            | StepError::NoRunner { step }
            | StepError::Cancelled { step }
            | StepError::Timeout { step, .. }
            | StepError::NoTargets { step, .. } => step,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, StepError::Cancelled { .. })
    }
}

pub type Result<T> = std::result::Result<T, StepError>;
