// ABOUTME: Step outcome types and the workflow report produced by a run
// ABOUTME: Records per-step status and timing, the failing step and the rollback sweep

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use super::error::WorkflowError;
use crate::steps::StepError;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    RolledBack,
    RollbackFailed,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub step: String,
    pub status: StepStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: Option<Duration>,
    /// Number of node invocations, 1 for cluster-wide steps
    pub invocations: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    /// A step failed and every completed step was rolled back
    RolledBack,
    /// A step failed and at least one rollback failed too
    RollbackFailed,
}

/// The step that stopped the run
#[derive(Debug)]
pub struct StepFailure {
    pub step: String,
    pub error: StepError,
}

#[derive(Debug)]
pub struct WorkflowReport {
    pub run_id: String,
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub steps: Vec<StepOutcome>,
    pub failure: Option<StepFailure>,
    /// Steps rolled back, in the order their rollback ran
    pub rolled_back: Vec<String>,
    pub rollback_errors: Vec<StepError>,
}

impl StepOutcome {
    pub fn new(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            status: StepStatus::Pending,
            start_time: None,
            end_time: None,
            duration: None,
            invocations: 0,
            error: None,
        }
    }

    pub fn mark_started(&mut self, invocations: usize) {
        self.status = StepStatus::Running;
        self.start_time = Some(Utc::now());
        self.invocations = invocations;
    }

    pub fn mark_completed(&mut self, status: StepStatus, error: Option<String>) {
        let now = Utc::now();
        self.status = status;
        self.end_time = Some(now);
        self.duration = self
            .start_time
            .map(|start| (now - start).to_std().unwrap_or(Duration::ZERO));
        self.error = error;
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self.status, StepStatus::Pending | StepStatus::Running)
    }
}

impl WorkflowReport {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            status: RunStatus::Succeeded,
            start_time: Utc::now(),
            end_time: None,
            steps: Vec::new(),
            failure: None,
            rolled_back: Vec::new(),
            rollback_errors: Vec::new(),
        }
    }

    pub fn outcome(&self, step: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|o| o.step == step)
    }

    pub(crate) fn outcome_mut(&mut self, step: &str) -> Option<&mut StepOutcome> {
        self.steps.iter_mut().find(|o| o.step == step)
    }

    /// Steps that completed, in completion order
    pub fn completed(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|o| {
                matches!(
                    o.status,
                    StepStatus::Completed | StepStatus::RolledBack | StepStatus::RollbackFailed
                )
            })
            .map(|o| o.step.as_str())
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    pub(crate) fn finish(&mut self) {
        self.end_time = Some(Utc::now());
        self.status = match (&self.failure, self.rollback_errors.is_empty()) {
            (None, _) => RunStatus::Succeeded,
            (Some(_), true) => RunStatus::RolledBack,
            (Some(_), false) => RunStatus::RollbackFailed,
        };
    }

    /// Turn a failed run into an error naming the failing step
    pub fn into_result(self) -> Result<(), WorkflowError> {
        match self.failure {
            None => Ok(()),
            Some(failure) => Err(WorkflowError::StepFailed {
                step: failure.step,
                source: failure.error,
                rollback_errors: self.rollback_errors,
            }),
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Running => write!(f, "running"),
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Failed => write!(f, "failed"),
            StepStatus::Cancelled => write!(f, "cancelled"),
            StepStatus::RolledBack => write!(f, "rolled_back"),
            StepStatus::RollbackFailed => write!(f, "rollback_failed"),
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Succeeded => write!(f, "succeeded"),
            RunStatus::RolledBack => write!(f, "rolled_back"),
            RunStatus::RollbackFailed => write!(f, "rollback_failed"),
        }
    }
}
