// ABOUTME: Error types for script execution backends
// ABOUTME: Distinguishes spawn, exit status, transport and cancellation failures

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("failed to start process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("I/O error while streaming output: {0}")]
    Io(#[from] std::io::Error),

    #[error("script exited with status {code}: {stderr}")]
    ExitStatus { code: i32, stderr: String },

    #[error("transport to {host} failed: {message}")]
    Transport { host: String, message: String },

    #[error("no target host for remote command")]
    NoTarget,

    #[error("execution cancelled")]
    Cancelled,

    #[error("execution failed: {0}")]
    Failed(String),

    #[error("output forwarding task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, RunnerError>;
