// ABOUTME: Command execution backends for rendered provisioning scripts
// ABOUTME: One streaming, cancellable contract shared by local and remote runners

pub mod error;
pub mod local;
mod process;
pub mod sink;
pub mod ssh;

use async_trait::async_trait;
use std::fmt;
use tokio_util::sync::CancellationToken;

pub use error::{Result, RunnerError};
pub use local::LocalRunner;
pub use sink::{CaptureBuffer, OutputSink};
pub use ssh::SshRunner;

/// Executes a rendered script.
///
/// Implementations stream every line of output to `command.out` while the
/// script runs, stop promptly once `cancel` fires, and must be usable from
/// several concurrent fan-out invocations at once.
#[async_trait]
pub trait Runner: Send + Sync {
    async fn run(&self, cancel: &CancellationToken, command: Command) -> Result<()>;
}

/// A rendered script plus where its output goes
#[derive(Clone)]
pub struct Command {
    pub script: String,
    pub out: OutputSink,
    /// Address of the node this invocation targets, if any
    pub host: Option<String>,
}

impl Command {
    pub fn new(script: impl Into<String>, out: OutputSink) -> Self {
        Self {
            script: script.into(),
            out,
            host: None,
        }
    }

    pub fn on_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("script_len", &self.script.len())
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}
