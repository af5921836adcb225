// ABOUTME: Runner that executes rendered scripts on remote nodes over ssh
// ABOUTME: Pipes the script into a remote bash through the system ssh client

use async_trait::async_trait;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::{Result, RunnerError};
use super::process::run_streaming;
use super::{Command, Runner};

/// Exit status the ssh client uses for its own failures
const SSH_TRANSPORT_FAILURE: i32 = 255;

#[derive(Debug, Clone)]
pub struct SshRunner {
    user: String,
    port: u16,
    identity_file: Option<PathBuf>,
    options: Vec<String>,
    default_host: Option<String>,
    ssh_binary: String,
}

impl Default for SshRunner {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            port: 22,
            identity_file: None,
            options: Vec::new(),
            default_host: None,
            ssh_binary: "ssh".to_string(),
        }
    }
}

impl SshRunner {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_identity_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity_file = Some(path.into());
        self
    }

    /// Extra `-o` option, e.g. `StrictHostKeyChecking=no`
    pub fn with_option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    /// Host used when a command carries no target of its own
    pub fn with_default_host(mut self, host: impl Into<String>) -> Self {
        self.default_host = Some(host.into());
        self
    }

    pub fn with_ssh_binary(mut self, binary: impl Into<String>) -> Self {
        self.ssh_binary = binary.into();
        self
    }

    pub(crate) fn build_command(&self, host: &str) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.ssh_binary);
        cmd.arg("-o").arg("BatchMode=yes");
        cmd.arg("-p").arg(self.port.to_string());

        if let Some(ref key) = self.identity_file {
            cmd.arg("-i").arg(key);
        }
        for option in &self.options {
            cmd.arg("-o").arg(option);
        }

        cmd.arg(format!("{}@{}", self.user, host));
        cmd.arg("bash").arg("-s");
        cmd
    }
}

#[async_trait]
impl Runner for SshRunner {
    async fn run(&self, cancel: &CancellationToken, command: Command) -> Result<()> {
        let host = command
            .host
            .clone()
            .or_else(|| self.default_host.clone())
            .ok_or(RunnerError::NoTarget)?;

        debug!("Executing script on {}@{}:{}", self.user, host, self.port);

        let cmd = self.build_command(&host);
        match run_streaming(cmd, Some(command.script), cancel, &command.out).await {
            Err(RunnerError::ExitStatus { code, stderr }) if code == SSH_TRANSPORT_FAILURE => {
                Err(RunnerError::Transport {
                    host,
                    message: stderr,
                })
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{CaptureBuffer, OutputSink};

    fn args(cmd: &tokio::process::Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_build_command_defaults() {
        let runner = SshRunner::new("admin");
        let cmd = runner.build_command("10.0.0.5");

        assert_eq!(cmd.as_std().get_program(), "ssh");
        assert_eq!(
            args(&cmd),
            vec!["-o", "BatchMode=yes", "-p", "22", "admin@10.0.0.5", "bash", "-s"]
        );
    }

    #[test]
    fn test_build_command_with_identity_and_options() {
        let runner = SshRunner::new("root")
            .with_port(2222)
            .with_identity_file("/keys/cluster")
            .with_option("StrictHostKeyChecking=no");
        let cmd = runner.build_command("node-1");

        assert_eq!(
            args(&cmd),
            vec![
                "-o",
                "BatchMode=yes",
                "-p",
                "2222",
                "-i",
                "/keys/cluster",
                "-o",
                "StrictHostKeyChecking=no",
                "root@node-1",
                "bash",
                "-s",
            ]
        );
    }

    #[tokio::test]
    async fn test_no_target_host() {
        let runner = SshRunner::default();
        let err = runner
            .run(
                &CancellationToken::new(),
                Command::new("echo hi", OutputSink::discard()),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RunnerError::NoTarget));
    }

    /// Write an executable stand-in for the ssh client that ignores its arguments
    fn fake_ssh(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("fake-ssh");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_script_is_piped_to_remote_shell() {
        let dir = tempfile::TempDir::new().unwrap();
        let binary = fake_ssh(&dir, "exec /bin/sh -s");
        let buffer = CaptureBuffer::new();

        let runner = SshRunner::default().with_ssh_binary(binary.to_string_lossy());
        let command = Command::new("echo from-stdin\n", buffer.sink()).on_host("10.0.0.7");
        runner.run(&CancellationToken::new(), command).await.unwrap();

        assert!(buffer.contents().contains("from-stdin"));
    }

    #[tokio::test]
    async fn test_exit_255_is_a_transport_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let binary = fake_ssh(&dir, "echo 'Connection refused' >&2\nexit 255");

        let runner = SshRunner::default()
            .with_ssh_binary(binary.to_string_lossy())
            .with_default_host("10.0.0.9");
        let err = runner
            .run(
                &CancellationToken::new(),
                Command::new("echo hi\n", OutputSink::discard()),
            )
            .await
            .unwrap_err();

        match err {
            RunnerError::Transport { host, message } => {
                assert_eq!(host, "10.0.0.9");
                assert!(message.contains("Connection refused"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_remote_script_failure_keeps_exit_status() {
        let dir = tempfile::TempDir::new().unwrap();
        let binary = fake_ssh(&dir, "exec /bin/sh -s");

        let runner = SshRunner::default().with_ssh_binary(binary.to_string_lossy());
        let command = Command::new("exit 4\n", OutputSink::discard()).on_host("node-2");
        let err = runner.run(&CancellationToken::new(), command).await.unwrap_err();

        assert!(matches!(err, RunnerError::ExitStatus { code: 4, .. }));
    }
}
