// ABOUTME: Runner that executes rendered scripts on the local host
// ABOUTME: Writes the script to a temporary file and runs it with the configured shell

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::Result;
use super::process::run_streaming;
use super::{Command, Runner};

#[derive(Debug, Clone)]
pub struct LocalRunner {
    shell: String,
    working_dir: Option<PathBuf>,
    env: HashMap<String, String>,
}

impl Default for LocalRunner {
    fn default() -> Self {
        Self {
            shell: "/bin/bash".to_string(),
            working_dir: None,
            env: HashMap::new(),
        }
    }
}

impl LocalRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    fn write_script(&self, script: &str) -> std::io::Result<NamedTempFile> {
        let mut temp_file = NamedTempFile::new()?;
        temp_file.write_all(script.as_bytes())?;
        temp_file.flush()?;

        let mut perms = temp_file.as_file().metadata()?.permissions();
        perms.set_mode(0o700);
        temp_file.as_file().set_permissions(perms)?;

        Ok(temp_file)
    }
}

#[async_trait]
impl Runner for LocalRunner {
    async fn run(&self, cancel: &CancellationToken, command: Command) -> Result<()> {
        if let Some(ref host) = command.host {
            debug!("Local runner ignores target host {}", host);
        }

        // Dropping the temp file removes it, so it must outlive the process
        let script_file = self.write_script(&command.script)?;

        debug!(
            "Executing {} byte script with {}",
            command.script.len(),
            self.shell
        );

        let mut cmd = tokio::process::Command::new(&self.shell);
        cmd.arg(script_file.path());
        cmd.envs(&self.env);
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }

        run_streaming(cmd, None, cancel, &command.out).await
    }
}
