// ABOUTME: Common utilities and helpers for integration tests
// ABOUTME: Provides fake runners, journaling steps and template fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use provisioner::context::{Config, Node, Role};
use provisioner::runner::{Command, OutputSink, Runner, RunnerError};
use provisioner::steps::{Step, StepError, StepTarget};
use provisioner::template::TemplateStore;

/// Directory holding the shipped script templates
pub fn templates_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("templates")
}

pub fn loaded_store() -> TemplateStore {
    let store = TemplateStore::new();
    store.init(templates_dir()).unwrap();
    store
}

/// Runner that copies the script to the output, or fails with a fixed message
#[derive(Default)]
pub struct FakeRunner {
    err_msg: Option<String>,
}

impl FakeRunner {
    pub fn echo() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self {
            err_msg: Some(message.to_string()),
        }
    }
}

#[async_trait]
impl Runner for FakeRunner {
    async fn run(&self, _cancel: &CancellationToken, command: Command) -> Result<(), RunnerError> {
        if let Some(ref message) = self.err_msg {
            return Err(RunnerError::Failed(message.clone()));
        }

        for line in command.script.lines() {
            command.out.write_line(line)?;
        }
        Ok(())
    }
}

/// Runner that records the target host of every command
#[derive(Default)]
pub struct RecordingRunner {
    pub hosts: Mutex<Vec<Option<String>>>,
    fail_host: Option<String>,
}

impl RecordingRunner {
    pub fn failing_on(host: &str) -> Self {
        Self {
            hosts: Mutex::new(Vec::new()),
            fail_host: Some(host.to_string()),
        }
    }

    pub fn hosts(&self) -> Vec<Option<String>> {
        self.hosts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Runner for RecordingRunner {
    async fn run(&self, _cancel: &CancellationToken, command: Command) -> Result<(), RunnerError> {
        self.hosts.lock().unwrap().push(command.host.clone());

        match (&self.fail_host, &command.host) {
            (Some(fail), Some(host)) if fail == host => Err(RunnerError::Failed(format!(
                "{} is unreachable",
                host
            ))),
            _ => Ok(()),
        }
    }
}

pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

/// Step that writes `run:<name>` and `rollback:<name>` entries to a shared journal
pub struct JournalStep {
    name: String,
    depends: Vec<String>,
    target: StepTarget,
    journal: Journal,
    fail_run: bool,
    fail_rollback: bool,
    discovers: Vec<Node>,
}

impl JournalStep {
    pub fn new(name: &str, depends: &[&str], journal: &Journal) -> Self {
        Self {
            name: name.to_string(),
            depends: depends.iter().map(|d| d.to_string()).collect(),
            target: StepTarget::Cluster,
            journal: Arc::clone(journal),
            fail_run: false,
            fail_rollback: false,
            discovers: Vec::new(),
        }
    }

    /// Add `node` to the context's inventory when the step runs
    pub fn discovering(mut self, node: Node) -> Self {
        self.discovers.push(node);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_run = true;
        self
    }

    pub fn failing_rollback(mut self) -> Self {
        self.fail_rollback = true;
        self
    }

    pub fn on(mut self, target: StepTarget) -> Self {
        self.target = target;
        self
    }

    fn record(&self, entry: String) {
        self.journal.lock().unwrap().push(entry);
    }

    fn failure(&self, what: &str) -> StepError {
        StepError::Execution {
            step: self.name.clone(),
            source: RunnerError::Failed(format!("{} {} failed", self.name, what)),
        }
    }
}

#[async_trait]
impl Step for JournalStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "journal step"
    }

    fn depends(&self) -> Vec<String> {
        self.depends.clone()
    }

    fn target(&self) -> StepTarget {
        self.target
    }

    async fn run(
        &self,
        _cancel: &CancellationToken,
        _out: &OutputSink,
        config: &mut Config,
    ) -> Result<(), StepError> {
        match config.node {
            Some(ref node) => self.record(format!("run:{}@{}", self.name, node.private_ip)),
            None => self.record(format!("run:{}", self.name)),
        }

        if self.fail_run {
            return Err(self.failure("run"));
        }
        for node in &self.discovers {
            match node.role {
                Role::Master => config.add_master(node.clone()),
                Role::Worker => config.add_worker(node.clone()),
            }
        }
        Ok(())
    }

    async fn rollback(
        &self,
        _cancel: &CancellationToken,
        _out: &OutputSink,
        _config: &mut Config,
    ) -> Result<(), StepError> {
        self.record(format!("rollback:{}", self.name));

        if self.fail_rollback {
            return Err(self.failure("rollback"));
        }
        Ok(())
    }
}
