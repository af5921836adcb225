// ABOUTME: Settings for the provisioner binary
// ABOUTME: Loaded from a YAML file and overlaid with PROVISIONER_* environment variables

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::context::{Config, DockerConfig, Node, Profile, PrometheusConfig};
use crate::engine::EngineSettings;
use crate::runner::SshRunner;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub templates_dir: PathBuf,
    pub cluster_name: String,
    pub logging: LoggingConfig,
    pub engine: EngineConfig,
    pub ssh: SshConfig,
    pub profile: Profile,
    pub masters: Vec<NodeConfig>,
    pub workers: Vec<NodeConfig>,
    pub prometheus: Option<PrometheusConfig>,
    pub docker: Option<DockerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_parallel_nodes: usize,
    pub step_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    pub user: String,
    pub port: u16,
    pub identity_file: Option<PathBuf>,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: String,
    pub private_ip: String,
    #[serde(default)]
    pub public_ip: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            templates_dir: PathBuf::from("templates"),
            cluster_name: "default".to_string(),
            logging: LoggingConfig::default(),
            engine: EngineConfig::default(),
            ssh: SshConfig::default(),
            profile: Profile::default(),
            masters: Vec::new(),
            workers: Vec::new(),
            prometheus: None,
            docker: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let defaults = EngineSettings::default();
        Self {
            max_parallel_nodes: defaults.max_parallel_nodes,
            step_timeout_secs: defaults.step_timeout.map(|d| d.as_secs()),
        }
    }
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            port: 22,
            identity_file: None,
            options: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from a file path or default locations
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) if !p.exists() => {
                anyhow::bail!("Settings file {} does not exist", p.display())
            }
            Some(p) => p,
            None => Self::find_config_file(),
        };

        let mut settings = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            serde_yaml::from_str(&contents)
                .with_context(|| format!("Invalid settings in {}", config_path.display()))?
        } else {
            Settings::default()
        };

        settings.merge_env()?;
        Ok(settings)
    }

    /// Find a settings file in standard locations
    fn find_config_file() -> PathBuf {
        let possible_paths = [
            PathBuf::from("provisioner.yaml"),
            PathBuf::from(".provisioner.yaml"),
        ];

        for path in possible_paths {
            if path.exists() {
                return path;
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_config = home_dir.join(".provisioner").join("config.yaml");
            if home_config.exists() {
                return home_config;
            }
        }

        // May not exist
        PathBuf::from("provisioner.yaml")
    }

    fn merge_env(&mut self) -> Result<()> {
        self.apply_env(|key| std::env::var(key).ok())
    }

    /// Overlay values from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("PROVISIONER_TEMPLATES_DIR") {
            self.templates_dir = PathBuf::from(dir);
        }
        if let Some(level) = lookup("PROVISIONER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("PROVISIONER_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Some(max) = lookup("PROVISIONER_MAX_PARALLEL") {
            self.engine.max_parallel_nodes = max
                .parse()
                .context("PROVISIONER_MAX_PARALLEL must be a number")?;
        }
        if let Some(secs) = lookup("PROVISIONER_STEP_TIMEOUT") {
            self.engine.step_timeout_secs = Some(
                secs.parse()
                    .context("PROVISIONER_STEP_TIMEOUT must be a number of seconds")?,
            );
        }
        if let Some(user) = lookup("PROVISIONER_SSH_USER") {
            self.ssh.user = user;
        }

        Ok(())
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            max_parallel_nodes: self.engine.max_parallel_nodes,
            step_timeout: self.engine.step_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn ssh_runner(&self) -> SshRunner {
        let mut runner = SshRunner::new(&self.ssh.user).with_port(self.ssh.port);
        if let Some(ref key) = self.ssh.identity_file {
            runner = runner.with_identity_file(key);
        }
        for option in &self.ssh.options {
            runner = runner.with_option(option);
        }
        runner
    }

    /// Build the execution context for one run, without a runner
    pub fn build_context(&self, run_id: impl Into<String>) -> Result<Config> {
        let mut config = Config::new(&self.cluster_name, run_id, self.profile.clone());

        for node in &self.masters {
            config.add_master(node.to_node(Node::master));
        }
        for node in &self.workers {
            config.add_worker(node.to_node(Node::worker));
        }

        if let Some(ref prometheus) = self.prometheus {
            config.insert_block(prometheus.clone())?;
        }
        if let Some(ref docker) = self.docker {
            config.insert_block(docker.clone())?;
        }

        Ok(config)
    }
}

impl NodeConfig {
    fn to_node(&self, build: fn(String, String) -> Node) -> Node {
        let node = build(self.id.clone(), self.private_ip.clone());
        match self.public_ip {
            Some(ref public_ip) => node.with_public_ip(public_ip),
            None => node,
        }
    }
}
