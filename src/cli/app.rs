// ABOUTME: Main application orchestration for the provisioner CLI
// ABOUTME: Initializes logging, loads templates, registers steps and dispatches commands

use anyhow::{Context, Result};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use super::commands;
use super::{Args, Commands, Settings};
use crate::engine::WorkflowEngine;
use crate::steps::{self, StepRegistry};
use crate::template::TemplateStore;

pub struct App {
    settings: Settings,
}

/// Log line layout, `pretty` unless the settings ask for `compact`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Compact,
}

impl LogFormat {
    fn from_setting(format: &str) -> Self {
        if format.eq_ignore_ascii_case("compact") {
            LogFormat::Compact
        } else {
            LogFormat::Pretty
        }
    }
}

impl App {
    /// Create a new application instance
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Initialize logging based on settings
    pub fn init_logging(&self, verbose: bool, no_color: bool) -> Result<()> {
        let log_level = if verbose {
            "debug"
        } else {
            &self.settings.logging.level
        };

        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        let builder = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_ansi(!no_color)
            .with_target(false)
            .with_writer(std::io::stderr);

        match LogFormat::from_setting(&self.settings.logging.format) {
            LogFormat::Compact => builder.compact().init(),
            LogFormat::Pretty => builder.pretty().init(),
        }

        debug!("Logging initialized with level: {}", log_level);
        Ok(())
    }

    /// Load templates and register the built-in step catalog
    pub fn build_engine(&self) -> Result<WorkflowEngine> {
        let store = TemplateStore::new();
        store
            .init(&self.settings.templates_dir)
            .with_context(|| {
                format!(
                    "Failed to load templates from {}",
                    self.settings.templates_dir.display()
                )
            })?;

        let mut registry = StepRegistry::new();
        steps::register_all(&mut registry, &store)?;
        debug!("Registered steps: {:?}", registry.names());

        Ok(WorkflowEngine::with_settings(
            registry,
            self.settings.engine_settings(),
        ))
    }

    /// Run the application with parsed arguments
    pub async fn run(&mut self, args: Args) -> Result<()> {
        self.init_logging(args.verbose, args.no_color)?;

        info!("Starting provisioner v{}", env!("CARGO_PKG_VERSION"));
        debug!("Settings loaded from: {:?}", args.config);

        if let Some(dir) = args.templates_dir {
            self.settings.templates_dir = dir;
        }
        if let Commands::Run {
            max_parallel: Some(max),
            ..
        } = &args.command
        {
            self.settings.engine.max_parallel_nodes = *max;
        }

        let engine = self.build_engine()?;

        match args.command {
            Commands::Steps => commands::list_steps(&engine),
            Commands::Plan { steps } => commands::print_plan(&engine, &steps),
            Commands::Run {
                steps,
                local,
                run_id,
                ..
            } => commands::run_steps(&engine, &self.settings, &steps, local, run_id).await,
        }
    }

    /// Create application from command line arguments
    pub fn from_args(args: &Args) -> Result<Self> {
        let settings = Settings::load(args.config.clone())?;
        Ok(Self::new(settings))
    }
}
