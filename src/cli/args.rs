// ABOUTME: Command line argument definitions and parsing using Clap
// ABOUTME: Defines the provisioner CLI structure and its subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "provisioner")]
#[command(about = "Runs dependency-ordered provisioning steps against cluster nodes")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Path to settings file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Directory containing *.tpl script templates")]
    pub templates_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the registered steps
    Steps,

    /// Print the execution order for the requested steps
    Plan {
        #[arg(required = true, help = "Steps to run, dependencies are added automatically")]
        steps: Vec<String>,
    },

    /// Run the requested steps
    Run {
        #[arg(required = true, help = "Steps to run, dependencies are added automatically")]
        steps: Vec<String>,

        #[arg(long, help = "Execute scripts on this host instead of over ssh")]
        local: bool,

        #[arg(long, help = "Maximum number of nodes a step runs on at once")]
        max_parallel: Option<usize>,

        #[arg(long, help = "Identifier for this run (generated when omitted)")]
        run_id: Option<String>,
    },
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
