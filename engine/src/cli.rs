//! CLI interface for devagent
//!
//! Command-line interface built with clap's derive API.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::BoundKind;

/// Devagent: TDD workflow orchestrator
///
/// Drives remote specialist agents (implement, review, fix) through a
/// language-model planner and publishes the result as a git branch.
#[derive(Parser, Debug)]
#[command(name = "devagent")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the TDD workflow for a task
    Run(RunArgs),

    /// Print the tool schema offered to the Brain
    Tools,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments of `devagent run`
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Task description (read from stdin when omitted)
    #[arg(long)]
    pub task: Option<String>,

    /// Branch the first agent run starts from
    #[arg(long, value_name = "BRANCH_ID")]
    pub parent_branch_id: String,

    /// Remote project name (overrides PROJECT_NAME)
    #[arg(long, value_name = "NAME")]
    pub project_name: Option<String>,

    /// Override the iteration bound
    #[arg(long, value_name = "N")]
    pub max_iterations: Option<usize>,

    /// What the iteration bound counts
    #[arg(long, value_enum)]
    pub bound: Option<BoundArg>,
}

/// Bound strategy as accepted on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundArg {
    Iterations,
    ReviewCycles,
}

impl From<BoundArg> for BoundKind {
    fn from(arg: BoundArg) -> Self {
        match arg {
            BoundArg::Iterations => BoundKind::Iterations,
            BoundArg::ReviewCycles => BoundKind::ReviewCycles,
        }
    }
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration (secrets excluded)
    Show,

    /// Print the configuration file path
    Path,
}
