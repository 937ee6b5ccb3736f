//! CLI module for netfw
//!
//! This module provides the command-line interface for netfw,
//! including argument parsing and subcommand dispatch.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// netfw - Declarative network-firewall rule groups
///
/// Plans and applies rule group manifests against a firewall service,
/// tracking what it manages in a local state file.
#[derive(Parser, Debug, Clone)]
#[command(name = "netfw")]
#[command(author = "Netfw Contributors")]
#[command(version)]
#[command(about = "Declarative management of network-firewall rule groups", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Template variables for manifests (key=value or @file.yml)
    #[arg(short = 'e', long = "var", global = true, action = clap::ArgAction::Append)]
    pub vars: Vec<String>,

    /// Verbosity level (-v, -vv, -vvv, -vvvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Log format
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true, env = "NETFW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the state file
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// Service endpoint URL, or memory:// for the in-process service
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Region of the firewall service
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output for scripting
    Json,
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Check a manifest without contacting the service
    Validate(commands::validate::ValidateArgs),

    /// Show what applying a manifest would change
    Plan(commands::plan::PlanArgs),

    /// Apply a manifest
    Apply(commands::apply::ApplyArgs),

    /// Delete managed rule groups
    Destroy(commands::destroy::DestroyArgs),

    /// Bring an existing rule group under management
    Import(commands::import::ImportArgs),

    /// Show managed rule groups from state
    Show(commands::show::ShowArgs),

    /// Delete leftover rule groups by name prefix
    Sweep(commands::sweep::SweepArgs),
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-4)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(4)
    }

    /// Check if JSON output is requested
    pub fn is_json(&self) -> bool {
        matches!(self.output, OutputFormat::Json)
    }
}
