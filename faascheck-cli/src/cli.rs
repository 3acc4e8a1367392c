//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// faascheck -- verification harness for the chatroom FaaS gateway.
///
/// Use `faascheck <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "faascheck", version, about, long_about = None)]
pub struct Cli {
    /// Path to the faascheck.toml configuration file (defaults + env when omitted).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run scenario suites against the gateway.
    Run(RunArgs),

    /// List the available suites and fault classes.
    List,

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- run ----

/// Run scenario suites and write the report.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Suites to run, comma separated (default: every gateway suite).
    /// `faults` selects the fault-injection suite.
    #[arg(short, long, value_delimiter = ',')]
    pub suites: Vec<String>,

    /// Gateway base URL (overrides `target.base_url`).
    #[arg(long)]
    pub base_url: Option<String>,

    /// Deployment backends to exercise, comma separated (docker, kube).
    #[arg(long, value_delimiter = ',')]
    pub backends: Vec<String>,

    /// Enable fault injection (same as `chaos.enabled = true`).
    #[arg(long)]
    pub chaos: bool,

    /// Orchestration backend for fault injection (kube, docker).
    #[arg(long)]
    pub chaos_backend: Option<String>,

    /// Fault classes to inject, comma separated (default: all).
    #[arg(long, value_delimiter = ',')]
    pub faults: Vec<String>,

    /// Directory for report.json and summary.txt.
    #[arg(long)]
    pub report_dir: Option<PathBuf>,
}

// ---- config ----

/// Manage faascheck configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, target, poller, load, chaos).
        #[arg(long)]
        section: Option<String>,
    },
}
