//! faascheck binary entry point

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use faascheck_cli::cli::{Cli, Commands};
use faascheck_cli::commands;
use faascheck_cli::error::CliError;
use faascheck_cli::logging;
use faascheck_cli::output::OutputWriter;
use faascheck_core::config::{FaascheckConfig, GeneralConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging needs [general] before any command runs. An unreadable config
    // falls back to defaults here and is reported by the command itself.
    let mut general = FaascheckConfig::load_or_default(cli.config.as_deref())
        .await
        .map(|config| config.general)
        .unwrap_or_else(|_| GeneralConfig::default());
    if let Some(level) = &cli.log_level {
        general.log_level = level.clone();
    }
    logging::init_tracing(&general)?;
    faascheck_core::metrics::describe_all();

    let writer = OutputWriter::new(cli.output);
    let config_path = cli.config.as_deref();

    let result: Result<(), CliError> = match cli.command {
        Commands::Run(args) => commands::run::execute(args, config_path, &writer).await,
        Commands::List => commands::list::execute(&writer),
        Commands::Config(args) => commands::config::execute(args, config_path, &writer).await,
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, exit_code = e.exit_code(), "command finished with error");
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(e.exit_code());
    }

    Ok(())
}
