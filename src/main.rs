//! deplumi - function bundle builder
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use deplumi::cli::{Cli, Commands};
use deplumi::config::ConfigManager;
use deplumi::error::DeplumiResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            } else if e.is_retryable() {
                eprintln!("{} {}", style("Hint:").yellow(), "This may be transient; rerun the command");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> DeplumiResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config.general.log_format);

    match cli.command {
        Commands::Build(args) => deplumi::cli::commands::build(args, &config).await,
        Commands::Cache(args) => deplumi::cli::commands::cache(args, &config).await,
        Commands::Config(args) => deplumi::cli::commands::config(args, &config, &config_manager).await,
    }
}

/// 0 = warn, 1 = info, 2+ = debug; `RUST_LOG` wins when set
fn init_logging(verbose: u8, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("deplumi=warn"),
        1 => EnvFilter::new("deplumi=info"),
        _ => EnvFilter::new("deplumi=debug"),
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
