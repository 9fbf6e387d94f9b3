//! nextevent CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use nextevent::cli::{Cli, Command, ConfigAction};
use nextevent::commands;
use nextevent::config::AppConfig;
use nextevent::error::ClientResult;
use nextevent_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing_config = if cli.json_logs {
        TracingConfig::daemon()
    } else if cli.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::default()
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("warning: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let path = cli.config.clone().unwrap_or_else(AppConfig::default_path);

    if let Command::Config {
        action: ConfigAction::Path,
    } = cli.selected_command()
    {
        return commands::config::path(&path);
    }

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    match cli.selected_command() {
        Command::Run => commands::run::run(&config).await,
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config, &path),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(&path),
        },
    }
}
