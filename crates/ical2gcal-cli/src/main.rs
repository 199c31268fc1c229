//! Binary entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use ical2gcal_cli::cli::{Cli, Command, ConfigAction};
use ical2gcal_cli::commands;
use ical2gcal_cli::config::AppConfig;
use ical2gcal_cli::error::{CliError, CliResult};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// `-v` forces DEBUG; otherwise `RUST_LOG` is honored, with INFO as the
/// fallback so the per-event progress lines show up.
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run(mut cli: Cli) -> CliResult<()> {
    let config = match cli.config {
        Some(ref path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
    .map_err(CliError::Config)?;

    // A bare invocation is a sync.
    match cli.command.take() {
        Some(Command::Auth {
            client_id,
            client_secret,
            credentials_file,
            force,
        }) => commands::auth::run(client_id, client_secret, credentials_file, force, &config).await,
        Some(Command::Config { action }) => match action {
            ConfigAction::Dump => commands::config::dump(&config),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(),
        },
        None => commands::sync::run(&cli, &config).await,
    }
}
