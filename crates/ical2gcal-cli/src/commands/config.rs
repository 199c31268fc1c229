//! The `config` subcommand: dump, validate, path.

use crate::config::{AppConfig, FeedSettings, GoogleSettings};
use crate::error::{CliError, CliResult};

/// Prints the effective configuration as TOML.
pub fn dump(config: &AppConfig) -> CliResult<()> {
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| invalid(format!("cannot render config as TOML: {}", e)))?;
    println!("# config.toml ({})", AppConfig::default_path().display());
    println!("{}", rendered);
    Ok(())
}

/// Checks every configured value that a sync would otherwise reject mid-run.
pub fn validate(config: &AppConfig) -> CliResult<()> {
    if let Some(ref feed) = config.feed {
        check_feed(feed)?;
        println!("Feed settings are valid.");
    }

    if let Some(ref google) = config.google {
        check_google(google)?;
    }

    println!("Configuration is valid.");
    Ok(())
}

/// Prints where the configuration file is looked up.
pub fn path() -> CliResult<()> {
    println!("config: {}", AppConfig::default_path().display());
    Ok(())
}

fn check_feed(feed: &FeedSettings) -> CliResult<()> {
    if let Some(ref url) = feed.url {
        url.parse::<url::Url>()
            .map_err(|e| invalid(format!("[feed] url: {}", e)))?;
    }

    if let Some(ref zone) = feed.default_timezone {
        zone.parse::<chrono_tz::Tz>()
            .map_err(|e| invalid(format!("[feed] default_timezone: {}", e)))?;
    }

    if let Some(ref day) = feed.cutoff_date {
        day.parse::<chrono::NaiveDate>()
            .map_err(|e| invalid(format!("[feed] cutoff_date: {}", e)))?;
    }

    Ok(())
}

fn check_google(google: &GoogleSettings) -> CliResult<()> {
    if google.client_id.is_none() && google.client_secret.is_none() {
        return Ok(());
    }

    let credentials = google.resolve_credentials().map_err(invalid)?;
    credentials.validate().map_err(|e| invalid(e.to_string()))?;
    println!("Google credentials are valid.");
    Ok(())
}

fn invalid(reason: impl Into<String>) -> CliError {
    CliError::Config(reason.into())
}
