//! Feed sync command.
//!
//! The default action of the CLI: fetch the ICS feed, canonicalize its
//! events, and reconcile them into the configured Google calendar.

use std::time::Duration;

use chrono::NaiveDate;
use chrono_tz::Tz;
use tracing::info;
use url::Url;

use ical2gcal_core::{FeedOptions, canonical_events};
use ical2gcal_providers::google::GoogleDestination;
use ical2gcal_providers::{FeedFetcher, SyncOptions, run_sync};

use crate::cli::Cli;
use crate::config::AppConfig;
use crate::error::{CliError, CliResult};

/// Request timeout for the feed download.
const FEED_TIMEOUT: Duration = Duration::from_secs(30);

/// Fully resolved parameters for one sync run.
#[derive(Debug)]
struct SyncParams {
    url: Url,
    feed_options: FeedOptions,
    sync_options: SyncOptions,
    calendar_id: Option<String>,
}

/// Fetch the feed and sync it into Google Calendar.
pub async fn run(cli: &Cli, config: &AppConfig) -> CliResult<()> {
    let params = resolve_params(cli, config)?;

    let google = config.google.as_ref().ok_or_else(|| {
        CliError::Config(
            "missing [google] section in config.toml - run 'ical2gcal auth' first".to_string(),
        )
    })?;
    let destination_config = google
        .to_destination_config(params.calendar_id.as_deref())
        .map_err(CliError::Config)?;
    let destination = GoogleDestination::new(destination_config)?;

    if !destination.is_authenticated() {
        return Err(CliError::Config(
            "not authenticated - run 'ical2gcal auth' first".to_string(),
        ));
    }

    info!("fetching feed from {}", params.url);
    let feed = FeedFetcher::new(FEED_TIMEOUT).fetch(&params.url).await?;

    let events = canonical_events(&feed, &params.feed_options);
    info!("feed yielded {} events", events.len());

    let report = run_sync(&destination, events, &params.sync_options).await?;

    println!(
        "Synced: {} inserted, {} updated, {} deleted, {} unchanged.",
        report.inserted, report.updated, report.deleted, report.unchanged
    );

    Ok(())
}

/// Merges CLI flags over `config.toml` values.
///
/// Flags win over the file. An unset cutoff keeps every event and an
/// unset timezone falls back to UTC.
fn resolve_params(cli: &Cli, config: &AppConfig) -> CliResult<SyncParams> {
    let feed = config.feed.as_ref();

    let url = match (&cli.url, feed.and_then(|f| f.url.as_deref())) {
        (Some(url), _) => url.clone(),
        (None, Some(raw)) => raw
            .parse()
            .map_err(|e| CliError::Config(format!("invalid [feed] url: {}", e)))?,
        (None, None) => {
            return Err(CliError::Config(
                "no feed url - set [feed] url in config.toml or pass --url".to_string(),
            ));
        }
    };

    let default_timezone = match (
        cli.default_timezone,
        feed.and_then(|f| f.default_timezone.as_deref()),
    ) {
        (Some(tz), _) => tz,
        (None, Some(raw)) => raw
            .parse()
            .map_err(|e| CliError::Config(format!("invalid [feed] default_timezone: {}", e)))?,
        (None, None) => Tz::UTC,
    };

    let cutoff_date = match (cli.cutoff, feed.and_then(|f| f.cutoff_date.as_deref())) {
        (Some(date), _) => date,
        (None, Some(raw)) => raw
            .parse()
            .map_err(|e| CliError::Config(format!("invalid [feed] cutoff_date: {}", e)))?,
        (None, None) => NaiveDate::MIN,
    };

    let sync_options = SyncOptions {
        erase_all: cli.erase_all || config.sync.erase_all,
        remove_stale: cli.remove_stale || config.sync.remove_stale,
        ..SyncOptions::default()
    };

    Ok(SyncParams {
        url,
        feed_options: FeedOptions {
            cutoff_date,
            default_timezone,
        },
        sync_options,
        calendar_id: cli.calendar_id.clone(),
    })
}
