//! Flag and subcommand definitions for the `ical2gcal` binary.

use std::path::PathBuf;

use chrono::NaiveDate;
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use url::Url;

/// ical2gcal - mirror an ICS feed into a Google calendar
#[derive(Debug, Parser)]
#[command(name = "ical2gcal", author, version, about, long_about = None)]
pub struct Cli {
    /// Read settings from this file instead of the default location
    #[arg(long, short, env = "ICAL2GCAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, short = 'v')]
    pub debug: bool,

    // Feed side
    /// Address of the ICS feed
    #[arg(long)]
    pub url: Option<Url>,

    /// IANA zone substituted when an event declares anything other than UTC
    #[arg(long)]
    pub default_timezone: Option<Tz>,

    /// Ignore events that start before this date (YYYY-MM-DD)
    #[arg(long)]
    pub cutoff: Option<NaiveDate>,

    // Calendar side
    /// Calendar that receives the events
    #[arg(long)]
    pub calendar_id: Option<String>,

    /// Also delete calendar events the feed no longer mentions
    #[arg(long)]
    pub remove_stale: bool,

    /// Empty the calendar completely before inserting
    #[arg(long)]
    pub erase_all: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands. Without one, `ical2gcal` runs a sync.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Set up Google Calendar access
    Auth {
        /// OAuth client id from the Google Cloud Console
        #[arg(long, env = "GOOGLE_CLIENT_ID")]
        client_id: Option<String>,

        /// OAuth client secret belonging to the client id
        #[arg(long, env = "GOOGLE_CLIENT_SECRET")]
        client_secret: Option<String>,

        /// Credentials JSON downloaded from the Cloud Console
        ///
        /// Hands over the whole OAuth client in one go, as an alternative
        /// to --client-id plus --client-secret.
        #[arg(long, env = "GOOGLE_CREDENTIALS_FILE")]
        credentials_file: Option<PathBuf>,

        /// Redo the consent flow even when tokens already exist
        #[arg(long, short)]
        force: bool,
    },

    /// Inspect the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// What `ical2gcal config` should do.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Dump,

    /// Check the file for values that would fail at sync time
    Validate,

    /// Print where the configuration file is looked up
    Path,
}
