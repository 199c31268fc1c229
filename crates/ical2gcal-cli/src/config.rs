//! On-disk configuration.
//!
//! Everything lives in one TOML file, `~/.config/ical2gcal/config.toml`,
//! split into `[feed]`, `[google]`, and `[sync]` tables. Any value can also
//! be supplied as a command-line flag, which wins over the file.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use ical2gcal_providers::google::{GcalConfig, OAuthCredentials};

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where the ICS feed lives and how to read it.
    pub feed: Option<FeedSettings>,

    /// The Google Calendar side: credentials and target calendar.
    pub google: Option<GoogleSettings>,

    /// Knobs for the sync pass itself.
    #[serde(default)]
    pub sync: SyncSettings,
}

/// The `[feed]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    /// Address the ICS feed is fetched from.
    pub url: Option<String>,

    /// IANA zone substituted when an event declares anything other than UTC.
    pub default_timezone: Option<String>,

    /// Events starting before this day (YYYY-MM-DD) are ignored.
    pub cutoff_date: Option<String>,
}

/// The `[sync]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Delete calendar events the feed no longer mentions.
    pub remove_stale: bool,

    /// Empty the calendar completely before inserting.
    pub erase_all: bool,
}

impl AppConfig {
    /// Reads `config.toml` from the default location.
    ///
    /// A missing file is not an error; it simply yields the defaults.
    pub fn load() -> Result<Self, String> {
        match std::fs::read_to_string(Self::default_path()) {
            Ok(text) => Self::parse(&text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(format!("cannot read config.toml: {}", e)),
        }
    }

    /// Reads configuration from an explicit `--config` path. Unlike
    /// [`AppConfig::load`], a missing file is an error here.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
        Self::parse(&text)
    }

    fn parse(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| format!("config.toml is malformed: {}", e))
    }

    /// Full path of the configuration file, `~/.config/ical2gcal/config.toml`.
    pub fn default_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("ical2gcal").join("config.toml")
    }
}

/// The `[google]` table.
///
/// The OAuth client pair normally gets here via `ical2gcal auth`, which
/// writes back whatever it was given on the command line.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GoogleSettings {
    /// OAuth client id issued by the Google Cloud Console.
    pub client_id: Option<String>,

    /// OAuth client secret belonging to the id.
    pub client_secret: Option<String>,

    /// Calendar that receives the events. `primary` when unset.
    pub calendar_id: Option<String>,

    /// Where OAuth tokens are kept between runs.
    pub token_path: Option<PathBuf>,
}

impl GoogleSettings {
    /// Builds the destination configuration for a sync run.
    ///
    /// A `--calendar-id` flag beats the configured `calendar_id`; with
    /// neither, events land in the `primary` calendar.
    pub fn to_destination_config(
        &self,
        calendar_override: Option<&str>,
    ) -> Result<GcalConfig, String> {
        let credentials = self.resolve_credentials()?;
        credentials.validate().map_err(|e| e.to_string())?;

        let calendar_id = calendar_override
            .or(self.calendar_id.as_deref())
            .unwrap_or("primary");

        let mut destination = GcalConfig::new(credentials, calendar_id);
        if let Some(ref path) = self.token_path {
            destination = destination.with_token_path(path);
        }

        Ok(destination)
    }

    /// Pulls the OAuth client pair out of the table.
    pub(crate) fn resolve_credentials(&self) -> Result<OAuthCredentials, String> {
        match (self.client_id.as_deref(), self.client_secret.as_deref()) {
            (Some(id), Some(secret)) => Ok(OAuthCredentials::new(id, secret)),
            (Some(_), None) => Err("[google] has a client_id but no client_secret".to_string()),
            _ => Err(format!(
                "no Google credentials configured. Add them to {}:\n\n\
                 [google]\n\
                 client_id = \"<your id>.apps.googleusercontent.com\"\n\
                 client_secret = \"<your secret>\"\n\n\
                 or import a Cloud Console download with: \
                 ical2gcal auth --credentials-file <file.json>",
                AppConfig::default_path().display()
            )),
        }
    }
}
