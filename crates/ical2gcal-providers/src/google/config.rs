//! Configuration for the Google Calendar destination.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// OAuth 2.0 client credentials.
///
/// Google has no shared public client for third-party tools, so every
/// user registers an OAuth client in the Cloud Console and feeds its id
/// and secret in here.
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    /// Client id, ending in `.apps.googleusercontent.com`.
    pub client_id: String,
    /// Matching client secret.
    pub client_secret: String,
}

impl OAuthCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Reads credentials from a JSON file on disk.
    ///
    /// Accepts the file as downloaded from the Cloud Console (an
    /// `installed` or `web` section) as well as a flat object with
    /// `client_id` and `client_secret` at the top level.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| format!("cannot read credentials file: {}", e))?;
        Self::from_json(&raw)
    }

    /// Parses credentials out of a JSON document.
    pub fn from_json(json: &str) -> Result<Self, String> {
        let parsed: CredentialsFile = serde_json::from_str(json)
            .map_err(|e| format!("credentials file is not valid JSON: {}", e))?;

        if let Some(section) = parsed.installed.or(parsed.web) {
            return Ok(Self::new(section.client_id, section.client_secret));
        }
        if let (Some(id), Some(secret)) = (parsed.client_id, parsed.client_secret) {
            return Ok(Self::new(id, secret));
        }
        Err(
            "no 'installed'/'web' section and no top-level 'client_id'/'client_secret' found"
                .to_string(),
        )
    }

    /// Sanity-checks the credential shape before any network call.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.client_id.is_empty() {
            return Err("client_id is required");
        }
        if !self.client_id.ends_with(".apps.googleusercontent.com") {
            return Err("client_id should end with .apps.googleusercontent.com");
        }
        if self.client_secret.is_empty() {
            return Err("client_secret is required");
        }
        Ok(())
    }
}

/// On-disk shape of Google's credentials JSON.
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    installed: Option<CredentialsSection>,
    web: Option<CredentialsSection>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

/// One `installed`/`web` section of the credentials JSON.
#[derive(Debug, Deserialize)]
struct CredentialsSection {
    client_id: String,
    client_secret: String,
}

/// Settings for [`GoogleDestination`](super::GoogleDestination).
#[derive(Debug, Clone)]
pub struct GcalConfig {
    /// OAuth client credentials.
    pub credentials: OAuthCredentials,

    /// Target calendar, `"primary"` or a calendar address.
    ///
    /// Stale removal and erase-all act on the whole calendar, so point
    /// this at one dedicated to the feed.
    pub calendar_id: String,

    /// Where OAuth tokens are persisted between runs.
    pub token_path: PathBuf,

    /// Timeout applied to every API request.
    pub timeout: Duration,

    /// Ports tried (in order) for the loopback OAuth redirect.
    pub loopback_port_range: (u16, u16),

    /// Scopes requested during authorization.
    pub scopes: Vec<String>,
}

impl GcalConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Read-write calendar scope; the sync inserts and deletes events.
    pub const DEFAULT_SCOPE: &'static str = "https://www.googleapis.com/auth/calendar";

    pub fn new(credentials: OAuthCredentials, calendar_id: impl Into<String>) -> Self {
        Self {
            credentials,
            calendar_id: calendar_id.into(),
            token_path: Self::default_token_path(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            loopback_port_range: (8080, 8090),
            scopes: vec![Self::DEFAULT_SCOPE.to_string()],
        }
    }

    /// `~/.local/share/ical2gcal/google-tokens.json`, or the platform
    /// equivalent.
    pub fn default_token_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ical2gcal")
            .join("google-tokens.json")
    }

    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_loopback_port_range(mut self, start: u16, end: u16) -> Self {
        self.loopback_port_range = (start, end);
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Checks the configuration is complete enough to build a
    /// destination from.
    pub fn validate(&self) -> Result<(), String> {
        self.credentials
            .validate()
            .map_err(|e| format!("invalid credentials: {}", e))?;

        if self.calendar_id.is_empty() {
            return Err("calendar_id is required".to_string());
        }
        if self.scopes.is_empty() {
            return Err("at least one OAuth scope is required".to_string());
        }
        let (low, high) = self.loopback_port_range;
        if low > high {
            return Err(format!("loopback port range {}-{} is inverted", low, high));
        }
        Ok(())
    }
}
