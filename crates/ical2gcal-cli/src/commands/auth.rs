//! The `auth` subcommand: obtain and store Google OAuth tokens.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use ical2gcal_providers::google::{GcalConfig, GoogleDestination, OAuthCredentials};

use crate::config::{AppConfig, GoogleSettings};
use crate::error::{CliError, CliResult};

/// An OAuth client pair together with where it came from.
#[derive(Debug)]
struct ResolvedCredentials {
    credentials: OAuthCredentials,
    origin: Origin,
}

/// Where the client id/secret pair was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// `--client-id`/`--client-secret` or `--credentials-file`; not yet in
    /// `config.toml`.
    Flags,
    /// Already stored in `config.toml`.
    ConfigFile,
}

/// Runs the browser-based consent flow and stores the resulting tokens.
///
/// The client pair is taken from the flags, from a Google Cloud Console
/// JSON download, or from `config.toml`, in that order of preference. A
/// pair supplied on the command line is written back to `config.toml`
/// afterwards so that plain sync runs pick it up.
pub async fn run(
    client_id: Option<String>,
    client_secret: Option<String>,
    credentials_file: Option<PathBuf>,
    force: bool,
    config: &AppConfig,
) -> CliResult<()> {
    let resolved = pick_credentials(
        client_id,
        client_secret,
        credentials_file,
        config.google.as_ref(),
    )?;
    resolved
        .credentials
        .validate()
        .map_err(|e| CliError::Config(format!("unusable Google credentials: {}", e)))?;

    let destination = GoogleDestination::new(destination_config(&resolved, config))?;

    if destination.is_authenticated() && !force {
        store_for_later(&resolved);
        println!("Google Calendar access is already set up.");
        println!("Run again with --force to redo the consent flow.");
        return Ok(());
    }

    println!("Requesting Google Calendar access.");
    println!();
    println!("Your browser should now show the Google consent screen.");
    println!("If nothing opens, paste the URL from this terminal into a browser.");
    println!();

    destination.authenticate().await?;
    store_for_later(&resolved);

    info!("OAuth consent flow completed");
    println!();
    println!("All set. Tokens are stored on this machine;");
    println!("run ical2gcal to sync your feed.");

    Ok(())
}

/// Builds the destination configuration for the consent flow.
///
/// The flow itself never touches a calendar; the configured id (or the
/// `primary` fallback) is carried only so that later sync runs share the
/// same token file.
fn destination_config(resolved: &ResolvedCredentials, config: &AppConfig) -> GcalConfig {
    let google = config.google.as_ref();
    let calendar_id = google
        .and_then(|g| g.calendar_id.as_deref())
        .unwrap_or("primary");

    let mut gcal = GcalConfig::new(resolved.credentials.clone(), calendar_id);
    if let Some(path) = google.and_then(|g| g.token_path.as_ref()) {
        gcal = gcal.with_token_path(path);
    }
    gcal
}

/// Finds a client pair, trying the most explicit source first: the flag
/// pair, then `--credentials-file`, then the `[google]` table.
fn pick_credentials(
    client_id: Option<String>,
    client_secret: Option<String>,
    credentials_file: Option<PathBuf>,
    google: Option<&GoogleSettings>,
) -> CliResult<ResolvedCredentials> {
    // A full flag pair wins outright.
    if let (Some(id), Some(secret)) = (&client_id, &client_secret) {
        return Ok(ResolvedCredentials {
            credentials: OAuthCredentials::new(id, secret),
            origin: Origin::Flags,
        });
    }

    // Next, a Cloud Console JSON download.
    if let Some(path) = credentials_file {
        let credentials = OAuthCredentials::from_file(&path)
            .map_err(|e| CliError::Config(format!("cannot use {}: {}", path.display(), e)))?;
        return Ok(ResolvedCredentials {
            credentials,
            origin: Origin::Flags,
        });
    }

    // Finally, whatever config.toml already holds.
    if let Some(google) = google
        && google.client_id.is_some()
        && google.client_secret.is_some()
    {
        let credentials = google.resolve_credentials().map_err(CliError::Config)?;
        return Ok(ResolvedCredentials {
            credentials,
            origin: Origin::ConfigFile,
        });
    }

    if client_id.is_some() != client_secret.is_some() {
        return Err(CliError::Config(
            "--client-id and --client-secret only work as a pair".to_string(),
        ));
    }

    Err(CliError::Config(format!(
        "no Google credentials found. Fill in client_id and client_secret \
         under [google] in {}, pass --client-id together with --client-secret, \
         point --credentials-file at a Google Cloud Console JSON download, or \
         export GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET.",
        AppConfig::default_path().display()
    )))
}

/// Writes flag-supplied credentials back to `config.toml`.
///
/// Failures are logged and otherwise ignored: the tokens themselves are
/// already on disk, so the consent flow has succeeded either way.
fn store_for_later(resolved: &ResolvedCredentials) {
    if resolved.origin == Origin::ConfigFile {
        return;
    }

    let path = AppConfig::default_path();
    match write_credentials(&path, &resolved.credentials) {
        Ok(()) => {
            info!("credentials written to {}", path.display());
            println!("Credentials saved to {}", path.display());
        }
        Err(e) => warn!("credentials were not written to {}: {}", path.display(), e),
    }
}

/// Updates the `[google]` table in the file at `path`, leaving every other
/// table untouched. Creates the file, and a `calendar_id = "primary"`
/// default, when missing.
fn write_credentials(path: &Path, credentials: &OAuthCredentials) -> Result<(), String> {
    let current = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(format!("cannot read the existing file: {}", e)),
    };

    let mut doc: toml_edit::DocumentMut = current
        .parse()
        .map_err(|e| format!("the existing file is not valid TOML: {}", e))?;

    let google = doc
        .entry("google")
        .or_insert(toml_edit::Item::Table(toml_edit::Table::new()));
    let Some(google) = google.as_table_mut() else {
        return Err("the google entry is not a table".to_string());
    };
    google["client_id"] = toml_edit::value(credentials.client_id.as_str());
    google["client_secret"] = toml_edit::value(credentials.client_secret.as_str());
    google
        .entry("calendar_id")
        .or_insert(toml_edit::value("primary"));

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("cannot create {}: {}", parent.display(), e))?;
    }
    std::fs::write(path, doc.to_string()).map_err(|e| format!("cannot write the file: {}", e))
}
