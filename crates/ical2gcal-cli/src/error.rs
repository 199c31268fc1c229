//! Errors surfaced to the person running the CLI.

use std::fmt;

use ical2gcal_providers::ProviderError;

/// Alias used by every command.
pub type CliResult<T> = Result<T, CliError>;

/// A failure the binary reports and exits on.
///
/// Both variants carry a rendered message; by the time an error reaches
/// `main` it is only ever printed.
#[derive(Debug)]
pub enum CliError {
    /// config.toml, or the flags layered over it, are unusable.
    Config(String),
    /// The feed or the calendar backend failed.
    Provider(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(reason) => write!(f, "bad configuration: {}", reason),
            Self::Provider(reason) => f.write_str(reason),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ProviderError> for CliError {
    fn from(source: ProviderError) -> Self {
        Self::Provider(source.to_string())
    }
}
