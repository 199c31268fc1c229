//! ical2gcal CLI: configuration, Google authentication, and the feed
//! sync driver.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::Cli;
pub use error::{CliError, CliResult};
