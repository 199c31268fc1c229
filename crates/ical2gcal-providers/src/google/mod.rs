//! Google Calendar destination.
//!
//! [`GoogleDestination`] writes synced events into one Google calendar
//! through the Calendar API v3. Authorization runs the OAuth 2.0 PKCE
//! flow in the user's browser with a loopback redirect; the granted
//! tokens are persisted and refreshed across runs, so the browser step
//! happens once.
//!
//! # Example
//!
//! ```ignore
//! use ical2gcal_providers::google::{GcalConfig, GoogleDestination, OAuthCredentials};
//!
//! let credentials = OAuthCredentials::new(
//!     "your-client-id.apps.googleusercontent.com",
//!     "your-client-secret",
//! );
//! let config = GcalConfig::new(credentials, "feed@group.calendar.google.com");
//! let destination = GoogleDestination::new(config)?;
//!
//! if !destination.is_authenticated() {
//!     destination.authenticate().await?;
//! }
//! ```

mod client;
mod config;
mod destination;
mod oauth;
mod tokens;

pub use client::GcalClient;
pub use config::{GcalConfig, OAuthCredentials};
pub use destination::GoogleDestination;
pub use oauth::{OAuthClient, PkceChallenge};
pub use tokens::{TokenSet, TokenStore};
