//! Feed fetching, the destination trait and the sync engine.
//!
//! This crate provides everything between the pure event pipeline in
//! `ical2gcal-core` and the outside world:
//!
//! - [`FeedFetcher`] - Downloads the ICS feed over HTTP(S)
//! - [`CalendarDestination`] - The write-side trait calendar backends implement
//! - [`google::GoogleDestination`] - The Google Calendar implementation
//! - [`run_sync`] - Applies a reconcile plan to a destination, paced
//! - [`ProviderError`] - Error types for feed and destination operations
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐                      ┌───────────────────┐
//! │  ICS feed   │                      │ Google Calendar   │
//! └──────┬──────┘                      └─────────▲─────────┘
//!        │ FeedFetcher                           │
//!        ▼                                       │
//! ┌─────────────────┐                  ┌─────────┴─────────┐
//! │ ical2gcal-core  │                  │ GoogleDestination │
//! │ (canonicalize)  │                  └─────────▲─────────┘
//! └──────┬──────────┘                            │
//!        │                            CalendarDestination
//!        ▼                                       │
//!   CanonicalEvents ──── run_sync ───────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use ical2gcal_providers::{FeedFetcher, SyncOptions, run_sync};
//!
//! let feed = FeedFetcher::new(timeout).fetch(&url).await?;
//! let events = ical2gcal_core::canonical_events(&feed, &feed_options);
//! let report = run_sync(&destination, events, &SyncOptions::default()).await?;
//! ```

pub mod destination;
pub mod error;
pub mod feed;
pub mod google;
pub mod sync;

// Re-export main types at crate root
pub use destination::{BoxFuture, CalendarDestination};
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use feed::FeedFetcher;
pub use sync::{DEFAULT_PACING, SyncOptions, SyncReport, run_sync};
