//! Core pipeline for calendar feed synchronization.
//!
//! This crate holds the pure stages of the pipeline:
//!
//! - [`EventScanner`] - Structural extraction of event blocks from feed text
//! - [`parse_zoned`] - Wall-clock parsing and timezone resolution
//! - [`canonical_events`] - Content-addressed canonical events with cutoff filtering
//! - [`reconcile`] - The diff between feed events and destination state
//!
//! Nothing here performs IO. Transports, the destination trait, and the
//! sync driver live in `ical2gcal-providers`.
//!
//! # Pipeline
//!
//! ```text
//! feed text ──> EventScanner ──> RawEventFields
//!                                      │
//!                                      ▼ parse_zoned()
//!                                 ZonedTime pairs
//!                                      │
//!                                      ▼ canonical_events()
//!                               CanonicalEvent set
//!                                      │   + destination listing
//!                                      ▼ reconcile()
//!                                ReconcilePlan
//! ```

pub mod diff;
pub mod event;
pub mod extract;
pub mod normalize;

// Re-export main types at crate root
pub use diff::{ReconcilePlan, RemoteEvent, reconcile};
pub use event::{CanonicalEvent, FeedOptions, canonical_events};
pub use extract::{EventScanner, RawDateField, RawEventFields};
pub use normalize::{NormalizeError, ZonedTime, parse_zoned};
