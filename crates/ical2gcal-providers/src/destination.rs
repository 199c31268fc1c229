//! The CalendarDestination trait.
//!
//! [`CalendarDestination`] is the write-side seam of the pipeline: the
//! sync engine drives every mutation through it, and Google Calendar is
//! the one shipped implementation.

use std::future::Future;
use std::pin::Pin;

use ical2gcal_core::{CanonicalEvent, RemoteEvent};

use crate::error::ProviderResult;

/// Boxed future used by the trait's async methods.
///
/// Boxing keeps the trait object-safe, which native async trait methods
/// still do not offer; the sync engine takes destinations as
/// `&dyn CalendarDestination`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The write-side abstraction over a calendar backend.
///
/// All ids crossing this trait are the content ids computed by
/// `ical2gcal-core`; the destination stores events under those ids
/// verbatim. Implementations own their transport and authentication
/// state, handle listing pagination internally and surface an id
/// collision on insert as a conflict error so the caller can fall back
/// to an update.
pub trait CalendarDestination: Send + Sync {
    /// A short name for this destination ("google").
    fn name(&self) -> &str;

    /// Removes every event from the destination calendar in one call.
    fn clear(&self) -> BoxFuture<'_, ProviderResult<()>>;

    /// Lists all events currently stored in the destination calendar,
    /// in the backend's listing order.
    fn list_events(&self) -> BoxFuture<'_, ProviderResult<Vec<RemoteEvent>>>;

    /// Creates an event under its content id.
    ///
    /// # Errors
    ///
    /// Returns a conflict error when the destination already holds an
    /// event with this id.
    fn insert_event<'a>(&'a self, event: &'a CanonicalEvent) -> BoxFuture<'a, ProviderResult<()>>;

    /// Overwrites the event stored under this event's content id.
    fn update_event<'a>(&'a self, event: &'a CanonicalEvent) -> BoxFuture<'a, ProviderResult<()>>;

    /// Deletes the event with the given id.
    fn delete_event<'a>(&'a self, event_id: &'a str) -> BoxFuture<'a, ProviderResult<()>>;
}
