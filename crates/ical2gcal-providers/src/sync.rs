//! Sequential sync of feed events into a calendar destination.
//!
//! Reconciles the feed against the destination's current contents, then
//! applies deletes and inserts one at a time. Writes are paced so a large
//! feed does not trip the destination's rate limits.

use std::time::Duration;

use ical2gcal_core::{CanonicalEvent, reconcile};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::destination::CalendarDestination;
use crate::error::ProviderResult;

/// Default delay before each destination write.
pub const DEFAULT_PACING: Duration = Duration::from_millis(300);

/// Options controlling one sync run.
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// Clear the whole calendar before inserting, instead of diffing
    /// against its contents.
    pub erase_all: bool,
    /// Delete destination events that are missing from the feed.
    pub remove_stale: bool,
    /// Delay before each insert and each fallback update.
    pub pacing: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            erase_all: false,
            remove_stale: false,
            pacing: DEFAULT_PACING,
        }
    }
}

/// Counters for one sync run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// Events created in the destination.
    pub inserted: usize,
    /// Events that hit an id conflict and were overwritten instead.
    pub updated: usize,
    /// Stale events removed from the destination.
    pub deleted: usize,
    /// Events already present and left untouched.
    pub unchanged: usize,
}

/// How a single event made it into the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InsertOutcome {
    Inserted,
    UpdatedAfterConflict,
}

/// Pushes one feed's events into the destination.
///
/// With `erase_all` the calendar is wiped first and the listing step is
/// skipped entirely, so every feed event becomes an insert. Otherwise the
/// destination is listed once and only the differences are written.
///
/// The first failed write aborts the run; everything applied before it
/// stays applied. Rerunning after a partial failure is safe because ids
/// are content-derived.
pub async fn run_sync(
    destination: &dyn CalendarDestination,
    new_events: Vec<CanonicalEvent>,
    options: &SyncOptions,
) -> ProviderResult<SyncReport> {
    let existing = if options.erase_all {
        info!("erasing all events from {}", destination.name());
        destination.clear().await?;
        Vec::new()
    } else {
        destination.list_events().await?
    };

    let plan = reconcile(new_events, &existing, options.remove_stale);
    debug!(
        "plan: {} to insert, {} to delete, {} unchanged",
        plan.to_insert.len(),
        plan.to_delete.len(),
        plan.unchanged.len()
    );

    let mut report = SyncReport {
        unchanged: plan.unchanged.len(),
        ..SyncReport::default()
    };

    for id in &plan.to_delete {
        info!("deleting stale event {}", id_prefix(id));
        destination.delete_event(id).await?;
        report.deleted += 1;
    }

    let total = plan.to_insert.len();
    for (index, event) in plan.to_insert.iter().enumerate() {
        info!("Adding {}/{} {}", index + 1, total, event.summary);
        match push_event(destination, event, options.pacing).await? {
            InsertOutcome::Inserted => report.inserted += 1,
            InsertOutcome::UpdatedAfterConflict => report.updated += 1,
        }
    }

    Ok(report)
}

/// Inserts one event, falling back to a single update on an id conflict.
///
/// A conflict means the destination already holds an event under this
/// content id, typically left over from a run against another copy of the
/// same feed. Any failure of the fallback update propagates.
async fn push_event(
    destination: &dyn CalendarDestination,
    event: &CanonicalEvent,
    pacing: Duration,
) -> ProviderResult<InsertOutcome> {
    sleep(pacing).await;

    match destination.insert_event(event).await {
        Ok(()) => Ok(InsertOutcome::Inserted),
        Err(e) if e.is_conflict() => {
            warn!(
                "event {} already exists, updating instead",
                id_prefix(&event.id)
            );
            sleep(pacing).await;
            destination.update_event(event).await?;
            Ok(InsertOutcome::UpdatedAfterConflict)
        }
        Err(e) => Err(e),
    }
}

/// First eight characters of a content id, for logs.
fn id_prefix(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono_tz::Tz;
    use ical2gcal_core::{RemoteEvent, parse_zoned};

    use crate::destination::BoxFuture;
    use crate::error::ProviderError;

    #[derive(Default)]
    struct MockDestination {
        existing: Vec<RemoteEvent>,
        conflict_ids: Vec<String>,
        fail_inserts: bool,
        fail_updates: bool,
        calls: Mutex<Vec<String>>,
    }

    impl MockDestination {
        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CalendarDestination for MockDestination {
        fn name(&self) -> &str {
            "mock"
        }

        fn clear(&self) -> BoxFuture<'_, ProviderResult<()>> {
            self.record("clear");
            Box::pin(async { Ok(()) })
        }

        fn list_events(&self) -> BoxFuture<'_, ProviderResult<Vec<RemoteEvent>>> {
            self.record("list");
            let existing = self.existing.clone();
            Box::pin(async move { Ok(existing) })
        }

        fn insert_event<'a>(
            &'a self,
            event: &'a CanonicalEvent,
        ) -> BoxFuture<'a, ProviderResult<()>> {
            self.record(format!("insert {}", event.summary));
            Box::pin(async move {
                if self.fail_inserts {
                    return Err(ProviderError::server("insert failed"));
                }
                if self.conflict_ids.contains(&event.id) {
                    return Err(ProviderError::conflict("already exists"));
                }
                Ok(())
            })
        }

        fn update_event<'a>(
            &'a self,
            event: &'a CanonicalEvent,
        ) -> BoxFuture<'a, ProviderResult<()>> {
            self.record(format!("update {}", event.summary));
            Box::pin(async move {
                if self.fail_updates {
                    return Err(ProviderError::server("update failed"));
                }
                Ok(())
            })
        }

        fn delete_event<'a>(&'a self, event_id: &'a str) -> BoxFuture<'a, ProviderResult<()>> {
            self.record(format!("delete {}", event_id));
            Box::pin(async { Ok(()) })
        }
    }

    fn event(summary: &str) -> CanonicalEvent {
        let start = parse_zoned("20240315T100000", None, Tz::UTC).unwrap();
        let end = parse_zoned("20240315T110000", None, Tz::UTC).unwrap();
        CanonicalEvent::new(summary, start, end)
    }

    fn remote(id: &str) -> RemoteEvent {
        RemoteEvent {
            id: id.to_string(),
            summary: None,
        }
    }

    fn no_pacing() -> SyncOptions {
        SyncOptions {
            pacing: Duration::ZERO,
            ..SyncOptions::default()
        }
    }

    #[tokio::test]
    async fn inserts_everything_into_an_empty_calendar() {
        let destination = MockDestination::default();
        let events = vec![event("One"), event("Two")];

        let report = run_sync(&destination, events, &no_pacing()).await.unwrap();

        assert_eq!(report.inserted, 2);
        assert_eq!(report.unchanged, 0);
        assert_eq!(destination.calls(), vec!["list", "insert One", "insert Two"]);
    }

    #[tokio::test]
    async fn rerun_with_the_same_feed_is_a_noop() {
        let events = vec![event("One"), event("Two")];
        let destination = MockDestination {
            existing: events.iter().map(|e| remote(&e.id)).collect(),
            ..MockDestination::default()
        };

        let report = run_sync(&destination, events, &no_pacing()).await.unwrap();

        assert_eq!(report.inserted, 0);
        assert_eq!(report.unchanged, 2);
        assert_eq!(destination.calls(), vec!["list"]);
    }

    #[tokio::test]
    async fn erase_all_clears_and_skips_listing() {
        let destination = MockDestination {
            existing: vec![remote("would-be-stale")],
            ..MockDestination::default()
        };
        let options = SyncOptions {
            erase_all: true,
            ..no_pacing()
        };

        let report = run_sync(&destination, vec![event("One")], &options)
            .await
            .unwrap();

        assert_eq!(report.inserted, 1);
        assert_eq!(report.deleted, 0);
        assert_eq!(destination.calls(), vec!["clear", "insert One"]);
    }

    #[tokio::test]
    async fn stale_events_are_kept_by_default() {
        let kept = event("Kept");
        let destination = MockDestination {
            existing: vec![remote(&kept.id), remote("stale-id")],
            ..MockDestination::default()
        };

        let report = run_sync(&destination, vec![kept], &no_pacing())
            .await
            .unwrap();

        assert_eq!(report.deleted, 0);
        assert_eq!(report.unchanged, 1);
        assert_eq!(destination.calls(), vec!["list"]);
    }

    #[tokio::test]
    async fn stale_events_are_deleted_before_inserts() {
        let kept = event("Kept");
        let destination = MockDestination {
            existing: vec![remote(&kept.id), remote("stale-id")],
            ..MockDestination::default()
        };
        let options = SyncOptions {
            remove_stale: true,
            ..no_pacing()
        };

        let report = run_sync(&destination, vec![kept, event("New")], &options)
            .await
            .unwrap();

        assert_eq!(report.deleted, 1);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.unchanged, 1);
        assert_eq!(
            destination.calls(),
            vec!["list", "delete stale-id", "insert New"]
        );
    }

    #[tokio::test]
    async fn conflict_falls_back_to_a_single_update() {
        let colliding = event("Colliding");
        let destination = MockDestination {
            conflict_ids: vec![colliding.id.clone()],
            ..MockDestination::default()
        };

        let report = run_sync(&destination, vec![colliding], &no_pacing())
            .await
            .unwrap();

        assert_eq!(report.inserted, 0);
        assert_eq!(report.updated, 1);
        assert_eq!(
            destination.calls(),
            vec!["list", "insert Colliding", "update Colliding"]
        );
    }

    #[tokio::test]
    async fn failed_fallback_update_aborts_the_run() {
        let colliding = event("Colliding");
        let destination = MockDestination {
            conflict_ids: vec![colliding.id.clone()],
            fail_updates: true,
            ..MockDestination::default()
        };

        let result = run_sync(&destination, vec![colliding, event("Never")], &no_pacing()).await;

        assert!(result.is_err());
        assert_eq!(
            destination.calls(),
            vec!["list", "insert Colliding", "update Colliding"]
        );
    }

    #[tokio::test]
    async fn failed_insert_aborts_the_run() {
        let destination = MockDestination {
            fail_inserts: true,
            ..MockDestination::default()
        };

        let result = run_sync(&destination, vec![event("One"), event("Two")], &no_pacing()).await;

        assert!(result.is_err());
        assert_eq!(destination.calls(), vec!["list", "insert One"]);
    }

    #[test]
    fn id_prefix_truncates_long_ids() {
        assert_eq!(id_prefix("abcdefghij"), "abcdefgh");
        assert_eq!(id_prefix("abc"), "abc");
    }
}
