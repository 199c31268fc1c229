//! Canonical events and their content-derived identifiers.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::extract::{EventScanner, RawEventFields};
use crate::normalize::{ZonedTime, parse_zoned};

/// Options controlling canonicalization.
#[derive(Debug, Clone, Copy)]
pub struct FeedOptions {
    /// Events whose wall-clock start precedes this date are dropped.
    pub cutoff_date: NaiveDate,
    /// Zone used to interpret values declared with a non-UTC timezone.
    pub default_timezone: Tz,
}

/// A fully normalized event, ready for reconciliation.
///
/// The id is a SHA-256 over the rendered start, end, and summary, so two
/// events are interchangeable exactly when their ids match. Hex digits
/// keep the id inside the character set destination calendars accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalEvent {
    /// Content-derived identifier, stable across runs.
    pub id: String,
    /// The event title.
    pub summary: String,
    /// Normalized start.
    pub start: ZonedTime,
    /// Normalized end.
    pub end: ZonedTime,
}

impl CanonicalEvent {
    /// Builds an event, deriving its id from the content.
    pub fn new(summary: impl Into<String>, start: ZonedTime, end: ZonedTime) -> Self {
        let summary = summary.into();
        let id = content_id(&start, &end, &summary);
        Self {
            id,
            summary,
            start,
            end,
        }
    }
}

/// Derives the content id for an event.
fn content_id(start: &ZonedTime, end: &ZonedTime, summary: &str) -> String {
    let material = format!("{} {} {}", start.render(), end.render(), summary);
    hex::encode(Sha256::digest(material.as_bytes()))
}

/// Extracts, normalizes, filters, and hashes every usable event in a feed.
///
/// Events come back in feed order. Blocks the scanner rejects and events
/// whose date values cannot be normalized are skipped with a diagnostic.
/// Duplicate ids keep their first occurrence; since the id covers every
/// field, later duplicates carry no new information.
pub fn canonical_events(feed: &str, options: &FeedOptions) -> Vec<CanonicalEvent> {
    let scanner = EventScanner::new(feed);
    let cutoff = options.cutoff_date.and_time(NaiveTime::MIN);

    let mut events = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for raw in scanner.scan() {
        let Some(event) = normalize_event(raw, options) else {
            continue;
        };

        if before_cutoff(&event, cutoff) {
            debug!("skipping event before cutoff: {}", event.summary);
            continue;
        }

        if seen.insert(event.id.clone()) {
            events.push(event);
        }
    }

    events
}

/// Normalizes both ends of a raw event, skipping it on the first failure.
fn normalize_event(raw: RawEventFields, options: &FeedOptions) -> Option<CanonicalEvent> {
    let start = match parse_zoned(&raw.start.value, raw.start.tzid.as_deref(), options.default_timezone)
    {
        Ok(start) => start,
        Err(e) => {
            warn!("skipping event {:?}, bad start: {}", raw.summary, e);
            return None;
        }
    };

    let end = match parse_zoned(&raw.end.value, raw.end.tzid.as_deref(), options.default_timezone) {
        Ok(end) => end,
        Err(e) => {
            warn!("skipping event {:?}, bad end: {}", raw.summary, e);
            return None;
        }
    };

    Some(CanonicalEvent::new(raw.summary, start, end))
}

/// Compares the start's wall-clock reading against the cutoff midnight,
/// ignoring zones on both sides.
fn before_cutoff(event: &CanonicalEvent, cutoff: NaiveDateTime) -> bool {
    event.start.naive_local() < cutoff
}

/// Minimal hex encoding, enough to render digests without another
/// dependency.
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes
            .as_ref()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> FeedOptions {
        FeedOptions {
            cutoff_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            default_timezone: Tz::Europe__London,
        }
    }

    fn timed_block(summary: &str, tzid: &str, start: &str, end: &str) -> String {
        format!(
            "BEGIN:VEVENT\r\nSUMMARY:{}\r\nDTSTART;TZID={}:{}\r\nDTEND;TZID={}:{}\r\nEND:VEVENT\r\n",
            summary, tzid, start, tzid, end
        )
    }

    fn all_day_block(summary: &str, start: &str, end: &str) -> String {
        format!(
            "BEGIN:VEVENT\r\nSUMMARY:{}\r\nX-MICROSOFT-CDO-ALLDAYEVENT:TRUE\r\n\
             DTSTART;VALUE=DATE:{}\r\nDTEND;VALUE=DATE:{}\r\nEND:VEVENT\r\n",
            summary, start, end
        )
    }

    #[test]
    fn id_is_lowercase_hex() {
        let feed = timed_block("Standup", "UTC", "20240315T100000", "20240315T103000");
        let events = canonical_events(&feed, &options());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id.len(), 64);
        assert!(events[0].id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(events[0].id, events[0].id.to_lowercase());
    }

    #[test]
    fn equal_content_produces_equal_ids() {
        let start = parse_zoned("20240315T100000", None, Tz::UTC).unwrap();
        let end = parse_zoned("20240315T110000", None, Tz::UTC).unwrap();

        let a = CanonicalEvent::new("Standup", start.clone(), end.clone());
        let b = CanonicalEvent::new("Standup", start, end);
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn changed_content_changes_the_id() {
        let start = parse_zoned("20240315T100000", None, Tz::UTC).unwrap();
        let end = parse_zoned("20240315T110000", None, Tz::UTC).unwrap();
        let later = parse_zoned("20240315T120000", None, Tz::UTC).unwrap();

        let base = CanonicalEvent::new("Standup", start.clone(), end.clone());
        let renamed = CanonicalEvent::new("Retro", start.clone(), end.clone());
        let moved = CanonicalEvent::new("Standup", start, later);

        assert_ne!(base.id, renamed.id);
        assert_ne!(base.id, moved.id);
    }

    #[test]
    fn id_covers_the_rendered_offset() {
        // The same instant rendered in different zones hashes differently:
        // the id is built from the rendering, not a normalized instant.
        let utc = parse_zoned("20240701T100000", None, Tz::UTC).unwrap();
        let london = parse_zoned("20240701T110000", Some("local"), Tz::Europe__London).unwrap();
        assert_eq!(utc.date_time, london.date_time);

        let end = parse_zoned("20240701T120000", None, Tz::UTC).unwrap();
        let a = CanonicalEvent::new("Standup", utc, end.clone());
        let b = CanonicalEvent::new("Standup", london, end);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn cutoff_drops_the_day_before_and_keeps_the_day_itself() {
        let feed = format!(
            "{}{}",
            timed_block("Old", "UTC", "20231231T235900", "20240101T003000"),
            timed_block("Boundary", "UTC", "20240101T000000", "20240101T010000"),
        );
        let events = canonical_events(&feed, &options());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].summary, "Boundary");
    }

    #[test]
    fn cutoff_compares_wall_clock_not_instant() {
        // 00:30 London wall clock on the cutoff day stays, even though the
        // instant in UTC terms (23:30 previous day in summer) would not.
        let feed = timed_block("Early", "Etc/Whatever", "20240701T003000", "20240701T013000");
        let mut opts = options();
        opts.cutoff_date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let events = canonical_events(&feed, &opts);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn all_day_events_use_the_utc_label() {
        let feed = all_day_block("Holiday", "20240318", "20240319");
        let events = canonical_events(&feed, &options());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start.time_zone, "UTC");
        assert_eq!(events[0].start.render(), "2024-03-18T00:00:00+00:00");
        assert_eq!(events[0].end.render(), "2024-03-19T00:00:00+00:00");
    }

    #[test]
    fn timed_non_utc_events_use_the_default_label() {
        let feed = timed_block(
            "Planning",
            "Pacific Standard Time",
            "20240315T100000",
            "20240315T110000",
        );
        let events = canonical_events(&feed, &options());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start.time_zone, "Europe/London");
        assert_eq!(events[0].end.time_zone, "Europe/London");
    }

    #[test]
    fn duplicate_blocks_collapse_to_one_event() {
        let block = timed_block("Standup", "UTC", "20240315T100000", "20240315T103000");
        let feed = format!("{}{}", block, block);
        let events = canonical_events(&feed, &options());
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn unparsable_dates_skip_only_that_event() {
        let feed = format!(
            "{}{}",
            timed_block("Broken", "UTC", "not-a-date", "20240315T110000"),
            timed_block("Fine", "UTC", "20240316T100000", "20240316T110000"),
        );
        let events = canonical_events(&feed, &options());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].summary, "Fine");
    }

    #[test]
    fn feed_order_is_preserved() {
        let feed = format!(
            "{}{}{}",
            timed_block("First", "UTC", "20240317T100000", "20240317T110000"),
            timed_block("Second", "UTC", "20240315T100000", "20240315T110000"),
            timed_block("Third", "UTC", "20240316T100000", "20240316T110000"),
        );
        let events = canonical_events(&feed, &options());
        let summaries: Vec<_> = events.iter().map(|e| e.summary.as_str()).collect();
        assert_eq!(summaries, vec!["First", "Second", "Third"]);
    }

    #[test]
    fn hex_encodes_digest_bytes() {
        assert_eq!(hex::encode([0x00, 0xff, 0x10]), "00ff10");
        assert_eq!(hex::encode(b""), "");
    }
}
