//! Structural event extraction from calendar feed text.
//!
//! Feeds are treated as text rather than parsed against the full iCalendar
//! grammar: event blocks are located with regular expressions and only the
//! scheduling fields are pulled out. This tolerates the malformed output
//! some publishers produce, at the cost of ignoring folded lines and
//! quoting rules.
//!
//! A block missing its summary or its start/end fields is skipped with a
//! diagnostic; one bad block never aborts the scan.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

/// Timezone alias emitted by Outlook-published feeds, rewritten (with its
/// surrounding quotes) to the plain UTC label before extraction.
const VENDOR_UTC_ALIAS: &str = "\"tzone://Microsoft/Utc\"";

/// Matches one `BEGIN:VEVENT` .. `END:VEVENT` block, across lines.
static EVENT_BLOCK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)BEGIN:VEVENT.*?END:VEVENT").expect("Invalid event block regex")
});

/// Captures the remainder of the first summary line.
static SUMMARY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)summary:([^\r\n]*)").expect("Invalid summary regex"));

/// Marks a block as an all-day event.
static ALL_DAY_MARKER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)X-MICROSOFT-CDO-ALLDAYEVENT:TRUE").expect("Invalid all-day marker regex")
});

/// All-day start, a bare date with no timezone parameter.
static ALL_DAY_START_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)dtstart;value=date:(?P<date>[^\r\n]*)").expect("Invalid all-day start regex")
});

/// All-day end, a bare date with no timezone parameter.
static ALL_DAY_END_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)dtend;value=date:(?P<date>[^\r\n]*)").expect("Invalid all-day end regex")
});

/// Timed start carrying a TZID parameter.
static TIMED_START_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)dtstart;tzid=(?P<timezone>[^:\r\n]*):(?P<date>[^\r\n]*)")
        .expect("Invalid timed start regex")
});

/// Timed end carrying a TZID parameter.
static TIMED_END_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)dtend;tzid=(?P<timezone>[^:\r\n]*):(?P<date>[^\r\n]*)")
        .expect("Invalid timed end regex")
});

/// A raw date value and the timezone label it was declared with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDateField {
    /// The value exactly as published, e.g. `20240315T100000` or `20240318`.
    pub value: String,
    /// The TZID parameter, absent for all-day dates.
    pub tzid: Option<String>,
}

/// The scheduling fields extracted from one event block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEventFields {
    /// The event title, with any trailing carriage return removed.
    pub summary: String,
    /// The raw start field.
    pub start: RawDateField,
    /// The raw end field.
    pub end: RawDateField,
    /// Whether the block carried the all-day marker.
    pub all_day: bool,
}

/// Scans feed text for event blocks.
///
/// Construction applies the vendor alias rewrite once; [`scan`](Self::scan)
/// can then be called any number of times, each returning a fresh lazy
/// iterator over the usable blocks.
#[derive(Debug)]
pub struct EventScanner {
    content: String,
}

impl EventScanner {
    /// Creates a scanner over the given feed text.
    pub fn new(feed: impl Into<String>) -> Self {
        let content = feed.into().replace(VENDOR_UTC_ALIAS, "UTC");
        Self { content }
    }

    /// Iterates over the extractable events, in feed order.
    ///
    /// Blocks with missing fields are skipped with a `warn!` diagnostic
    /// and do not appear in the output.
    pub fn scan(&self) -> impl Iterator<Item = RawEventFields> + '_ {
        EVENT_BLOCK_REGEX
            .find_iter(&self.content)
            .filter_map(|block| extract_fields(block.as_str()))
    }
}

/// Extracts the scheduling fields from one event block.
fn extract_fields(block: &str) -> Option<RawEventFields> {
    let summary = match SUMMARY_REGEX.captures(block).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().to_string(),
        None => {
            warn!("skipping event with no summary: {}", excerpt(block));
            return None;
        }
    };

    let all_day = ALL_DAY_MARKER_REGEX.is_match(block);

    // All-day blocks publish bare dates; timed blocks publish a TZID and a
    // local timestamp. The two shapes never mix within one block.
    let (start, end) = if all_day {
        (
            capture_field(&ALL_DAY_START_REGEX, block),
            capture_field(&ALL_DAY_END_REGEX, block),
        )
    } else {
        (
            capture_field(&TIMED_START_REGEX, block),
            capture_field(&TIMED_END_REGEX, block),
        )
    };

    match (start, end) {
        (Some(start), Some(end)) => Some(RawEventFields {
            summary,
            start,
            end,
            all_day,
        }),
        _ => {
            warn!("skipping event with missing start or end: {}", summary);
            None
        }
    }
}

/// Runs a field regex over a block, returning the date value and any
/// captured timezone label.
fn capture_field(regex: &Regex, block: &str) -> Option<RawDateField> {
    let caps = regex.captures(block)?;
    Some(RawDateField {
        value: caps.name("date")?.as_str().to_string(),
        tzid: caps.name("timezone").map(|m| m.as_str().to_string()),
    })
}

/// A short prefix of a block for diagnostics.
fn excerpt(block: &str) -> String {
    const MAX_CHARS: usize = 120;
    if block.chars().count() <= MAX_CHARS {
        block.to_string()
    } else {
        let prefix: String = block.chars().take(MAX_CHARS).collect();
        format!("{}...", prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_feed() -> &'static str {
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Test//Test//EN\r\n\
         BEGIN:VEVENT\r\n\
         SUMMARY:Team Standup\r\n\
         DTSTART;TZID=Europe/London:20240315T100000\r\n\
         DTEND;TZID=Europe/London:20240315T103000\r\n\
         END:VEVENT\r\n\
         BEGIN:VEVENT\r\n\
         SUMMARY:Company Holiday\r\n\
         X-MICROSOFT-CDO-ALLDAYEVENT:TRUE\r\n\
         DTSTART;VALUE=DATE:20240318\r\n\
         DTEND;VALUE=DATE:20240319\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n"
    }

    #[test]
    fn scan_finds_all_blocks() {
        let scanner = EventScanner::new(sample_feed());
        let events: Vec<_> = scanner.scan().collect();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn scan_is_restartable() {
        let scanner = EventScanner::new(sample_feed());
        assert_eq!(scanner.scan().count(), 2);
        assert_eq!(scanner.scan().count(), 2);
    }

    #[test]
    fn timed_event_fields() {
        let scanner = EventScanner::new(sample_feed());
        let event = scanner.scan().next().unwrap();

        assert_eq!(event.summary, "Team Standup");
        assert!(!event.all_day);
        assert_eq!(event.start.value, "20240315T100000");
        assert_eq!(event.start.tzid, Some("Europe/London".to_string()));
        assert_eq!(event.end.value, "20240315T103000");
        assert_eq!(event.end.tzid, Some("Europe/London".to_string()));
    }

    #[test]
    fn all_day_event_fields() {
        let scanner = EventScanner::new(sample_feed());
        let event = scanner.scan().nth(1).unwrap();

        assert_eq!(event.summary, "Company Holiday");
        assert!(event.all_day);
        assert_eq!(event.start.value, "20240318");
        assert!(event.start.tzid.is_none());
        assert_eq!(event.end.value, "20240319");
        assert!(event.end.tzid.is_none());
    }

    #[test]
    fn field_matching_is_case_insensitive() {
        let feed = "begin:vevent\r\n\
                    summary:Lowercase Block\r\n\
                    dtstart;tzid=UTC:20240315T100000\r\n\
                    dtend;tzid=UTC:20240315T110000\r\n\
                    end:vevent\r\n";
        let scanner = EventScanner::new(feed);
        let events: Vec<_> = scanner.scan().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].summary, "Lowercase Block");
        assert_eq!(events[0].start.tzid, Some("UTC".to_string()));
    }

    #[test]
    fn vendor_utc_alias_is_rewritten() {
        let feed = "BEGIN:VEVENT\r\n\
                    SUMMARY:Aliased Zone\r\n\
                    DTSTART;TZID=\"tzone://Microsoft/Utc\":20240315T100000\r\n\
                    DTEND;TZID=\"tzone://Microsoft/Utc\":20240315T110000\r\n\
                    END:VEVENT\r\n";
        let scanner = EventScanner::new(feed);
        let event = scanner.scan().next().unwrap();
        assert_eq!(event.start.tzid, Some("UTC".to_string()));
        assert_eq!(event.end.tzid, Some("UTC".to_string()));
    }

    #[test]
    fn block_without_summary_is_skipped() {
        let feed = "BEGIN:VEVENT\r\n\
                    DTSTART;TZID=UTC:20240315T100000\r\n\
                    DTEND;TZID=UTC:20240315T110000\r\n\
                    END:VEVENT\r\n\
                    BEGIN:VEVENT\r\n\
                    SUMMARY:Kept\r\n\
                    DTSTART;TZID=UTC:20240316T100000\r\n\
                    DTEND;TZID=UTC:20240316T110000\r\n\
                    END:VEVENT\r\n";
        let scanner = EventScanner::new(feed);
        let events: Vec<_> = scanner.scan().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].summary, "Kept");
    }

    #[test]
    fn block_without_end_is_skipped() {
        let feed = "BEGIN:VEVENT\r\n\
                    SUMMARY:No End\r\n\
                    DTSTART;TZID=UTC:20240315T100000\r\n\
                    END:VEVENT\r\n";
        let scanner = EventScanner::new(feed);
        assert_eq!(scanner.scan().count(), 0);
    }

    #[test]
    fn timed_patterns_ignore_bare_dtstart() {
        // A DTSTART without a TZID parameter is not a shape this scanner
        // accepts for timed events.
        let feed = "BEGIN:VEVENT\r\n\
                    SUMMARY:Bare Start\r\n\
                    DTSTART:20240315T100000Z\r\n\
                    DTEND:20240315T110000Z\r\n\
                    END:VEVENT\r\n";
        let scanner = EventScanner::new(feed);
        assert_eq!(scanner.scan().count(), 0);
    }

    #[test]
    fn empty_feed_yields_nothing() {
        let scanner = EventScanner::new("");
        assert_eq!(scanner.scan().count(), 0);
    }

    #[test]
    fn summary_preserves_inner_content() {
        let feed = "BEGIN:VEVENT\r\n\
                    SUMMARY:Budget review: Q2\r\n\
                    DTSTART;VALUE=DATE:20240318\r\n\
                    DTEND;VALUE=DATE:20240319\r\n\
                    X-MICROSOFT-CDO-ALLDAYEVENT:TRUE\r\n\
                    END:VEVENT\r\n";
        let scanner = EventScanner::new(feed);
        let event = scanner.scan().next().unwrap();
        assert_eq!(event.summary, "Budget review: Q2");
    }
}
