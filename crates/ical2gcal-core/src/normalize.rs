//! Wall-clock parsing and timezone resolution.
//!
//! Raw date values arrive as local timestamps with an unreliable timezone
//! label. Normalization strips the UTC designator, parses the wall-clock
//! value against a small set of formats, and attaches a resolved zone
//! without converting the clock reading.

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use thiserror::Error;

/// The timezone label attached to instants interpreted as UTC.
pub const UTC_LABEL: &str = "UTC";

/// Timestamp formats tried in order when parsing a raw value.
const DATETIME_FORMATS: &[&str] = &["%Y%m%dT%H%M%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Date-only formats, parsed as midnight.
const DATE_FORMATS: &[&str] = &["%Y%m%d", "%Y-%m-%d"];

/// A date value that could not be normalized.
///
/// These are recoverable: the caller skips the event and moves on.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The value matched none of the accepted formats.
    #[error("unrecognized date value {0:?}")]
    UnrecognizedValue(String),

    /// The wall-clock value falls inside a DST gap in the resolved zone.
    #[error("time {value:?} does not exist in timezone {zone}")]
    NonexistentLocalTime { value: String, zone: String },
}

/// An absolute instant paired with the timezone label it is presented in.
///
/// The label is always either `"UTC"` or the configured default timezone,
/// and is the same zone the wall-clock value was interpreted in. Both the
/// content id and the destination payload use [`render`](Self::render),
/// so the rendering is part of the event identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZonedTime {
    /// The instant, carrying the zone it was interpreted in.
    pub date_time: DateTime<Tz>,
    /// The label sent to the destination alongside the instant.
    pub time_zone: String,
}

impl ZonedTime {
    /// Renders the wall-clock timestamp with its UTC offset attached,
    /// e.g. `2024-03-15T10:00:00+00:00`.
    pub fn render(&self) -> String {
        self.date_time.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
    }

    /// The wall-clock value without zone information, for cutoff
    /// comparisons.
    pub fn naive_local(&self) -> NaiveDateTime {
        self.date_time.naive_local()
    }
}

/// Parses a raw date value into a [`ZonedTime`].
///
/// The declared timezone decides the zone the value is interpreted in:
/// no label and the literal `UTC` label both mean UTC, while any other
/// label is replaced by `default_tz`. The feeds this tool targets publish
/// vendor aliases and display names in TZID parameters, so literal labels
/// are never trusted as IANA zone names.
///
/// A value inside a DST fold resolves to the earlier of the two instants.
pub fn parse_zoned(
    value: &str,
    declared_tz: Option<&str>,
    default_tz: Tz,
) -> Result<ZonedTime, NormalizeError> {
    let (label, tz) = match declared_tz {
        Some(name) if name != UTC_LABEL => (default_tz.name(), default_tz),
        _ => (UTC_LABEL, Tz::UTC),
    };

    // The UTC designator is dropped rather than honored; the zone above
    // already decides the interpretation.
    let cleaned = value.replace(['Z', 'z'], "");
    let cleaned = cleaned.trim();

    let naive = parse_wall_clock(cleaned)
        .ok_or_else(|| NormalizeError::UnrecognizedValue(value.to_string()))?;

    let date_time = match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earlier, _) => earlier,
        LocalResult::None => {
            return Err(NormalizeError::NonexistentLocalTime {
                value: value.to_string(),
                zone: label.to_string(),
            });
        }
    };

    Ok(ZonedTime {
        date_time,
        time_zone: label.to_string(),
    })
}

/// Tries each accepted format in order; date-only values become midnight.
fn parse_wall_clock(value: &str) -> Option<NaiveDateTime> {
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date.and_time(NaiveTime::MIN));
        }
    }
    None
}
