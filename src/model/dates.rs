//! Lenient timestamp parsing shared by the JSON loader and the CLI.
//!
//! Stored timestamps are RFC 3339 UTC. Older exports and hand-edited files
//! also carry bare dates (`2024-05-01`) or wall-clock date-times without an
//! offset (`2024-05-01T09:30`); those are read in local time.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse a timestamp in any of the accepted shapes.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return local_to_utc(naive);
        }
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    local_to_utc(date.and_time(NaiveTime::MIN))
}

/// Parse user date input. A bare date becomes local midnight, or the last
/// second of that local day when `end_of_day` is set (inclusive bounds).
pub fn parse_date_input(s: &str, end_of_day: bool) -> Option<DateTime<Utc>> {
    let trimmed = s.trim();
    if end_of_day && let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        let last_second = NaiveTime::from_hms_opt(23, 59, 59)?;
        return local_to_utc(date.and_time(last_second));
    }
    parse_timestamp(trimmed)
}

fn local_to_utc(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Serde helper for optional timestamps: `null`, missing, or unparseable
/// strings all become `None`.
pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

/// Serde helper for timestamps that must exist. `null` or an unparseable
/// string falls back to the current time, as a missing field does.
pub fn deserialize_or_now<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp).unwrap_or_else(Utc::now))
}
