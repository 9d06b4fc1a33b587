//! Timestamp parsing for input payloads

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};

use crate::types::InputFormatError;

/// Zone-less formats, interpreted as UTC.
const NAIVE_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse RFC 3339, a zone-less ISO-8601 / `YYYY-MM-DD HH:MM:SS` string
/// (UTC assumed), a bare date, or integer epoch seconds.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, InputFormatError> {
    let s = s.trim().trim_matches('"');
    if s.is_empty() {
        return Err(InputFormatError::Timestamp(s.to_string()));
    }

    if let Ok(epoch) = s.parse::<i64>() {
        return from_epoch(epoch).ok_or_else(|| InputFormatError::Timestamp(s.to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z") {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.and_utc());
        }
    }

    if let Ok(date) = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc());
        }
    }

    Err(InputFormatError::Timestamp(s.to_string()))
}

/// Parse a JSON timestamp: a string in any supported format or an integer
/// number of epoch seconds.
pub fn parse_timestamp_value(value: &serde_json::Value) -> Result<DateTime<Utc>, InputFormatError> {
    match value {
        serde_json::Value::String(s) => parse_timestamp(s),
        serde_json::Value::Number(n) => n
            .as_i64()
            .and_then(from_epoch)
            .ok_or_else(|| InputFormatError::Timestamp(n.to_string())),
        other => Err(InputFormatError::Timestamp(other.to_string())),
    }
}

fn from_epoch(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

/// Daily steps starting at UTC midnight of `now`, one per sample.
pub fn default_timestamps(count: usize, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map_or(now, |dt| dt.and_utc());
    (0..count)
        .map(|i| midnight + Duration::days(i as i64))
        .collect()
}
