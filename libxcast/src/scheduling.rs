//! Schedule string parsing
//!
//! Turns the `scheduled_at` strings clients send into Unix timestamps.

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, TimeZone, Utc};

use crate::error::{Result, XcastError};

/// Naive formats interpreted in the configured offset
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse a schedule string into a Unix timestamp
///
/// Tried in order:
/// - RFC 3339: "2026-03-01T09:00:00+09:00"
/// - Naive local time in `offset`: "2026-03-01T09:00", "2026-03-01 09:00:30"
/// - Relative durations from `now`: "30m", "2h", "1 day"
/// - Natural language: "tomorrow", "next friday 10am"
///
/// Times in the past are accepted; such posts are due immediately.
pub fn parse_schedule(input: &str, now: DateTime<Utc>, offset: FixedOffset) -> Result<i64> {
    let input = input.trim();
    if input.is_empty() {
        return Err(XcastError::InvalidInput(
            "scheduled_at cannot be empty".to_string(),
        ));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.timestamp());
    }

    if let Some(ts) = parse_naive(input, offset) {
        return Ok(ts);
    }

    if let Some(duration) = parse_duration(input) {
        return now
            .checked_add_signed(duration)
            .map(|dt| dt.timestamp())
            .ok_or_else(|| XcastError::InvalidInput("scheduled_at is out of range".to_string()));
    }

    let local_now = now.with_timezone(&offset);
    if let Ok(dt) = chrono_english::parse_date_string(input, local_now, chrono_english::Dialect::Us)
    {
        return Ok(dt.timestamp());
    }

    Err(XcastError::InvalidInput(format!(
        "could not parse scheduled_at: '{}'",
        input
    )))
}

fn parse_naive(input: &str, offset: FixedOffset) -> Option<i64> {
    NAIVE_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(input, format)
            .ok()
            .and_then(|naive| offset.from_local_datetime(&naive).single())
            .map(|dt| dt.timestamp())
    })
}

fn parse_duration(input: &str) -> Option<Duration> {
    let std_duration = humantime::parse_duration(input).ok()?;
    Duration::try_seconds(i64::try_from(std_duration.as_secs()).ok()?)
}

/// Render a timestamp in the given offset, for logs and responses
pub fn format_timestamp(ts: i64, offset: FixedOffset) -> String {
    match DateTime::from_timestamp(ts, 0) {
        Some(dt) => dt.with_timezone(&offset).to_rfc3339(),
        None => ts.to_string(),
    }
}
