//! Hourly schedule expansion
//!
//! An hourly schedule is a set of local times of day. Expanding it yields
//! the concrete timestamps that match those times, which can then be
//! paired with texts and queued through the importer.

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone};

use crate::error::{Result, XcastError};
use crate::types::{HourlySchedule, NewPost};

/// Validate "H:MM"/"HH:MM" entries and return them padded, sorted and deduplicated
pub fn normalize_hours(hours: &[String]) -> Result<Vec<String>> {
    let mut times = Vec::with_capacity(hours.len());
    for raw in hours {
        times.push(parse_hour(raw)?);
    }
    if times.is_empty() {
        return Err(XcastError::InvalidInput(
            "schedule needs at least one hour".to_string(),
        ));
    }

    times.sort();
    times.dedup();
    Ok(times.iter().map(|t| t.format("%H:%M").to_string()).collect())
}

fn parse_hour(raw: &str) -> Result<NaiveTime> {
    let invalid = || XcastError::InvalidInput(format!("invalid hour '{}': expected HH:MM", raw));

    let (h, m) = raw.trim().split_once(':').ok_or_else(invalid)?;
    if h.is_empty() || h.len() > 2 || m.len() != 2 {
        return Err(invalid());
    }
    let hour: u32 = h.parse().map_err(|_| invalid())?;
    let minute: u32 = m.parse().map_err(|_| invalid())?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
}

/// The next `count` timestamps at or after `from` matching the schedule
///
/// Times are interpreted in `offset`. Nothing before the schedule's start
/// date is produced, and inactive schedules produce nothing at all.
pub fn next_slots(schedule: &HourlySchedule, from: i64, count: usize, offset: FixedOffset) -> Vec<i64> {
    if !schedule.is_active || count == 0 {
        return vec![];
    }

    let times: Vec<NaiveTime> = schedule
        .hours
        .iter()
        .filter_map(|h| parse_hour(h).ok())
        .collect();
    if times.is_empty() {
        return vec![];
    }

    let start_of_schedule = schedule
        .start_date
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|midnight| offset.from_local_datetime(&midnight).single())
        .map(|dt| dt.timestamp())
        .unwrap_or(i64::MIN);
    let start = from.max(start_of_schedule);

    let Some(start_local) = DateTime::from_timestamp(start, 0).map(|dt| dt.with_timezone(&offset)) else {
        return vec![];
    };

    let mut slots = Vec::with_capacity(count);
    let mut day = start_local.date_naive();
    // Every day yields at least one slot, so this is bounded by count + 1 days
    while slots.len() < count {
        for time in &times {
            let Some(ts) = offset
                .from_local_datetime(&day.and_time(*time))
                .single()
                .map(|dt| dt.timestamp())
            else {
                continue;
            };
            if ts >= start {
                slots.push(ts);
                if slots.len() == count {
                    break;
                }
            }
        }
        match day.checked_add_signed(Duration::days(1)) {
            Some(next) => day = next,
            None => break,
        }
    }

    slots
}

/// Pair texts with the schedule's next slots, one post per text
pub fn plan_posts(
    schedule: &HourlySchedule,
    texts: &[String],
    from: i64,
    offset: FixedOffset,
) -> Vec<NewPost> {
    let slots = next_slots(schedule, from, texts.len(), offset);

    texts
        .iter()
        .zip(slots)
        .map(|(text, ts)| NewPost {
            content: Some(text.clone()),
            image_names: vec![],
            scheduled_at: crate::scheduling::format_timestamp(ts, offset),
        })
        .collect()
}
