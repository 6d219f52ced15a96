//! Plain text encoding, one activity per line:
//!
//! ```text
//! 2024-03-01 09:00 - 2024-03-01 10:30 | work | code review
//! 2024-03-01 10:30 | work | writing docs
//! ```
//!
//! Times are local wall-clock times. Lines are written with minute precision, seconds are
//! accepted when reading.

use chrono::{DateTime, Local, NaiveDateTime, Utc};

use crate::{tracking::entities::Activity, utils::time::local_to_utc};

use super::DecodeError;

const TIME_LAYOUT_MIN: &str = "%Y-%m-%d %H:%M";
const TIME_LAYOUT_SEC: &str = "%Y-%m-%d %H:%M:%S";
const RANGE_SEPARATOR: &str = " - ";

/// Decodes a single line. Blank lines and free text without the `|` separated fields are
/// [DecodeError::NotAnActivity].
pub fn decode(line: &str) -> Result<Activity, DecodeError> {
    let mut parts = line.splitn(3, '|');
    let (Some(time_part), Some(project), Some(description)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return Err(DecodeError::NotAnActivity);
    };

    let time_part = time_part.trim();
    let (start, end) = match time_part.split_once(RANGE_SEPARATOR) {
        Some((start, end)) => (parse_time(start)?, Some(parse_time(end)?)),
        None => (parse_time(time_part)?, None),
    };

    Ok(Activity {
        end_time: end,
        ..Activity::new(project.trim(), description.trim(), start)
    })
}

pub fn encode(activity: &Activity) -> String {
    let start = format_time(activity.start_time);
    match activity.end_time {
        Some(end) => format!(
            "{start}{RANGE_SEPARATOR}{} | {} | {}",
            format_time(end),
            activity.project,
            activity.description
        ),
        None => format!("{start} | {} | {}", activity.project, activity.description),
    }
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, DecodeError> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, TIME_LAYOUT_MIN)
        .or_else(|_| NaiveDateTime::parse_from_str(value, TIME_LAYOUT_SEC))
        .ok()
        .and_then(local_to_utc)
        .ok_or_else(|| DecodeError::InvalidTime(value.to_string()))
}

fn format_time(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local).format(TIME_LAYOUT_MIN).to_string()
}
