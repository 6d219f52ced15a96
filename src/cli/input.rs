use std::fmt::Display;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, Utc};
use chrono_english::parse_date_string;
use clap::ValueEnum;
use now::DateTimeNow;

use crate::{
    tracking::dto::ActivityFilter,
    utils::time::{local_to_utc, TimeFormatter},
};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

/// Parses `HH:MM` (today) or `YYYY-MM-DD HH:MM` as a local wall-clock time.
pub fn parse_local_time(
    formatter: &TimeFormatter,
    input: &str,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    let today = now.with_timezone(&Local).date_naive();
    let naive = formatter.parse_time_with_date(input, today)?;
    local_to_utc(naive).ok_or_else(|| anyhow!("{input:?} does not exist in the local timezone"))
}

/// Natural language date such as "yesterday", "2 days ago" or "15/03/2025".
pub fn parse_natural_date(
    input: &str,
    now: DateTime<Utc>,
    style: DateStyle,
) -> Result<DateTime<Local>> {
    parse_date_string(input, now.with_timezone(&Local), style.into())
        .map_err(|e| anyhow!("Failed to parse date {input:?}: {e}"))
}

/// Go style durations made of `<number><unit>` pairs with `h`, `m` or `s` units, e.g. `1h30m`.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim();
    if input.is_empty() {
        bail!("Empty duration");
    }

    let mut total = Duration::zero();
    let mut number = String::new();
    for c in input.chars() {
        if c.is_ascii_digit() {
            number.push(c);
            continue;
        }
        let value = std::mem::take(&mut number)
            .parse::<i64>()
            .with_context(|| format!("Invalid duration {input:?}"))?;
        let part = match c {
            'h' => Duration::try_hours(value),
            'm' => Duration::try_minutes(value),
            's' => Duration::try_seconds(value),
            _ => bail!("Invalid duration unit {c:?} in {input:?}"),
        };
        total = part
            .and_then(|v| total.checked_add(&v))
            .ok_or_else(|| anyhow!("Duration {input:?} is too long"))?;
    }
    if !number.is_empty() {
        bail!("Missing unit in duration {input:?}");
    }
    Ok(total)
}

/// Filter selecting everything within the local day of `day`.
pub fn whole_day(day: DateTime<Local>) -> ActivityFilter {
    ActivityFilter::between(
        day.beginning_of_day().with_timezone(&Utc),
        day.end_of_day().with_timezone(&Utc),
    )
}

/// Local moment in the middle of `date`, used to address whole days.
pub fn local_midday(date: NaiveDate) -> Result<DateTime<Local>> {
    let midday = NaiveTime::from_hms_opt(12, 0, 0).ok_or_else(|| anyhow!("Invalid midday"))?;
    local_to_utc(date.and_time(midday))
        .map(|v| v.with_timezone(&Local))
        .ok_or_else(|| anyhow!("{date} does not exist in the local timezone"))
}

/// Splits `YYYY-MM-DD-NN` into the day and the 1-based position of an activity on that day.
pub fn parse_day_index(input: &str) -> Result<(NaiveDate, usize)> {
    let (date, sequence) = input
        .trim()
        .rsplit_once('-')
        .ok_or_else(|| anyhow!("Invalid index {input:?}, expected YYYY-MM-DD-NN"))?;
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .with_context(|| format!("Invalid date {date:?}"))?;
    let sequence = sequence
        .parse::<usize>()
        .with_context(|| format!("Invalid sequence {sequence:?}"))?;
    Ok((date, sequence))
}
