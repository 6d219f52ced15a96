use anyhow::{anyhow, bail, Context, Result};
use chrono::{
    DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};

/// This is the standard way of converting a date to a string in tock. Used for naming per-day
/// note directories.
pub fn date_to_record_name(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Name of the file holding intervals for the month `date` falls into.
pub fn month_to_record_name(date: NaiveDate) -> String {
    format!("{:04}-{:02}.data", date.year(), date.month())
}

/// First day of the month `date` falls into.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Interprets a wall-clock time in the local timezone. Ambiguous times (clocks turned back) take
/// the earlier instant, non-existent ones (clocks turned forward) yield `None`.
pub fn local_to_utc(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|v| v.with_timezone(&Utc))
}

/// Formats a duration as `HH:MM:SS`.
pub fn format_hms(duration: Duration) -> String {
    let seconds = duration.num_seconds().max(0);
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        seconds % 3600 / 60,
        seconds % 60
    )
}

/// Formats a duration as `Xh Ym`.
pub fn format_hours_minutes(duration: Duration) -> String {
    let minutes = duration.num_minutes().max(0);
    format!("{}h {}m", minutes / 60, minutes % 60)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HourFormat {
    #[default]
    TwentyFourHour,
    TwelveHour,
}

/// Parses and renders wall-clock times according to the configured hour format. Created once from
/// configuration and passed to whatever prints or reads times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeFormatter {
    format: HourFormat,
}

impl TimeFormatter {
    pub fn new(format: HourFormat) -> Self {
        Self { format }
    }

    /// `"12"` selects the 12 hour clock, anything else falls back to 24 hours.
    pub fn from_setting(setting: &str) -> Self {
        match setting.trim() {
            "12" => Self::new(HourFormat::TwelveHour),
            _ => Self::new(HourFormat::TwentyFourHour),
        }
    }

    pub fn format(&self) -> HourFormat {
        self.format
    }

    pub fn display_format(&self) -> &'static str {
        match self.format {
            HourFormat::TwentyFourHour => "%H:%M",
            HourFormat::TwelveHour => "%I:%M %p",
        }
    }

    pub fn display_format_with_date(&self) -> &'static str {
        match self.format {
            HourFormat::TwentyFourHour => "%Y-%m-%d %H:%M",
            HourFormat::TwelveHour => "%Y-%m-%d %I:%M %p",
        }
    }

    pub fn display<Tz: TimeZone>(&self, time: &DateTime<Tz>) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        time.format(self.display_format()).to_string()
    }

    pub fn display_with_date<Tz: TimeZone>(&self, time: &DateTime<Tz>) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        time.format(self.display_format_with_date()).to_string()
    }

    /// Parses a time of day and places it on `day`.
    ///
    /// `HH:MM` is always accepted. The 12 hour clock additionally accepts forms like `3:04 PM`,
    /// `3:04pm`, `03 PM` and `3pm`.
    pub fn parse_time(&self, input: &str, day: NaiveDate) -> Result<NaiveDateTime> {
        let input = input.trim();
        if let Ok(time) = NaiveTime::parse_from_str(input, "%H:%M") {
            return Ok(day.and_time(time));
        }
        match self.format {
            HourFormat::TwentyFourHour => bail!("Invalid time {input:?}, expected HH:MM"),
            HourFormat::TwelveHour => Ok(day.and_time(parse_twelve_hour(input)?)),
        }
    }

    /// Parses either a bare time of day (placed on `today`) or `YYYY-MM-DD <time>`.
    pub fn parse_time_with_date(&self, input: &str, today: NaiveDate) -> Result<NaiveDateTime> {
        let input = input.trim();
        if let Some((date, time)) = input.split_once(' ') {
            if let Ok(date) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
                return self.parse_time(time, date);
            }
        }
        self.parse_time(input, today)
    }
}

fn parse_twelve_hour(input: &str) -> Result<NaiveTime> {
    let lowered = input.to_ascii_lowercase();
    let (clock, afternoon) = if let Some(v) = lowered.strip_suffix("pm") {
        (v.trim_end(), true)
    } else if let Some(v) = lowered.strip_suffix("am") {
        (v.trim_end(), false)
    } else {
        bail!("Invalid time {input:?}, expected HH:MM or H:MM AM/PM");
    };

    let (hour, minute) = clock.split_once(':').unwrap_or((clock, "0"));
    let hour: u32 = hour
        .parse()
        .with_context(|| format!("Invalid hour in {input:?}"))?;
    let minute: u32 = minute
        .parse()
        .with_context(|| format!("Invalid minute in {input:?}"))?;
    if !(1..=12).contains(&hour) {
        bail!("Hour in {input:?} must be between 1 and 12");
    }

    let hour = match (hour, afternoon) {
        (12, false) => 0,
        (12, true) => 12,
        (hour, true) => hour + 12,
        (hour, false) => hour,
    };
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| anyhow!("Invalid time {input:?}"))
}
