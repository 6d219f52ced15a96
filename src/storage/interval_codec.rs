//! TimeWarrior data lines. Current TimeWarrior writes JSON objects:
//!
//! ```text
//! {"start":"20231001T120000Z","end":"20231001T130000Z","tags":["ProjectB"],"annotation":"Task 2"}
//! ```
//!
//! Older data files and undo logs use a whitespace separated form where tokens may be quoted:
//!
//! ```text
//! inc 20251201T014528Z - 20251201T041127Z # plan "plan_" |8ba7daab| # some annotation
//! ```
//!
//! The project of an activity is the first tag and its description is the annotation.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tracking::entities::Activity;

use super::DecodeError;

pub const TIME_LAYOUT: &str = "%Y%m%dT%H%M%SZ";

const LEGACY_PREFIX: &str = "inc";
const SECTION_MARKER: &str = "#";

#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone, Default)]
pub struct Interval {
    pub start: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
}

impl Interval {
    pub fn from_activity(activity: &Activity) -> Self {
        Self {
            start: format_time(activity.start_time),
            end: activity.end_time.map(format_time),
            tags: if activity.project.is_empty() {
                vec![]
            } else {
                vec![activity.project.clone()]
            },
            annotation: Some(activity.description.clone()).filter(|v| !v.is_empty()),
        }
    }

    pub fn to_activity(&self) -> Result<Activity, DecodeError> {
        let start = parse_time(&self.start)?;
        let end = self.end.as_deref().map(parse_time).transpose()?;
        let project = self.tags.first().cloned().unwrap_or_default();
        let description = self.annotation.clone().unwrap_or_default();

        Ok(Activity {
            end_time: end,
            ..Activity::new(project, description, start)
        })
    }

    /// Parses either representation of a data line.
    pub fn parse_line(line: &str) -> Result<Self, DecodeError> {
        let line = line.trim();
        if line.starts_with('{') {
            serde_json::from_str(line).map_err(|e| DecodeError::InvalidJson(e.to_string()))
        } else if line.starts_with(LEGACY_PREFIX) {
            parse_legacy_line(line)
        } else {
            Err(DecodeError::UnknownFormat)
        }
    }

    /// Serializes into the JSON form. Legacy lines are never written back.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

pub fn format_time(time: DateTime<Utc>) -> String {
    time.format(TIME_LAYOUT).to_string()
}

pub fn parse_time(value: &str) -> Result<DateTime<Utc>, DecodeError> {
    NaiveDateTime::parse_from_str(value, TIME_LAYOUT)
        .map(|v| v.and_utc())
        .map_err(|_| DecodeError::InvalidTime(value.to_string()))
}

/// `inc <start> [- <end>] [# <tag>...] [# <annotation words...>]`
fn parse_legacy_line(line: &str) -> Result<Interval, DecodeError> {
    let tokens = tokenize(line);
    let mut tokens = tokens.iter().map(String::as_str).peekable();
    if tokens.next() != Some(LEGACY_PREFIX) {
        return Err(DecodeError::UnknownFormat);
    }

    let mut interval = Interval {
        start: tokens
            .next_if(|v| looks_like_timestamp(v))
            .ok_or(DecodeError::UnknownFormat)?
            .to_string(),
        ..Default::default()
    };

    if tokens.next_if_eq(&"-").is_some() {
        interval.end = Some(
            tokens
                .next_if(|v| looks_like_timestamp(v))
                .ok_or(DecodeError::UnknownFormat)?
                .to_string(),
        );
    }

    if tokens.next_if_eq(&SECTION_MARKER).is_some() {
        while let Some(tag) = tokens.next_if(|v| *v != SECTION_MARKER) {
            interval.tags.push(tag.to_string());
        }
    }

    if tokens.next_if_eq(&SECTION_MARKER).is_some() {
        let annotation = tokens.collect::<Vec<_>>().join(" ");
        interval.annotation = Some(annotation).filter(|v| !v.is_empty());
    }

    Ok(interval)
}

fn looks_like_timestamp(token: &str) -> bool {
    token.len() == 16 && token.as_bytes()[8] == b'T'
}

/// Splits on whitespace outside of double quotes. Quotes themselves are dropped, so `"a b"`
/// becomes the single token `a b`.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = vec![];
    let mut current = String::new();
    let mut in_quote = false;

    for c in line.chars() {
        match c {
            '"' => in_quote = !in_quote,
            c if c.is_whitespace() && !in_quote => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
