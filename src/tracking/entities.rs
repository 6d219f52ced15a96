use chrono::{DateTime, Duration, Local, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// A single tracked interval of work. An activity without `end_time` is still running.
///
/// Notes and tags are not part of the primary record. They live in the note store and are merged
/// in when activities are read through the service.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct Activity {
    pub description: String,
    pub project: String,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Activity {
    pub fn new(
        project: impl Into<String>,
        description: impl Into<String>,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            description: description.into(),
            project: project.into(),
            start_time,
            end_time: None,
            notes: String::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_end(self, end_time: DateTime<Utc>) -> Self {
        Self {
            end_time: Some(end_time),
            ..self
        }
    }

    pub fn is_running(&self) -> bool {
        self.end_time.is_none()
    }

    /// Time spent on the activity. Running activities are measured up to `now`.
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        self.end_time.unwrap_or(now) - self.start_time
    }

    /// End of the activity, or its start if it is still running. This is the moment compared
    /// against the upper bound of a filter.
    pub fn end_or_start(&self) -> DateTime<Utc> {
        self.end_time.unwrap_or(self.start_time)
    }

    /// Key used by the note store: Unix seconds of the start, truncated to the minute. The line
    /// format drops seconds, so the key must not depend on them to survive a round trip.
    pub fn id(&self) -> String {
        truncate_to_minute(self.start_time).timestamp().to_string()
    }

    /// Local calendar day the activity started on. Notes are grouped by it.
    pub fn note_date(&self) -> NaiveDate {
        self.start_time.with_timezone(&Local).date_naive()
    }

    /// Whether both activities start within the same minute. The line format only keeps minutes,
    /// so this is how records are recognized there.
    pub fn starts_in_same_minute(&self, other: &Activity) -> bool {
        truncate_to_minute(self.start_time) == truncate_to_minute(other.start_time)
    }
}

pub fn truncate_to_minute(time: DateTime<Utc>) -> DateTime<Utc> {
    time.with_second(0)
        .and_then(|v| v.with_nanosecond(0))
        .unwrap_or(time)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::Activity;

    #[test]
    fn test_duration_of_stopped_and_running() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let now = start + Duration::hours(3);

        let running = Activity::new("work", "coding", start);
        assert_eq!(running.duration(now), Duration::hours(3));

        let stopped = running.with_end(start + Duration::minutes(45));
        assert_eq!(stopped.duration(now), Duration::minutes(45));
    }

    #[test]
    fn test_same_minute_ignores_seconds() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 12).unwrap();
        let a = Activity::new("work", "a", start);
        let b = Activity::new("other", "b", start + Duration::seconds(40));
        let c = Activity::new("work", "a", start + Duration::seconds(50));

        assert!(a.starts_in_same_minute(&b));
        assert!(!a.starts_in_same_minute(&c));
    }

    #[test]
    fn test_id_is_unix_seconds() {
        let start = Utc.with_ymd_and_hms(2023, 10, 1, 10, 0, 0).unwrap();
        assert_eq!(Activity::new("p", "d", start).id(), "1696154400");
    }

    #[test]
    fn test_id_ignores_seconds() {
        let start = Utc.with_ymd_and_hms(2023, 10, 1, 10, 0, 37).unwrap();
        assert_eq!(Activity::new("p", "d", start).id(), "1696154400");
    }
}
