use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::entities::Activity;

#[derive(Debug, Clone, Default)]
pub struct StartActivityRequest {
    pub description: String,
    pub project: String,
    /// Defaults to the current time.
    pub start_time: Option<DateTime<Utc>>,
    pub notes: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StopActivityRequest {
    /// Defaults to the current time.
    pub end_time: Option<DateTime<Utc>>,
    pub notes: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AddActivityRequest {
    pub description: String,
    pub project: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub notes: String,
    pub tags: Vec<String>,
}

/// Query over stored activities. Every criterion is optional and they are combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityFilter {
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub project: Option<String>,
    pub description: Option<String>,
    pub is_running: Option<bool>,
}

impl ActivityFilter {
    pub fn running() -> Self {
        Self {
            is_running: Some(true),
            ..Default::default()
        }
    }

    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from_date: Some(from),
            to_date: Some(to),
            ..Default::default()
        }
    }

    pub fn matches(&self, activity: &Activity) -> bool {
        if matches!(&self.project, Some(project) if *project != activity.project) {
            return false;
        }
        if matches!(&self.description, Some(description) if *description != activity.description)
        {
            return false;
        }
        if matches!(self.from_date, Some(from) if activity.start_time < from) {
            return false;
        }
        if matches!(self.to_date, Some(to) if activity.end_or_start() > to) {
            return false;
        }
        if matches!(self.is_running, Some(running) if running != activity.is_running()) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub activities: Vec<Activity>,
    #[serde(serialize_with = "serialize_duration")]
    pub total_duration: Duration,
    pub by_project: HashMap<String, ProjectReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectReport {
    pub project_name: String,
    #[serde(serialize_with = "serialize_duration")]
    pub duration: Duration,
    pub activities: Vec<Activity>,
}

impl ProjectReport {
    fn new(project_name: String) -> Self {
        Self {
            project_name,
            duration: Duration::zero(),
            activities: Vec::new(),
        }
    }
}

impl Default for Report {
    fn default() -> Self {
        Self {
            activities: Vec::new(),
            total_duration: Duration::zero(),
            by_project: HashMap::new(),
        }
    }
}

impl Report {
    /// Folds activities into totals. Running activities are measured up to `now`, which is
    /// shared by the whole report so the per-project sums add up to the total exactly.
    pub fn build(activities: Vec<Activity>, now: DateTime<Utc>) -> Self {
        let mut report = Report::default();
        for activity in activities {
            let duration = activity.duration(now);
            report.total_duration += duration;

            let project = report
                .by_project
                .entry(activity.project.clone())
                .or_insert_with(|| ProjectReport::new(activity.project.clone()));
            project.duration += duration;
            project.activities.push(activity.clone());

            report.activities.push(activity);
        }
        report
    }
}

pub(crate) fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_i64(duration.num_seconds())
}
