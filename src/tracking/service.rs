use std::{collections::HashSet, future::Future};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    storage::{notes::NoteStore, ActivityStore},
    utils::clock::Clock,
};

use super::{
    dto::{
        ActivityFilter, AddActivityRequest, Report, StartActivityRequest, StopActivityRequest,
    },
    entities::Activity,
    errors::TrackError,
};

/// Everything a front end can do with activities.
pub trait ActivityResolver {
    /// Starts a new activity, stopping whatever is running.
    fn start(&self, request: StartActivityRequest) -> impl Future<Output = Result<Activity>>;

    /// Stops the most recently started running activity.
    fn stop(&self, request: StopActivityRequest) -> impl Future<Output = Result<Activity>>;

    /// Records an activity that already ended.
    fn add(&self, request: AddActivityRequest) -> impl Future<Output = Result<Activity>>;

    fn remove(&self, activity: &Activity) -> impl Future<Output = Result<()>>;

    fn list(&self, filter: &ActivityFilter) -> impl Future<Output = Result<Vec<Activity>>>;

    fn get_report(&self, filter: &ActivityFilter) -> impl Future<Output = Result<Report>>;

    /// Up to `limit` activities with distinct project and description, most recent first.
    fn get_recent(&self, limit: usize) -> impl Future<Output = Result<Vec<Activity>>>;

    fn get_last(&self) -> impl Future<Output = Result<Activity>>;

    /// Current time as seen by the resolver.
    fn now(&self) -> DateTime<Utc>;
}

/// [ActivityResolver] over any [ActivityStore]. Notes are optional; when present they are
/// written after the primary record and failures there never fail the operation.
pub struct ActivityService<S> {
    store: S,
    notes: Option<Box<dyn NoteStore>>,
    clock: Box<dyn Clock>,
}

impl<S: ActivityStore> ActivityService<S> {
    pub fn new(store: S, notes: Option<Box<dyn NoteStore>>, clock: Box<dyn Clock>) -> Self {
        Self {
            store,
            notes,
            clock,
        }
    }

    async fn save_notes(&self, activity: &Activity) {
        let Some(notes) = &self.notes else {
            return;
        };
        if let Err(e) = notes
            .save(
                &activity.id(),
                activity.note_date(),
                &activity.notes,
                &activity.tags,
            )
            .await
        {
            error!("Failed to save notes of activity {}: {e:?}", activity.id());
        }
    }

    async fn enrich_one(&self, mut activity: Activity) -> Activity {
        let Some(notes) = &self.notes else {
            return activity;
        };
        match notes.get(&activity.id(), activity.note_date()).await {
            Ok((text, tags)) => {
                activity.notes = text;
                activity.tags = tags;
            }
            Err(e) => warn!("Failed to read notes of activity {}: {e:?}", activity.id()),
        }
        activity
    }

    async fn enrich(&self, activities: Vec<Activity>) -> Vec<Activity> {
        if self.notes.is_none() {
            return activities;
        }
        let mut result = Vec::with_capacity(activities.len());
        for activity in activities {
            result.push(self.enrich_one(activity).await);
        }
        result
    }

    async fn find_running(&self) -> Result<Vec<Activity>> {
        self.store
            .find(&ActivityFilter::running())
            .await
            .context("Failed to find running activities")
    }
}

fn has_notes(notes: &str, tags: &[String]) -> bool {
    !notes.is_empty() || !tags.is_empty()
}

impl<S: ActivityStore> ActivityResolver for ActivityService<S> {
    async fn start(&self, request: StartActivityRequest) -> Result<Activity> {
        let now = self.clock.time();
        let start_time = request.start_time.unwrap_or(now);

        for running in self.find_running().await? {
            // A new activity placed before the running one must not give it a negative length.
            let end = if start_time < running.start_time {
                now.max(running.start_time)
            } else {
                start_time
            };
            info!(
                "Stopping {} | {} at {end}",
                running.project, running.description
            );
            self.store
                .save(&running.with_end(end))
                .await
                .context("Failed to stop running activity")?;
        }

        let activity = Activity {
            notes: request.notes,
            tags: request.tags,
            ..Activity::new(request.project, request.description, start_time)
        };
        self.store
            .save(&activity)
            .await
            .context("Failed to save activity")?;
        info!(
            "Started {} | {} at {start_time}",
            activity.project, activity.description
        );

        if has_notes(&activity.notes, &activity.tags) {
            self.save_notes(&activity).await;
        }
        Ok(activity)
    }

    async fn stop(&self, request: StopActivityRequest) -> Result<Activity> {
        let latest = self
            .find_running()
            .await?
            .into_iter()
            .reduce(|last, v| if v.start_time > last.start_time { v } else { last })
            .ok_or(TrackError::NoActiveActivity)?;

        let end = request.end_time.unwrap_or_else(|| self.clock.time());
        if end < latest.start_time {
            return Err(TrackError::InvalidTimeRange {
                start: latest.start_time,
                end,
            }
            .into());
        }

        // Existing notes are loaded first so that passing only tags keeps the text and the other
        // way around.
        let mut activity = self.enrich_one(latest.with_end(end)).await;
        let update_notes = has_notes(&request.notes, &request.tags);
        if !request.notes.is_empty() {
            activity.notes = request.notes;
        }
        if !request.tags.is_empty() {
            activity.tags = request.tags;
        }

        self.store
            .save(&activity)
            .await
            .context("Failed to save activity")?;
        info!(
            "Stopped {} | {} at {end}",
            activity.project, activity.description
        );

        if update_notes {
            self.save_notes(&activity).await;
        }
        Ok(activity)
    }

    async fn add(&self, request: AddActivityRequest) -> Result<Activity> {
        if request.end_time < request.start_time {
            return Err(TrackError::InvalidTimeRange {
                start: request.start_time,
                end: request.end_time,
            }
            .into());
        }

        let activity = Activity {
            notes: request.notes,
            tags: request.tags,
            ..Activity::new(request.project, request.description, request.start_time)
                .with_end(request.end_time)
        };
        self.store
            .save(&activity)
            .await
            .context("Failed to save activity")?;
        info!(
            "Added {} | {} from {} to {}",
            activity.project, activity.description, request.start_time, request.end_time
        );

        if has_notes(&activity.notes, &activity.tags) {
            self.save_notes(&activity).await;
        }
        Ok(activity)
    }

    async fn remove(&self, activity: &Activity) -> Result<()> {
        self.store
            .remove(activity)
            .await
            .context("Failed to remove activity")?;
        info!(
            "Removed {} | {} started at {}",
            activity.project, activity.description, activity.start_time
        );
        Ok(())
    }

    async fn list(&self, filter: &ActivityFilter) -> Result<Vec<Activity>> {
        let activities = self
            .store
            .find(filter)
            .await
            .context("Failed to find activities")?;
        Ok(self.enrich(activities).await)
    }

    #[instrument(skip(self))]
    async fn get_report(&self, filter: &ActivityFilter) -> Result<Report> {
        let activities = self.list(filter).await?;
        debug!("Building report over {} activities", activities.len());
        Ok(Report::build(activities, self.clock.time()))
    }

    async fn get_recent(&self, limit: usize) -> Result<Vec<Activity>> {
        let all = self
            .store
            .find(&ActivityFilter::default())
            .await
            .context("Failed to find activities")?;

        let mut seen = HashSet::new();
        let recent = all
            .into_iter()
            .rev()
            .filter(|v| seen.insert((v.project.clone(), v.description.clone())))
            .take(limit)
            .collect();
        Ok(self.enrich(recent).await)
    }

    async fn get_last(&self) -> Result<Activity> {
        let last = self.store.find_last().await?;
        Ok(self.enrich_one(last).await)
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.time()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use anyhow::{anyhow, Result};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use tempfile::tempdir;

    use crate::{
        storage::{
            interval_store::IntervalStore,
            line_store::LineStore,
            notes::{FileNoteStore, MockNoteStore, NoteStore},
            ActivityStore,
        },
        tracking::{
            dto::{
                ActivityFilter, AddActivityRequest, StartActivityRequest, StopActivityRequest,
            },
            entities::Activity,
            errors::TrackError,
        },
        utils::{clock::FixedClock, logging::TEST_LOGGING},
    };

    use super::{ActivityResolver, ActivityService};

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 14, hour, minute, 0).unwrap()
    }

    fn service_at(dir: &Path, now: DateTime<Utc>) -> ActivityService<LineStore> {
        service_with_notes(dir, now, None)
    }

    fn service_with_notes(
        dir: &Path,
        now: DateTime<Utc>,
        notes: Option<Box<dyn NoteStore>>,
    ) -> ActivityService<LineStore> {
        ActivityService::new(
            LineStore::new(dir.join("tock.txt")),
            notes,
            Box::new(FixedClock(now)),
        )
    }

    fn start_request(
        project: &str,
        description: &str,
        start: DateTime<Utc>,
    ) -> StartActivityRequest {
        StartActivityRequest {
            project: project.into(),
            description: description.into(),
            start_time: Some(start),
            ..Default::default()
        }
    }

    fn add_request(
        project: &str,
        description: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AddActivityRequest {
        AddActivityRequest {
            project: project.into(),
            description: description.into(),
            start_time: start,
            end_time: end,
            notes: String::new(),
            tags: vec![],
        }
    }

    #[tokio::test]
    async fn test_start_then_start_then_stop() -> Result<()> {
        let dir = tempdir()?;
        let service = service_at(dir.path(), at(12, 0));

        service.start(start_request("A", "first", at(9, 0))).await?;
        service.start(start_request("B", "second", at(11, 0))).await?;

        let activities = service.list(&ActivityFilter::default()).await?;
        assert_eq!(activities[0], Activity::new("A", "first", at(9, 0)).with_end(at(11, 0)));
        assert!(activities[1].is_running());

        let stopped = service.stop(StopActivityRequest::default()).await?;
        assert_eq!(stopped.end_time, Some(at(12, 0)));

        assert_eq!(
            service.list(&ActivityFilter::default()).await?,
            vec![
                Activity::new("A", "first", at(9, 0)).with_end(at(11, 0)),
                Activity::new("B", "second", at(11, 0)).with_end(at(12, 0)),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_start_then_start_then_stop_in_timewarrior_data() -> Result<()> {
        let dir = tempdir()?;
        let now = at(12, 0);
        let service = ActivityService::new(
            IntervalStore::with_clock(dir.path().to_path_buf(), Box::new(FixedClock(now))),
            None,
            Box::new(FixedClock(now)),
        );

        service.start(start_request("A", "first", at(9, 0))).await?;
        service.start(start_request("B", "second", at(11, 0))).await?;
        assert_eq!(service.list(&ActivityFilter::running()).await?.len(), 1);

        let stopped = service.stop(StopActivityRequest::default()).await?;
        assert_eq!(stopped.end_time, Some(at(12, 0)));

        assert_eq!(
            service.list(&ActivityFilter::default()).await?,
            vec![
                Activity::new("A", "first", at(9, 0)).with_end(at(11, 0)),
                Activity::new("B", "second", at(11, 0)).with_end(at(12, 0)),
            ]
        );
        let report = service.get_report(&ActivityFilter::default()).await?;
        assert_eq!(report.total_duration, Duration::hours(3));
        Ok(())
    }

    #[tokio::test]
    async fn test_start_before_running_does_not_overlap() -> Result<()> {
        let dir = tempdir()?;
        let service = service_at(dir.path(), at(10, 30));

        service.start(start_request("A", "running", at(10, 0))).await?;
        service.start(start_request("B", "backdated", at(9, 0))).await?;

        let activities = service.list(&ActivityFilter::default()).await?;
        let first = activities
            .iter()
            .find(|v| v.project == "A")
            .ok_or(anyhow!("A is missing"))?;
        assert_eq!(first.end_time, Some(at(10, 30)));
        assert!(first.end_time >= Some(first.start_time));

        let running = service.list(&ActivityFilter::running()).await?;
        assert_eq!(running, vec![Activity::new("B", "backdated", at(9, 0))]);
        Ok(())
    }

    #[tokio::test]
    async fn test_start_before_future_activity_closes_at_its_start() -> Result<()> {
        let dir = tempdir()?;
        let service = service_at(dir.path(), at(8, 0));

        service.start(start_request("A", "planned", at(10, 0))).await?;
        service.start(start_request("B", "earlier", at(9, 0))).await?;

        let closed = service
            .list(&ActivityFilter {
                project: Some("A".into()),
                ..Default::default()
            })
            .await?;
        assert_eq!(closed[0].end_time, Some(at(10, 0)));
        Ok(())
    }

    #[tokio::test]
    async fn test_stop_picks_latest_running() -> Result<()> {
        let dir = tempdir()?;
        let service = service_at(dir.path(), at(11, 0));

        let older = Activity::new("A", "older", at(9, 0));
        service.store.save(&older).await?;
        service
            .store
            .save(&Activity::new("B", "newer", at(10, 0)))
            .await?;

        let stopped = service.stop(StopActivityRequest::default()).await?;
        assert_eq!(stopped.description, "newer");
        assert_eq!(stopped.end_time, Some(at(11, 0)));

        assert_eq!(
            service.list(&ActivityFilter::running()).await?,
            vec![older]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_stop_without_running_activity() -> Result<()> {
        let dir = tempdir()?;
        let service = service_at(dir.path(), at(11, 0));
        service.add(add_request("A", "done", at(9, 0), at(10, 0))).await?;

        let error = service
            .stop(StopActivityRequest::default())
            .await
            .unwrap_err();
        assert!(TrackError::is(&error, &TrackError::NoActiveActivity));
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_time_ranges() -> Result<()> {
        let dir = tempdir()?;
        let service = service_at(dir.path(), at(11, 0));

        let error = service
            .add(add_request("A", "backwards", at(10, 0), at(9, 0)))
            .await
            .unwrap_err();
        assert!(TrackError::is(
            &error,
            &TrackError::InvalidTimeRange {
                start: at(10, 0),
                end: at(9, 0)
            }
        ));

        service.start(start_request("A", "running", at(10, 0))).await?;
        let error = service
            .stop(StopActivityRequest {
                end_time: Some(at(9, 30)),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(TrackError::is(
            &error,
            &TrackError::InvalidTimeRange {
                start: at(10, 0),
                end: at(9, 30)
            }
        ));
        assert_eq!(service.list(&ActivityFilter::running()).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_report_totals() -> Result<()> {
        let dir = tempdir()?;
        let service = service_at(dir.path(), at(15, 0));

        service.add(add_request("Work", "review", at(9, 0), at(10, 30))).await?;
        service.add(add_request("Personal", "gym", at(11, 0), at(12, 0))).await?;
        service.start(start_request("Work", "coding", at(13, 0))).await?;

        let report = service.get_report(&ActivityFilter::default()).await?;
        assert_eq!(report.activities.len(), 3);
        assert_eq!(report.total_duration, Duration::minutes(270));
        assert_eq!(report.by_project["Work"].duration, Duration::minutes(210));
        assert_eq!(report.by_project["Work"].activities.len(), 2);
        assert_eq!(report.by_project["Personal"].duration, Duration::minutes(60));

        let sum = report
            .by_project
            .values()
            .fold(Duration::zero(), |acc, v| acc + v.duration);
        assert_eq!(sum, report.total_duration);
        Ok(())
    }

    #[tokio::test]
    async fn test_recent_distinct_pairs() -> Result<()> {
        let dir = tempdir()?;
        let service = service_at(dir.path(), at(15, 0));

        service.add(add_request("work", "review", at(8, 0), at(9, 0))).await?;
        service.add(add_request("home", "cooking", at(9, 0), at(10, 0))).await?;
        service.add(add_request("work", "review", at(10, 0), at(11, 0))).await?;
        service.add(add_request("work", "docs", at(11, 0), at(12, 0))).await?;

        let recent = service.get_recent(2).await?;
        assert_eq!(
            recent
                .iter()
                .map(|v| (v.description.as_str(), v.start_time))
                .collect::<Vec<_>>(),
            vec![("docs", at(11, 0)), ("review", at(10, 0))]
        );

        let all = service.get_recent(10).await?;
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].description, "cooking");

        assert!(service.get_recent(0).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_notes_are_merged_on_read() -> Result<()> {
        let dir = tempdir()?;
        let notes = FileNoteStore::new(dir.path().join("notes"));
        let service = service_with_notes(dir.path(), at(12, 0), Some(Box::new(notes)));

        service
            .start(StartActivityRequest {
                notes: "draft outline".into(),
                tags: vec!["writing".into()],
                ..start_request("blog", "post", at(9, 0))
            })
            .await?;

        let stopped = service
            .stop(StopActivityRequest {
                tags: vec!["published".into()],
                ..Default::default()
            })
            .await?;
        assert_eq!(stopped.notes, "draft outline");
        assert_eq!(stopped.tags, vec!["published".to_string()]);

        let last = service.get_last().await?;
        assert_eq!(last.notes, "draft outline");
        assert_eq!(last.tags, vec!["published".to_string()]);

        let content = std::fs::read_to_string(dir.path().join("tock.txt"))?;
        assert!(!content.contains("draft outline"));
        Ok(())
    }

    #[tokio::test]
    async fn test_notes_survive_start_at_now_with_seconds() -> Result<()> {
        let dir = tempdir()?;
        let now = Utc.with_ymd_and_hms(2024, 5, 14, 9, 0, 37).unwrap();
        let notes = FileNoteStore::new(dir.path().join("notes"));
        let service = service_with_notes(dir.path(), now, Some(Box::new(notes)));

        service
            .start(StartActivityRequest {
                project: "A".into(),
                description: "task".into(),
                notes: "hello".into(),
                ..Default::default()
            })
            .await?;

        let listed = service.list(&ActivityFilter::default()).await?;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].notes, "hello");

        let stopped = service.stop(StopActivityRequest::default()).await?;
        assert_eq!(stopped.notes, "hello");

        let note_files = std::fs::read_dir(dir.path().join("notes"))?
            .map(|day| -> std::io::Result<usize> {
                Ok(std::fs::read_dir(day?.path())?.count())
            })
            .sum::<std::io::Result<usize>>()?;
        assert_eq!(note_files, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_note_failures_do_not_fail_operations() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let mut notes = MockNoteStore::new();
        notes
            .expect_save()
            .times(1)
            .returning(|_, _, _, _| Err(anyhow!("disk full")));
        notes
            .expect_get()
            .returning(|_, _| Err(anyhow!("permission denied")));
        let service = service_with_notes(dir.path(), at(12, 0), Some(Box::new(notes)));

        let started = service
            .start(StartActivityRequest {
                notes: "lost".into(),
                ..start_request("A", "task", at(9, 0))
            })
            .await?;
        assert_eq!(started.notes, "lost");

        let listed = service.list(&ActivityFilter::default()).await?;
        assert_eq!(listed, vec![Activity::new("A", "task", at(9, 0))]);
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_missing_activity() -> Result<()> {
        let dir = tempdir()?;
        let service = service_at(dir.path(), at(12, 0));
        let activity = Activity::new("A", "task", at(9, 0)).with_end(at(10, 0));
        service.add(add_request("A", "task", at(9, 0), at(10, 0))).await?;

        service.remove(&activity).await?;
        let error = service.remove(&activity).await.unwrap_err();
        assert!(TrackError::is(&error, &TrackError::ActivityNotFound));
        Ok(())
    }
}
