use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::{
    fs::operations::{read_lines, write_lines},
    tracking::{dto::ActivityFilter, entities::Activity, errors::TrackError},
};

use super::{line_codec, ActivityStore, DecodeError};

/// [ActivityStore] over a single plain text file. Lines that are not activities (comments, blank
/// lines) are kept untouched when the file is rewritten.
pub struct LineStore {
    path: PathBuf,
}

impl LineStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Decodes every activity line, skipping the rest.
    async fn read_activities(&self) -> Result<Option<Vec<Activity>>> {
        let Some(lines) = read_lines(&self.path).await? else {
            return Ok(None);
        };
        let activities = lines
            .iter()
            .enumerate()
            .filter_map(|(index, line)| match line_codec::decode(line) {
                Ok(v) => Some(v),
                Err(DecodeError::NotAnActivity) => None,
                Err(e) => {
                    debug!(
                        "Skipping line {} of {:?}: {e}: {line}",
                        index + 1,
                        self.path
                    );
                    None
                }
            })
            .collect();
        Ok(Some(activities))
    }

    /// Index of the last line holding an activity that starts in the same minute as `activity`.
    fn position_of(lines: &[String], activity: &Activity) -> Option<usize> {
        lines.iter().rposition(|line| {
            line_codec::decode(line)
                .map(|stored| stored.starts_in_same_minute(activity))
                .unwrap_or(false)
        })
    }
}

impl ActivityStore for LineStore {
    async fn save(&self, activity: &Activity) -> Result<()> {
        let mut lines = read_lines(&self.path)
            .await
            .context("Failed to read activities")?
            .unwrap_or_default();

        let line = line_codec::encode(activity);
        match Self::position_of(&lines, activity) {
            Some(index) => {
                debug!("Updating line {} of {:?}", index + 1, self.path);
                lines[index] = line;
            }
            None => {
                debug!("Appending to {:?}", self.path);
                lines.push(line);
            }
        }

        write_lines(&self.path, &lines)
            .await
            .context("Failed to write activities")
    }

    async fn find_last(&self) -> Result<Activity> {
        let activities = self
            .read_activities()
            .await?
            .ok_or(TrackError::ActivityNotFound)?;

        // Lines may be appended out of order when older activities are backfilled.
        activities
            .into_iter()
            .reduce(|last, v| if v.start_time > last.start_time { v } else { last })
            .ok_or_else(|| TrackError::ActivityNotFound.into())
    }

    async fn find(&self, filter: &ActivityFilter) -> Result<Vec<Activity>> {
        let activities = self.read_activities().await?.unwrap_or_default();
        Ok(activities
            .into_iter()
            .filter(|v| filter.matches(v))
            .collect())
    }

    async fn remove(&self, activity: &Activity) -> Result<()> {
        let mut lines = read_lines(&self.path)
            .await
            .context("Failed to read activities")?
            .ok_or(TrackError::ActivityNotFound)?;

        let index = Self::position_of(&lines, activity).ok_or(TrackError::ActivityNotFound)?;
        info!("Removing line {} of {:?}", index + 1, self.path);
        lines.remove(index);

        write_lines(&self.path, &lines)
            .await
            .context("Failed to write activities")
    }
}
