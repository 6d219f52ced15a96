use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Months, NaiveDate};
use futures::{stream, StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

use crate::{
    fs::operations::{read_lines, write_lines},
    tracking::{dto::ActivityFilter, entities::Activity, errors::TrackError},
    utils::{
        clock::{Clock, DefaultClock},
        time::{month_start, month_to_record_name},
    },
};

use super::{interval_codec::Interval, ActivityStore};

/// How many month files [IntervalStore::find_last] looks at, counting the current one.
const FIND_LAST_MONTHS: u32 = 12;

/// [ActivityStore] over a TimeWarrior data directory. Intervals are kept in one `YYYY-MM.data`
/// file per UTC month of their start.
pub struct IntervalStore {
    data_dir: PathBuf,
    clock: Box<dyn Clock>,
}

impl IntervalStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self::with_clock(data_dir, Box::new(DefaultClock))
    }

    pub fn with_clock(data_dir: PathBuf, clock: Box<dyn Clock>) -> Self {
        Self { data_dir, clock }
    }

    fn month_file(&self, month: NaiveDate) -> PathBuf {
        self.data_dir.join(month_to_record_name(month))
    }

    /// Months covered by a filter, oldest first. Without bounds this spans from 2000 until a year
    /// from now.
    fn month_range(&self, filter: &ActivityFilter) -> Vec<NaiveDate> {
        let Some(first) = filter
            .from_date
            .map(|v| v.date_naive())
            .or(NaiveDate::from_ymd_opt(2000, 1, 1))
        else {
            return vec![];
        };
        let to = filter.to_date.unwrap_or_else(|| {
            let now = self.clock.time();
            now.checked_add_months(Months::new(12)).unwrap_or(now)
        });

        let last = to.date_naive();
        std::iter::successors(Some(month_start(first)), |month| {
            month.checked_add_months(Months::new(1))
        })
        .take_while(|month| *month <= last)
        .collect()
    }

    async fn read_month(&self, month: NaiveDate) -> Result<Vec<Activity>> {
        let path = self.month_file(month);
        let intervals = read_intervals(&path).await?;
        Ok(intervals
            .into_iter()
            .filter_map(|v| match v.to_activity() {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Skipping interval in {path:?}: {e}: {v:?}");
                    None
                }
            })
            .collect())
    }
}

/// Reads every interval of a month file. Lines that can't be understood are logged and skipped.
async fn read_intervals(path: &Path) -> Result<Vec<Interval>> {
    let Some(lines) = read_lines(path)
        .await
        .with_context(|| format!("Failed to read intervals from {path:?}"))?
    else {
        return Ok(vec![]);
    };

    let intervals = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match Interval::parse_line(line) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Skipping line in {path:?}: {e}: {line}");
                None
            }
        })
        .collect();
    Ok(intervals)
}

async fn write_intervals(path: &Path, intervals: &[Interval]) -> Result<()> {
    let lines = intervals
        .iter()
        .map(Interval::to_line)
        .collect::<Result<Vec<_>, _>>()?;
    write_lines(path, &lines)
        .await
        .with_context(|| format!("Failed to write intervals to {path:?}"))
}

impl ActivityStore for IntervalStore {
    async fn save(&self, activity: &Activity) -> Result<()> {
        let path = self.month_file(activity.start_time.date_naive());
        let mut intervals = read_intervals(&path).await?;

        let interval = Interval::from_activity(activity);
        match intervals.iter().rposition(|v| v.start == interval.start) {
            Some(index) => {
                debug!("Updating interval {} in {path:?}", interval.start);
                intervals[index] = interval;
            }
            None => {
                debug!("Adding interval {} to {path:?}", interval.start);
                intervals.push(interval);
            }
        }

        // The layout is fixed width, so string order is chronological order.
        intervals.sort_by(|a, b| a.start.cmp(&b.start));

        write_intervals(&path, &intervals).await
    }

    async fn find_last(&self) -> Result<Activity> {
        let current = month_start(self.clock.time().date_naive());
        let mut last: Option<Activity> = None;

        // No early exit on the first non-empty month. Data files are edited by hand and by
        // TimeWarrior itself, so the newest file does not necessarily hold the latest start.
        for offset in 0..FIND_LAST_MONTHS {
            let Some(month) = current.checked_sub_months(Months::new(offset)) else {
                break;
            };
            for activity in self.read_month(month).await? {
                if last
                    .as_ref()
                    .map_or(true, |v| activity.start_time > v.start_time)
                {
                    last = Some(activity);
                }
            }
        }

        last.ok_or_else(|| TrackError::ActivityNotFound.into())
    }

    async fn find(&self, filter: &ActivityFilter) -> Result<Vec<Activity>> {
        let months = self.month_range(filter);
        debug!("Searching {} month files", months.len());

        // Files are read a few at a time but results keep month order.
        let per_month = stream::iter(months)
            .map(|month| self.read_month(month))
            .buffered(4)
            .try_collect::<Vec<_>>()
            .await?;

        Ok(per_month
            .into_iter()
            .flatten()
            .filter(|v| filter.matches(v))
            .collect())
    }

    async fn remove(&self, activity: &Activity) -> Result<()> {
        let path = self.month_file(activity.start_time.date_naive());
        let mut intervals = read_intervals(&path).await?;

        let start = Interval::from_activity(activity).start;
        let index = intervals
            .iter()
            .position(|v| v.start == start)
            .ok_or(TrackError::ActivityNotFound)?;
        info!("Removing interval {start} from {path:?}");
        intervals.remove(index);

        write_intervals(&path, &intervals).await
    }
}
