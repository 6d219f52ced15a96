use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failures the tracking layer reports to its callers. Everything else (I/O, permissions) travels
/// as a plain [anyhow::Error] with context attached.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackError {
    #[error("activity not found")]
    ActivityNotFound,
    #[error("no active activity found")]
    NoActiveActivity,
    #[error("end time {end} cannot be before start time {start}")]
    InvalidTimeRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl TrackError {
    /// Checks whether `error` (or anything it wraps) is the given sentinel.
    pub fn is(error: &anyhow::Error, expected: &TrackError) -> bool {
        error
            .chain()
            .filter_map(|cause| cause.downcast_ref::<TrackError>())
            .any(|cause| cause == expected)
    }
}
