//! Persistence of activities. Two interchangeable stores implement [ActivityStore]:
//!  - [line_store::LineStore] keeps every activity as one human editable line of a single file.
//!  - [interval_store::IntervalStore] keeps TimeWarrior compatible intervals in one file per month.
//!
//! Neither store keeps state between calls. Every operation re-reads the files it needs and
//! writes them back whole, so records are identified by their start time only. There is no
//! locking: two processes writing the same file at once can lose updates.
//!
//! Notes and tags are kept apart from the records by [notes::NoteStore].

pub mod interval_codec;
pub mod interval_store;
pub mod line_codec;
pub mod line_store;
pub mod notes;

use std::{future::Future, ops::Deref};

use anyhow::Result;
use thiserror::Error;

use crate::tracking::{dto::ActivityFilter, entities::Activity};

/// Interface for abstracting storage of activities.
pub trait ActivityStore {
    /// Updates the stored record with the same start time, or appends a new one.
    fn save(&self, activity: &Activity) -> impl Future<Output = Result<()>>;

    /// Activity with the greatest start time, regardless of where it is physically stored. Fails
    /// with [TrackError::ActivityNotFound](crate::tracking::errors::TrackError::ActivityNotFound)
    /// when there is none.
    fn find_last(&self) -> impl Future<Output = Result<Activity>>;

    /// Activities matching `filter`, in storage order.
    fn find(&self, filter: &ActivityFilter) -> impl Future<Output = Result<Vec<Activity>>>;

    /// Deletes the record with the same start time. Fails with
    /// [TrackError::ActivityNotFound](crate::tracking::errors::TrackError::ActivityNotFound) when
    /// nothing matches.
    fn remove(&self, activity: &Activity) -> impl Future<Output = Result<()>>;
}

impl<T: Deref> ActivityStore for T
where
    T::Target: ActivityStore,
{
    fn save(&self, activity: &Activity) -> impl Future<Output = Result<()>> {
        self.deref().save(activity)
    }

    fn find_last(&self) -> impl Future<Output = Result<Activity>> {
        self.deref().find_last()
    }

    fn find(&self, filter: &ActivityFilter) -> impl Future<Output = Result<Vec<Activity>>> {
        self.deref().find(filter)
    }

    fn remove(&self, activity: &Activity) -> impl Future<Output = Result<()>> {
        self.deref().remove(activity)
    }
}

/// Reasons a stored line could not be turned into an activity. These never fail a read: the
/// offending line is logged and skipped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("not an activity line")]
    NotAnActivity,
    #[error("invalid timestamp {0:?}")]
    InvalidTime(String),
    #[error("invalid interval json: {0}")]
    InvalidJson(String),
    #[error("unknown line format")]
    UnknownFormat,
}
