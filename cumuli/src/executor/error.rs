use crate::core::UserId;
use crate::directory::DirectoryError;
use std::time::Duration;
use thiserror::Error;

/// Why a single user's fetch did not complete.
#[derive(Debug, Clone, Error, PartialEq)]
#[non_exhaustive]
pub enum FetchCause {
    /// The count query or a page query failed.
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// The directory reported more followings than the configured maximum.
    #[error("follow count {count} exceeds the limit of {limit}")]
    FollowCountExceeded { count: usize, limit: usize },

    /// The fetch exceeded the per-fetch timeout; outstanding pages were dropped.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The aggregation was cancelled before the fetch finished.
    #[error("cancelled")]
    Cancelled,

    /// The fetch task panicked.
    #[error("task panicked: {0}")]
    TaskPanic(String),
}

/// A user's followings could not be retrieved.
///
/// Delivered on the aggregation stream in place of the user's
/// [`crate::graph::FollowingsList`]; siblings are unaffected.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("fetch failed for {user}: {cause}")]
pub struct FetchError {
    user: UserId,
    #[source]
    cause: FetchCause,
}

impl FetchError {
    pub fn new(user: UserId, cause: impl Into<FetchCause>) -> Self {
        Self {
            user,
            cause: cause.into(),
        }
    }

    /// The user whose fetch failed.
    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn cause(&self) -> &FetchCause {
        &self.cause
    }

    /// Returns true when the fetch ended because the aggregation was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.cause, FetchCause::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
