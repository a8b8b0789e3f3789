use crate::core::{Retryable, UserId};
use std::time::Duration;
use thiserror::Error;

/// Error type for [`super::RemoteDirectory`] requests.
#[derive(Debug, Clone, Error, PartialEq)]
#[non_exhaustive]
pub enum DirectoryError {
    /// The request could not be delivered or the directory answered with an
    /// unexpected status.
    #[error("transport error: {0}")]
    Transport(String),

    /// The directory does not know the account.
    #[error("user not found: {0}")]
    NotFound(UserId),

    /// The directory refused the request for now.
    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },

    /// The directory answered with a body that could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl Retryable for DirectoryError {
    fn is_retryable(&self) -> bool {
        match self {
            DirectoryError::Transport(_) | DirectoryError::RateLimited { .. } => true,
            DirectoryError::NotFound(_) | DirectoryError::Malformed(_) => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            DirectoryError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DirectoryError>;
