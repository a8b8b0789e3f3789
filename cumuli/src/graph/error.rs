//! Error types for graph construction and presentation.

use super::builder::BuilderState;
use crate::core::UserId;
use thiserror::Error;

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors that can occur while building or decoding a shared graph
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum GraphError {
    /// A followings list arrived for a user that was not requested
    #[error("followings list for unknown user: {owner}")]
    UnknownOwner {
        /// Owner of the rejected list
        owner: UserId,
    },

    /// A second followings list arrived for the same user
    #[error("duplicate followings list for user: {owner}")]
    DuplicateList {
        /// Owner of the rejected list
        owner: UserId,
    },

    /// The builder was fed after it left the collecting state
    #[error("builder is no longer collecting (state: {state:?})")]
    NotCollecting {
        /// State the builder was in
        state: BuilderState,
    },

    /// A decoded graph does not hold together
    #[error("malformed graph: {reason}")]
    Malformed {
        /// What is wrong with it
        reason: String,
    },
}

impl GraphError {
    pub fn unknown_owner(owner: UserId) -> Self {
        Self::UnknownOwner { owner }
    }

    pub fn duplicate_list(owner: UserId) -> Self {
        Self::DuplicateList { owner }
    }

    pub fn not_collecting(state: BuilderState) -> Self {
        Self::NotCollecting { state }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}
