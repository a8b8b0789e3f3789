use crate::executor::FetchError;
use crate::graph::GraphError;
use thiserror::Error;

/// Top-level error type for a shared-graph request.
///
/// Fetch failures of individual users are not errors at this level: they
/// travel on the aggregation stream as [`FetchError`] items and only become
/// an [`Error::AggregationAborted`] when the failure policy says so.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The request was rejected before any fetch was launched.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A user's fetch failed and the request was aborted as a whole.
    #[error("aggregation aborted: {0}")]
    AggregationAborted(#[source] FetchError),

    /// The request was cancelled before its graph was complete.
    #[error("request cancelled")]
    Cancelled,

    /// The followings stream violated a builder invariant.
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// Encoding or decoding a graph document failed.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configuration value could not be used.
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
