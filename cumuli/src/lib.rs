//! Cumuli: shared-followings graphs for social-network users
//!
//! Given a set of users, `cumuli` finds the accounts followed by at least two
//! of them and emits a node/edge graph of who follows whom, ready for a
//! force-directed renderer.
//!
//! # Features
//!
//! - **Paginated fetching**: each user's followings are assembled from pages
//!   fetched concurrently into disjoint slots
//! - **Concurrent aggregation**: one task per user, results streamed in
//!   completion order
//! - **Order-independent reduction**: graph membership never depends on
//!   which fetch finished first
//! - **Cancellation and timeouts**: per-fetch deadlines and whole-request
//!   cancellation that still settles every task
//! - **Result caching**: finished graphs are kept for a configurable TTL
//!
//! # Quick Start
//!
//! ```ignore
//! use cumuli::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MapperConfig::from_env()?;
//!     let directory = Arc::new(HttpDirectory::from_config(&config)?);
//!     let mapper = NetworkMapper::new(directory, config)
//!         .with_cache(Arc::new(InMemoryResultCache::new()));
//!
//!     let users = NetworkMapper::parse_request("forss flume")?;
//!     println!("{}", mapper.build_network_map(&users).await?);
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! Following Parnas's information hiding principles, each module hides specific design
//! decisions that are likely to change:
//!
//! - [`core`]: Identifiers, configuration, errors and retry (hides env parsing)
//! - [`directory`]: Remote follow data (hides the transport and its API shape)
//! - [`executor`]: Fetching engine (hides pagination and task fan-out)
//! - [`graph`]: Shared-graph construction (hides the membership bookkeeping)
//! - [`cache`]: Result cache (hides storage and expiry)

pub mod cache;
pub mod core;
pub mod directory;
pub mod executor;
pub mod graph;
mod mapper;

pub use crate::core::{Error, MapperConfig, Result, UserId};

pub use directory::{DirectoryError, InMemoryDirectory, RemoteDirectory};

#[cfg(feature = "http")]
pub use directory::HttpDirectory;

pub use executor::{
    Aggregation, AggregationSummary, FetchCause, FetchError, FetchResult, FollowingsAggregator,
    FollowingsStream, PaginatedFollowingsFetcher,
};

pub use graph::{FailurePolicy, FollowingsList, Graph, GraphError, NodeGroup, SharedGraphBuilder};

pub use cache::{InMemoryResultCache, ResultCache};

pub use mapper::NetworkMapper;

// Re-export dependencies used in public API
pub use tokio_util::sync::CancellationToken;

/// Prelude module for convenient glob imports
///
/// # Example
///
/// ```
/// use cumuli::prelude::*;
/// ```
pub mod prelude {
    pub use crate::cache::{InMemoryResultCache, ResultCache};
    pub use crate::core::{Error, MapperConfig, Result, RetryPolicy, UserId};
    pub use crate::directory::{DirectoryError, InMemoryDirectory, RemoteDirectory};

    #[cfg(feature = "http")]
    pub use crate::directory::HttpDirectory;

    pub use crate::executor::{
        Aggregation, FetchError, FetchResult, FollowingsAggregator, PaginatedFollowingsFetcher,
    };
    pub use crate::graph::{FailurePolicy, FollowingsList, Graph, SharedGraphBuilder};
    pub use crate::NetworkMapper;
    pub use tokio_util::sync::CancellationToken;
}
