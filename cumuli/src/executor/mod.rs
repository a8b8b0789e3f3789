//! Concurrent retrieval of followings lists.
//!
//! This module hides how followings are fetched:
//! - fetcher: one user's list, assembled from concurrently fetched pages
//! - aggregator: one task per user, results delivered in completion order
//! - error: per-user failure causes, which never abort sibling fetches
//!
//! # Example
//!
//! ```
//! use cumuli::core::MapperConfig;
//! use cumuli::directory::InMemoryDirectory;
//! use cumuli::executor::FollowingsAggregator;
//! use cumuli::UserId;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let directory = Arc::new(
//!     InMemoryDirectory::new()
//!         .with_user("a", ["x", "y"])
//!         .with_user("b", ["y"]),
//! );
//! let aggregator = FollowingsAggregator::from_config(directory, &MapperConfig::default());
//!
//! let mut aggregation = aggregator.aggregate(&[UserId::new("a"), UserId::new("b")]);
//! while let Some(result) = aggregation.stream().next_result().await {
//!     match result {
//!         Ok(list) => println!("{} follows {}", list.owner(), list.followed().len()),
//!         Err(e) => eprintln!("{}", e),
//!     }
//! }
//! # }
//! ```

mod aggregator;
mod error;
mod fetcher;

pub use aggregator::{
    Aggregation, AggregationSummary, FetchResult, FollowingsAggregator, FollowingsStream,
};
pub use error::{FetchCause, FetchError, Result};
pub use fetcher::PaginatedFollowingsFetcher;
