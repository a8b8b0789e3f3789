//! Core types shared by every layer of the shared-graph pipeline.
//!
//! # Identifiers
//! - [`UserId`]: exact-match account identifier, with a blank placeholder for
//!   unfilled followings slots
//!
//! # Configuration
//! - [`MapperConfig`]: page size, fetch timeout, retry policy, cache TTL and
//!   failure policy, created once and read-only afterwards
//!
//! # Error Handling
//! - [`Error`]: top-level request error with proper error chains
//! - [`Result<T>`]: type alias for results using [`Error`]
//!
//! # Retry Behavior
//! - [`RetryPolicy`] and [`Retryable`] decide how directory requests are retried
//! - [`retry_with_policy`] runs an operation under a policy

mod config;
mod error;
pub mod retry;
mod user_id;

pub use config::{
    MapperConfig, DEFAULT_API_BASE, DEFAULT_CACHE_TTL, DEFAULT_FETCH_TIMEOUT,
    DEFAULT_MAX_FOLLOW_COUNT, DEFAULT_PAGE_SIZE,
};
pub use error::{Error, Result};
pub use retry::{retry_with_policy, RetryPolicy, Retryable};
pub use user_id::{validate_users, UserId};
