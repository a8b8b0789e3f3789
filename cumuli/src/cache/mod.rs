//! Result cache for serialized graphs.
//!
//! Computing a graph costs one count query plus several page queries per
//! user, so finished graphs are kept for a short time under a key derived
//! from the requested user set (see [`crate::NetworkMapper::request_key`]).
//!
//! Using `async_trait` allows networked cache backends behind the same
//! interface as the in-memory one.

mod memory;

pub use memory::InMemoryResultCache;

use async_trait::async_trait;
use std::time::Duration;

/// Stores serialized graph documents with an expiry.
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Returns the stored document, or `None` when absent or expired.
    async fn get(&self, key: &str) -> Option<String>;

    /// Stores `json` under `key` for `ttl`, replacing any previous entry.
    async fn put(&self, key: &str, json: String, ttl: Duration);
}
