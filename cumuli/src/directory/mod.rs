//! Remote directory capability.
//!
//! The core only ever asks a directory two questions: how many accounts a
//! user follows, and which accounts sit at a given page offset. Network
//! calls, retries and transport errors live behind this trait:
//!
//! - [`HttpDirectory`]: SoundCloud-style JSON API over `reqwest` (feature `http`)
//! - [`InMemoryDirectory`]: DashMap-backed directory for tests and demos
//!
//! # Example
//!
//! ```
//! use cumuli::directory::{InMemoryDirectory, RemoteDirectory};
//! use cumuli::UserId;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let directory = InMemoryDirectory::new().with_user("a", ["x", "y", "z"]);
//! let user = UserId::new("a");
//!
//! assert_eq!(directory.follow_count(&user).await?, 3);
//! assert_eq!(directory.followed_page(&user, 2, 50).await?, vec![UserId::new("z")]);
//! # Ok(())
//! # }
//! ```

use crate::core::UserId;
use async_trait::async_trait;

mod error;
pub mod memory;

#[cfg(feature = "http")]
pub mod http;

pub use error::{DirectoryError, Result};
pub use memory::InMemoryDirectory;

#[cfg(feature = "http")]
pub use http::HttpDirectory;

/// Read-only source of followings data.
///
/// Implementations must be safe to share across every concurrent fetch task
/// of a request; the core holds them behind an `Arc` and never mutates them.
#[async_trait]
pub trait RemoteDirectory: Send + Sync {
    /// Total number of accounts `user` follows.
    async fn follow_count(&self, user: &UserId) -> Result<usize>;

    /// Up to `limit` followed-account ids of `user`, starting at `offset`.
    ///
    /// A page may hold fewer ids than requested. Callers treat missing
    /// entries as blank placeholders rather than as an error.
    async fn followed_page(&self, user: &UserId, offset: usize, limit: usize)
        -> Result<Vec<UserId>>;
}
