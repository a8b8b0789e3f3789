use super::{DirectoryError, RemoteDirectory, Result};
use crate::core::UserId;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// In-memory directory using DashMap for concurrent access.
///
/// Every fetch task of a request reads the same instance, so lookups go
/// through DashMap's sharded maps rather than a single mutex. Besides the
/// followings themselves, the directory can inject the conditions a real
/// directory produces:
///
/// - per-user and per-page latency, to control completion order
/// - failing count or page queries
/// - an over-reported follow count, which leaves the last page short
///
/// Query counters make pagination observable in tests.
pub struct InMemoryDirectory {
    /// Followed ids per user, in directory order
    followings: DashMap<UserId, Vec<UserId>>,
    /// Follow counts that differ from the stored list length
    reported_counts: DashMap<UserId, usize>,
    /// Delay applied to every request for a user
    latencies: DashMap<UserId, Duration>,
    /// Extra delay for the page at (user, offset)
    page_latencies: DashMap<(UserId, usize), Duration>,
    /// Errors returned by a user's count query
    count_failures: DashMap<UserId, DirectoryError>,
    /// Errors returned by the page at (user, offset)
    page_failures: DashMap<(UserId, usize), DirectoryError>,
    /// Page queries issued per user
    page_queries_by_user: DashMap<UserId, usize>,
    count_queries: AtomicUsize,
    page_queries: AtomicUsize,
}

impl InMemoryDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self {
            followings: DashMap::new(),
            reported_counts: DashMap::new(),
            latencies: DashMap::new(),
            page_latencies: DashMap::new(),
            count_failures: DashMap::new(),
            page_failures: DashMap::new(),
            page_queries_by_user: DashMap::new(),
            count_queries: AtomicUsize::new(0),
            page_queries: AtomicUsize::new(0),
        }
    }

    /// Adds a user and the accounts it follows.
    pub fn with_user<I, S>(self, user: impl Into<UserId>, followed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<UserId>,
    {
        self.insert_user(user, followed);
        self
    }

    /// Delays every request for `user` by `latency`.
    pub fn with_latency(self, user: impl Into<UserId>, latency: Duration) -> Self {
        self.latencies.insert(user.into(), latency);
        self
    }

    /// Delays the page of `user` starting at `offset` by `latency`, on top of
    /// any per-user latency.
    pub fn with_page_latency(
        self,
        user: impl Into<UserId>,
        offset: usize,
        latency: Duration,
    ) -> Self {
        self.page_latencies.insert((user.into(), offset), latency);
        self
    }

    /// Reports `count` as the follow count of `user`, regardless of the
    /// stored list length.
    pub fn with_reported_count(self, user: impl Into<UserId>, count: usize) -> Self {
        self.reported_counts.insert(user.into(), count);
        self
    }

    /// Makes the count query for `user` fail with `error`.
    pub fn with_count_failure(self, user: impl Into<UserId>, error: DirectoryError) -> Self {
        self.count_failures.insert(user.into(), error);
        self
    }

    /// Makes the page of `user` starting at `offset` fail with `error`.
    pub fn with_page_failure(
        self,
        user: impl Into<UserId>,
        offset: usize,
        error: DirectoryError,
    ) -> Self {
        self.page_failures.insert((user.into(), offset), error);
        self
    }

    /// Adds or replaces a user's followings.
    pub fn insert_user<I, S>(&self, user: impl Into<UserId>, followed: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<UserId>,
    {
        self.followings
            .insert(user.into(), followed.into_iter().map(Into::into).collect());
    }

    /// Total count queries served.
    pub fn count_queries(&self) -> usize {
        self.count_queries.load(Ordering::SeqCst)
    }

    /// Total page queries served.
    pub fn page_queries(&self) -> usize {
        self.page_queries.load(Ordering::SeqCst)
    }

    /// Page queries served for one user.
    pub fn page_queries_for(&self, user: &str) -> usize {
        self.page_queries_by_user
            .get(user)
            .map(|count| *count)
            .unwrap_or(0)
    }

    async fn simulate_latency(&self, user: &UserId) {
        let latency = self.latencies.get(user).map(|l| *l);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteDirectory for InMemoryDirectory {
    async fn follow_count(&self, user: &UserId) -> Result<usize> {
        self.count_queries.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency(user).await;

        if let Some(error) = self.count_failures.get(user) {
            return Err(error.clone());
        }
        if let Some(count) = self.reported_counts.get(user) {
            return Ok(*count);
        }

        self.followings
            .get(user)
            .map(|followed| followed.len())
            .ok_or_else(|| DirectoryError::NotFound(user.clone()))
    }

    async fn followed_page(
        &self,
        user: &UserId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<UserId>> {
        self.page_queries.fetch_add(1, Ordering::SeqCst);
        *self.page_queries_by_user.entry(user.clone()).or_insert(0) += 1;
        self.simulate_latency(user).await;

        let page_latency = self.page_latencies.get(&(user.clone(), offset)).map(|l| *l);
        if let Some(latency) = page_latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(error) = self.page_failures.get(&(user.clone(), offset)) {
            return Err(error.clone());
        }

        let followed = self
            .followings
            .get(user)
            .ok_or_else(|| DirectoryError::NotFound(user.clone()))?;

        let start = offset.min(followed.len());
        let end = offset.saturating_add(limit).min(followed.len());
        Ok(followed[start..end].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pages_slice_the_followings() {
        let directory = InMemoryDirectory::new().with_user("a", ["1", "2", "3", "4", "5"]);
        let a = UserId::new("a");

        assert_eq!(directory.follow_count(&a).await.unwrap(), 5);
        assert_eq!(
            directory.followed_page(&a, 0, 2).await.unwrap(),
            vec![UserId::new("1"), UserId::new("2")]
        );
        assert_eq!(
            directory.followed_page(&a, 4, 2).await.unwrap(),
            vec![UserId::new("5")]
        );
        assert!(directory.followed_page(&a, 10, 2).await.unwrap().is_empty());
        assert_eq!(directory.page_queries(), 3);
        assert_eq!(directory.page_queries_for("a"), 3);
        assert_eq!(directory.count_queries(), 1);
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let directory = InMemoryDirectory::new();
        let ghost = UserId::new("ghost");

        assert_eq!(
            directory.follow_count(&ghost).await,
            Err(DirectoryError::NotFound(ghost.clone()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_latency_delays_one_page() {
        let directory = InMemoryDirectory::new()
            .with_user("a", ["1", "2", "3"])
            .with_page_latency("a", 2, Duration::from_secs(5));
        let a = UserId::new("a");

        let start = tokio::time::Instant::now();
        directory.followed_page(&a, 0, 2).await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));

        directory.followed_page(&a, 2, 2).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_injected_failures_and_counts() {
        let directory = InMemoryDirectory::new()
            .with_user("a", ["1"])
            .with_reported_count("a", 3)
            .with_page_failure("a", 0, DirectoryError::RateLimited { retry_after: None })
            .with_user("b", ["2"])
            .with_count_failure("b", DirectoryError::Transport("reset".into()));

        assert_eq!(directory.follow_count(&UserId::new("a")).await.unwrap(), 3);
        assert!(directory
            .followed_page(&UserId::new("a"), 0, 50)
            .await
            .is_err());
        assert!(directory.follow_count(&UserId::new("b")).await.is_err());
    }
}
