//! Paginated retrieval of one user's followings.
//!
//! The directory serves followings in pages of at most `page_size` ids. For a
//! user following `count` accounts the fetcher allocates `count` blank slots,
//! splits them into `ceil(count / page_size)` disjoint chunks and lets every
//! page query fill its own chunk. All page queries of a user are polled
//! concurrently inside that user's task, and because no two chunks overlap the
//! final order never depends on which page answered first.

use super::error::{FetchCause, FetchError, Result};
use crate::core::{MapperConfig, UserId};
use crate::directory::{self, RemoteDirectory};
use crate::graph::FollowingsList;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Retrieves complete, ordered followings lists from a [`RemoteDirectory`].
///
/// # Example
///
/// ```
/// use cumuli::core::MapperConfig;
/// use cumuli::directory::InMemoryDirectory;
/// use cumuli::executor::PaginatedFollowingsFetcher;
/// use cumuli::UserId;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let directory = Arc::new(InMemoryDirectory::new().with_user("a", ["x", "y", "z"]));
/// let config = MapperConfig::default().with_page_size(2);
/// let fetcher = PaginatedFollowingsFetcher::new(directory, &config);
///
/// let list = fetcher.fetch(&UserId::new("a")).await?;
/// assert_eq!(list.followed().len(), 3);
/// # Ok(())
/// # }
/// ```
pub struct PaginatedFollowingsFetcher {
    directory: Arc<dyn RemoteDirectory>,
    page_size: usize,
    max_follow_count: usize,
    timeout: Option<Duration>,
}

impl PaginatedFollowingsFetcher {
    /// Creates a fetcher using the page size, follow count limit and fetch
    /// timeout of `config`.
    pub fn new(directory: Arc<dyn RemoteDirectory>, config: &MapperConfig) -> Self {
        Self {
            directory,
            page_size: config.page_size().max(1),
            max_follow_count: config.max_follow_count(),
            timeout: config.fetch_timeout(),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Retrieves every account `user` follows, in directory order.
    ///
    /// Slots a short page never filled stay blank. Any failed query aborts
    /// the fetch; dropping the returned future (or hitting the timeout)
    /// drops every outstanding page query with it.
    pub async fn fetch(&self, user: &UserId) -> Result<FollowingsList> {
        let Some(limit) = self.timeout else {
            return self.fetch_all(user).await;
        };

        match tokio::time::timeout(limit, self.fetch_all(user)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Fetch for {} timed out after {:?}", user, limit);
                Err(FetchError::new(user.clone(), FetchCause::Timeout(limit)))
            }
        }
    }

    async fn fetch_all(&self, user: &UserId) -> Result<FollowingsList> {
        let count = self
            .directory
            .follow_count(user)
            .await
            .map_err(|e| FetchError::new(user.clone(), e))?;

        if count > self.max_follow_count {
            warn!(
                "{} reports {} followings, above the limit of {}",
                user, count, self.max_follow_count
            );
            return Err(FetchError::new(
                user.clone(),
                FetchCause::FollowCountExceeded {
                    count,
                    limit: self.max_follow_count,
                },
            ));
        }

        let mut followed = vec![UserId::blank(); count];
        if count == 0 {
            debug!("{} follows nobody, no pages to fetch", user);
            return Ok(FollowingsList::new(user.clone(), followed));
        }

        let pages = count.div_ceil(self.page_size);
        debug!(
            "Fetching {} followings of {} in {} pages of {}",
            count, user, pages, self.page_size
        );

        let page_queries = followed
            .chunks_mut(self.page_size)
            .enumerate()
            .map(|(page, slots)| self.fill_page(user, page, slots));

        let filled: usize = futures::future::try_join_all(page_queries)
            .await
            .map_err(|e| FetchError::new(user.clone(), e))?
            .into_iter()
            .sum();

        if filled < count {
            debug!(
                "{} of {} slots for {} left blank by short pages",
                count - filled,
                count,
                user
            );
        }

        Ok(FollowingsList::new(user.clone(), followed))
    }

    /// Queries one page and writes its ids into `slots`, returning how many
    /// slots were filled.
    async fn fill_page(
        &self,
        user: &UserId,
        page: usize,
        slots: &mut [UserId],
    ) -> directory::Result<usize> {
        let offset = page * self.page_size;
        let ids = self
            .directory
            .followed_page(user, offset, self.page_size)
            .await?;

        if ids.len() != slots.len() {
            debug!(
                "Page {} of {} returned {} ids for {} slots",
                page,
                user,
                ids.len(),
                slots.len()
            );
        }

        let filled = ids.len().min(slots.len());
        for (slot, id) in slots.iter_mut().zip(ids) {
            *slot = id;
        }
        Ok(filled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{DirectoryError, InMemoryDirectory};

    fn ids(names: &[&str]) -> Vec<UserId> {
        names.iter().map(|n| UserId::new(*n)).collect()
    }

    fn fetcher(directory: Arc<InMemoryDirectory>, page_size: usize) -> PaginatedFollowingsFetcher {
        let config = MapperConfig::default().with_page_size(page_size);
        PaginatedFollowingsFetcher::new(directory, &config)
    }

    #[tokio::test]
    async fn test_fetch_spans_multiple_pages_in_order() {
        let names: Vec<String> = (0..7).map(|i| format!("f{i}")).collect();
        let directory = Arc::new(InMemoryDirectory::new().with_user("a", names.clone()));
        let fetcher = fetcher(directory.clone(), 3);

        let list = fetcher.fetch(&UserId::new("a")).await.unwrap();

        assert_eq!(list.owner(), &UserId::new("a"));
        let fetched: Vec<&str> = list.followed().iter().map(UserId::as_str).collect();
        assert_eq!(fetched, names.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(directory.page_queries_for("a"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pages_finishing_in_reverse_keep_directory_order() {
        let names: Vec<String> = (0..6).map(|i| format!("f{i}")).collect();
        let directory = Arc::new(
            InMemoryDirectory::new()
                .with_user("a", names.clone())
                .with_page_latency("a", 0, Duration::from_millis(300))
                .with_page_latency("a", 2, Duration::from_millis(200))
                .with_page_latency("a", 4, Duration::from_millis(100)),
        );
        let fetcher = fetcher(directory.clone(), 2);

        let start = tokio::time::Instant::now();
        let list = fetcher.fetch(&UserId::new("a")).await.unwrap();
        let elapsed = start.elapsed();

        let fetched: Vec<&str> = list.followed().iter().map(UserId::as_str).collect();
        assert_eq!(fetched, names.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(directory.page_queries_for("a"), 3);
        // Pages ran concurrently: total time is the slowest page, not the sum.
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_millis(600));
    }

    #[tokio::test]
    async fn test_zero_count_issues_no_page_queries() {
        let directory = Arc::new(InMemoryDirectory::new().with_user("a", Vec::<&str>::new()));
        let fetcher = fetcher(directory.clone(), 50);

        let list = fetcher.fetch(&UserId::new("a")).await.unwrap();

        assert!(list.followed().is_empty());
        assert_eq!(directory.count_queries(), 1);
        assert_eq!(directory.page_queries(), 0);
    }

    #[tokio::test]
    async fn test_short_last_page_leaves_blank_slots() {
        let directory = Arc::new(
            InMemoryDirectory::new()
                .with_user("a", ["x", "y", "z"])
                .with_reported_count("a", 5),
        );
        let fetcher = fetcher(directory, 2);

        let list = fetcher.fetch(&UserId::new("a")).await.unwrap();

        assert_eq!(list.followed().len(), 5);
        assert_eq!(&list.followed()[..3], &ids(&["x", "y", "z"])[..]);
        assert!(list.followed()[3].is_blank());
        assert!(list.followed()[4].is_blank());
    }

    #[tokio::test]
    async fn test_under_reported_count_truncates() {
        let directory = Arc::new(
            InMemoryDirectory::new()
                .with_user("a", ["x", "y", "z"])
                .with_reported_count("a", 2),
        );
        let fetcher = fetcher(directory, 50);

        let list = fetcher.fetch(&UserId::new("a")).await.unwrap();

        assert_eq!(list.followed(), &ids(&["x", "y"])[..]);
    }

    #[tokio::test]
    async fn test_huge_reported_count_is_rejected_before_allocating() {
        let directory = Arc::new(
            InMemoryDirectory::new()
                .with_user("a", ["x"])
                .with_reported_count("a", usize::MAX),
        );
        let fetcher = fetcher(directory.clone(), 50);

        let error = fetcher.fetch(&UserId::new("a")).await.unwrap_err();

        assert_eq!(
            error.cause(),
            &FetchCause::FollowCountExceeded {
                count: usize::MAX,
                limit: crate::core::DEFAULT_MAX_FOLLOW_COUNT,
            }
        );
        assert_eq!(directory.page_queries(), 0);
    }

    #[tokio::test]
    async fn test_count_at_the_limit_is_fetched() {
        let directory = Arc::new(InMemoryDirectory::new().with_user("a", ["x", "y", "z"]));
        let config = MapperConfig::default().with_max_follow_count(3);
        let fetcher = PaginatedFollowingsFetcher::new(directory, &config);

        let list = fetcher.fetch(&UserId::new("a")).await.unwrap();

        assert_eq!(list.followed(), &ids(&["x", "y", "z"])[..]);
    }

    #[tokio::test]
    async fn test_count_failure_surfaces_fetch_error() {
        let directory = Arc::new(
            InMemoryDirectory::new()
                .with_user("a", ["x"])
                .with_count_failure("a", DirectoryError::Transport("reset".into())),
        );
        let fetcher = fetcher(directory.clone(), 50);

        let error = fetcher.fetch(&UserId::new("a")).await.unwrap_err();

        assert_eq!(error.user(), &UserId::new("a"));
        assert_eq!(
            error.cause(),
            &FetchCause::Directory(DirectoryError::Transport("reset".into()))
        );
        assert_eq!(directory.page_queries(), 0);
    }

    #[tokio::test]
    async fn test_page_failure_aborts_fetch() {
        let directory = Arc::new(
            InMemoryDirectory::new()
                .with_user("a", ["w", "x", "y", "z"])
                .with_page_failure("a", 2, DirectoryError::RateLimited { retry_after: None }),
        );
        let fetcher = fetcher(directory, 2);

        let error = fetcher.fetch(&UserId::new("a")).await.unwrap_err();

        assert!(matches!(
            error.cause(),
            FetchCause::Directory(DirectoryError::RateLimited { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let directory = Arc::new(InMemoryDirectory::new());
        let fetcher = fetcher(directory, 50);

        let error = fetcher.fetch(&UserId::new("ghost")).await.unwrap_err();

        assert!(matches!(
            error.cause(),
            FetchCause::Directory(DirectoryError::NotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_abandons_slow_fetch() {
        let directory = Arc::new(
            InMemoryDirectory::new()
                .with_user("a", ["x"])
                .with_latency("a", Duration::from_secs(60)),
        );
        let config = MapperConfig::default().with_fetch_timeout(Some(Duration::from_secs(1)));
        let fetcher = PaginatedFollowingsFetcher::new(directory, &config);

        let error = fetcher.fetch(&UserId::new("a")).await.unwrap_err();

        assert_eq!(error.cause(), &FetchCause::Timeout(Duration::from_secs(1)));
    }
}
