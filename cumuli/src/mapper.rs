//! Request pipeline: validation, cache, aggregation, reduction, serialization.
//!
//! ```text
//! users ──validate──▶ cache? ──hit──▶ JSON
//!                       │
//!                      miss
//!                       ▼
//!          FollowingsAggregator ──stream──▶ SharedGraphBuilder ──▶ Graph ──▶ JSON ──▶ cache
//! ```

use crate::cache::ResultCache;
use crate::core::{validate_users, Error, MapperConfig, Result, UserId};
use crate::directory::RemoteDirectory;
use crate::executor::{FetchError, FollowingsAggregator};
use crate::graph::{Graph, SharedGraphBuilder};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Builds shared-followings graphs for requested user sets.
///
/// One mapper serves any number of requests; each request gets its own
/// aggregation and builder.
///
/// # Example
///
/// ```
/// use cumuli::core::MapperConfig;
/// use cumuli::directory::InMemoryDirectory;
/// use cumuli::NetworkMapper;
/// use std::sync::Arc;
///
/// # async fn example() -> cumuli::Result<()> {
/// let directory = Arc::new(
///     InMemoryDirectory::new()
///         .with_user("a", ["x"])
///         .with_user("b", ["x"]),
/// );
/// let mapper = NetworkMapper::new(directory, MapperConfig::default());
///
/// let users = NetworkMapper::parse_request("a b")?;
/// let json = mapper.build_network_map(&users).await?;
/// assert!(json.contains("\"links\""));
/// # Ok(())
/// # }
/// ```
pub struct NetworkMapper {
    aggregator: FollowingsAggregator,
    cache: Option<Arc<dyn ResultCache>>,
    config: MapperConfig,
}

impl NetworkMapper {
    pub fn new(directory: Arc<dyn RemoteDirectory>, config: MapperConfig) -> Self {
        Self {
            aggregator: FollowingsAggregator::from_config(directory, &config),
            cache: None,
            config,
        }
    }

    /// Stores finished graphs in `cache` for the configured TTL.
    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Parses a whitespace-separated list of user ids, keeping caller order.
    pub fn parse_request(raw: &str) -> Result<Vec<UserId>> {
        let users = raw
            .split_whitespace()
            .map(UserId::parse)
            .collect::<Result<Vec<_>>>()?;
        validate_users(&users)?;
        Ok(users)
    }

    /// Cache key for a user set: the ids sorted and joined with spaces.
    ///
    /// Requests naming the same users in a different order share a key.
    pub fn request_key(users: &[UserId]) -> String {
        let mut names: Vec<&str> = users.iter().map(UserId::as_str).collect();
        names.sort_unstable();
        names.join(" ")
    }

    /// Fetches and reduces the followings of `users` into a graph.
    pub async fn shared_graph(&self, users: &[UserId]) -> Result<Graph> {
        self.shared_graph_with_cancel(users, &CancellationToken::new())
            .await
    }

    /// Like [`NetworkMapper::shared_graph`], stopping early once `cancel`
    /// fires.
    ///
    /// Always waits for every launched fetch to settle before returning.
    pub async fn shared_graph_with_cancel(
        &self,
        users: &[UserId],
        cancel: &CancellationToken,
    ) -> Result<Graph> {
        self.compute(users, cancel).await.map(|(graph, _)| graph)
    }

    /// Returns the JSON graph for `users`, from the cache when possible.
    pub async fn build_network_map(&self, users: &[UserId]) -> Result<String> {
        self.build_network_map_with_cancel(users, &CancellationToken::new())
            .await
    }

    pub async fn build_network_map_with_cancel(
        &self,
        users: &[UserId],
        cancel: &CancellationToken,
    ) -> Result<String> {
        validate_users(users)?;
        let key = Self::request_key(users);

        if let Some(cache) = &self.cache {
            if let Some(json) = cache.get(&key).await {
                info!("Serving graph for [{}] from cache", key);
                return Ok(json);
            }
        }

        let (graph, excluded) = self.compute(users, cancel).await?;
        let json = graph.to_json()?;

        if let Some(cache) = &self.cache {
            if excluded == 0 {
                cache.put(&key, json.clone(), self.config.cache_ttl()).await;
            } else {
                debug!(
                    "Not caching graph for [{}]: {} users were excluded",
                    key, excluded
                );
            }
        }

        Ok(json)
    }

    /// Runs one aggregation into one builder, returning the graph and the
    /// number of excluded users.
    async fn compute(&self, users: &[UserId], cancel: &CancellationToken) -> Result<(Graph, usize)> {
        let mut builder = SharedGraphBuilder::new(users, self.config.failure_policy())?;
        let mut aggregation = self.aggregator.aggregate_with_cancel(users, cancel);

        let outcome = builder.build(aggregation.stream()).await;
        let outcome = cancellation_outcome(outcome, builder.excluded());

        if outcome.is_err() {
            aggregation.cancel();
        }
        let summary = aggregation.settled().await;
        debug!(
            "Aggregation settled: {} launched, {} succeeded, {} failed, {} cancelled",
            summary.launched, summary.succeeded, summary.failed, summary.cancelled
        );

        outcome.map(|graph| (graph, builder.excluded().len()))
    }
}

/// Replaces an outcome that cancellation cut short with [`Error::Cancelled`].
///
/// A graph built from fetches that all completed stays valid even when the
/// token fires afterwards.
fn cancellation_outcome(outcome: Result<Graph>, excluded: &[FetchError]) -> Result<Graph> {
    let cut_short = match &outcome {
        Ok(_) => excluded.iter().any(FetchError::is_cancelled),
        Err(Error::AggregationAborted(failure)) => failure.is_cancelled(),
        Err(_) => false,
    };

    if cut_short {
        Err(Error::Cancelled)
    } else {
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryResultCache;
    use crate::directory::{DirectoryError, InMemoryDirectory};
    use crate::executor::FetchCause;
    use crate::graph::FailurePolicy;
    use std::time::Duration;

    fn directory() -> InMemoryDirectory {
        InMemoryDirectory::new()
            .with_user("A", ["X", "Y"])
            .with_user("B", ["X", "Z"])
            .with_user("C", ["Z"])
    }

    fn users(names: &[&str]) -> Vec<UserId> {
        names.iter().map(|n| UserId::new(*n)).collect()
    }

    #[test]
    fn test_parse_request() {
        assert_eq!(
            NetworkMapper::parse_request("  b a\tc ").unwrap(),
            users(&["b", "a", "c"])
        );
        assert!(matches!(
            NetworkMapper::parse_request("   "),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            NetworkMapper::parse_request("a b a"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_request_key_ignores_order() {
        assert_eq!(NetworkMapper::request_key(&users(&["c", "a", "b"])), "a b c");
        assert_eq!(
            NetworkMapper::request_key(&users(&["b", "a"])),
            NetworkMapper::request_key(&users(&["a", "b"]))
        );
    }

    #[tokio::test]
    async fn test_shared_graph() {
        let mapper = NetworkMapper::new(Arc::new(directory()), MapperConfig::default());

        let graph = mapper.shared_graph(&users(&["A", "B", "C"])).await.unwrap();

        let mut names: Vec<&str> = graph.nodes().iter().map(|n| n.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["A", "B", "C", "X", "Z"]);
        assert_eq!(graph.edges().len(), 4);
    }

    #[tokio::test]
    async fn test_invalid_input_launches_nothing() {
        let directory = Arc::new(directory());
        let mapper = NetworkMapper::new(directory.clone(), MapperConfig::default());

        let result = mapper.build_network_map(&users(&["A", "A"])).await;

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(directory.count_queries(), 0);
    }

    #[tokio::test]
    async fn test_abort_policy_fails_the_request() {
        let directory = directory().with_count_failure("B", DirectoryError::Transport("reset".into()));
        let mapper = NetworkMapper::new(Arc::new(directory), MapperConfig::default());

        let result = mapper.shared_graph(&users(&["A", "B", "C"])).await;

        match result {
            Err(Error::AggregationAborted(e)) => assert_eq!(e.user(), &UserId::new("B")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cache_hit_skips_directory() {
        let directory = Arc::new(directory());
        let cache = Arc::new(InMemoryResultCache::new());
        let mapper = NetworkMapper::new(directory.clone(), MapperConfig::default())
            .with_cache(cache.clone());

        let first = mapper.build_network_map(&users(&["A", "B"])).await.unwrap();
        let queries = directory.count_queries();
        let second = mapper.build_network_map(&users(&["B", "A"])).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(directory.count_queries(), queries);
        assert_eq!(cache.get("A B").await, Some(first));
    }

    #[tokio::test]
    async fn test_partial_graphs_are_not_cached() {
        let directory = directory().with_count_failure("C", DirectoryError::NotFound(UserId::new("C")));
        let cache = Arc::new(InMemoryResultCache::new());
        let config = MapperConfig::default().with_failure_policy(FailurePolicy::ExcludeUser);
        let mapper = NetworkMapper::new(Arc::new(directory), config).with_cache(cache.clone());

        let json = mapper.build_network_map(&users(&["A", "B", "C"])).await.unwrap();

        assert!(json.contains("\"C\""));
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_returns_cancelled() {
        let directory = directory().with_latency("C", Duration::from_secs(20));
        let mapper = NetworkMapper::new(Arc::new(directory), MapperConfig::default());
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let result = mapper
            .shared_graph_with_cancel(&users(&["A", "B", "C"]), &cancel)
            .await;

        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_under_exclude_policy_returns_cancelled() {
        let directory = directory().with_latency("C", Duration::from_secs(20));
        let config = MapperConfig::default().with_failure_policy(FailurePolicy::ExcludeUser);
        let mapper = NetworkMapper::new(Arc::new(directory), config);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let result = mapper
            .shared_graph_with_cancel(&users(&["A", "B", "C"]), &cancel)
            .await;

        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancelling_after_completion_keeps_the_graph() {
        let mapper = NetworkMapper::new(Arc::new(directory()), MapperConfig::default());
        let cancel = CancellationToken::new();

        let graph = mapper
            .shared_graph_with_cancel(&users(&["A", "B"]), &cancel)
            .await
            .unwrap();
        cancel.cancel();

        assert_eq!(graph.edges().len(), 2);
    }

    #[test]
    fn test_complete_graph_is_not_reported_as_cancelled() {
        let graph = || Graph::from_json(r#"{"nodes":[],"links":[]}"#).unwrap();
        let cancelled = FetchError::new(UserId::new("C"), FetchCause::Cancelled);
        let failed = FetchError::new(
            UserId::new("C"),
            DirectoryError::Transport("reset".into()),
        );

        assert!(cancellation_outcome(Ok(graph()), &[]).is_ok());
        assert!(cancellation_outcome(Ok(graph()), std::slice::from_ref(&failed)).is_ok());
        assert!(matches!(
            cancellation_outcome(Ok(graph()), &[failed.clone(), cancelled.clone()]),
            Err(Error::Cancelled)
        ));
        assert!(matches!(
            cancellation_outcome(Err(Error::AggregationAborted(cancelled)), &[]),
            Err(Error::Cancelled)
        ));
        assert!(matches!(
            cancellation_outcome(Err(Error::AggregationAborted(failed)), &[]),
            Err(Error::AggregationAborted(_))
        ));
    }
}
