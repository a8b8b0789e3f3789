use super::ResultCache;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

struct Entry {
    json: String,
    expires_at: Instant,
}

/// In-memory result cache using DashMap for concurrent access.
///
/// Expired entries are evicted lazily when read, or in bulk through
/// [`InMemoryResultCache::purge_expired`]. Expiry follows tokio's clock, so
/// paused-time tests can advance past a TTL without sleeping.
#[derive(Default)]
pub struct InMemoryResultCache {
    entries: DashMap<String, Entry>,
}

impl InMemoryResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes the entry for `key`, returning whether one existed.
    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drops every expired entry and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            debug!("Purged {} expired cache entries", purged);
        }
        purged
    }
}

#[async_trait]
impl ResultCache for InMemoryResultCache {
    async fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => return Some(entry.json.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            // The read guard is released above; remove_if rechecks expiry in
            // case a fresh entry was stored meanwhile.
            self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
            debug!("Cache entry {:?} expired", key);
        }
        None
    }

    async fn put(&self, key: &str, json: String, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries
            .insert(key.to_string(), Entry { json, expires_at });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache = InMemoryResultCache::new();
        cache.put("a b", "{}".to_string(), Duration::from_secs(60)).await;

        assert_eq!(cache.get("a b").await.as_deref(), Some("{}"));

        tokio::time::advance(Duration::from_secs(61)).await;

        assert_eq!(cache.get("a b").await, None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_replaces_and_refreshes() {
        let cache = InMemoryResultCache::new();
        cache.put("k", "old".to_string(), Duration::from_secs(10)).await;
        tokio::time::advance(Duration::from_secs(5)).await;
        cache.put("k", "new".to_string(), Duration::from_secs(10)).await;
        tokio::time::advance(Duration::from_secs(8)).await;

        assert_eq!(cache.get("k").await.as_deref(), Some("new"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_and_invalidate() {
        let cache = InMemoryResultCache::new();
        cache.put("short", "1".to_string(), Duration::from_secs(1)).await;
        cache.put("long", "2".to_string(), Duration::from_secs(100)).await;
        cache.put("other", "3".to_string(), Duration::from_secs(100)).await;

        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.invalidate("other"));
        assert!(!cache.invalidate("other"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("long").await.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_zero_ttl_is_never_served() {
        let cache = InMemoryResultCache::new();
        cache.put("k", "v".to_string(), Duration::ZERO).await;

        assert_eq!(cache.get("k").await, None);
    }
}
