//! Explicit configuration for the shared-graph pipeline.
//!
//! A [`MapperConfig`] is created once at process start and passed into the
//! constructors of the fetcher, aggregator and [`crate::NetworkMapper`].
//! Nothing inside the core reads the environment on its own.

use super::error::{Error, Result};
use super::retry::RetryPolicy;
use crate::graph::FailurePolicy;
use std::time::Duration;

/// Number of followed accounts requested per directory page.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Upper bound for one user's complete fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// How long a serialized graph stays in the result cache.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

pub const DEFAULT_API_BASE: &str = "https://api.soundcloud.com";

/// Largest follow count a fetch will allocate slots for.
pub const DEFAULT_MAX_FOLLOW_COUNT: usize = 100_000;

/// Configuration shared by every request a process serves.
///
/// # Example
///
/// ```
/// use cumuli::core::MapperConfig;
/// use std::time::Duration;
///
/// let config = MapperConfig::default()
///     .with_page_size(200)
///     .with_fetch_timeout(Some(Duration::from_secs(5)));
///
/// assert_eq!(config.page_size(), 200);
/// ```
#[derive(Debug, Clone)]
pub struct MapperConfig {
    client_id: Option<String>,
    api_base: String,
    page_size: usize,
    max_follow_count: usize,
    fetch_timeout: Option<Duration>,
    retry_policy: Option<RetryPolicy>,
    cache_ttl: Duration,
    failure_policy: FailurePolicy,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            api_base: DEFAULT_API_BASE.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            max_follow_count: DEFAULT_MAX_FOLLOW_COUNT,
            fetch_timeout: Some(DEFAULT_FETCH_TIMEOUT),
            retry_policy: Some(RetryPolicy::STANDARD),
            cache_ttl: DEFAULT_CACHE_TTL,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl MapperConfig {
    /// Reads configuration from the process environment.
    ///
    /// | Variable                    | Default                        |
    /// |-----------------------------|--------------------------------|
    /// | `SC_CLIENT_ID`              | unset                          |
    /// | `CUMULI_API_BASE`           | `https://api.soundcloud.com`   |
    /// | `CUMULI_PAGE_SIZE`          | `50`                           |
    /// | `CUMULI_MAX_FOLLOW_COUNT`   | `100000`                       |
    /// | `CUMULI_FETCH_TIMEOUT_SECS` | `30` (`0` disables the timeout)|
    /// | `CUMULI_CACHE_TTL_SECS`     | `60`                           |
    /// | `CUMULI_FAILURE_POLICY`     | `abort` (or `exclude`)         |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(id) = lookup("SC_CLIENT_ID").filter(|v| !v.is_empty()) {
            config.client_id = Some(id);
        }
        if let Some(base) = lookup("CUMULI_API_BASE").filter(|v| !v.is_empty()) {
            config.api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(raw) = lookup("CUMULI_PAGE_SIZE") {
            let page_size = parse_number("CUMULI_PAGE_SIZE", &raw)?;
            if page_size == 0 {
                return Err(Error::Config("CUMULI_PAGE_SIZE must be positive".to_string()));
            }
            config.page_size = page_size as usize;
        }
        if let Some(raw) = lookup("CUMULI_MAX_FOLLOW_COUNT") {
            let max = parse_number("CUMULI_MAX_FOLLOW_COUNT", &raw)?;
            config.max_follow_count = usize::try_from(max).map_err(|_| {
                Error::Config(format!("CUMULI_MAX_FOLLOW_COUNT is out of range: {max}"))
            })?;
        }
        if let Some(raw) = lookup("CUMULI_FETCH_TIMEOUT_SECS") {
            let secs = parse_number("CUMULI_FETCH_TIMEOUT_SECS", &raw)?;
            config.fetch_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(raw) = lookup("CUMULI_CACHE_TTL_SECS") {
            config.cache_ttl = Duration::from_secs(parse_number("CUMULI_CACHE_TTL_SECS", &raw)?);
        }
        if let Some(raw) = lookup("CUMULI_FAILURE_POLICY") {
            config.failure_policy = raw.parse()?;
        }

        Ok(config)
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Sets the page size. A size of zero is clamped to one.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Caps the follow count a directory may report for one user.
    pub fn with_max_follow_count(mut self, max: usize) -> Self {
        self.max_follow_count = max;
        self
    }

    /// Bounds one user's complete fetch; `None` disables the bound.
    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, policy: Option<RetryPolicy>) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn max_follow_count(&self) -> usize {
        self.max_follow_count
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout
    }

    pub fn retry_policy(&self) -> Option<RetryPolicy> {
        self.retry_policy
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }
}

fn parse_number(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got {raw:?}")))
}
