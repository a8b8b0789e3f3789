//! SoundCloud-style HTTP directory.
//!
//! Two endpoints are used:
//!
//! - `GET {base}/users/{user}.json?client_id=…` answers
//!   `{"followings_count": n}`
//! - `GET {base}/users/{user}/followings.json?client_id=…&offset=O&limit=L`
//!   answers `[{"permalink": "…"}, …]`
//!
//! Every request runs under the configured [`RetryPolicy`]; only transport
//! failures and rate limits are attempted again.

use super::{DirectoryError, RemoteDirectory, Result};
use crate::core::{retry_with_policy, Error, MapperConfig, RetryPolicy, UserId};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Per-request timeout for a single HTTP call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Deserialize)]
struct UserResponse {
    followings_count: f64,
}

#[derive(Deserialize)]
struct FollowingResponse {
    #[serde(default)]
    permalink: String,
}

/// Directory backed by a SoundCloud-compatible JSON API.
#[derive(Debug, Clone)]
pub struct HttpDirectory {
    client: reqwest::Client,
    api_base: Url,
    client_id: String,
    retry_policy: Option<RetryPolicy>,
}

impl HttpDirectory {
    /// Creates a directory from the process configuration.
    ///
    /// Fails with [`Error::Config`] when no client id is configured or the
    /// API base is not an absolute URL.
    pub fn from_config(config: &MapperConfig) -> crate::core::Result<Self> {
        let client_id = config
            .client_id()
            .ok_or_else(|| Error::Config("SC_CLIENT_ID is not set".to_string()))?;

        let api_base = Url::parse(config.api_base())
            .map_err(|e| Error::Config(format!("invalid API base {:?}: {e}", config.api_base())))?;
        if api_base.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "API base {api_base} cannot carry a path"
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base,
            client_id: client_id.to_string(),
            retry_policy: config.retry_policy(),
        })
    }

    fn user_url(&self, user: &UserId) -> Result<Url> {
        let file = format!("{user}.json");
        self.endpoint(user, &["users", file.as_str()], &[])
    }

    fn followings_url(&self, user: &UserId, offset: usize, limit: usize) -> Result<Url> {
        self.endpoint(
            user,
            &["users", user.as_str(), "followings.json"],
            &[("offset", offset.to_string()), ("limit", limit.to_string())],
        )
    }

    /// Appends percent-encoded path segments and query pairs to the API base.
    ///
    /// A user id can never add segments, a query or a fragment of its own.
    fn endpoint(
        &self,
        user: &UserId,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<Url> {
        // `.` and `..` would be dropped as dot segments, changing the path.
        if user.as_str() == "." || user.as_str() == ".." {
            return Err(DirectoryError::NotFound(user.clone()));
        }

        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| DirectoryError::Transport(format!("{} cannot be a base", self.api_base)))?
            .pop_if_empty()
            .extend(segments);

        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("client_id", &self.client_id);
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
        drop(pairs);

        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, user: &UserId, url: &Url) -> Result<T> {
        retry_with_policy(self.retry_policy, |attempt| {
            debug!("GET {} (attempt {})", url, attempt);
            self.get_once(user, url)
        })
        .await
    }

    async fn get_once<T: DeserializeOwned>(&self, user: &UserId, url: &Url) -> Result<T> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| DirectoryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, user, retry_after(&response)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| DirectoryError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl RemoteDirectory for HttpDirectory {
    async fn follow_count(&self, user: &UserId) -> Result<usize> {
        let url = self.user_url(user)?;
        let body: UserResponse = self.get_json(user, &url).await?;
        follow_count_from(body.followings_count)
    }

    async fn followed_page(
        &self,
        user: &UserId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<UserId>> {
        let url = self.followings_url(user, offset, limit)?;
        let body: Vec<FollowingResponse> = self.get_json(user, &url).await?;

        Ok(body
            .into_iter()
            .map(|following| UserId::new(following.permalink))
            .collect())
    }
}

/// Converts the JSON number the API reports into a slot count.
fn follow_count_from(raw: f64) -> Result<usize> {
    // `usize::MAX as f64` rounds up, so `>=` also rejects values that would saturate.
    if !raw.is_finite() || raw < 0.0 || raw.fract() != 0.0 || raw >= usize::MAX as f64 {
        return Err(DirectoryError::Malformed(format!(
            "followings_count {raw} is not a count"
        )));
    }
    Ok(raw as usize)
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Maps a non-success status to a directory error.
fn status_error(status: StatusCode, user: &UserId, retry_after: Option<Duration>) -> DirectoryError {
    match status {
        StatusCode::NOT_FOUND => DirectoryError::NotFound(user.clone()),
        StatusCode::TOO_MANY_REQUESTS => DirectoryError::RateLimited { retry_after },
        other => DirectoryError::Transport(format!("HTTP {other}")),
    }
}
