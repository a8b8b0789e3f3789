//! Retry policy for directory requests.
//!
//! The core never retries a failed fetch on its own: a failed count or page
//! query surfaces as a [`crate::executor::FetchError`]. Retrying belongs to the
//! [`crate::directory::RemoteDirectory`] implementation, which wraps each
//! request in [`retry_with_policy`].
//!
//! Two things decide whether a request is attempted again:
//!
//! 1. [`RetryPolicy`] says HOW MANY attempts are allowed and how long to wait
//!    between them (exponential backoff, capped).
//! 2. [`Retryable`] says WHICH errors are worth another attempt. A missing
//!    account is permanent; a dropped connection or a rate limit is not.
//!    An error may also name the earliest moment to try again, which
//!    stretches the backoff delay.

use std::future::Future;
use std::time::Duration;

// =============================================================================
// RETRY POLICY
// =============================================================================

/// Attempt budget and backoff schedule for a single directory request.
///
/// # Examples
///
/// ```
/// use cumuli::core::RetryPolicy;
/// use std::time::Duration;
///
/// const DIRECTORY_RETRY: RetryPolicy = RetryPolicy {
///     max_attempts: 4,
///     initial_delay: Duration::from_millis(250),
///     max_delay: Duration::from_secs(5),
///     backoff_multiplier: 2.0,
/// };
///
/// assert_eq!(DIRECTORY_RETRY.delay_for_attempt(1), Some(Duration::from_millis(250)));
/// assert_eq!(DIRECTORY_RETRY.delay_for_attempt(4), None);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, the first try included.
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Upper bound for any single delay.
    pub max_delay: Duration,

    /// Growth factor applied per retry:
    /// `min(initial_delay * backoff_multiplier^(attempt-1), max_delay)`.
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub const NONE: Self = Self {
        max_attempts: 1,
        initial_delay: Duration::from_secs(0),
        max_delay: Duration::from_secs(0),
        backoff_multiplier: 1.0,
    };

    /// Three attempts: immediate, then 1s, then 2s.
    pub const STANDARD: Self = Self {
        max_attempts: 3,
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(30),
        backoff_multiplier: 2.0,
    };

    /// Delay to wait after the given (1-indexed) failed attempt, or `None`
    /// once the attempt budget is spent.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }

        let exponent = attempt.saturating_sub(1) as f64;
        let delay_secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powf(exponent);

        Some(Duration::from_secs_f64(
            delay_secs.min(self.max_delay.as_secs_f64()),
        ))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::NONE
    }
}

// =============================================================================
// RETRYABLE ERRORS
// =============================================================================

/// Classifies an error as transient (worth retrying) or permanent.
///
/// # Example
///
/// ```
/// use cumuli::core::Retryable;
///
/// #[derive(Debug)]
/// enum LookupError {
///     Timeout,
///     UnknownAccount,
/// }
///
/// impl Retryable for LookupError {
///     fn is_retryable(&self) -> bool {
///         matches!(self, LookupError::Timeout)
///     }
/// }
///
/// assert!(LookupError::Timeout.is_retryable());
/// assert!(!LookupError::UnknownAccount.is_retryable());
/// ```
pub trait Retryable {
    /// Returns true if the failed operation may succeed when attempted again.
    fn is_retryable(&self) -> bool;

    /// Minimum wait the failing side asked for before the next attempt.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

// =============================================================================
// RETRY EXECUTION
// =============================================================================

/// Runs `operation` until it succeeds, fails permanently, or the policy's
/// attempt budget is spent.
///
/// The closure receives the current attempt number (1-indexed). With
/// `retry_policy = None` the operation runs exactly once. A
/// [`Retryable::retry_after`] hint longer than the backoff delay replaces it.
pub async fn retry_with_policy<F, Fut, T, E>(
    retry_policy: Option<RetryPolicy>,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Debug,
{
    let Some(policy) = retry_policy else {
        return operation(1).await;
    };

    let mut attempt = 1;

    loop {
        let error = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if !error.is_retryable() {
            tracing::debug!("Request failed with non-retryable error: {:?}", error);
            return Err(error);
        }

        match policy.delay_for_attempt(attempt) {
            Some(backoff) => {
                let delay = error.retry_after().map_or(backoff, |hint| hint.max(backoff));
                tracing::debug!(
                    "Request failed (attempt {}/{}): {:?}. Retrying after {:?}",
                    attempt,
                    policy.max_attempts,
                    error,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            None => {
                tracing::warn!(
                    "Request failed and exhausted retry attempts ({}/{}): {:?}",
                    attempt,
                    policy.max_attempts,
                    error
                );
                return Err(error);
            }
        }
    }
}
