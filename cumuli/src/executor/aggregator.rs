//! Concurrent fan-out of followings fetches with completion-ordered fan-in.
//!
//! # How It Works
//!
//! 1. One task per user is spawned into a `JoinSet`
//! 2. Each task races its fetch against the aggregation's cancellation token
//!    and converts a panic into a tagged failure
//! 3. A settling task joins the set and forwards each result onto an
//!    unbounded channel the moment it finishes, so the consumer sees results in
//!    completion order rather than submission order
//! 4. When the set is empty the sender is dropped, which closes the stream,
//!    and the completion handle resolves with an [`AggregationSummary`]
//!
//! Cancelling never abandons a task: every outstanding task finishes with a
//! [`FetchCause::Cancelled`] failure that is delivered like any other result
//! before the stream closes. A task that fails to join is mapped back to its
//! user through the task id and reported the same way.

use super::error::{FetchCause, FetchError};
use super::fetcher::PaginatedFollowingsFetcher;
use crate::core::{MapperConfig, UserId};
use crate::directory::RemoteDirectory;
use crate::graph::FollowingsList;
use futures::{FutureExt, Stream};
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::{Id, JoinError, JoinHandle, JoinSet};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Outcome of one user's fetch, as delivered on the stream.
pub type FetchResult = std::result::Result<FollowingsList, FetchError>;

/// Counts reported once every launched fetch has settled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregationSummary {
    pub launched: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl AggregationSummary {
    fn record(&mut self, result: &FetchResult) {
        match result {
            Ok(_) => self.succeeded += 1,
            Err(e) if e.is_cancelled() => self.cancelled += 1,
            Err(_) => self.failed += 1,
        }
    }

    /// Number of fetches that have settled in any way.
    pub fn settled(&self) -> usize {
        self.succeeded + self.failed + self.cancelled
    }
}

/// Launches one concurrent fetch per user.
pub struct FollowingsAggregator {
    fetcher: Arc<PaginatedFollowingsFetcher>,
}

impl FollowingsAggregator {
    pub fn new(fetcher: PaginatedFollowingsFetcher) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
        }
    }

    /// Creates an aggregator whose fetcher uses `config`.
    pub fn from_config(directory: Arc<dyn RemoteDirectory>, config: &MapperConfig) -> Self {
        Self::new(PaginatedFollowingsFetcher::new(directory, config))
    }

    /// Starts fetching the followings of every user.
    ///
    /// Must be called within a tokio runtime.
    pub fn aggregate(&self, users: &[UserId]) -> Aggregation {
        self.aggregate_with_cancel(users, &CancellationToken::new())
    }

    /// Starts fetching under a child of `parent`.
    ///
    /// Cancelling `parent` (for example when the caller disconnects) tears
    /// down every outstanding fetch. Dropping the returned [`Aggregation`]
    /// cancels only its own child token.
    pub fn aggregate_with_cancel(
        &self,
        users: &[UserId],
        parent: &CancellationToken,
    ) -> Aggregation {
        let request_id = Uuid::new_v4();
        let token = parent.child_token();
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut tasks = JoinSet::new();
        let mut owners = HashMap::with_capacity(users.len());

        for user in users {
            let span = info_span!("fetch_followings", user = %user, %request_id);
            let handle = tasks.spawn(
                run_fetch(Arc::clone(&self.fetcher), user.clone(), token.clone()).instrument(span),
            );
            owners.insert(handle.id(), user.clone());
        }

        info!(
            "Launched {} followings fetches for request {}",
            users.len(),
            request_id
        );

        let completion = tokio::spawn(settle(tasks, owners, sender, request_id));

        Aggregation {
            stream: FollowingsStream { receiver },
            completion,
            token: token.clone(),
            _cancel_on_drop: token.drop_guard(),
        }
    }
}

/// Runs one fetch until it finishes, fails, panics or is cancelled.
async fn run_fetch(
    fetcher: Arc<PaginatedFollowingsFetcher>,
    user: UserId,
    token: CancellationToken,
) -> FetchResult {
    let fetch = AssertUnwindSafe(fetcher.fetch(&user)).catch_unwind();

    tokio::select! {
        biased;

        _ = token.cancelled() => {
            debug!("Fetch for {} cancelled", user);
            Err(FetchError::new(user.clone(), FetchCause::Cancelled))
        }

        outcome = fetch => match outcome {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Fetch for {} panicked: {}", user, message);
                Err(FetchError::new(user.clone(), FetchCause::TaskPanic(message)))
            }
        },
    }
}

/// Forwards results in completion order and closes the stream once every
/// task has settled.
async fn settle(
    mut tasks: JoinSet<FetchResult>,
    mut owners: HashMap<Id, UserId>,
    sender: mpsc::UnboundedSender<FetchResult>,
    request_id: Uuid,
) -> AggregationSummary {
    let mut summary = AggregationSummary {
        launched: tasks.len(),
        ..Default::default()
    };

    while let Some(joined) = tasks.join_next_with_id().await {
        let result = match joined {
            Ok((id, result)) => {
                owners.remove(&id);
                result
            }
            Err(e) => match owners.remove(&e.id()) {
                Some(user) => Err(join_failure(user, e)),
                None => {
                    error!(
                        "Unknown fetch task for request {} failed to join: {}",
                        request_id, e
                    );
                    continue;
                }
            },
        };

        summary.record(&result);
        if let Err(e) = &result {
            warn!("{}", e);
        }

        if sender.send(result).is_err() {
            debug!("Followings stream for request {} was dropped", request_id);
        }
    }

    info!(
        "Request {} settled: {} succeeded, {} failed, {} cancelled",
        request_id, summary.succeeded, summary.failed, summary.cancelled
    );
    summary
}

/// Converts a task that could not be joined into its user's failure.
fn join_failure(user: UserId, error: JoinError) -> FetchError {
    if error.is_panic() {
        let message = panic_message(error.into_panic().as_ref());
        error!("Fetch task for {} panicked outside the fetch: {}", user, message);
        FetchError::new(user, FetchCause::TaskPanic(message))
    } else {
        error!("Fetch task for {} was aborted", user);
        FetchError::new(user, FetchCause::Cancelled)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Completion-ordered stream of fetch results.
///
/// Ends once every launched fetch has settled.
pub struct FollowingsStream {
    receiver: mpsc::UnboundedReceiver<FetchResult>,
}

impl FollowingsStream {
    /// Waits for the next settled fetch, or `None` once all have settled.
    pub async fn next_result(&mut self) -> Option<FetchResult> {
        self.receiver.recv().await
    }
}

impl Stream for FollowingsStream {
    type Item = FetchResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Handle to a running aggregation: its result stream, its completion signal
/// and its cancellation token.
pub struct Aggregation {
    stream: FollowingsStream,
    completion: JoinHandle<AggregationSummary>,
    token: CancellationToken,
    _cancel_on_drop: DropGuard,
}

impl Aggregation {
    /// The completion-ordered result stream.
    pub fn stream(&mut self) -> &mut FollowingsStream {
        &mut self.stream
    }

    /// Cancels every fetch that has not settled yet.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns true once every launched fetch has settled.
    pub fn is_settled(&self) -> bool {
        self.completion.is_finished()
    }

    /// Waits until every launched fetch has settled.
    ///
    /// Results still queued on the stream are discarded.
    pub async fn settled(self) -> AggregationSummary {
        let Aggregation {
            mut stream,
            completion,
            _cancel_on_drop: _guard,
            ..
        } = self;

        let mut discarded = 0;
        while stream.next_result().await.is_some() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!("Discarded {} unconsumed fetch results", discarded);
        }

        completion.await.unwrap_or_else(|e| {
            error!("Aggregation settling task failed: {}", e);
            AggregationSummary::default()
        })
    }
}
