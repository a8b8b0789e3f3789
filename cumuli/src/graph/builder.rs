//! Two-pass reduction of followings lists into a shared graph.
//!
//! # Membership pass
//!
//! Runs incrementally as lists arrive, so it overlaps with fetching:
//!
//! - `seen` and `qualifies` start out holding the requested users
//! - the first list only records its ids in `seen`
//! - every later list promotes each distinct id that is already in `seen`
//!   but not yet in `qualifies`, then records it in `seen`
//!
//! An id therefore qualifies exactly when it shows up in two different lists,
//! whichever order the lists arrive in. Only the position of a discovered node
//! depends on arrival order.
//!
//! # Edge pass
//!
//! Runs once the stream is drained: every non-blank occurrence of a
//! qualifying id in a collected list becomes an edge from the list's owner.
//! Repeated occurrences produce repeated edges.

use super::error::{GraphError, GraphResult};
use super::model::{Edge, FollowingsList, Graph, Node, NodeGroup};
use crate::core::{validate_users, Error, Result, UserId};
use crate::executor::{FetchError, FetchResult};
use futures::{Stream, StreamExt};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// What the builder does when a user's fetch failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FailurePolicy {
    /// Stop and report the failure; no partial graph is produced.
    #[default]
    Abort,
    /// Drop the user's contribution but keep it as an input node.
    ExcludeUser,
}

impl FromStr for FailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(FailurePolicy::Abort),
            "exclude" | "exclude-user" => Ok(FailurePolicy::ExcludeUser),
            other => Err(Error::Config(format!(
                "unknown failure policy {other:?}, expected \"abort\" or \"exclude\""
            ))),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Abort => f.write_str("abort"),
            FailurePolicy::ExcludeUser => f.write_str("exclude"),
        }
    }
}

/// Lifecycle of a [`SharedGraphBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuilderState {
    /// Accepting lists and failures
    Collecting,
    /// Emitting nodes and edges
    Reducing,
    /// Finished, successfully or not
    Done,
}

/// Incrementally builds a shared graph for one request.
///
/// # Example
///
/// ```
/// use cumuli::graph::{FailurePolicy, FollowingsList, SharedGraphBuilder};
/// use cumuli::UserId;
///
/// let users = [UserId::new("a"), UserId::new("b")];
/// let mut builder = SharedGraphBuilder::new(&users, FailurePolicy::Abort).unwrap();
///
/// builder
///     .accept(FollowingsList::new(UserId::new("a"), vec![UserId::new("x")]))
///     .unwrap();
/// builder
///     .accept(FollowingsList::new(UserId::new("b"), vec![UserId::new("x")]))
///     .unwrap();
///
/// let graph = builder.finish().unwrap();
/// assert_eq!(graph.nodes().len(), 3);
/// assert_eq!(graph.edges().len(), 2);
/// ```
pub struct SharedGraphBuilder {
    users: Vec<UserId>,
    policy: FailurePolicy,
    state: BuilderState,
    seen: HashSet<UserId>,
    qualifies: HashSet<UserId>,
    /// Requested users, then discovered ids in promotion order
    node_order: Vec<UserId>,
    /// Lists in arrival order
    collected: Vec<FollowingsList>,
    /// Owners whose list or failure has arrived
    received: HashSet<UserId>,
    excluded: Vec<FetchError>,
}

impl SharedGraphBuilder {
    /// Creates a builder for `users`, in caller order.
    ///
    /// Fails with [`Error::InvalidInput`] for an empty, malformed or
    /// duplicated user set.
    pub fn new(users: &[UserId], policy: FailurePolicy) -> Result<Self> {
        validate_users(users)?;

        let seeded: HashSet<UserId> = users.iter().cloned().collect();
        Ok(Self {
            users: users.to_vec(),
            policy,
            state: BuilderState::Collecting,
            seen: seeded.clone(),
            qualifies: seeded,
            node_order: users.to_vec(),
            collected: Vec::with_capacity(users.len()),
            received: HashSet::with_capacity(users.len()),
            excluded: Vec::new(),
        })
    }

    /// Builds the graph for a complete set of lists in the given order.
    pub fn from_lists<I>(users: &[UserId], lists: I) -> Result<Graph>
    where
        I: IntoIterator<Item = FollowingsList>,
    {
        let mut builder = Self::new(users, FailurePolicy::Abort)?;
        for list in lists {
            builder.accept(list)?;
        }
        builder.finish()
    }

    pub fn state(&self) -> BuilderState {
        self.state
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Failures dropped under [`FailurePolicy::ExcludeUser`].
    pub fn excluded(&self) -> &[FetchError] {
        &self.excluded
    }

    /// Feeds one item from the aggregation stream.
    ///
    /// A failure under [`FailurePolicy::Abort`] ends the builder with
    /// [`Error::AggregationAborted`].
    pub fn ingest(&mut self, result: FetchResult) -> Result<()> {
        match result {
            Ok(list) => Ok(self.accept(list)?),
            Err(failure) => self.reject(failure),
        }
    }

    /// Runs the membership pass for one successfully fetched list.
    pub fn accept(&mut self, list: FollowingsList) -> GraphResult<()> {
        self.check_owner(list.owner())?;

        if self.collected.is_empty() {
            self.seen.extend(list.non_blank().cloned());
        } else {
            let mut distinct = HashSet::new();
            for id in list.non_blank() {
                if !distinct.insert(id) {
                    continue;
                }
                if self.seen.contains(id) && !self.qualifies.contains(id) {
                    debug!("{} qualifies on the list of {}", id, list.owner());
                    self.qualifies.insert(id.clone());
                    self.node_order.push(id.clone());
                }
                self.seen.insert(id.clone());
            }
        }

        self.received.insert(list.owner().clone());
        self.collected.push(list);
        Ok(())
    }

    fn reject(&mut self, failure: FetchError) -> Result<()> {
        self.check_owner(failure.user())?;

        match self.policy {
            FailurePolicy::Abort => {
                self.state = BuilderState::Done;
                Err(Error::AggregationAborted(failure))
            }
            FailurePolicy::ExcludeUser => {
                warn!("Excluding {} from the graph: {}", failure.user(), failure.cause());
                self.received.insert(failure.user().clone());
                self.excluded.push(failure);
                Ok(())
            }
        }
    }

    fn check_owner(&self, owner: &UserId) -> GraphResult<()> {
        if self.state != BuilderState::Collecting {
            return Err(GraphError::not_collecting(self.state));
        }
        if !self.users.contains(owner) {
            return Err(GraphError::unknown_owner(owner.clone()));
        }
        if self.received.contains(owner) {
            return Err(GraphError::duplicate_list(owner.clone()));
        }
        Ok(())
    }

    /// Runs the edge pass and emits the graph.
    pub fn finish(&mut self) -> Result<Graph> {
        if self.state != BuilderState::Collecting {
            return Err(GraphError::not_collecting(self.state).into());
        }
        self.state = BuilderState::Reducing;

        let index: HashMap<&UserId, usize> = self
            .node_order
            .iter()
            .enumerate()
            .map(|(position, id)| (id, position))
            .collect();

        let nodes = self
            .node_order
            .iter()
            .enumerate()
            .map(|(position, id)| Node {
                name: id.clone(),
                group: if position < self.users.len() {
                    NodeGroup::Input
                } else {
                    NodeGroup::Discovered
                },
            })
            .collect::<Vec<_>>();

        let mut edges = Vec::new();
        for list in &self.collected {
            let Some(&source) = index.get(list.owner()) else {
                continue;
            };
            edges.extend(
                list.non_blank()
                    .filter(|id| self.qualifies.contains(*id))
                    .filter_map(|id| index.get(id))
                    .map(|&target| Edge { source, target }),
            );
        }

        info!(
            "Built shared graph: {} nodes ({} discovered), {} edges from {} lists, {} excluded",
            nodes.len(),
            nodes.len() - self.users.len(),
            edges.len(),
            self.collected.len(),
            self.excluded.len()
        );

        self.state = BuilderState::Done;
        Ok(Graph::new(nodes, edges))
    }

    /// Drains `stream` into the builder and emits the graph.
    ///
    /// Returns as soon as a failure aborts the build; the rest of the stream
    /// is left unread.
    pub async fn build<S>(&mut self, mut stream: S) -> Result<Graph>
    where
        S: Stream<Item = FetchResult> + Unpin,
    {
        while let Some(result) = stream.next().await {
            self.ingest(result)?;
        }
        self.finish()
    }
}
