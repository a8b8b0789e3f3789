//! Shared-followings graph construction
//!
//! This module turns the followings lists of a set of requested users into a
//! node/edge graph. It provides:
//!
//! - The data model: [`FollowingsList`] in, [`Graph`] of [`Node`]s and
//!   [`Edge`]s out
//! - [`SharedGraphBuilder`], which reduces lists as they arrive and applies a
//!   [`FailurePolicy`] to failed fetches
//! - JSON and Graphviz DOT presentation of a finished graph
//!
//! # Design Principles
//!
//! Following Parnas's information hiding principles:
//! - This module hides the membership bookkeeping (seen/qualifying sets)
//! - Exposes only abstract operations: accept, ingest, finish, build
//!
//! Membership depends only on which lists arrived, never on the order they
//! arrived in.

mod builder;
mod error;
mod model;

pub use builder::{BuilderState, FailurePolicy, SharedGraphBuilder};
pub use error::{GraphError, GraphResult};
pub use model::{Edge, FollowingsList, Graph, Node, NodeGroup};
