//! Graph data model: followings lists in, nodes and edges out.
//!
//! The serialized form is the shape force-directed renderers consume:
//!
//! ```json
//! {"nodes": [{"name": "a", "group": 1}], "links": [{"source": 0, "target": 1}]}
//! ```
//!
//! `group` is 1 for requested users and 2 for discovered accounts. Edge
//! endpoints are indices into `nodes`; the source follows the target.

use super::error::GraphError;
use crate::core::{Result, UserId};
use petgraph::dot::{Config, Dot};
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};

/// The complete, ordered followings of one user.
///
/// `followed` may hold blank placeholders where the directory returned a
/// short page; it never has missing entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowingsList {
    owner: UserId,
    followed: Vec<UserId>,
}

impl FollowingsList {
    pub fn new(owner: UserId, followed: Vec<UserId>) -> Self {
        Self { owner, followed }
    }

    /// The user whose followings these are.
    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    /// Followed accounts in directory order, blanks included.
    pub fn followed(&self) -> &[UserId] {
        &self.followed
    }

    /// Followed accounts with blank placeholders skipped.
    pub fn non_blank(&self) -> impl Iterator<Item = &UserId> {
        self.followed.iter().filter(|id| !id.is_blank())
    }

    pub fn into_parts(self) -> (UserId, Vec<UserId>) {
        (self.owner, self.followed)
    }
}

/// Why an account is in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum NodeGroup {
    /// One of the requested users
    Input,
    /// Followed by at least two requested users
    Discovered,
}

impl From<NodeGroup> for u8 {
    fn from(group: NodeGroup) -> Self {
        match group {
            NodeGroup::Input => 1,
            NodeGroup::Discovered => 2,
        }
    }
}

impl TryFrom<u8> for NodeGroup {
    type Error = GraphError;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(NodeGroup::Input),
            2 => Ok(NodeGroup::Discovered),
            other => Err(GraphError::malformed(format!("unknown node group {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: UserId,
    pub group: NodeGroup,
}

/// `source` follows `target`; both are indices into [`Graph::nodes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: usize,
    pub target: usize,
}

/// A shared-followings graph.
///
/// Requested users come first in caller order, followed by discovered
/// accounts in the order they qualified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    nodes: Vec<Node>,
    #[serde(rename = "links")]
    edges: Vec<Edge>,
}

impl Graph {
    pub(super) fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Position of the node named `name`, if present.
    pub fn node_index(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|node| node.name.as_str() == name)
    }

    /// Edges as `(source name, target name)` pairs.
    pub fn named_edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.edges.iter().map(|edge| {
            (
                self.nodes[edge.source].name.as_str(),
                self.nodes[edge.target].name.as_str(),
            )
        })
    }

    /// Serializes to the `{nodes, links}` JSON document.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes a `{nodes, links}` document, rejecting edges that point
    /// outside the node list.
    pub fn from_json(json: &str) -> Result<Self> {
        let graph: Graph = serde_json::from_str(json)?;

        let count = graph.nodes.len();
        if let Some(edge) = graph
            .edges
            .iter()
            .find(|edge| edge.source >= count || edge.target >= count)
        {
            return Err(GraphError::malformed(format!(
                "edge {} -> {} out of range for {} nodes",
                edge.source, edge.target, count
            ))
            .into());
        }

        Ok(graph)
    }

    /// Exports the graph in Graphviz DOT format.
    ///
    /// ```text
    /// dot -Tpng graph.dot -o graph.png
    /// ```
    pub fn to_dot(&self) -> String {
        let mut graph = DiGraph::<&str, ()>::new();

        let indices: Vec<_> = self
            .nodes
            .iter()
            .map(|node| graph.add_node(node.name.as_str()))
            .collect();

        for edge in &self.edges {
            graph.add_edge(indices[edge.source], indices[edge.target], ());
        }

        format!("{:?}", Dot::with_config(&graph, &[Config::EdgeNoLabel]))
    }
}
