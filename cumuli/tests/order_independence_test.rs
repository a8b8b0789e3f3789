//! Property tests for the shared-graph reduction
//!
//! These verify that:
//! 1. Membership never depends on the order lists arrive in
//! 2. A discovered node exists exactly when two different lists name it
//! 3. Requested users always come first, in caller order
//! 4. Blank placeholders never reach the graph

use cumuli::graph::{FollowingsList, Graph, NodeGroup, SharedGraphBuilder};
use cumuli::UserId;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashSet};

/// Index 0 is the blank placeholder, 1..=5 can name a requested user, the
/// rest are outside accounts.
fn pool_id(k: usize) -> UserId {
    match k {
        0 => UserId::blank(),
        1..=5 => UserId::new(format!("u{}", k - 1)),
        _ => UserId::new(format!("f{k}")),
    }
}

fn users(n: usize) -> Vec<UserId> {
    (0..n).map(|i| UserId::new(format!("u{i}"))).collect()
}

fn lists(followings: &[Vec<usize>]) -> Vec<FollowingsList> {
    followings
        .iter()
        .enumerate()
        .map(|(i, followed)| {
            FollowingsList::new(
                UserId::new(format!("u{i}")),
                followed.iter().copied().map(pool_id).collect(),
            )
        })
        .collect()
}

/// Lists in caller order plus the same lists in a shuffled arrival order.
fn scenario() -> impl Strategy<Value = (Vec<FollowingsList>, Vec<FollowingsList>)> {
    (1usize..=5)
        .prop_flat_map(|n| prop::collection::vec(prop::collection::vec(0usize..12, 0..10), n))
        .prop_flat_map(|followings| {
            let lists = lists(&followings);
            (Just(lists.clone()), Just(lists).prop_shuffle())
        })
}

fn membership(graph: &Graph) -> BTreeSet<(String, u8)> {
    graph
        .nodes()
        .iter()
        .map(|n| (n.name.to_string(), u8::from(n.group)))
        .collect()
}

fn sorted_edges(graph: &Graph) -> Vec<(String, String)> {
    let mut edges: Vec<_> = graph
        .named_edges()
        .map(|(s, t)| (s.to_string(), t.to_string()))
        .collect();
    edges.sort();
    edges
}

/// Accounts named by at least two distinct lists, excluding requested users.
fn expected_discovered(lists: &[FollowingsList], requested: &[UserId]) -> BTreeSet<String> {
    let mut counts = std::collections::HashMap::new();
    for list in lists {
        let distinct: HashSet<&UserId> = list.non_blank().collect();
        for id in distinct {
            *counts.entry(id.to_string()).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .filter(|(id, count)| *count >= 2 && !requested.iter().any(|u| u.as_str() == id.as_str()))
        .map(|(id, _)| id)
        .collect()
}

proptest! {
    #[test]
    fn membership_is_independent_of_arrival_order((ordered, shuffled) in scenario()) {
        let requested = users(ordered.len());

        let first = SharedGraphBuilder::from_lists(&requested, ordered.clone()).unwrap();
        let second = SharedGraphBuilder::from_lists(&requested, shuffled).unwrap();

        prop_assert_eq!(membership(&first), membership(&second));
        prop_assert_eq!(sorted_edges(&first), sorted_edges(&second));
    }

    #[test]
    fn discovered_nodes_follow_two_sighting_rule((ordered, shuffled) in scenario()) {
        let requested = users(ordered.len());
        let graph = SharedGraphBuilder::from_lists(&requested, shuffled).unwrap();

        let discovered: BTreeSet<String> = graph
            .nodes()
            .iter()
            .filter(|n| n.group == NodeGroup::Discovered)
            .map(|n| n.name.to_string())
            .collect();

        prop_assert_eq!(discovered, expected_discovered(&ordered, &requested));
    }

    #[test]
    fn requested_users_lead_and_blanks_vanish((_, shuffled) in scenario()) {
        let requested = users(shuffled.len());
        let graph = SharedGraphBuilder::from_lists(&requested, shuffled).unwrap();

        let leading: Vec<&UserId> = graph.nodes()[..requested.len()].iter().map(|n| &n.name).collect();
        prop_assert_eq!(leading, requested.iter().collect::<Vec<_>>());
        prop_assert!(graph.nodes()[..requested.len()].iter().all(|n| n.group == NodeGroup::Input));
        prop_assert!(graph.nodes().iter().all(|n| !n.name.is_blank()));
        prop_assert!(graph.edges().iter().all(|e| e.source < requested.len()));
    }
}
