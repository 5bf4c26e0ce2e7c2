//! A read-only [`petgraph`] view over the engine's current dependency graph.
//!
//! Built from a [`crate::snapshot::Snapshot`] rather than implementing
//! `petgraph::visit` directly against the live registry: the registry's
//! splay trees and intrusive lists are reorganized by every read (a search
//! splays), which does not sit well with `petgraph`'s expectation of a
//! stable graph to traverse. Snapshotting first gives us a frozen, ordinary
//! graph to hand to `petgraph`'s algorithms.

use petgraph::graph::DiGraph;

use crate::snapshot::Snapshot;
use crate::Address;

/// Build a directed graph from `snapshot`: one node per registered address,
/// one edge per outgoing dependency, weighted `true` for content and `false`
/// for existence.
///
/// Node weights are the addresses themselves, so callers can recover which
/// [`petgraph::graph::NodeIndex`] corresponds to which address via the
/// returned graph's `node_weight`.
pub fn to_graph(snapshot: &Snapshot) -> DiGraph<Address, bool> {
    let mut graph = DiGraph::new();
    let mut index_of = std::collections::HashMap::new();

    for object in &snapshot.objects {
        let idx = graph.add_node(object.address);
        index_of.insert(object.address, idx);
    }

    for object in &snapshot.objects {
        let source_idx = index_of[&object.address];
        for edge in &object.outgoing {
            let Some(&target_idx) = index_of.get(&edge.target) else {
                continue;
            };
            graph.add_edge(source_idx, target_idx, edge.content);
        }
    }

    graph
}
