//! Filtered views over a dependency graph.
//!
//! A [`Subgraph`] is a set of node handles borrowed from one [`Graph`],
//! together with an id used for labeling in diagnostics. Root/leaf queries
//! filter each node's edges against the view, so the same node can be a
//! root of one subgraph and an interior node of another.

use crate::graph::node::NodeId;
use crate::graph::Graph;
use std::collections::BTreeSet;

/// A filtered view over a set of nodes of one [`Graph`].
///
/// Node order is the graph's insertion order (ids are dense and ascending),
/// which keeps every subgraph-derived result deterministic.
#[derive(Clone, Debug)]
pub struct Subgraph<'g> {
    graph: &'g Graph,
    id: u32,
    nodes: BTreeSet<NodeId>,
}

impl<'g> Subgraph<'g> {
    pub(crate) fn new(graph: &'g Graph) -> Self {
        Self {
            graph,
            id: graph.alloc_subgraph_id(),
            nodes: BTreeSet::new(),
        }
    }

    pub(crate) fn with_nodes(graph: &'g Graph, nodes: BTreeSet<NodeId>) -> Self {
        Self {
            graph,
            id: graph.alloc_subgraph_id(),
            nodes,
        }
    }

    /// The owning graph.
    #[inline]
    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    /// Id unique within the owning graph, for diagnostic labels.
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Insert `n`; returns false if it was already present.
    #[inline]
    pub fn add(&mut self, n: NodeId) -> bool {
        self.nodes.insert(n)
    }

    #[inline]
    pub fn remove(&mut self, n: NodeId) -> bool {
        self.nodes.remove(&n)
    }

    #[inline]
    pub fn contains(&self, n: NodeId) -> bool {
        self.nodes.contains(&n)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Nodes in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    /// Absorb every node of `other`. The views must share a graph.
    pub fn merge(&mut self, other: &Subgraph<'g>) {
        debug_assert!(std::ptr::eq(self.graph, other.graph));
        self.nodes.extend(other.nodes.iter().copied());
    }

    /// Nodes whose dependencies, filtered to this view, are empty.
    pub fn roots(&self) -> Vec<NodeId> {
        self.iter()
            .filter(|&n| !self.graph.deps(n).iter().any(|d| self.contains(*d)))
            .collect()
    }

    /// Nodes whose dependers, filtered to this view, are empty.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.iter()
            .filter(|&n| !self.graph.dependers(n).iter().any(|d| self.contains(*d)))
            .collect()
    }
}
