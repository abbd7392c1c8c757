//! `NodeId`: a dense handle for computations in a dependency graph.
//!
//! Nodes live inside their owning [`Graph`](crate::graph::Graph); outside
//! code only ever holds a `NodeId`, an index into the graph's storage that
//! is assigned once at creation and never changes. Edges are stored as
//! mirrored `Vec<NodeId>` lists on both endpoints and are mutated only
//! through the graph, never by handle surgery.

use crate::graph::loop_type::LoopType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to a node owned by a [`Graph`](crate::graph::Graph).
///
/// Ids are dense: the n-th created node has id `n`. A `NodeId` is only
/// meaningful together with the graph that issued it.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub(crate) fn new(index: usize) -> Self {
        NodeId(index as u32)
    }

    /// The raw index into the owning graph's storage.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeId").field(&self.0).finish()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-node storage: flags, loop type, and the two mirrored edge lists.
///
/// `deps` holds what this node needs (forward edges); `dependers` holds the
/// nodes that need it (reverse edges). The graph keeps the two lists exact
/// mirrors of each other across all nodes.
#[derive(Clone, Debug)]
pub(crate) struct NodeData {
    pub name: String,
    /// Computed value retained across consecutive sweeps without
    /// recomputation.
    pub cached: bool,
    /// Value available only after an entire sweep completes (aggregation).
    pub reducing: bool,
    pub looptype: LoopType,
    pub deps: Vec<NodeId>,
    pub dependers: Vec<NodeId>,
}

impl NodeData {
    pub(crate) fn new(name: String, cached: bool, reducing: bool, looptype: LoopType) -> Self {
        Self {
            name,
            cached,
            reducing,
            looptype,
            deps: Vec::new(),
            dependers: Vec::new(),
        }
    }

    /// Reducing nodes implicitly store their value.
    #[inline]
    pub(crate) fn is_cached(&self) -> bool {
        self.cached || self.reducing
    }
}
