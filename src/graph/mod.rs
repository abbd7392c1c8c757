//! Dependency-graph primitives for sweep scheduling.
//!
//! A [`Graph`] owns every node (kernels, materials, variables,
//! postprocessors, …) and hands out dense [`NodeId`] handles. Forward edges
//! (`deps`) and reverse edges (`dependers`) are stored as mirrored lists and
//! mutated only through [`Graph::needs`] / [`Graph::clear_deps`], which
//! update both sides in one operation.
//!
//! ## Edge rules
//! - The deps-induced digraph must stay acyclic; an insertion that would
//!   close a cycle fails with [`MeshSweepError::CyclicGraph`].
//! - Inserting an existing edge is a no-op (upsert semantics).
//! - A non-cached node must not depend on a non-cached node of a different
//!   loop type; nothing would be available to bridge the sweeps. This is
//!   checked by [`Graph::validate`] rather than on every insertion, keeping
//!   `needs` cheap; the partitioner runs the check on entry in debug builds
//!   (and always with the `strict-checks` feature) and refuses a malformed
//!   graph with [`MeshSweepError::InvariantViolation`].
//!
//! ## Derived data
//! Loop numbers are computed once per graph revision and cached in a
//! `OnceCell`; every edge mutation invalidates the cache.

pub mod loop_type;
pub mod node;
pub mod subgraph;

pub use loop_type::{LoopCategory, LoopType, MergeClass};
pub use node::NodeId;
pub use subgraph::Subgraph;

use crate::algs::numbering::{compute_numbering, LoopNumbering};
use crate::sweep_error::MeshSweepError;
use node::NodeData;
use once_cell::sync::OnceCell;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};

/// Owner of all node storage; also the full subgraph over every node.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: Vec<NodeData>,
    /// Memoized loop numbering; taken on every edge mutation.
    numbering: OnceCell<LoopNumbering>,
    /// Per-graph counter backing `Subgraph::id`, so diagnostics stay stable
    /// without process-wide state.
    next_subgraph_id: AtomicU32,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new node and return its handle.
    ///
    /// The id equals the insertion index; handles stay valid for the
    /// graph's lifetime.
    pub fn create(
        &mut self,
        name: impl Into<String>,
        cached: bool,
        reducing: bool,
        looptype: LoopType,
    ) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes
            .push(NodeData::new(name.into(), cached, reducing, looptype));
        self.numbering.take();
        id
    }

    /// Number of nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All node ids in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId::new)
    }

    #[inline]
    fn data(&self, n: NodeId) -> &NodeData {
        &self.nodes[n.index()]
    }

    #[inline]
    pub fn name(&self, n: NodeId) -> &str {
        &self.data(n).name
    }

    #[inline]
    pub fn loop_type(&self, n: NodeId) -> LoopType {
        self.data(n).looptype
    }

    #[inline]
    pub fn is_reducing(&self, n: NodeId) -> bool {
        self.data(n).reducing
    }

    /// True if the node's value is retained across consecutive sweeps;
    /// reducing implies cached.
    #[inline]
    pub fn is_cached(&self, n: NodeId) -> bool {
        self.data(n).is_cached()
    }

    /// Forward edges: what `n` needs.
    #[inline]
    pub fn deps(&self, n: NodeId) -> &[NodeId] {
        &self.data(n).deps
    }

    /// Reverse edges: what needs `n`.
    #[inline]
    pub fn dependers(&self, n: NodeId) -> &[NodeId] {
        &self.data(n).dependers
    }

    /// Record that `node` needs `dep`.
    ///
    /// Inserts `dep` into `node.deps` and `node` into `dep.dependers` in one
    /// operation. Idempotent for existing edges.
    ///
    /// # Errors
    /// [`MeshSweepError::CyclicGraph`] if `node == dep` or if `dep` already
    /// (transitively) depends on `node`.
    pub fn needs(&mut self, node: NodeId, dep: NodeId) -> Result<(), MeshSweepError> {
        if node == dep {
            return Err(MeshSweepError::CyclicGraph(format!(
                "`{}` cannot depend on itself",
                self.name(node)
            )));
        }
        if self.nodes[node.index()].deps.contains(&dep) {
            return Ok(());
        }
        if self.depends_on(dep, node) {
            return Err(MeshSweepError::CyclicGraph(format!(
                "adding `{}` -> `{}` would close a cycle",
                self.name(node),
                self.name(dep)
            )));
        }
        self.nodes[node.index()].deps.push(dep);
        self.nodes[dep.index()].dependers.push(node);
        self.numbering.take();
        Ok(())
    }

    /// Record that `node` needs every node in `deps`.
    pub fn needs_all(&mut self, node: NodeId, deps: &[NodeId]) -> Result<(), MeshSweepError> {
        for &d in deps {
            self.needs(node, d)?;
        }
        Ok(())
    }

    /// Detach `n` from both sides of every edge it participates in.
    pub fn clear_deps(&mut self, n: NodeId) {
        let deps = std::mem::take(&mut self.nodes[n.index()].deps);
        for d in deps {
            self.nodes[d.index()].dependers.retain(|x| *x != n);
        }
        let dependers = std::mem::take(&mut self.nodes[n.index()].dependers);
        for d in dependers {
            self.nodes[d.index()].deps.retain(|x| *x != n);
        }
        self.numbering.take();
    }

    /// Does `a` reach `b` along forward (deps) edges?
    ///
    /// Iterative walk with a local visited set; independent queries are
    /// fully isolated from each other.
    pub fn depends_on(&self, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return false;
        }
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![a];
        visited[a.index()] = true;
        while let Some(n) = stack.pop() {
            for &d in self.deps(n) {
                if d == b {
                    return true;
                }
                if !visited[d.index()] {
                    visited[d.index()] = true;
                    stack.push(d);
                }
            }
        }
        false
    }

    /// The memoized loop numbering, computing it on first access after any
    /// mutation.
    ///
    /// # Errors
    /// [`MeshSweepError::CyclicGraph`] if the dependency graph is cyclic.
    pub fn numbering(&self) -> Result<&LoopNumbering, MeshSweepError> {
        self.numbering.get_or_try_init(|| compute_numbering(self))
    }

    /// Force (re)computation of loop numbers; call after wiring edges.
    pub fn prepare(&self) -> Result<(), MeshSweepError> {
        self.numbering().map(|_| ())
    }

    /// Loop number of `n` under the current numbering.
    pub fn loop_of(&self, n: NodeId) -> Result<u32, MeshSweepError> {
        Ok(self.numbering()?.loop_of(n))
    }

    /// An empty view over this graph.
    pub fn subgraph(&self) -> Subgraph<'_> {
        Subgraph::new(self)
    }

    /// The full view containing every node.
    pub fn full(&self) -> Subgraph<'_> {
        Subgraph::with_nodes(self, self.node_ids().collect())
    }

    pub(crate) fn alloc_subgraph_id(&self) -> u32 {
        self.next_subgraph_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Audit the structural invariants: mirrored edge lists with no
    /// duplicates, acyclicity, and the sweep-bridging rule. Returns the
    /// first violation found.
    ///
    /// The scheduler runs this on entry in debug builds; enable the
    /// `strict-checks` feature to keep auditing in release builds too.
    pub fn validate(&self) -> Result<(), MeshSweepError> {
        // Edge mirrors: every dep edge must appear exactly once on each side.
        for n in self.node_ids() {
            let data = self.data(n);
            let mut seen = BTreeSet::new();
            for &d in &data.deps {
                if d.index() >= self.nodes.len() {
                    return Err(MeshSweepError::InvariantViolation(format!(
                        "node `{}` has out-of-range dep {d}",
                        data.name
                    )));
                }
                if !seen.insert(d) {
                    return Err(MeshSweepError::InvariantViolation(format!(
                        "duplicate dep edge `{}` -> `{}`",
                        data.name,
                        self.name(d)
                    )));
                }
                if !self.data(d).dependers.contains(&n) {
                    return Err(MeshSweepError::InvariantViolation(format!(
                        "edge `{}` -> `{}` is missing its depender mirror",
                        data.name,
                        self.name(d)
                    )));
                }
            }
            let mut seen = BTreeSet::new();
            for &d in &data.dependers {
                if !seen.insert(d) {
                    return Err(MeshSweepError::InvariantViolation(format!(
                        "duplicate depender edge on `{}`",
                        data.name
                    )));
                }
                if !self.data(d).deps.contains(&n) {
                    return Err(MeshSweepError::InvariantViolation(format!(
                        "depender `{}` of `{}` is missing its dep mirror",
                        self.name(d),
                        data.name
                    )));
                }
            }
        }
        // Acyclicity; recomputing is cheap relative to validation.
        compute_numbering(self)?;
        // Sweep-bridging rule: an uncached value cannot be handed across
        // loop types.
        for n in self.node_ids() {
            if self.is_cached(n) {
                continue;
            }
            for &d in self.deps(n) {
                if !self.is_cached(d) && self.loop_type(d) != self.loop_type(n) {
                    return Err(MeshSweepError::InvariantViolation(format!(
                        "uncached `{}` ({}) depends on uncached `{}` ({}) of a different loop type",
                        self.name(n),
                        self.loop_type(n),
                        self.name(d),
                        self.loop_type(d)
                    )));
                }
            }
        }
        Ok(())
    }
}
