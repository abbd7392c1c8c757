//! Loop numbering: assigning each node to a sweep depth.
//!
//! Loop numbers ascend as nodes get deeper in the dependency hierarchy:
//! leaves of the depender relation (final outputs) sit at loop 0, and a
//! node's number is the maximum over its consumers of
//!
//! ```text
//! loop(d) + 1   if d.looptype != n.looptype  or  n is reducing
//! loop(d)       otherwise
//! ```
//!
//! The increment on reducing nodes is the reduction barrier: a reducer's
//! consumers run in a strictly earlier-numbered (later-executed) sweep. The
//! increment on a loop-type change forces cross-flavor dependencies to be
//! serialized through a cached handoff.
//!
//! The numbering is a pure function of the current graph and is computed by
//! one Kahn pass over the depender relation, so it is invariant under
//! repeat computation and detects cycles.

use crate::graph::{Graph, NodeId};
use crate::sweep_error::MeshSweepError;

/// Dense loop numbers for one graph revision.
///
/// Obtained from [`Graph::numbering`]; invalidated by any edge mutation.
#[derive(Clone, Debug)]
pub struct LoopNumbering {
    loops: Vec<u32>,
    max_loop: u32,
}

impl LoopNumbering {
    /// Loop number of `n`.
    #[inline]
    pub fn loop_of(&self, n: NodeId) -> u32 {
        self.loops[n.index()]
    }

    /// Highest loop number present (the depth of the schedule).
    #[inline]
    pub fn max_loop(&self) -> u32 {
        self.max_loop
    }

    /// Number of nodes covered.
    #[inline]
    pub fn len(&self) -> usize {
        self.loops.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }
}

/// Compute loop numbers for every node of `g`.
///
/// A node becomes ready once all of its dependers are numbered, so the pass
/// walks the depender relation in topological order (Kahn). If not every
/// node drains, the deps digraph contains a cycle.
///
/// # Errors
/// [`MeshSweepError::CyclicGraph`] when the graph is cyclic.
pub(crate) fn compute_numbering(g: &Graph) -> Result<LoopNumbering, MeshSweepError> {
    let n = g.len();
    let mut loops = vec![0u32; n];
    // Remaining unnumbered dependers per node.
    let mut pending: Vec<usize> = g.node_ids().map(|id| g.dependers(id).len()).collect();
    let mut stack: Vec<NodeId> = g.node_ids().filter(|&id| pending[id.index()] == 0).collect();

    let mut done = 0usize;
    while let Some(id) = stack.pop() {
        done += 1;
        let lt = g.loop_type(id);
        let reducing = g.is_reducing(id);
        let mut max = 0u32;
        for &d in g.dependers(id) {
            let inc = u32::from(g.loop_type(d) != lt || reducing);
            max = max.max(loops[d.index()] + inc);
        }
        loops[id.index()] = max;
        for &dep in g.deps(id) {
            pending[dep.index()] -= 1;
            if pending[dep.index()] == 0 {
                stack.push(dep);
            }
        }
    }

    if done != n {
        let stuck = g
            .node_ids()
            .find(|&id| pending[id.index()] != 0)
            .map(|id| g.name(id).to_string())
            .unwrap_or_default();
        return Err(MeshSweepError::CyclicGraph(format!(
            "graph contains a cycle involving `{stuck}`"
        )));
    }

    let max_loop = loops.iter().copied().max().unwrap_or(0);
    Ok(LoopNumbering { loops, max_loop })
}
