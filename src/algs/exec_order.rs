//! Topological layering of partitions into executable waves.
//!
//! Within one sweep, nodes whose in-partition dependencies are all
//! satisfied can run concurrently; `exec_order` peels those root sets off
//! wave by wave. Concatenating the waves of every sweep (in
//! [`compute_loops`] order) gives a full execution plan.

use crate::graph::{NodeId, Subgraph};
use std::collections::BTreeSet;

/// Layer one partition into waves of concurrently executable nodes.
///
/// A cached node surfacing again as a root after it has already been
/// emitted is a handoff repeat and is dropped rather than re-executed.
/// Empty waves are discarded.
pub fn exec_order(part: &Subgraph<'_>) -> Vec<Vec<NodeId>> {
    let g = part.graph();
    let mut work = part.clone();
    let mut executed: BTreeSet<NodeId> = BTreeSet::new();
    let mut order = Vec::new();
    while !work.is_empty() {
        let mut wave = Vec::new();
        for n in work.roots() {
            work.remove(n);
            if executed.contains(&n) && g.is_cached(n) {
                continue;
            }
            executed.insert(n);
            wave.push(n);
        }
        if !wave.is_empty() {
            order.push(wave);
        }
    }
    order
}

/// Layer every partition and emit the sweeps in execution order.
///
/// Partitions arrive in ascending-loop order (consumers first); the result
/// is reversed so producers run before their consumers.
pub fn compute_loops(partitions: &[Subgraph<'_>]) -> Vec<Vec<Vec<NodeId>>> {
    let mut loops: Vec<Vec<Vec<NodeId>>> = partitions.iter().map(exec_order).collect();
    loops.reverse();
    loops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Graph, LoopType};

    #[test]
    fn waves_follow_dependencies() {
        let mut g = Graph::new();
        let a = g.create("a", false, false, LoopType::default());
        let b = g.create("b", false, false, LoopType::default());
        let c = g.create("c", false, false, LoopType::default());
        g.needs(a, b).unwrap();
        g.needs(a, c).unwrap();
        g.needs(b, c).unwrap();

        let waves = exec_order(&g.full());
        assert_eq!(waves, vec![vec![c], vec![b], vec![a]]);
    }

    #[test]
    fn independent_nodes_share_a_wave() {
        let mut g = Graph::new();
        let a = g.create("a", false, false, LoopType::default());
        let b = g.create("b", false, false, LoopType::default());
        let c = g.create("c", false, false, LoopType::default());
        g.needs(a, b).unwrap();
        g.needs(a, c).unwrap();

        let waves = exec_order(&g.full());
        assert_eq!(waves, vec![vec![b, c], vec![a]]);
    }

    #[test]
    fn no_node_is_emitted_twice() {
        let mut g = Graph::new();
        let a = g.create("a", false, false, LoopType::default());
        let b = g.create("b", true, false, LoopType::default());
        let c = g.create("c", false, false, LoopType::default());
        g.needs(a, b).unwrap();
        g.needs(a, c).unwrap();
        g.needs(c, b).unwrap();

        let waves = exec_order(&g.full());
        let mut seen = BTreeSet::new();
        for wave in &waves {
            for n in wave {
                assert!(seen.insert(*n), "node emitted twice");
            }
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn sweeps_are_reversed_into_execution_order() {
        use crate::algs::partition::compute_partitions;
        let mut g = Graph::new();
        let a = g.create("a", false, false, LoopType::default());
        let b = g.create("b", true, true, LoopType::default());
        g.needs(a, b).unwrap();

        let parts = compute_partitions(&g, false).unwrap();
        let loops = compute_loops(&parts);
        assert_eq!(loops.len(), 2);
        // The reducer's sweep runs first, its consumer second.
        assert_eq!(loops[0], vec![vec![b]]);
        assert_eq!(loops[1], vec![vec![a]]);
    }
}
