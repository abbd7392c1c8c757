//! Component splitter: divide each partition into weakly connected pieces.
//!
//! Two nodes belong to the same piece when they are connected by any chain
//! of dep/depender edges lying entirely inside the partition. Splitting
//! disconnected pieces apart gives the sibling merger smaller units to
//! recombine.

use crate::graph::{NodeId, Subgraph};
use std::collections::BTreeSet;

/// Decompose every partition into its weakly connected components.
///
/// Components are emitted per source partition, smallest root first, so the
/// output order is a pure function of node insertion order.
pub fn split_partitions(partitions: Vec<Subgraph<'_>>) -> Vec<Subgraph<'_>> {
    let mut splits = Vec::new();
    for part in &partitions {
        let mut roots: BTreeSet<NodeId> = part.roots().into_iter().collect();
        while let Some(&r) = roots.iter().next() {
            let split = find_connected(part, r);
            for sr in split.roots() {
                roots.remove(&sr);
            }
            splits.push(split);
        }
    }
    splits
}

/// Undirected reachability from `start` across both edge directions,
/// restricted to `part`.
fn find_connected<'g>(part: &Subgraph<'g>, start: NodeId) -> Subgraph<'g> {
    let g = part.graph();
    let mut all = g.subgraph();
    let mut stack = vec![start];
    while let Some(n) = stack.pop() {
        if !part.contains(n) || !all.add(n) {
            continue;
        }
        stack.extend(g.deps(n).iter().copied());
        stack.extend(g.dependers(n).iter().copied());
    }
    all
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Graph, LoopType};

    #[test]
    fn disconnected_chains_are_separated() {
        let mut g = Graph::new();
        let a = g.create("a", false, false, LoopType::default());
        let b = g.create("b", false, false, LoopType::default());
        let c = g.create("c", false, false, LoopType::default());
        let d = g.create("d", false, false, LoopType::default());
        g.needs(a, b).unwrap();
        g.needs(c, d).unwrap();

        let splits = split_partitions(vec![g.full()]);
        assert_eq!(splits.len(), 2);
        assert!(splits[0].contains(a) && splits[0].contains(b));
        assert!(splits[1].contains(c) && splits[1].contains(d));
    }

    #[test]
    fn connectivity_crosses_edge_direction() {
        // a -> b <- c: weakly connected through b.
        let mut g = Graph::new();
        let a = g.create("a", false, false, LoopType::default());
        let b = g.create("b", false, false, LoopType::default());
        let c = g.create("c", false, false, LoopType::default());
        g.needs(a, b).unwrap();
        g.needs(c, b).unwrap();

        let splits = split_partitions(vec![g.full()]);
        assert_eq!(splits.len(), 1);
        assert_eq!(splits[0].len(), 3);
    }

    #[test]
    fn membership_is_partition_relative() {
        // b bridges a and c but is excluded from the view, so a and c stay
        // apart.
        let mut g = Graph::new();
        let a = g.create("a", false, false, LoopType::default());
        let b = g.create("b", false, false, LoopType::default());
        let c = g.create("c", false, false, LoopType::default());
        g.needs(a, b).unwrap();
        g.needs(c, b).unwrap();

        let mut part = g.full();
        part.remove(b);
        let splits = split_partitions(vec![part]);
        assert_eq!(splits.len(), 2);
    }
}
