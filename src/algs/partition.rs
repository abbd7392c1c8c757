//! Partitioner: from a numbered graph to one subgraph per sweep.
//!
//! Nodes are first bucketed by loop number, then split by loop type inside
//! each bucket (in first-observed order), then each partition floods its
//! uncached same-flavor dependencies in, and finally each partition is
//! decomposed into weakly connected components. Flooding duplicates
//! stateless shared dependencies (materials) into every sweep that consumes
//! them; cached values computed in a deeper loop are left where they are and
//! become handoffs.
//!
//! ## Determinism
//! Output order depends only on node insertion order: buckets ascend by
//! loop number, loop types inside a bucket appear in the order the bucket's
//! nodes (id-ordered) introduce them, and component splitting picks the
//! smallest remaining root first.

use crate::algs::merge::merge_siblings;
use crate::algs::split::split_partitions;
use crate::graph::{Graph, LoopType, NodeId, Subgraph};
use crate::sweep_error::MeshSweepError;
use std::collections::BTreeSet;

/// Compute the sweep partitions of `g`.
///
/// Partitions are emitted in ascending-loop bucket order; pass them to
/// [`compute_loops`](crate::algs::exec_order::compute_loops) to obtain the
/// executable sweep sequence (which reverses, so producers run first).
/// With `merge` set, compatible sibling partitions are fused (see
/// [`merge_siblings`]).
///
/// # Errors
/// [`MeshSweepError::CyclicGraph`] if the graph is cyclic;
/// [`MeshSweepError::InvariantViolation`] if the structural audit rejects
/// the graph (debug builds and the `strict-checks` feature).
pub fn compute_partitions(g: &Graph, merge: bool) -> Result<Vec<Subgraph<'_>>, MeshSweepError> {
    #[cfg(any(debug_assertions, feature = "strict-checks"))]
    g.validate()?;
    let numbering = g.numbering()?;

    // Max loop over the roots; roots sit deepest in the dependency tree.
    let full = g.full();
    let maxloop = full
        .roots()
        .iter()
        .map(|&n| numbering.loop_of(n))
        .max()
        .unwrap_or(0);

    // Bucket by loop number.
    let mut buckets: Vec<Vec<NodeId>> = vec![Vec::new(); maxloop as usize + 1];
    for n in g.node_ids() {
        buckets[numbering.loop_of(n) as usize].push(n);
    }

    // Split each bucket by loop type, keeping first-observed type order.
    let mut partitions: Vec<Subgraph<'_>> = Vec::new();
    for bucket in &buckets {
        let mut by_type: Vec<(LoopType, Subgraph<'_>)> = Vec::new();
        for &n in bucket {
            let t = g.loop_type(n);
            match by_type.iter_mut().find(|(lt, _)| *lt == t) {
                Some((_, sg)) => {
                    sg.add(n);
                }
                None => {
                    let mut sg = g.subgraph();
                    sg.add(n);
                    by_type.push((t, sg));
                }
            }
        }
        partitions.extend(by_type.into_iter().map(|(_, sg)| sg));
    }

    // Pull uncached dependencies transitively into each partition. Each
    // node was initially assigned only its own loop number, so values
    // consumed by several sweeps have to be duplicated into each of them;
    // cached values computed in a deeper loop are already available and
    // stop the flood.
    for part in &mut partitions {
        let mut expanded = BTreeSet::new();
        for leaf in part.leaves() {
            flood_up(g, leaf, part, &mut expanded)?;
        }
    }

    let partitions = split_partitions(partitions);
    log::debug!(
        "partitioned {} nodes into {} sweeps (maxloop {maxloop})",
        g.len(),
        partitions.len()
    );

    #[cfg(any(debug_assertions, feature = "strict-checks"))]
    if let Some((p, d)) = uncovered_dependency(&partitions) {
        panic!(
            "partition closure broken: `{}` is referenced but never scheduled",
            p.graph().name(d)
        );
    }

    let mut partitions = partitions;
    if merge {
        merge_siblings(&mut partitions)?;
    }
    Ok(partitions)
}

/// Walk `n`'s dependencies, adding every same-flavor node that still has to
/// be computed in this sweep. Stops at nodes of a different loop type and
/// at cached nodes whose own loop number exceeds the partition's (those are
/// handoffs from an earlier-executed sweep).
fn flood_up(
    g: &Graph,
    n: NodeId,
    part: &mut Subgraph<'_>,
    expanded: &mut BTreeSet<NodeId>,
) -> Result<(), MeshSweepError> {
    let t = g.loop_type(n);
    let curr_loop = g.loop_of(n)?;
    let mut stack = vec![n];
    while let Some(x) = stack.pop() {
        if g.loop_type(x) != t {
            continue;
        }
        if g.is_cached(x) && g.loop_of(x)? > curr_loop {
            continue;
        }
        part.add(x);
        if expanded.insert(x) {
            stack.extend(g.deps(x).iter().copied());
        }
    }
    Ok(())
}

/// Every dependency of every partitioned node must itself appear in at
/// least one partition, or the schedule would reference a value nobody
/// computes. Returns the first uncovered dependency, paired with a
/// partition for name lookup.
#[allow(dead_code)]
fn uncovered_dependency<'a, 'g>(
    partitions: &'a [Subgraph<'g>],
) -> Option<(&'a Subgraph<'g>, NodeId)> {
    let mut all_nodes = BTreeSet::new();
    let mut all_deps = BTreeSet::new();
    for part in partitions {
        let g = part.graph();
        for n in part.iter() {
            all_nodes.insert(n);
            all_deps.extend(g.deps(n).iter().copied());
        }
    }
    let missing = all_deps.difference(&all_nodes).next().copied()?;
    partitions.first().map(|p| (p, missing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Graph, LoopType};

    #[test]
    fn uncached_shared_dep_is_duplicated() {
        // a (loop 0) and reducing b (loop 1) both consume uncached c.
        let mut g = Graph::new();
        let a = g.create("a", false, false, LoopType::default());
        let b = g.create("b", true, true, LoopType::default());
        let c = g.create("c", false, false, LoopType::default());
        g.needs(a, b).unwrap();
        g.needs(a, c).unwrap();
        g.needs(b, c).unwrap();

        let parts = compute_partitions(&g, false).unwrap();
        let holding_c: Vec<_> = parts.iter().filter(|p| p.contains(c)).collect();
        assert_eq!(holding_c.len(), 2);
    }

    #[test]
    fn cached_deeper_dep_becomes_a_handoff() {
        let mut g = Graph::new();
        let a = g.create("a", false, false, LoopType::default());
        let b = g.create("b", true, true, LoopType::default());
        g.needs(a, b).unwrap();

        let parts = compute_partitions(&g, false).unwrap();
        assert_eq!(parts.len(), 2);
        // b stays out of a's partition: its value is handed off, not
        // recomputed.
        let a_part = parts.iter().find(|p| p.contains(a)).unwrap();
        assert!(!a_part.contains(b));
    }

    #[test]
    fn bucket_type_order_follows_first_observation() {
        let mut g = Graph::new();
        let n0 = g.create("elem", false, false, LoopType::default());
        let n1 = g.create("nodal", false, false, LoopType::nodal(0));
        let parts = compute_partitions(&g, false).unwrap();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].contains(n0));
        assert!(parts[1].contains(n1));
    }

    #[test]
    fn repeat_partitioning_is_stable() {
        let mut g = Graph::new();
        let a = g.create("a", false, false, LoopType::default());
        let b = g.create("b", true, true, LoopType::default());
        let c = g.create("c", false, false, LoopType::default());
        g.needs(a, b).unwrap();
        g.needs(b, c).unwrap();

        let first: Vec<Vec<_>> = compute_partitions(&g, false)
            .unwrap()
            .iter()
            .map(|p| p.iter().collect())
            .collect();
        let second: Vec<Vec<_>> = compute_partitions(&g, false)
            .unwrap()
            .iter()
            .map(|p| p.iter().collect())
            .collect();
        assert_eq!(first, second);
    }
}
