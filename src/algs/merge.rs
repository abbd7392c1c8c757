//! Sibling merger: fuse partitions that can share a sweep.
//!
//! Two partitions are merge candidates when their loop categories fall in
//! the same merge class, they cover the same block, and neither depends on
//! the other through the inter-partition dependency graph. Performing one
//! merge can make another impossible (it would close a cycle between
//! sweeps), so candidates are ranked by how many other candidates they
//! cancel and applied greedily, fewest conflicts first. That gives a
//! practical near-optimal result without exhaustive search, and the
//! `(cancellation count, original candidate index)` order makes the outcome
//! bit-identical across reruns.

use crate::graph::{Graph, NodeId, Subgraph};
use crate::sweep_error::MeshSweepError;
use std::collections::HashMap;

/// Can these two meta-nodes (partitions) share a sweep?
///
/// Symmetric in its arguments and always false for `a == b`.
pub fn can_merge(g: &Graph, a: NodeId, b: NodeId) -> bool {
    if a == b {
        return false;
    }
    let (ta, tb) = (g.loop_type(a), g.loop_type(b));
    ta.category.merge_class() == tb.category.merge_class()
        && ta.block == tb.block
        && !g.depends_on(a, b)
        && !g.depends_on(b, a)
}

/// Fuse compatible sibling partitions in place.
///
/// Builds a meta-graph with one node per partition and the inter-partition
/// dependency edges, enumerates candidate merges, cancels the ones that
/// conflict, and applies the survivors through a current-partition pointer
/// array so chains of merges accumulate into a single subgraph. Emptied
/// partitions are removed.
pub fn merge_siblings(partitions: &mut Vec<Subgraph<'_>>) -> Result<(), MeshSweepError> {
    if partitions.len() < 2 {
        return Ok(());
    }
    let g = partitions[0].graph();

    // A node can live in several partitions (uncached duplicates), so the
    // reverse mapping has to be a multimap or inter-partition edges would be
    // dropped.
    let mut owners: HashMap<NodeId, Vec<usize>> = HashMap::new();
    for (i, part) in partitions.iter().enumerate() {
        for n in part.iter() {
            owners.entry(n).or_default().push(i);
        }
    }

    // Meta-graph: one node per partition, carrying the partition's loop
    // type; meta ids equal partition indices by construction.
    let mut meta = Graph::new();
    let metas: Vec<NodeId> = partitions
        .iter()
        .enumerate()
        .map(|(i, part)| {
            let lt = part
                .iter()
                .next()
                .map(|n| g.loop_type(n))
                .unwrap_or_default();
            meta.create(format!("sweep{i}"), false, false, lt)
        })
        .collect();
    for (i, part) in partitions.iter().enumerate() {
        for n in part.iter() {
            for &dep in g.deps(n) {
                if part.contains(dep) {
                    continue;
                }
                if let Some(holders) = owners.get(&dep) {
                    for &j in holders {
                        if j != i {
                            meta.needs(metas[i], metas[j])?;
                        }
                    }
                }
            }
        }
    }

    // Candidate merges over unordered meta pairs, in id order.
    let mut candidates: Vec<(usize, usize)> = Vec::new();
    for i in 0..metas.len() {
        for j in (i + 1)..metas.len() {
            if can_merge(&meta, metas[i], metas[j]) {
                candidates.push((i, j));
            }
        }
    }

    // Which candidates does performing each candidate rule out? Align the
    // second pair with the first by swapping so the two share a node or a
    // dependency direction, then check the four conflicting shapes.
    let dep = |a: NodeId, b: NodeId| meta.depends_on(a, b);
    let mut cancels: Vec<Vec<usize>> = vec![Vec::new(); candidates.len()];
    for ci in 0..candidates.len() {
        let (l1, l2) = (metas[candidates[ci].0], metas[candidates[ci].1]);
        for cj in (ci + 1)..candidates.len() {
            let (mut o1, mut o2) = (metas[candidates[cj].0], metas[candidates[cj].1]);
            if l1 == o2 || dep(l1, o2) || dep(o2, l1) {
                std::mem::swap(&mut o1, &mut o2);
            }
            let conflicting = (dep(l1, o1) && dep(o2, l2))
                || (dep(o1, l1) && dep(l2, o2))
                || (l1 == o1 && (dep(l2, o2) || dep(o2, l2)))
                || (l2 == o2 && (dep(l1, o1) || dep(o1, l1)));
            if conflicting {
                cancels[ci].push(cj);
                cancels[cj].push(ci);
            }
        }
    }

    // Fewest cancellations first; original candidate index breaks ties.
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by_key(|&ci| (cancels[ci].len(), ci));
    let mut pos = vec![0usize; candidates.len()];
    for (p, &ci) in order.iter().enumerate() {
        pos[ci] = p;
    }

    let mut ruled_out = vec![false; candidates.len()];
    let mut chosen: Vec<usize> = Vec::new();
    for (p, &ci) in order.iter().enumerate() {
        if ruled_out[p] {
            continue;
        }
        chosen.push(ci);
        for &cj in &cancels[ci] {
            ruled_out[pos[cj]] = true;
        }
    }

    // Apply through current-partition pointers, so merging (1,2) and later
    // (2,3) accumulates all three into one subgraph. Re-merging partitions
    // whose pointers already agree is a no-op.
    let mut ptr: Vec<usize> = (0..partitions.len()).collect();
    let mut applied = 0usize;
    for ci in chosen {
        let (p1, p2) = candidates[ci];
        let (a, b) = (ptr[p1], ptr[p2]);
        if a == b {
            continue;
        }
        let moved: Vec<NodeId> = partitions[b].iter().collect();
        for n in moved {
            partitions[a].add(n);
        }
        partitions[b].clear();
        for p in ptr.iter_mut() {
            if *p == b {
                *p = a;
            }
        }
        applied += 1;
    }
    log::debug!(
        "sibling merge: {applied} merges applied over {} candidates, {} partitions remain",
        candidates.len(),
        partitions.iter().filter(|p| !p.is_empty()).count()
    );

    partitions.retain(|p| !p.is_empty());
    Ok(())
}
