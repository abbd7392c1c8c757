//! Synthetic dependency-graph builder for stress-testing the scheduler.
//!
//! Mirrors how a real multiphysics input deck comes together: node
//! *families* (a base name instantiated per block and per loop category,
//! with cached/reducing flags), *forced bindings* (a kernel always needs
//! its variable), and a *transition matrix* of probabilistic dependencies
//! walked randomly to grow varied graphs. Binding across loop categories is
//! only legal through a cached bridge that lives in exactly one category;
//! a reducing dependency is consumed across all of its blocks, anything
//! else block-matches.

use crate::graph::{Graph, LoopCategory, LoopType, NodeId};
use crate::sweep_error::MeshSweepError;
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug)]
struct Family {
    cached: bool,
    reducing: bool,
    blocks: BTreeSet<u32>,
    cats: BTreeSet<LoopCategory>,
    members: Vec<(LoopType, NodeId)>,
}

/// Builder accumulating families, bindings, and transitions into a
/// [`Graph`].
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: Graph,
    families: BTreeMap<String, Family>,
    transitions: HashMap<NodeId, Vec<(Vec<NodeId>, f64)>>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a family of nodes named `base`, one per (block, category)
    /// pair. An empty block list declares a single out-of-loop node
    /// (`LoopCategory::None`); an empty category list means every in-loop
    /// category.
    ///
    /// # Errors
    /// [`MeshSweepError::NameConflict`] for a duplicate base name;
    /// [`MeshSweepError::InvariantViolation`] for a reducing family with no
    /// blocks (there is nothing to reduce over).
    pub fn add_family(
        &mut self,
        base: &str,
        cached: bool,
        reducing: bool,
        blocks: &[u32],
        cats: &[LoopCategory],
    ) -> Result<(), MeshSweepError> {
        if self.families.contains_key(base) {
            return Err(MeshSweepError::NameConflict(base.to_string()));
        }
        if blocks.is_empty() && reducing {
            return Err(MeshSweepError::InvariantViolation(format!(
                "reducing family `{base}` needs at least one block"
            )));
        }
        let mut family = Family {
            cached,
            reducing,
            blocks: blocks.iter().copied().collect(),
            cats: BTreeSet::new(),
            members: Vec::new(),
        };
        if blocks.is_empty() {
            let lt = LoopType::new(LoopCategory::None, 0);
            let id = self.graph.create(base, cached, reducing, lt);
            family.blocks.insert(0);
            family.cats.insert(LoopCategory::None);
            family.members.push((lt, id));
        } else {
            let cats: Vec<LoopCategory> = if cats.is_empty() {
                LoopCategory::all()
                    .into_iter()
                    .filter(|c| *c != LoopCategory::None)
                    .collect()
            } else {
                cats.to_vec()
            };
            family.cats.extend(cats.iter().copied());
            for &block in blocks {
                for &cat in &cats {
                    let lt = LoopType::new(cat, block);
                    let id = self.graph.create(base, cached, reducing, lt);
                    family.members.push((lt, id));
                }
            }
        }
        self.families.insert(base.to_string(), family);
        Ok(())
    }

    /// The member of `base` instantiated for (`cat`, `block`), if any.
    pub fn node(&self, base: &str, cat: LoopCategory, block: u32) -> Option<NodeId> {
        let want = LoopType::new(cat, block);
        self.families.get(base).and_then(|f| {
            f.members
                .iter()
                .find(|(lt, _)| *lt == want)
                .map(|(_, id)| *id)
        })
    }

    /// The graph built so far.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Finish building and hand the graph over.
    pub fn finish(self) -> Graph {
        self.graph
    }

    /// Force every member of `node_base` to depend on `dep_base`.
    ///
    /// For each category of the consumer: a dependency family lacking that
    /// category must be cached and live in exactly one category (the
    /// bridge). A reducing dependency is consumed across all of its blocks;
    /// otherwise the dependency must exist on the consumer's block.
    pub fn bind(&mut self, node_base: &str, dep_base: &str) -> Result<(), MeshSweepError> {
        self.bind_with(node_base, dep_base, false)
    }

    /// [`bind`](Self::bind) that tolerates dependency families missing some
    /// of the consumer's blocks.
    pub fn bind_with(
        &mut self,
        node_base: &str,
        dep_base: &str,
        allow_missing_dep_blocks: bool,
    ) -> Result<(), MeshSweepError> {
        let pairs = self.resolve_binding(node_base, dep_base, allow_missing_dep_blocks)?;
        for (src, dep) in pairs {
            self.graph.needs(src, dep)?;
        }
        Ok(())
    }

    /// All (consumer, dependency) node pairs a binding expands to.
    fn resolve_binding(
        &self,
        node_base: &str,
        dep_base: &str,
        allow_missing_dep_blocks: bool,
    ) -> Result<Vec<(NodeId, NodeId)>, MeshSweepError> {
        let node_family = self
            .families
            .get(node_base)
            .ok_or_else(|| MeshSweepError::UnknownName(node_base.to_string()))?;
        let dep_family = self
            .families
            .get(dep_base)
            .ok_or_else(|| MeshSweepError::UnknownName(dep_base.to_string()))?;

        let mut pairs = Vec::new();
        for &cat in &node_family.cats {
            let dstcat = if dep_family.cats.contains(&cat) {
                cat
            } else {
                // Crossing categories needs a cached bridge living in
                // exactly one category.
                if !dep_family.cached && !dep_family.reducing {
                    return Err(MeshSweepError::BindingIncompatible {
                        node: node_base.to_string(),
                        dep: dep_base.to_string(),
                        reason: "differing loop category and the dependency isn't cached".into(),
                    });
                }
                if dep_family.cats.len() > 1 {
                    return Err(MeshSweepError::BindingIncompatible {
                        node: node_base.to_string(),
                        dep: dep_base.to_string(),
                        reason: "differing loop category and the dependency spans several".into(),
                    });
                }
                *dep_family
                    .cats
                    .iter()
                    .next()
                    .ok_or_else(|| MeshSweepError::BindingIncompatible {
                        node: node_base.to_string(),
                        dep: dep_base.to_string(),
                        reason: "dependency family has no members".into(),
                    })?
            };

            for &block in &node_family.blocks {
                let Some(src) = self.node(node_base, cat, block) else {
                    continue;
                };
                if dep_family.reducing {
                    // A reduction is one value over all of its blocks.
                    for &depblock in &dep_family.blocks {
                        if let Some(dep) = self.node(dep_base, dstcat, depblock) {
                            pairs.push((src, dep));
                        }
                    }
                } else if let Some(dep) = self.node(dep_base, dstcat, block) {
                    pairs.push((src, dep));
                } else if !allow_missing_dep_blocks {
                    return Err(MeshSweepError::BindingIncompatible {
                        node: node_base.to_string(),
                        dep: dep_base.to_string(),
                        reason: format!("not defined on block {block}"),
                    });
                }
            }
        }
        Ok(pairs)
    }

    /// Register a probabilistic dependency from `node_base` to `dep_base`,
    /// taken with `probability` at each visit during a walk.
    pub fn transition(
        &mut self,
        node_base: &str,
        dep_base: &str,
        probability: f64,
    ) -> Result<(), MeshSweepError> {
        let pairs = self.resolve_binding(node_base, dep_base, true)?;
        // Group dependency candidates per source node.
        let mut per_src: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        for (src, dep) in pairs {
            per_src.entry(src).or_default().push(dep);
        }
        for (src, deps) in per_src {
            self.transitions
                .entry(src)
                .or_default()
                .push((deps, probability));
        }
        Ok(())
    }

    /// Grow the graph with `n_walks` random walks from `start`, wiring one
    /// transition group per visited node and recursing into it.
    pub fn walk(
        &mut self,
        rng: &mut StdRng,
        start: NodeId,
        n_walks: usize,
    ) -> Result<(), MeshSweepError> {
        for _ in 0..n_walks {
            self.walk_transitions(rng, start)?;
        }
        Ok(())
    }

    fn walk_transitions(&mut self, rng: &mut StdRng, n: NodeId) -> Result<(), MeshSweepError> {
        let groups = match self.transitions.get(&n) {
            Some(g) if !g.is_empty() => g.clone(),
            _ => return Ok(()),
        };
        let r: f64 = rng.gen();
        let mut prob_sum = 0.0;
        for (deps, prob) in groups {
            prob_sum += prob;
            if r > prob_sum {
                continue;
            }
            // Wire the whole group first (breadth-first) so the cycle
            // screening below sees every edge this step introduces.
            for &dep in &deps {
                if self.graph.depends_on(dep, n) {
                    break;
                }
                self.graph.needs(n, dep)?;
            }
            for &dep in &deps {
                self.walk_transitions(rng, dep)?;
            }
            break;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::partition::compute_partitions;
    use rand::SeedableRng;

    #[test]
    fn blockless_family_lives_outside_loops() {
        let mut b = GraphBuilder::new();
        b.add_family("solution", true, false, &[], &[]).unwrap();
        let n = b.node("solution", LoopCategory::None, 0).unwrap();
        assert_eq!(b.graph().loop_type(n).category, LoopCategory::None);
    }

    #[test]
    fn reducing_family_requires_blocks() {
        let mut b = GraphBuilder::new();
        assert!(matches!(
            b.add_family("pp", true, true, &[], &[]),
            Err(MeshSweepError::InvariantViolation(_))
        ));
    }

    #[test]
    fn cross_category_binding_requires_a_cached_bridge() {
        let mut b = GraphBuilder::new();
        b.add_family("kernel", false, false, &[0], &[LoopCategory::ElemOnElem])
            .unwrap();
        b.add_family("aux", false, false, &[0], &[LoopCategory::Nodal])
            .unwrap();
        assert!(matches!(
            b.bind("kernel", "aux"),
            Err(MeshSweepError::BindingIncompatible { .. })
        ));

        let mut b = GraphBuilder::new();
        b.add_family("kernel", false, false, &[0], &[LoopCategory::ElemOnElem])
            .unwrap();
        b.add_family("aux", true, false, &[0], &[LoopCategory::Nodal])
            .unwrap();
        b.bind("kernel", "aux").unwrap();
        let k = b.node("kernel", LoopCategory::ElemOnElem, 0).unwrap();
        let a = b.node("aux", LoopCategory::Nodal, 0).unwrap();
        assert!(b.graph().deps(k).contains(&a));
    }

    #[test]
    fn reducing_dependency_spans_all_blocks() {
        let mut b = GraphBuilder::new();
        b.add_family("out", false, false, &[1], &[LoopCategory::ElemOnElem])
            .unwrap();
        b.add_family("pp", true, true, &[1, 2, 3], &[LoopCategory::ElemOnElem])
            .unwrap();
        b.bind("out", "pp").unwrap();
        let out = b.node("out", LoopCategory::ElemOnElem, 1).unwrap();
        assert_eq!(b.graph().deps(out).len(), 3);
    }

    #[test]
    fn non_reducing_dependency_block_matches() {
        let mut b = GraphBuilder::new();
        b.add_family("kernel", false, false, &[1, 2], &[LoopCategory::ElemOnElem])
            .unwrap();
        b.add_family("mat", false, false, &[1, 2], &[LoopCategory::ElemOnElem])
            .unwrap();
        b.bind("kernel", "mat").unwrap();
        let k1 = b.node("kernel", LoopCategory::ElemOnElem, 1).unwrap();
        let m1 = b.node("mat", LoopCategory::ElemOnElem, 1).unwrap();
        let m2 = b.node("mat", LoopCategory::ElemOnElem, 2).unwrap();
        assert!(b.graph().deps(k1).contains(&m1));
        assert!(!b.graph().deps(k1).contains(&m2));
    }

    #[test]
    fn seeded_walks_are_reproducible() {
        fn build(seed: u64) -> Vec<(NodeId, Vec<NodeId>)> {
            let mut b = GraphBuilder::new();
            b.add_family("sol", true, false, &[], &[]).unwrap();
            b.add_family("k", true, true, &[1, 2], &[LoopCategory::ElemOnElem])
                .unwrap();
            b.add_family("m", false, false, &[1, 2], &[LoopCategory::ElemOnElem])
                .unwrap();
            b.transition("sol", "k", 0.9).unwrap();
            b.transition("k", "m", 0.7).unwrap();
            let start = b.node("sol", LoopCategory::None, 0).unwrap();
            let mut rng = StdRng::seed_from_u64(seed);
            b.walk(&mut rng, start, 8).unwrap();
            let g = b.finish();
            g.node_ids().map(|n| (n, g.deps(n).to_vec())).collect()
        }
        assert_eq!(build(7), build(7));
    }

    #[test]
    fn generated_graphs_partition_cleanly() {
        let mut b = GraphBuilder::new();
        b.add_family("sol", true, false, &[], &[]).unwrap();
        b.add_family(
            "k",
            true,
            true,
            &[1, 2, 3],
            &[LoopCategory::ElemOnElem],
        )
        .unwrap();
        b.add_family("m", false, false, &[1, 2, 3], &[LoopCategory::ElemOnElem])
            .unwrap();
        b.add_family("aux", true, true, &[1, 2, 3], &[LoopCategory::Nodal])
            .unwrap();
        b.bind("sol", "k").unwrap();
        b.bind("k", "m").unwrap();
        b.bind("aux", "m").unwrap_err();
        // aux is nodal and m is elemental+uncached: illegal direct bind.
        let g = b.finish();
        let parts = compute_partitions(&g, true).unwrap();
        assert!(!parts.is_empty());
    }
}
