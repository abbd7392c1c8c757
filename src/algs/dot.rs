//! Graphviz rendering of partitions and execution plans.
//!
//! Diagnostic surface only; nothing in the scheduler consumes this output.
//! Node labels carry the node name, the partition id it is drawn in, its
//! loop type, and its cached/reducing tags. A dependency pointing outside
//! the partition is drawn as a khaki-filled node: that value is a cached
//! handoff from another sweep and is reused here, not recalculated.

use crate::graph::{NodeId, Subgraph};
use std::fmt::Write as _;

/// Label for `n` as drawn inside partition `g`.
pub fn node_label(g: &Subgraph<'_>, n: NodeId) -> String {
    let graph = g.graph();
    let mut s = format!(
        "{} on partition {}\\n{}",
        graph.name(n),
        g.id(),
        graph.loop_type(n)
    );
    if graph.is_cached(n) {
        s.push_str("\\n(cached");
        if graph.is_reducing(n) {
            s.push_str(",reducing");
        }
        s.push(')');
    }
    s
}

/// One dot edge from `src` to `dst`, or an island statement when `dst` is
/// `None`. Out-of-partition targets get the handoff fill.
fn dot_edge(g: &Subgraph<'_>, src: NodeId, dst: Option<NodeId>) -> String {
    match dst {
        Some(dst) if g.contains(dst) => {
            format!("\"{}\" -> \"{}\";\n", node_label(g, src), node_label(g, dst))
        }
        Some(dst) => {
            let dstlabel = format!("\"{}\"", node_label(g, dst));
            format!(
                "\"{}\" -> {dstlabel};\n{dstlabel} [style=filled, fillcolor=khaki];\n",
                node_label(g, src)
            )
        }
        None => format!("\"{}\";\n", node_label(g, src)),
    }
}

fn dot_connections(g: &Subgraph<'_>) -> String {
    let graph = g.graph();
    let mut out = String::new();
    for n in g.iter() {
        let mut island = true;
        for &dep in graph.deps(n) {
            island = false;
            out.push_str(&dot_edge(g, n, Some(dep)));
        }
        if graph.dependers(n).iter().any(|d| g.contains(*d)) {
            island = false;
        }
        if island {
            out.push_str(&dot_edge(g, n, None));
        }
    }
    out
}

/// Render one subgraph as a standalone `digraph`.
pub fn dot_graph(g: &Subgraph<'_>) -> String {
    format!("digraph g {{\n{}}}\n", dot_connections(g))
}

/// Render several subgraphs on a single `digraph`, one cluster each.
pub fn dot_graph_merged(graphs: &[Subgraph<'_>]) -> String {
    let mut out = String::from("digraph g {\n");
    for (i, g) in graphs.iter().enumerate() {
        let _ = write!(out, "subgraph g{}{{\n{}}}\n", i + 1, dot_connections(g));
    }
    out.push_str("}\n");
    out
}

/// Human-readable execution plan: one line per wave, grouped by sweep.
///
/// When merging fused several loop categories into one sweep, the loop type
/// shown for the sweep is that of its first node and may be any of the
/// merged flavors.
pub fn format_loops(partitions: &[Subgraph<'_>], loops: &[Vec<Vec<NodeId>>]) -> String {
    let mut out = String::new();
    for (i, sweep) in loops.iter().enumerate() {
        let header = sweep
            .first()
            .and_then(|w| w.first())
            .map(|&n| {
                partitions
                    .first()
                    .map(|p| p.graph().loop_type(n).to_string())
                    .unwrap_or_default()
            })
            .unwrap_or_default();
        let _ = writeln!(out, "loop {} ({header}):", i + 1);
        for (w, wave) in sweep.iter().enumerate() {
            let _ = write!(out, "    group {}: ", w + 1);
            for &n in wave {
                if let Some(p) = partitions.first() {
                    let _ = write!(out, "{}, ", p.graph().name(n));
                }
            }
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::exec_order::compute_loops;
    use crate::algs::partition::compute_partitions;
    use crate::graph::{Graph, LoopType};

    fn barrier_pair() -> Graph {
        let mut g = Graph::new();
        let a = g.create("a", false, false, LoopType::default());
        let b = g.create("b", true, true, LoopType::default());
        g.needs(a, b).unwrap();
        g
    }

    #[test]
    fn labels_carry_flags_and_loop_type() {
        let g = barrier_pair();
        let full = g.full();
        let b = g.node_ids().nth(1).unwrap();
        let label = node_label(&full, b);
        assert!(label.starts_with("b on partition "));
        assert!(label.contains("ElemOnElem:block0"));
        assert!(label.ends_with("(cached,reducing)"));
    }

    #[test]
    fn cross_partition_targets_are_filled() {
        let g = barrier_pair();
        let parts = compute_partitions(&g, false).unwrap();
        let a_part = parts
            .iter()
            .find(|p| p.iter().any(|n| p.graph().name(n) == "a"))
            .unwrap();
        let dot = dot_graph(a_part);
        assert!(dot.starts_with("digraph g {"));
        assert!(dot.contains("fillcolor=khaki"));
    }

    #[test]
    fn format_loops_lists_each_wave() {
        let g = barrier_pair();
        let parts = compute_partitions(&g, false).unwrap();
        let loops = compute_loops(&parts);
        let text = format_loops(&parts, &loops);
        assert!(text.contains("loop 1"));
        assert!(text.contains("group 1: b,"));
        assert!(text.contains("group 1: a,"));
    }
}
