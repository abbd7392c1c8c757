//! # mesh-sweep
//!
//! mesh-sweep is a scheduling and value-storage kernel for multiphysics
//! finite-element runtimes. Given a directed acyclic dependency graph of
//! computations (kernels, materials, variables, postprocessors, boundary
//! conditions), it decides how to execute them as a minimal sequence of
//! mesh sweeps, and it serves the material-property-like values those
//! computations exchange through a lazily computed, location-keyed store
//! with old/older history.
//!
//! ## Features
//! - Graph of dense node handles with mirrored dep/depender edges and
//!   cached loop numbering
//! - Partitioning into per-loop, per-flavor sweeps with duplication of
//!   stateless dependencies and merging of compatible siblings
//! - Topological wave ordering per sweep and Graphviz diagnostics
//! - `QpStore`: name-indexed heterogeneous value cache with cyclic
//!   dependency detection, mappers, guarantees, history rotation, and
//!   projection across mesh adaptation
//! - Synthetic graph builder for stress-testing the scheduler
//!
//! ## Usage
//! ```rust
//! use mesh_sweep::prelude::*;
//!
//! # fn main() -> Result<(), mesh_sweep::MeshSweepError> {
//! let mut g = Graph::new();
//! let residual = g.create("residual", false, false, LoopType::elemental(0));
//! let flux = g.create("flux", true, true, LoopType::elemental(0));
//! g.needs(residual, flux)?;
//!
//! let partitions = compute_partitions(&g, true)?;
//! let sweeps = compute_loops(&partitions);
//! assert_eq!(sweeps.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! The crate is an embedding library: no CLI, no environment variables, no
//! file formats of its own. The only persistence hook is the per-value
//! binary codec behind [`qp::Value`].

pub mod algs;
pub mod builder;
pub mod graph;
pub mod qp;
pub mod sweep_error;

pub use sweep_error::MeshSweepError;

/// A convenient prelude importing the most-used types and entry points.
pub mod prelude {
    pub use crate::algs::{
        compute_loops, compute_partitions, dot_graph, dot_graph_merged, exec_order, format_loops,
    };
    pub use crate::builder::GraphBuilder;
    pub use crate::graph::{Graph, LoopCategory, LoopType, NodeId, Subgraph};
    pub use crate::qp::{
        ConstValuer, FnValuer, Guarantee, KeyPolicy, Location, MemoValuer, QpKey, QpStore, Value,
        ValueId, Valuer,
    };
    pub use crate::sweep_error::MeshSweepError;
}
