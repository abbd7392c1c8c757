//! MeshSweepError: unified error type for mesh-sweep public APIs
//!
//! Every fallible operation in the scheduler, the builder, and the value
//! store returns this type. Errors are always surfaced to the caller;
//! nothing in the crate retries or swallows, and no error is fatal at the
//! process level.

use thiserror::Error;

/// Unified error type for mesh-sweep operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshSweepError {
    /// `add`/`add_mapper` given a name that is already registered.
    #[error("value `{0}` is already registered")]
    NameConflict(String),
    /// `id(name)` for an unregistered name.
    #[error("value `{0}` doesn't exist")]
    UnknownName(String),
    /// A value id outside the registered range.
    #[error("value id {0} is out of range")]
    UnknownId(u32),
    /// A typed retrieval did not match the valuer's declared output type.
    #[error("wrong type requested for `{value}`: stored {stored}, requested {requested}")]
    TypeMismatch {
        value: String,
        stored: &'static str,
        requested: &'static str,
    },
    /// A value's evaluation transitively requested its own current value.
    #[error("cyclic value dependency detected: {}", cycle.join(" -> "))]
    CyclicValueDependency { cycle: Vec<String> },
    /// A mapper chain exceeded the resolution depth limit.
    #[error("mapper chain for `{value}` exceeded depth {depth}")]
    MapperLoop { value: String, depth: usize },
    /// A retrieval demanded a guarantee the valuer does not declare.
    #[error("value `{value}` does not declare guarantee `{guarantee}`")]
    MissingGuarantee { value: String, guarantee: &'static str },
    /// A mapper had no target for the requested location.
    #[error("value `{value}` is not mapped on block {block}")]
    MissingMapping { value: String, block: u32 },
    /// A graph mutation or numbering pass found a dependency cycle.
    #[error("dependency cycle: {0}")]
    CyclicGraph(String),
    /// Builder-level: a dependency binding crossed incompatible loop types
    /// without a cached bridge, or was otherwise unsatisfiable.
    #[error("cannot bind `{node}` to dependency `{dep}`: {reason}")]
    BindingIncompatible {
        node: String,
        dep: String,
        reason: String,
    },
    /// `project` called with source/destination lists of different lengths.
    #[error("projection source/destination length mismatch: {srcs} vs {dsts}")]
    ProjectionMismatch { srcs: usize, dsts: usize },
    /// `shift` called while a valuer evaluation was in flight.
    #[error("shift during in-flight evaluation of `{value}`")]
    ShiftMidEvaluation { value: String },
    /// Binary serialization of a stored value failed.
    #[error("value codec error: {0}")]
    ValueCodec(String),
    /// A structural invariant was found broken during validation.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}
