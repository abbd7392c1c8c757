//! Per-quadrature-point value storage.
//!
//! The runtime half of the crate: while the scheduler decides *when* each
//! computation runs, the [`QpStore`] serves the values those computations
//! exchange — lazily computed, memoized per location, with opt-in
//! old/older history that survives mesh adaptation via
//! [`QpStore::project`].

pub mod location;
pub mod store;
pub mod value;
pub mod valuer;

pub use location::{CustomKey, KeyPolicy, Location, QpKey};
pub use store::QpStore;
pub use value::{Guarantee, Value, ValueId, ValueLike};
pub use valuer::{ConstValuer, FnValuer, MemoValuer, Valuer};
