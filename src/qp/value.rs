//! Erased stored values and the `ValueId` handle.
//!
//! The store holds heterogeneous results behind the object-safe [`Value`]
//! trait: cloneable, order-comparable, and serializable to a byte stream.
//! Any concrete payload satisfying [`ValueLike`] gets the erased interface
//! through a blanket impl, and the typed/erased boundary is guarded by a
//! `TypeId` recorded at registration time rather than by hashing on every
//! retrieval.

use crate::sweep_error::MeshSweepError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::io::{Read, Write};

/// Handle to a registered value in a
/// [`QpStore`](crate::qp::store::QpStore).
///
/// Ids are dense: the n-th registration gets id `n`.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct ValueId(u32);

impl ValueId {
    #[inline]
    pub(crate) fn new(index: usize) -> Self {
        ValueId(index as u32)
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ValueId").field(&self.0).finish()
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical bound set for concrete value payloads.
///
/// Rationale:
/// - `Clone` so history tiers can stage copies
/// - `Default` as the fallback initial old/older value
/// - `PartialOrd` for map-key comparison through the erased interface
/// - `Serialize + DeserializeOwned` for the binary history codec
/// - `Debug` for diagnostics
pub trait ValueLike:
    Clone + Default + PartialOrd + fmt::Debug + Serialize + DeserializeOwned + 'static
{
}
impl<T> ValueLike for T where
    T: Clone + Default + PartialOrd + fmt::Debug + Serialize + DeserializeOwned + 'static
{
}

/// Object-safe erased interface over a computed result.
///
/// The byte-stream contract is ordering only: whatever `store` writes,
/// `load` consumes in the same order. The default codec is bincode.
pub trait Value: Any {
    /// Clone into a fresh box.
    fn clone_value(&self) -> Box<dyn Value>;
    /// Order against another erased value; `None` when the types differ or
    /// the payloads are incomparable.
    fn partial_cmp_value(&self, other: &dyn Value) -> Option<Ordering>;
    /// Serialize into `out`.
    fn store(&self, out: &mut dyn Write) -> Result<(), MeshSweepError>;
    /// Replace `self` with a value read from `input`.
    fn load(&mut self, input: &mut dyn Read) -> Result<(), MeshSweepError>;
    /// Typed access for downcasting.
    fn as_any(&self) -> &dyn Any;
    /// Payload type name, for error messages.
    fn type_name(&self) -> &'static str;
}

impl<T: ValueLike> Value for T {
    fn clone_value(&self) -> Box<dyn Value> {
        Box::new(self.clone())
    }

    fn partial_cmp_value(&self, other: &dyn Value) -> Option<Ordering> {
        other
            .as_any()
            .downcast_ref::<T>()
            .and_then(|o| self.partial_cmp(o))
    }

    fn store(&self, out: &mut dyn Write) -> Result<(), MeshSweepError> {
        bincode::serialize_into(out, self).map_err(|e| MeshSweepError::ValueCodec(e.to_string()))
    }

    fn load(&mut self, input: &mut dyn Read) -> Result<(), MeshSweepError> {
        *self =
            bincode::deserialize_from(input).map_err(|e| MeshSweepError::ValueCodec(e.to_string()))?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A semantic property a valuer promises about its output, checkable by
/// callers at retrieval time.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Guarantee {
    /// The value never changes across locations or steps.
    Constant,
    /// Direction-independent (e.g. an isotropic material tensor).
    Isotropic,
    /// Symmetric under index exchange.
    Symmetric,
}

impl Guarantee {
    pub fn as_str(self) -> &'static str {
        match self {
            Guarantee::Constant => "Constant",
            Guarantee::Isotropic => "Isotropic",
            Guarantee::Symmetric => "Symmetric",
        }
    }
}

impl fmt::Display for Guarantee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_preserves_payload() {
        let v: Box<dyn Value> = Box::new(42.5f64);
        let c = v.clone_value();
        assert_eq!(c.as_any().downcast_ref::<f64>(), Some(&42.5));
    }

    #[test]
    fn comparison_requires_matching_types() {
        let a: Box<dyn Value> = Box::new(1.0f64);
        let b: Box<dyn Value> = Box::new(2.0f64);
        let c: Box<dyn Value> = Box::new(3i64);
        assert_eq!(a.partial_cmp_value(b.as_ref()), Some(Ordering::Less));
        assert_eq!(a.partial_cmp_value(c.as_ref()), None);
    }

    #[test]
    fn codec_round_trip_preserves_write_order() {
        let mut buf = Vec::new();
        1.5f64.store(&mut buf).unwrap();
        7.25f64.store(&mut buf).unwrap();
        let mut cursor = buf.as_slice();
        let mut a = 0.0f64;
        let mut b = 0.0f64;
        a.load(&mut cursor).unwrap();
        b.load(&mut cursor).unwrap();
        assert_eq!((a, b), (1.5, 7.25));
    }

    #[test]
    fn vector_payloads_round_trip() {
        let v = vec![1.0f64, 2.0, 3.0];
        let mut buf = Vec::new();
        v.store(&mut buf).unwrap();
        let mut out: Vec<f64> = Vec::new();
        out.load(&mut buf.as_slice()).unwrap();
        assert_eq!(out, v);
    }
}
