//! Mesh locations and the injectable keying policy.
//!
//! A [`Location`] addresses one quadrature point: element, optional face,
//! owning block, the point index and count, plus an opaque `custom` field
//! for user-defined addressing (per-node, per-DOF, …). Locations are used
//! only as keys into value-history maps, and the store is generic over a
//! [`KeyPolicy`] so embedders choose which fields participate in the key.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// One mesh coordinate at quadrature-point granularity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub elem_id: u64,
    pub face_id: u64,
    /// Subdomain or boundary the coordinate lies in.
    pub block_id: u32,
    /// Quadrature point index within the element.
    pub qp: u32,
    /// Number of quadrature points per element.
    pub nqp: u32,
    /// Opaque user-defined key component.
    pub custom: Option<u64>,
}

impl Location {
    /// Quadrature point `qp` of `nqp` on an element.
    pub fn elem(elem_id: u64, nqp: u32, qp: u32) -> Self {
        Self {
            elem_id,
            nqp,
            qp,
            ..Self::default()
        }
    }

    /// Same coordinate restricted to a face.
    pub fn on_face(mut self, face_id: u64) -> Self {
        self.face_id = face_id;
        self
    }

    /// Same coordinate tagged with its owning block.
    pub fn in_block(mut self, block_id: u32) -> Self {
        self.block_id = block_id;
        self
    }

    /// Same coordinate with a user-defined key component.
    pub fn with_custom(mut self, custom: u64) -> Self {
        self.custom = Some(custom);
        self
    }
}

/// Keying policy: which parts of a [`Location`] identify a stored value.
///
/// The associated key is what history maps are ordered by; it must
/// serialize so stored history can round-trip through the value codec.
pub trait KeyPolicy: 'static {
    type Key: Ord + Clone + Debug + Serialize + DeserializeOwned + 'static;
    fn key(loc: &Location) -> Self::Key;
}

/// Default policy: keyed by element, face, quadrature point, and the
/// custom component. Block is routing metadata, not identity.
#[derive(Clone, Copy, Debug, Default)]
pub struct QpKey;

impl KeyPolicy for QpKey {
    type Key = (u64, u64, u32, Option<u64>);
    #[inline]
    fn key(loc: &Location) -> Self::Key {
        (loc.elem_id, loc.face_id, loc.qp, loc.custom)
    }
}

/// Policy for user-defined addressing: only the `custom` field keys the
/// history, e.g. a node or DOF number.
#[derive(Clone, Copy, Debug, Default)]
pub struct CustomKey;

impl KeyPolicy for CustomKey {
    type Key = Option<u64>;
    #[inline]
    fn key(loc: &Location) -> Self::Key {
        loc.custom
    }
}
