//! Sweep flavors: `LoopCategory` and `LoopType`.
//!
//! A `LoopType` identifies one mesh sweep: a geometric traversal flavor
//! (the category) restricted to a subdomain or boundary (the block). Two
//! computations can only share a sweep when their loop types agree, or when
//! the sibling merger proves their categories compatible.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Geometric flavor of a mesh sweep.
///
/// `None` represents values calculated outside of any loop, e.g.
/// postprocessors that depend only on other such values.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum LoopCategory {
    None,
    Nodal,
    /// FV face sweeps.
    Face,
    ElemOnElem,
    /// Different quadrature points than normal/FE.
    ElemOnElemFv,
    ElemOnBoundary,
    ElemOnInternalSide,
}

/// Compatibility class for sibling merging: `None`, `Nodal`, and `Face`
/// only merge with themselves, while all elemental flavors can share a
/// sweep (a face or boundary visit still walks elements).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MergeClass {
    None,
    Nodal,
    Face,
    Elemental,
}

impl LoopCategory {
    /// Short printable name, used in Graphviz labels and log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            LoopCategory::None => "None",
            LoopCategory::Nodal => "Nodal",
            LoopCategory::Face => "Face",
            LoopCategory::ElemOnElem => "ElemOnElem",
            LoopCategory::ElemOnElemFv => "ElemOnElemFv",
            LoopCategory::ElemOnBoundary => "ElemOnBoundary",
            LoopCategory::ElemOnInternalSide => "ElemOnInternalSide",
        }
    }

    /// The merge-compatibility class of this category.
    pub fn merge_class(self) -> MergeClass {
        match self {
            LoopCategory::None => MergeClass::None,
            LoopCategory::Nodal => MergeClass::Nodal,
            LoopCategory::Face => MergeClass::Face,
            LoopCategory::ElemOnElem
            | LoopCategory::ElemOnElemFv
            | LoopCategory::ElemOnBoundary
            | LoopCategory::ElemOnInternalSide => MergeClass::Elemental,
        }
    }

    /// All categories, in order.
    pub fn all() -> [LoopCategory; 7] {
        [
            LoopCategory::None,
            LoopCategory::Nodal,
            LoopCategory::Face,
            LoopCategory::ElemOnElem,
            LoopCategory::ElemOnElemFv,
            LoopCategory::ElemOnBoundary,
            LoopCategory::ElemOnInternalSide,
        ]
    }
}

impl fmt::Display for LoopCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sweep flavor: (category, block).
///
/// Equality is componentwise; the total order is lexicographic (category,
/// then block), which gives deterministic bucketing wherever loop types are
/// collected.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct LoopType {
    pub category: LoopCategory,
    /// Subdomain (volume) or boundary (surface) id.
    pub block: u32,
}

impl LoopType {
    pub fn new(category: LoopCategory, block: u32) -> Self {
        Self { category, block }
    }

    /// Elemental loop on the given block; the most common flavor.
    pub fn elemental(block: u32) -> Self {
        Self::new(LoopCategory::ElemOnElem, block)
    }

    pub fn nodal(block: u32) -> Self {
        Self::new(LoopCategory::Nodal, block)
    }
}

impl Default for LoopType {
    /// Elemental on block 0.
    fn default() -> Self {
        Self::elemental(0)
    }
}

/// Prints as `<category>:block<n>`, the grammar used by the Graphviz dump.
impl fmt::Display for LoopType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:block{}", self.category, self.block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_is_category_then_block() {
        let a = LoopType::new(LoopCategory::Nodal, 9);
        let b = LoopType::new(LoopCategory::Face, 0);
        assert!(a < b);
        assert!(LoopType::elemental(1) < LoopType::elemental(2));
    }

    #[test]
    fn elemental_flavors_share_a_merge_class() {
        for cat in [
            LoopCategory::ElemOnElem,
            LoopCategory::ElemOnElemFv,
            LoopCategory::ElemOnBoundary,
            LoopCategory::ElemOnInternalSide,
        ] {
            assert_eq!(cat.merge_class(), MergeClass::Elemental);
        }
        assert_ne!(
            LoopCategory::Nodal.merge_class(),
            LoopCategory::Face.merge_class()
        );
    }

    #[test]
    fn display_grammar() {
        assert_eq!(LoopType::default().to_string(), "ElemOnElem:block0");
        assert_eq!(
            LoopType::new(LoopCategory::Nodal, 3).to_string(),
            "Nodal:block3"
        );
    }
}
