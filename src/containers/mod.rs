//! Child-map container strategies.
//!
//! A node maps hypercube positions to child entries. Three concrete layouts
//! cover the dimensionality range, all exposing the same contract (lookup,
//! lower-bound iteration in ascending position order, insert-if-absent,
//! erase):
//!
//! - [`ArrayMap`]: dense slot block with a 64-bit occupancy word, `DIM <= 3`,
//! - [`SparseMap`]: sorted vector with binary search, `DIM <= 8`,
//! - [`BptMap`]: B⁺-tree, `DIM > 8`.
//!
//! [`BptSet`] reuses the B⁺-tree as a hash set; it is the bucket type of the
//! multi-map.

mod array_map;
mod b_plus_tree;
mod hash_set;
mod sparse_map;

pub use array_map::{ArrayMap, ArrayMapIter};
pub use b_plus_tree::{BptIter, BptMap};
pub use hash_set::{BptSet, BptSetIter};
pub use sparse_map::{SparseMap, SparseMapIter};
