#![warn(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

//! PH-tree implementation
//!
//! A multi-dimensional spatial index over integer coordinates: a trie on
//! Morton-order keys with per-node prefix compression, hypercube-addressed
//! children and three traversal engines (full scan, window query, nearest
//! neighbor). Point and box payloads are supported through pluggable
//! coordinate converters; a multi-map variant stores a bucket of values per
//! key.
//!
//! # References
//!
//!  - Zäschke, T., Zimmerli, C., & Norrie, M. C. (2014, June). The PH-tree:
//!    a space-efficient storage structure and multi-dimensional index. In
//!    Proceedings of the 2014 ACM SIGMOD international conference on
//!    Management of data (pp. 397-408). [Link to PDF][PH-tree paper]
//!
//! [PH-tree paper]: https://www.phtree.org/
//!
//! # Example
//!
//! ```rust
//! use phtree::{DistanceEuclidean, PhBox, PhTreeD};
//!
//! let mut tree = PhTreeD::<2, &str>::new();
//! tree.try_emplace(&[2.0, 2.0], "a");
//! tree.try_emplace(&[-3.0, 7.5], "b");
//!
//! let hits: Vec<_> = tree.query(&PhBox::new([0.0, 0.0], [4.0, 4.0])).collect();
//! assert_eq!(hits, vec![([2.0, 2.0], &"a")]);
//!
//! let nearest: Vec<_> = tree.knn(1, &[0.0, 0.0], DistanceEuclidean).collect();
//! assert_eq!(nearest, vec![([2.0, 2.0], &"a")]);
//! ```

mod bits;
mod containers;
mod debug;
mod keys;
mod map;
mod multimap;
mod nodes;
mod tree;

pub mod converter;
pub mod distance;
pub mod filter;

pub use containers::{BptSet, BptSetIter};
pub use converter::{
    Converter, IeeeBoxConverter, IeeeConverter, IeeeConverterF, MultiplyBoxConverter,
    MultiplyConverter, NoOpConverter, QueryType,
};
pub use debug::TreeStats;
pub use distance::{Distance, DistanceEuclidean, DistanceL1};
pub use filter::{Filter, FilterAabb, FilterNoOp, FilterSphere, MultiMapFilter};
pub use keys::{PhBox, PhPoint, Scalar};
pub use map::{
    Entry, Iter, Knn, OccupiedEntry, PhTree, PhTreeBoxD, PhTreeD, PhTreeF, Query, VacantEntry,
};
pub use multimap::{
    FlatIter, MmIter, MmKnn, MmNodeFilterOwned, MmQuery, PhTreeMultiMap, PhTreeMultiMapBoxD,
    PhTreeMultiMapD,
};
pub use tree::{FullIter, KnnIter, RawTree, WindowIter};
