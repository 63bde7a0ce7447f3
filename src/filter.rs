//! Query filters.
//!
//! Traversals consult a filter at two levels: `is_node_valid` prunes whole
//! subtrees by their prefix (with `bits_to_ignore` undetermined low bits per
//! coordinate), `is_entry_valid` accepts or rejects individual values. The
//! multi-map adds a third predicate for items within a matching bucket.

use crate::containers::BptSet;
use crate::converter::Converter;
use crate::distance::Distance;
use crate::keys::{PhPoint, Scalar};

/// Filter over single-map traversals. All predicates default to accepting
/// everything.
pub trait Filter<const N: usize, S: Scalar, T> {
    fn is_entry_valid(&self, key: &PhPoint<N, S>, value: &T) -> bool {
        let _ = (key, value);
        true
    }

    fn is_node_valid(&self, prefix: &PhPoint<N, S>, bits_to_ignore: u32) -> bool {
        let _ = (prefix, bits_to_ignore);
        true
    }
}

/// Filter over multi-map traversals: bucket-level and item-level predicates.
pub trait MultiMapFilter<const N: usize, S: Scalar, T> {
    fn is_bucket_valid(&self, key: &PhPoint<N, S>, bucket: &BptSet<T>) -> bool {
        let _ = (key, bucket);
        true
    }

    fn is_node_valid(&self, prefix: &PhPoint<N, S>, bits_to_ignore: u32) -> bool {
        let _ = (prefix, bits_to_ignore);
        true
    }

    fn is_bucket_entry_valid(&self, key: &PhPoint<N, S>, value: &T) -> bool {
        let _ = (key, value);
        true
    }
}

/// The pass-through filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterNoOp;

impl<const N: usize, S: Scalar, T> Filter<N, S, T> for FilterNoOp {}

impl<const N: usize, S: Scalar, T> MultiMapFilter<N, S, T> for FilterNoOp {}

/// Accepts only entries whose external point lies inside a closed
/// axis-aligned box; prunes nodes whose prefix box misses it.
pub struct FilterAabb<'a, const N: usize, C: Converter<N>> {
    min_external: C::Key,
    max_external: C::Key,
    min_internal: PhPoint<N, C::Scalar>,
    max_internal: PhPoint<N, C::Scalar>,
    converter: &'a C,
}

impl<'a, const N: usize, C: Converter<N>> FilterAabb<'a, N, C> {
    pub fn new(min_include: C::Key, max_include: C::Key, converter: &'a C) -> Self {
        FilterAabb {
            min_internal: converter.pre(&min_include),
            max_internal: converter.pre(&max_include),
            min_external: min_include,
            max_external: max_include,
            converter,
        }
    }
}

impl<'a, const N: usize, E, C, T> Filter<N, C::Scalar, T> for FilterAabb<'a, N, C>
where
    E: PartialOrd + Copy,
    C: Converter<N, Key = [E; N]>,
{
    fn is_entry_valid(&self, key: &PhPoint<N, C::Scalar>, _value: &T) -> bool {
        let point = self.converter.post(key);
        for d in 0..N {
            if point[d] < self.min_external[d] || point[d] > self.max_external[d] {
                return false;
            }
        }
        true
    }

    fn is_node_valid(&self, prefix: &PhPoint<N, C::Scalar>, bits_to_ignore: u32) -> bool {
        if bits_to_ignore >= C::Scalar::BITS - 1 {
            return true;
        }
        let min_bits = u64::MAX << bits_to_ignore;
        let max_bits = !min_bits;
        for d in 0..N {
            let lo = C::Scalar::from_bits(prefix[d].to_bits() & min_bits);
            let hi = C::Scalar::from_bits(prefix[d].to_bits() | max_bits);
            if hi < self.min_internal[d] || lo > self.max_internal[d] {
                return false;
            }
        }
        true
    }
}

/// Accepts only entries within `radius` of a center point under a caller
/// metric; prunes nodes whose prefix box is entirely farther away.
pub struct FilterSphere<'a, const N: usize, C: Converter<N>, D> {
    center_external: C::Key,
    center_internal: PhPoint<N, C::Scalar>,
    radius: f64,
    converter: &'a C,
    distance: D,
}

impl<'a, const N: usize, C: Converter<N>, D> FilterSphere<'a, N, C, D> {
    pub fn new(center: C::Key, radius: f64, converter: &'a C, distance: D) -> Self {
        FilterSphere {
            center_internal: converter.pre(&center),
            center_external: center,
            radius,
            converter,
            distance,
        }
    }
}

impl<'a, const N: usize, C, D, T> Filter<N, C::Scalar, T> for FilterSphere<'a, N, C, D>
where
    C: Converter<N>,
    D: Distance<C::Key>,
{
    fn is_entry_valid(&self, key: &PhPoint<N, C::Scalar>, _value: &T) -> bool {
        let point = self.converter.post(key);
        self.distance.distance(&self.center_external, &point) <= self.radius
    }

    fn is_node_valid(&self, prefix: &PhPoint<N, C::Scalar>, bits_to_ignore: u32) -> bool {
        if bits_to_ignore >= C::Scalar::BITS - 1 {
            return true;
        }
        let min_bits = u64::MAX << bits_to_ignore;
        let max_bits = !min_bits;
        let mut closest = [C::Scalar::ZERO; N];
        for d in 0..N {
            let lo = C::Scalar::from_bits(prefix[d].to_bits() & min_bits);
            let hi = C::Scalar::from_bits(prefix[d].to_bits() | max_bits);
            closest[d] = self.center_internal[d].clamp(lo, hi);
        }
        let closest_point = self.converter.post(&closest);
        self.distance.distance(&self.center_external, &closest_point) <= self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::NoOpConverter;
    use crate::distance::DistanceEuclidean;

    #[test]
    fn aabb_filter_bounds_entries() {
        let converter = NoOpConverter::<2, i64>::new();
        let filter = FilterAabb::new([0, 0], [10, 10], &converter);
        assert!(Filter::<2, i64, ()>::is_entry_valid(&filter, &[5, 5], &()));
        assert!(!Filter::<2, i64, ()>::is_entry_valid(&filter, &[11, 5], &()));
        assert!(!Filter::<2, i64, ()>::is_entry_valid(&filter, &[5, -1], &()));
    }

    #[test]
    fn aabb_filter_prunes_far_nodes() {
        let converter = NoOpConverter::<2, i64>::new();
        let filter = FilterAabb::new([0, 0], [10, 10], &converter);
        // Node covering [256, 511] in both dimensions: disjoint.
        assert!(!Filter::<2, i64, ()>::is_node_valid(&filter, &[256, 256], 8));
        // Node covering [0, 255]: overlaps.
        assert!(Filter::<2, i64, ()>::is_node_valid(&filter, &[0, 0], 8));
    }

    #[test]
    fn sphere_filter_uses_metric() {
        let converter = NoOpConverter::<2, i64>::new();
        let filter = FilterSphere::new([0, 0], 5.0, &converter, DistanceEuclidean);
        assert!(Filter::<2, i64, ()>::is_entry_valid(&filter, &[3, 4], &()));
        assert!(!Filter::<2, i64, ()>::is_entry_valid(&filter, &[4, 4], &()));
        assert!(Filter::<2, i64, ()>::is_node_valid(&filter, &[0, 0], 8));
        assert!(!Filter::<2, i64, ()>::is_node_valid(&filter, &[1024, 1024], 8));
    }
}
