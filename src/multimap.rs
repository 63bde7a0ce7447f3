//! Multi-map facade: one key maps to a bucket (set) of values.
//!
//! Buckets are [`BptSet`]s stored as the values of the core tree. `len`
//! counts items across all buckets, while the core tree's entry count equals
//! the number of non-empty buckets. Removing the last item of a bucket
//! removes the tree entry; relocation uses the single-walk bucket primitive
//! of the core.

use std::cell::RefCell;
use std::hash::Hash;

use crate::containers::{BptSet, BptSetIter};
use crate::converter::{Converter, IeeeBoxConverter, IeeeConverter, NoOpConverter, QueryType};
use crate::distance::Distance;
use crate::filter::{Filter, FilterNoOp, MultiMapFilter};
use crate::keys::{PhPoint, Scalar};
use crate::tree::{FullIter, KnnIter, RawTree, WindowIter};

/// A multi-dimensional spatial index mapping each key to a set of values.
///
/// # Examples
///
/// ```rust
/// use phtree::PhTreeMultiMap;
///
/// let mut tree = PhTreeMultiMap::<2, &str>::new();
/// tree.emplace(&[1, 1], "a");
/// tree.emplace(&[1, 1], "b");
/// assert_eq!(tree.len(), 2);
/// assert_eq!(tree.count(&[1, 1]), 2);
///
/// assert!(tree.remove(&[1, 1], &"a"));
/// assert_eq!(tree.count(&[1, 1]), 1);
/// ```
pub struct PhTreeMultiMap<const N: usize, T, C: Converter<N> = NoOpConverter<N>> {
    tree: RawTree<N, BptSet<T>, C::Scalar>,
    converter: C,
    size: usize,
}

/// `f64` point keys.
pub type PhTreeMultiMapD<const N: usize, T> = PhTreeMultiMap<N, T, IeeeConverter<N>>;
/// `f64` box keys; `N` must equal `2 * DIM`.
pub type PhTreeMultiMapBoxD<const DIM: usize, const N: usize, T> =
    PhTreeMultiMap<N, T, IeeeBoxConverter<DIM, N>>;

impl<const N: usize, T, C> PhTreeMultiMap<N, T, C>
where
    T: Hash + Eq,
    C: Converter<N> + Default,
    C::Key: Clone,
{
    pub fn new() -> Self {
        Self::with_converter(C::default())
    }
}

impl<const N: usize, T, C> Default for PhTreeMultiMap<N, T, C>
where
    T: Hash + Eq,
    C: Converter<N> + Default,
    C::Key: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize, T, C> PhTreeMultiMap<N, T, C>
where
    T: Hash + Eq,
    C: Converter<N>,
    C::Key: Clone,
{
    pub fn with_converter(converter: C) -> Self {
        PhTreeMultiMap {
            tree: RawTree::new(),
            converter,
            size: 0,
        }
    }

    /// Insert `value` into the bucket under `key`. Returns whether the
    /// bucket changed (an equal value may already be present).
    pub fn emplace(&mut self, key: &C::Key, value: T) -> bool {
        let internal = self.converter.pre(key);
        let (bucket, _) = self.tree.try_emplace(&internal, BptSet::new());
        let inserted = bucket.insert(value);
        self.size += usize::from(inserted);
        inserted
    }

    /// Alias of [`Self::emplace`].
    pub fn insert(&mut self, key: &C::Key, value: T) -> bool {
        self.emplace(key, value)
    }

    /// Number of values stored under `key`.
    pub fn count(&self, key: &C::Key) -> usize {
        self.tree
            .get(&self.converter.pre(key))
            .map_or(0, BptSet::len)
    }

    pub fn contains(&self, key: &C::Key, value: &T) -> bool {
        self.tree
            .get(&self.converter.pre(key))
            .map_or(false, |bucket| bucket.contains(value))
    }

    /// Iterate the values stored under `key`.
    pub fn values_at<'a>(&'a self, key: &C::Key) -> impl Iterator<Item = &'a T> + 'a {
        self.tree
            .get(&self.converter.pre(key))
            .into_iter()
            .flat_map(BptSet::iter)
    }

    /// Remove `value` from the bucket under `key`; an emptied bucket is
    /// removed from the tree. Returns whether a value was removed.
    pub fn remove(&mut self, key: &C::Key, value: &T) -> bool {
        let internal = self.converter.pre(key);
        let removed = match self.tree.get_mut(&internal) {
            Some(bucket) => bucket.remove(value),
            None => false,
        };
        if removed {
            self.size -= 1;
            let emptied = self
                .tree
                .get(&internal)
                .map_or(false, BptSet::is_empty);
            if emptied {
                self.tree.erase(&internal);
            }
        }
        removed
    }

    /// Move `value` from the bucket at `old_key` to the bucket at `new_key`.
    /// Returns the number of values moved (0 or 1); a value equal to it
    /// already stored under `new_key` aborts the move.
    pub fn relocate(&mut self, old_key: &C::Key, new_key: &C::Key, value: &T) -> usize {
        let old_internal = self.converter.pre(old_key);
        let new_internal = self.converter.pre(new_key);
        self.tree.relocate_buckets(
            &old_internal,
            &new_internal,
            |src, dst| {
                if !src.contains(value) || dst.contains(value) {
                    return 0;
                }
                let item = src.take(value).expect("presence checked above");
                dst.insert(item);
                1
            },
            |src| usize::from(src.contains(value)),
        )
    }

    /// Move every value under `old_key` accepted by `pred` to `new_key`.
    /// Values equal to something already stored under `new_key` stay put.
    /// Returns the number of values moved.
    pub fn relocate_if(
        &mut self,
        old_key: &C::Key,
        new_key: &C::Key,
        pred: impl FnMut(&T) -> bool,
    ) -> usize {
        let old_internal = self.converter.pre(old_key);
        let new_internal = self.converter.pre(new_key);
        let pred = RefCell::new(pred);
        self.tree.relocate_buckets(
            &old_internal,
            &new_internal,
            |src, dst| src.drain_matching_into(dst, |v| (&mut *pred.borrow_mut())(v)),
            |src| src.count_matching(|v| (&mut *pred.borrow_mut())(v)),
        )
    }

    /// Move the whole bucket at `old_key` to `new_key`. Returns 1 when a
    /// bucket moved; an existing bucket at `new_key` aborts the move.
    pub fn relocate_all(&mut self, old_key: &C::Key, new_key: &C::Key) -> usize {
        let old_internal = self.converter.pre(old_key);
        let new_internal = self.converter.pre(new_key);
        self.tree.relocate(&old_internal, &new_internal)
    }

    /// Number of values inside the query box, summed over matching buckets
    /// without visiting individual items.
    pub fn estimate_count(&self, query: &C::QueryBox) -> usize {
        let window = self.converter.pre_query(query, C::DEFAULT_QUERY);
        let mut n = 0;
        self.tree
            .for_each_window(window.min(), window.max(), &FilterNoOp, &mut |_, bucket| {
                n += bucket.len();
            });
        n
    }

    /// Visit every `(key, value)` pair.
    pub fn for_each(&self, mut callback: impl FnMut(C::Key, &T)) {
        let converter = &self.converter;
        self.tree.for_each(&FilterNoOp, &mut |key, bucket| {
            let external = converter.post(key);
            for item in bucket.iter() {
                callback(external.clone(), item);
            }
        });
    }

    /// Visit every `(key, value)` pair inside the query box.
    pub fn for_each_in(&self, query: &C::QueryBox, callback: impl FnMut(C::Key, &T)) {
        self.for_each_in_with(query, C::DEFAULT_QUERY, &FilterNoOp, callback);
    }

    /// Visit the pairs inside the query box with an explicit query type and
    /// filter (bucket- and item-level predicates both apply).
    pub fn for_each_in_with<F: MultiMapFilter<N, C::Scalar, T>>(
        &self,
        query: &C::QueryBox,
        query_type: QueryType,
        filter: &F,
        mut callback: impl FnMut(C::Key, &T),
    ) {
        let window = self.converter.pre_query(query, query_type);
        let converter = &self.converter;
        let adapter = MmNodeFilter { filter };
        self.tree
            .for_each_window(window.min(), window.max(), &adapter, &mut |key, bucket| {
                let external = converter.post(key);
                for item in bucket.iter() {
                    if filter.is_bucket_entry_valid(key, item) {
                        callback(external.clone(), item);
                    }
                }
            });
    }

    /// Iterator over all `(key, value)` pairs.
    pub fn iter(&self) -> MmIter<'_, N, T, C, FilterNoOp> {
        FlatIter::new(self.tree.iter(), &self.converter, FilterNoOp)
    }

    /// Iterator over the pairs inside the query box (default query type).
    pub fn query(&self, query: &C::QueryBox) -> MmQuery<'_, N, T, C, FilterNoOp> {
        self.query_with(query, C::DEFAULT_QUERY, FilterNoOp)
    }

    pub fn query_with<F>(
        &self,
        query: &C::QueryBox,
        query_type: QueryType,
        filter: F,
    ) -> MmQuery<'_, N, T, C, F>
    where
        F: MultiMapFilter<N, C::Scalar, T> + Clone,
    {
        let window = self.converter.pre_query(query, query_type);
        let inner = self.tree.query(
            window.min(),
            window.max(),
            MmNodeFilterOwned {
                filter: filter.clone(),
            },
        );
        FlatIter::new(inner, &self.converter, filter)
    }

    /// Iterator yielding at least `min_results` values in order of
    /// increasing bucket distance from `center`.
    pub fn knn<D: Distance<C::Key>>(
        &self,
        min_results: usize,
        center: &C::Key,
        distance: D,
    ) -> MmKnn<'_, N, T, C, D, FilterNoOp> {
        self.knn_with(min_results, center, distance, FilterNoOp)
    }

    pub fn knn_with<D, F>(
        &self,
        min_results: usize,
        center: &C::Key,
        distance: D,
        filter: F,
    ) -> MmKnn<'_, N, T, C, D, F>
    where
        D: Distance<C::Key>,
        F: MultiMapFilter<N, C::Scalar, T> + Clone,
    {
        let internal = self.converter.pre(center);
        let inner = self.tree.knn(
            min_results,
            &internal,
            &self.converter,
            distance,
            MmNodeFilterOwned {
                filter: filter.clone(),
            },
        );
        FlatIter::new(inner, &self.converter, filter)
    }

    pub fn clear(&mut self) {
        self.tree.clear();
        self.size = 0;
    }

    /// Total number of stored values across all buckets.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn converter(&self) -> &C {
        &self.converter
    }
}

/// Adapter exposing the bucket-level predicates of a [`MultiMapFilter`] as a
/// core-tree [`Filter`] over bucket values (borrowed form).
struct MmNodeFilter<'f, F> {
    filter: &'f F,
}

impl<'f, const N: usize, S, T, F> Filter<N, S, BptSet<T>> for MmNodeFilter<'f, F>
where
    S: Scalar,
    F: MultiMapFilter<N, S, T>,
{
    fn is_entry_valid(&self, key: &PhPoint<N, S>, bucket: &BptSet<T>) -> bool {
        self.filter.is_bucket_valid(key, bucket)
    }

    fn is_node_valid(&self, prefix: &PhPoint<N, S>, bits_to_ignore: u32) -> bool {
        self.filter.is_node_valid(prefix, bits_to_ignore)
    }
}

/// Owned form of [`MmNodeFilter`] for iterators that outlive the call site.
pub struct MmNodeFilterOwned<F> {
    filter: F,
}

impl<const N: usize, S, T, F> Filter<N, S, BptSet<T>> for MmNodeFilterOwned<F>
where
    S: Scalar,
    F: MultiMapFilter<N, S, T>,
{
    fn is_entry_valid(&self, key: &PhPoint<N, S>, bucket: &BptSet<T>) -> bool {
        self.filter.is_bucket_valid(key, bucket)
    }

    fn is_node_valid(&self, prefix: &PhPoint<N, S>, bits_to_ignore: u32) -> bool {
        self.filter.is_node_valid(prefix, bits_to_ignore)
    }
}

/// Iterator adapter flattening bucket iterators into `(key, value)` pairs.
pub struct FlatIter<'a, const N: usize, T, C: Converter<N>, I, F> {
    inner: I,
    converter: &'a C,
    filter: F,
    current: Option<(PhPoint<N, C::Scalar>, C::Key, BptSetIter<'a, T>)>,
}

impl<'a, const N: usize, T, C: Converter<N>, I, F> FlatIter<'a, N, T, C, I, F> {
    fn new(inner: I, converter: &'a C, filter: F) -> Self {
        FlatIter {
            inner,
            converter,
            filter,
            current: None,
        }
    }
}

impl<'a, const N: usize, T, C, I, F> Iterator for FlatIter<'a, N, T, C, I, F>
where
    T: Hash + Eq,
    C: Converter<N>,
    C::Key: Clone,
    I: Iterator<Item = (&'a PhPoint<N, C::Scalar>, &'a BptSet<T>)>,
    F: MultiMapFilter<N, C::Scalar, T>,
{
    type Item = (C::Key, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((internal, external, bucket_iter)) = &mut self.current {
                for item in bucket_iter.by_ref() {
                    if self.filter.is_bucket_entry_valid(internal, item) {
                        return Some((external.clone(), item));
                    }
                }
                self.current = None;
            }
            let (key, bucket) = self.inner.next()?;
            self.current = Some((*key, self.converter.post(key), bucket.iter()));
        }
    }
}

/// Full-scan iterator over a [`PhTreeMultiMap`].
pub type MmIter<'a, const N: usize, T, C, F = FilterNoOp> = FlatIter<
    'a,
    N,
    T,
    C,
    FullIter<'a, N, BptSet<T>, <C as Converter<N>>::Scalar, FilterNoOp>,
    F,
>;

/// Window-query iterator over a [`PhTreeMultiMap`].
pub type MmQuery<'a, const N: usize, T, C, F = FilterNoOp> = FlatIter<
    'a,
    N,
    T,
    C,
    WindowIter<'a, N, BptSet<T>, <C as Converter<N>>::Scalar, MmNodeFilterOwned<F>>,
    F,
>;

/// Nearest-neighbor iterator over a [`PhTreeMultiMap`].
pub type MmKnn<'a, const N: usize, T, C, D, F = FilterNoOp> = FlatIter<
    'a,
    N,
    T,
    C,
    KnnIter<'a, N, BptSet<T>, <C as Converter<N>>::Scalar, C, D, MmNodeFilterOwned<F>>,
    F,
>;

impl<'a, const N: usize, T, C, D, F>
    FlatIter<
        'a,
        N,
        T,
        C,
        KnnIter<'a, N, BptSet<T>, <C as Converter<N>>::Scalar, C, D, MmNodeFilterOwned<F>>,
        F,
    >
where
    T: Hash + Eq,
    C: Converter<N>,
    D: Distance<C::Key>,
    F: MultiMapFilter<N, C::Scalar, T>,
{
    /// Distance of the bucket yielded from last.
    pub fn distance(&self) -> f64 {
        self.inner.distance()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_erase_drops_empty_bucket() {
        let mut tree = PhTreeMultiMap::<2, &str>::new();
        assert!(tree.emplace(&[1, 1], "a"));
        assert!(tree.emplace(&[1, 1], "b"));
        assert!(!tree.emplace(&[1, 1], "a"));
        assert_eq!(tree.len(), 2);

        assert!(tree.remove(&[1, 1], &"a"));
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.count(&[1, 1]), 1);

        assert!(tree.remove(&[1, 1], &"b"));
        assert_eq!(tree.len(), 0);
        assert_eq!(tree.count(&[1, 1]), 0);
        assert!(tree.is_empty());
    }

    #[test]
    fn relocate_single_value() {
        let mut tree = PhTreeMultiMap::<2, u32>::new();
        tree.emplace(&[1, 1], 10);
        tree.emplace(&[1, 1], 11);
        assert_eq!(tree.relocate(&[1, 1], &[9, 9], &10), 1);
        assert_eq!(tree.count(&[1, 1]), 1);
        assert_eq!(tree.count(&[9, 9]), 1);
        assert!(tree.contains(&[9, 9], &10));
        assert_eq!(tree.len(), 2);

        // Moving a value onto an equal one is refused.
        tree.emplace(&[1, 1], 10);
        assert_eq!(tree.relocate(&[1, 1], &[9, 9], &10), 0);
        assert!(tree.contains(&[1, 1], &10));
    }

    #[test]
    fn relocate_if_moves_matching_items() {
        let mut tree = PhTreeMultiMap::<2, u32>::new();
        for v in 0..10 {
            tree.emplace(&[2, 2], v);
        }
        let moved = tree.relocate_if(&[2, 2], &[40, 40], |v| v % 2 == 0);
        assert_eq!(moved, 5);
        assert_eq!(tree.count(&[2, 2]), 5);
        assert_eq!(tree.count(&[40, 40]), 5);
        assert_eq!(tree.len(), 10);
    }

    #[test]
    fn relocate_whole_bucket_and_same_key() {
        let mut tree = PhTreeMultiMap::<2, u32>::new();
        tree.emplace(&[3, 3], 1);
        tree.emplace(&[3, 3], 2);
        assert_eq!(tree.relocate_all(&[3, 3], &[8, 8]), 1);
        assert_eq!(tree.count(&[8, 8]), 2);
        assert_eq!(tree.count(&[3, 3]), 0);

        // Same-key relocate counts the present values.
        assert_eq!(tree.relocate(&[8, 8], &[8, 8], &1), 1);
        assert_eq!(tree.relocate(&[8, 8], &[8, 8], &7), 0);
    }

    #[test]
    fn window_query_flattens_buckets() {
        let mut tree = PhTreeMultiMap::<2, u32>::new();
        tree.emplace(&[0, 0], 1);
        tree.emplace(&[0, 0], 2);
        tree.emplace(&[5, 5], 3);
        tree.emplace(&[20, 20], 4);

        let mut hits: Vec<u32> = tree
            .query(&crate::keys::PhBox::new([0, 0], [10, 10]))
            .map(|(_, v)| *v)
            .collect();
        hits.sort();
        assert_eq!(hits, vec![1, 2, 3]);
        assert_eq!(tree.estimate_count(&crate::keys::PhBox::new([0, 0], [10, 10])), 3);
    }

    #[test]
    fn iter_and_for_each_agree() {
        let mut tree = PhTreeMultiMap::<2, u32>::new();
        for i in 0..20u32 {
            tree.emplace(&[(i % 5) as i64, (i / 5) as i64], i);
        }
        let mut from_iter: Vec<u32> = tree.iter().map(|(_, v)| *v).collect();
        let mut from_for_each = Vec::new();
        tree.for_each(|_, v| from_for_each.push(*v));
        from_iter.sort();
        from_for_each.sort();
        assert_eq!(from_iter, from_for_each);
        assert_eq!(from_iter.len(), 20);
    }
}
