//! The public tree facade: coordinate conversion plus the map API.

use crate::converter::{Converter, IeeeBoxConverter, IeeeConverter, IeeeConverterF, NoOpConverter, QueryType};
use crate::distance::Distance;
use crate::filter::{Filter, FilterNoOp};
use crate::keys::PhPoint;
use crate::tree::{FullIter, KnnIter, RawTree, WindowIter};

/// A multi-dimensional spatial index over point or box keys.
///
/// `N` is the internal dimensionality (equal to the key dimensionality for
/// point trees, twice that for box trees) and `C` converts external keys to
/// the internal integer representation. With the default converter the tree
/// is keyed directly by `[i64; N]`.
///
/// # Examples
///
/// ```rust
/// use phtree::PhTree;
///
/// let mut tree = PhTree::<2, &str>::new();
/// tree.try_emplace(&[1, 1], "a");
/// tree.try_emplace(&[5, 5], "b");
///
/// assert_eq!(tree.get(&[1, 1]), Some(&"a"));
/// assert_eq!(tree.len(), 2);
///
/// let in_box: Vec<&str> = tree
///     .query(&phtree::PhBox::new([0, 0], [3, 3]))
///     .map(|(_, v)| *v)
///     .collect();
/// assert_eq!(in_box, vec!["a"]);
/// ```
pub struct PhTree<const N: usize, T, C: Converter<N> = NoOpConverter<N>> {
    tree: RawTree<N, T, C::Scalar>,
    converter: C,
}

/// `f64` point keys (IEEE order-preserving conversion onto `i64`).
pub type PhTreeD<const N: usize, T> = PhTree<N, T, IeeeConverter<N>>;
/// `f32` point keys on a 32 bit tree.
pub type PhTreeF<const N: usize, T> = PhTree<N, T, IeeeConverterF<N>>;
/// `f64` box keys; `N` must equal `2 * DIM`.
pub type PhTreeBoxD<const DIM: usize, const N: usize, T> = PhTree<N, T, IeeeBoxConverter<DIM, N>>;

impl<const N: usize, T, C: Converter<N> + Default> PhTree<N, T, C> {
    pub fn new() -> Self {
        Self::with_converter(C::default())
    }
}

impl<const N: usize, T, C: Converter<N> + Default> Default for PhTree<N, T, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize, T, C: Converter<N>> PhTree<N, T, C> {
    pub fn with_converter(converter: C) -> Self {
        PhTree {
            tree: RawTree::new(),
            converter,
        }
    }

    /// Insert `value` under `key` unless the key is present. Returns the
    /// stored value and whether an insert happened; on a duplicate key the
    /// stored value is left untouched.
    pub fn try_emplace(&mut self, key: &C::Key, value: T) -> (&mut T, bool) {
        let internal = self.converter.pre(key);
        self.tree.try_emplace(&internal, value)
    }

    /// Alias of [`Self::try_emplace`].
    pub fn insert(&mut self, key: &C::Key, value: T) -> (&mut T, bool) {
        self.try_emplace(key, value)
    }

    /// Vacant/occupied view for a key, for find-or-insert patterns that
    /// should not pay a second descent.
    pub fn entry(&mut self, key: &C::Key) -> Entry<'_, N, T, C> {
        let internal = self.converter.pre(key);
        if self.tree.contains(&internal) {
            let value = self
                .tree
                .get_mut(&internal)
                .expect("key checked present immediately before");
            Entry::Occupied(OccupiedEntry {
                value,
                _converter: std::marker::PhantomData,
            })
        } else {
            Entry::Vacant(VacantEntry {
                tree: self,
                key: internal,
            })
        }
    }

    pub fn get(&self, key: &C::Key) -> Option<&T> {
        self.tree.get(&self.converter.pre(key))
    }

    pub fn get_mut(&mut self, key: &C::Key) -> Option<&mut T> {
        let internal = self.converter.pre(key);
        self.tree.get_mut(&internal)
    }

    pub fn contains_key(&self, key: &C::Key) -> bool {
        self.get(key).is_some()
    }

    /// Number of values stored under `key` (0 or 1).
    pub fn count(&self, key: &C::Key) -> usize {
        usize::from(self.contains_key(key))
    }

    /// Remove `key`, returning its value.
    pub fn remove(&mut self, key: &C::Key) -> Option<T> {
        let internal = self.converter.pre(key);
        self.tree.erase(&internal)
    }

    /// Move the value at `old_key` to `new_key`. Returns the number of
    /// values moved (0 or 1); a value already present at `new_key` aborts
    /// the move.
    pub fn relocate(&mut self, old_key: &C::Key, new_key: &C::Key) -> usize {
        self.relocate_if(old_key, new_key, |_| true)
    }

    /// Like [`Self::relocate`], but only moves a value accepted by `pred`.
    pub fn relocate_if(
        &mut self,
        old_key: &C::Key,
        new_key: &C::Key,
        pred: impl FnMut(&T) -> bool,
    ) -> usize {
        let old_internal = self.converter.pre(old_key);
        let new_internal = self.converter.pre(new_key);
        self.tree.relocate_if(&old_internal, &new_internal, pred)
    }

    /// Visit every value with its external key.
    pub fn for_each(&self, mut callback: impl FnMut(C::Key, &T)) {
        let converter = &self.converter;
        self.tree
            .for_each(&FilterNoOp, &mut |key, value| callback(converter.post(key), value));
    }

    /// Visit every value accepted by `filter`.
    pub fn for_each_filtered<F: Filter<N, C::Scalar, T>>(
        &self,
        filter: &F,
        mut callback: impl FnMut(C::Key, &T),
    ) {
        let converter = &self.converter;
        self.tree
            .for_each(filter, &mut |key, value| callback(converter.post(key), value));
    }

    /// Visit every value inside the query box (using the converter's default
    /// query type).
    pub fn for_each_in(&self, query: &C::QueryBox, mut callback: impl FnMut(C::Key, &T)) {
        let window = self.converter.pre_query(query, C::DEFAULT_QUERY);
        let converter = &self.converter;
        self.tree.for_each_window(
            window.min(),
            window.max(),
            &FilterNoOp,
            &mut |key, value| callback(converter.post(key), value),
        );
    }

    /// Visit every value inside the query box with an explicit query type
    /// and filter.
    pub fn for_each_in_with<F: Filter<N, C::Scalar, T>>(
        &self,
        query: &C::QueryBox,
        query_type: QueryType,
        filter: &F,
        mut callback: impl FnMut(C::Key, &T),
    ) {
        let window = self.converter.pre_query(query, query_type);
        let converter = &self.converter;
        self.tree.for_each_window(
            window.min(),
            window.max(),
            filter,
            &mut |key, value| callback(converter.post(key), value),
        );
    }

    /// Iterator over all values in hypercube order.
    pub fn iter(&self) -> Iter<'_, N, T, C, FilterNoOp> {
        Iter {
            inner: self.tree.iter(),
            converter: &self.converter,
        }
    }

    /// Iterator over all values accepted by `filter`.
    pub fn iter_filtered<F: Filter<N, C::Scalar, T>>(&self, filter: F) -> Iter<'_, N, T, C, F> {
        Iter {
            inner: self.tree.iter_filtered(filter),
            converter: &self.converter,
        }
    }

    /// Iterator over the values inside the query box (default query type).
    pub fn query(&self, query: &C::QueryBox) -> Query<'_, N, T, C, FilterNoOp> {
        self.query_with(query, C::DEFAULT_QUERY, FilterNoOp)
    }

    /// Iterator over the values inside the query box with an explicit query
    /// type and filter.
    pub fn query_with<F: Filter<N, C::Scalar, T>>(
        &self,
        query: &C::QueryBox,
        query_type: QueryType,
        filter: F,
    ) -> Query<'_, N, T, C, F> {
        let window = self.converter.pre_query(query, query_type);
        Query {
            inner: self.tree.query(window.min(), window.max(), filter),
            converter: &self.converter,
        }
    }

    /// Iterator yielding at least `min_results` values (fewer if the tree is
    /// smaller) in order of increasing distance from `center`.
    pub fn knn<D: Distance<C::Key>>(
        &self,
        min_results: usize,
        center: &C::Key,
        distance: D,
    ) -> Knn<'_, N, T, C, D, FilterNoOp> {
        self.knn_with(min_results, center, distance, FilterNoOp)
    }

    pub fn knn_with<D: Distance<C::Key>, F: Filter<N, C::Scalar, T>>(
        &self,
        min_results: usize,
        center: &C::Key,
        distance: D,
        filter: F,
    ) -> Knn<'_, N, T, C, D, F> {
        let internal = self.converter.pre(center);
        Knn {
            inner: self
                .tree
                .knn(min_results, &internal, &self.converter, distance, filter),
            converter: &self.converter,
        }
    }

    pub fn clear(&mut self) {
        self.tree.clear();
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn converter(&self) -> &C {
        &self.converter
    }

    /// The converter-free core tree, keyed by internal integer points.
    pub fn raw(&self) -> &RawTree<N, T, C::Scalar> {
        &self.tree
    }
}

/// A view into a single key of a [`PhTree`], either occupied or vacant.
pub enum Entry<'a, const N: usize, T, C: Converter<N>> {
    Occupied(OccupiedEntry<'a, N, T, C>),
    Vacant(VacantEntry<'a, N, T, C>),
}

impl<'a, const N: usize, T, C: Converter<N>> Entry<'a, N, T, C> {
    pub fn or_insert(self, default: T) -> &'a mut T {
        self.or_insert_with(|| default)
    }

    pub fn or_insert_with(self, make: impl FnOnce() -> T) -> &'a mut T {
        match self {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => vacant.insert(make()),
        }
    }

    pub fn and_modify(self, modify: impl FnOnce(&mut T)) -> Self {
        match self {
            Entry::Occupied(mut occupied) => {
                modify(occupied.get_mut());
                Entry::Occupied(occupied)
            }
            vacant => vacant,
        }
    }
}

/// A key that is present in the tree.
pub struct OccupiedEntry<'a, const N: usize, T, C: Converter<N>> {
    value: &'a mut T,
    _converter: std::marker::PhantomData<C>,
}

impl<'a, const N: usize, T, C: Converter<N>> OccupiedEntry<'a, N, T, C> {
    pub fn get(&self) -> &T {
        self.value
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.value
    }

    pub fn into_mut(self) -> &'a mut T {
        self.value
    }

    /// Replace the stored value, returning the previous one.
    pub fn insert(&mut self, value: T) -> T {
        std::mem::replace(self.value, value)
    }
}

/// A key that is absent from the tree.
pub struct VacantEntry<'a, const N: usize, T, C: Converter<N>> {
    tree: &'a mut PhTree<N, T, C>,
    key: PhPoint<N, C::Scalar>,
}

impl<'a, const N: usize, T, C: Converter<N>> VacantEntry<'a, N, T, C> {
    pub fn insert(self, value: T) -> &'a mut T {
        let (stored, inserted) = self.tree.tree.try_emplace(&self.key, value);
        debug_assert!(inserted);
        stored
    }
}

/// Iterator over all values of a [`PhTree`] with external keys.
pub struct Iter<'a, const N: usize, T, C: Converter<N>, F> {
    inner: FullIter<'a, N, T, C::Scalar, F>,
    converter: &'a C,
}

impl<'a, const N: usize, T, C, F> Iterator for Iter<'a, N, T, C, F>
where
    C: Converter<N>,
    F: Filter<N, C::Scalar, T>,
{
    type Item = (C::Key, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let (key, value) = self.inner.next()?;
        Some((self.converter.post(key), value))
    }
}

/// Iterator over the values of a [`PhTree`] inside a query window.
pub struct Query<'a, const N: usize, T, C: Converter<N>, F> {
    inner: WindowIter<'a, N, T, C::Scalar, F>,
    converter: &'a C,
}

impl<'a, const N: usize, T, C, F> Iterator for Query<'a, N, T, C, F>
where
    C: Converter<N>,
    F: Filter<N, C::Scalar, T>,
{
    type Item = (C::Key, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let (key, value) = self.inner.next()?;
        Some((self.converter.post(key), value))
    }
}

/// Nearest-neighbor iterator over a [`PhTree`].
pub struct Knn<'a, const N: usize, T, C: Converter<N>, D, F> {
    inner: KnnIter<'a, N, T, C::Scalar, C, D, F>,
    converter: &'a C,
}

impl<'a, const N: usize, T, C, D, F> Knn<'a, N, T, C, D, F>
where
    C: Converter<N>,
    D: Distance<C::Key>,
    F: Filter<N, C::Scalar, T>,
{
    /// Distance of the value yielded last.
    pub fn distance(&self) -> f64 {
        self.inner.distance()
    }
}

impl<'a, const N: usize, T, C, D, F> Iterator for Knn<'a, N, T, C, D, F>
where
    C: Converter<N>,
    D: Distance<C::Key>,
    F: Filter<N, C::Scalar, T>,
{
    type Item = (C::Key, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let (key, value) = self.inner.next()?;
        Some((self.converter.post(key), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceEuclidean;
    use crate::keys::PhBox;

    #[test]
    fn ieee_keys_round_trip_through_tree() {
        let mut tree = PhTreeD::<2, u32>::new();
        tree.try_emplace(&[1.5, -2.5], 1);
        tree.try_emplace(&[-1e9, 1e-9], 2);
        assert_eq!(tree.get(&[1.5, -2.5]), Some(&1));
        assert_eq!(tree.get(&[-1e9, 1e-9]), Some(&2));
        assert_eq!(tree.remove(&[1.5, -2.5]), Some(1));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn entry_api_inserts_once() {
        let mut tree = PhTree::<2, u32>::new();
        *tree.entry(&[3, 3]).or_insert(0) += 1;
        *tree.entry(&[3, 3]).or_insert(0) += 1;
        assert_eq!(tree.get(&[3, 3]), Some(&2));

        tree.entry(&[3, 3]).and_modify(|v| *v = 9);
        assert_eq!(tree.get(&[3, 3]), Some(&9));
        tree.entry(&[4, 4]).and_modify(|v| *v = 9);
        assert!(!tree.contains_key(&[4, 4]));
    }

    #[test]
    fn float_window_query() {
        let mut tree = PhTreeD::<2, u32>::new();
        for (i, p) in [[0.5, 0.5], [1.5, 0.5], [2.5, 2.5], [-0.5, 0.5]]
            .iter()
            .enumerate()
        {
            tree.try_emplace(p, i as u32);
        }
        let mut hits: Vec<u32> = tree
            .query(&PhBox::new([0.0, 0.0], [2.0, 2.0]))
            .map(|(_, v)| *v)
            .collect();
        hits.sort();
        assert_eq!(hits, vec![0, 1]);
    }

    #[test]
    fn float_knn() {
        let mut tree = PhTreeD::<2, u32>::new();
        for (i, p) in [[0.0, 0.0], [4.0, 0.0], [0.0, 4.0], [10.0, 10.0]]
            .iter()
            .enumerate()
        {
            tree.try_emplace(p, i as u32);
        }
        let nearest: Vec<u32> = tree
            .knn(3, &[0.5, 0.5], DistanceEuclidean)
            .map(|(_, v)| *v)
            .collect();
        assert_eq!(nearest[0], 0);
        assert_eq!(nearest.len(), 3);
        assert!(!nearest.contains(&3));
    }

    #[test]
    fn box_tree_intersection_query() {
        let mut tree = PhTreeBoxD::<2, 4, &str>::new();
        tree.try_emplace(&PhBox::new([0.0, 0.0], [2.0, 2.0]), "low");
        tree.try_emplace(&PhBox::new([5.0, 5.0], [7.0, 7.0]), "high");
        tree.try_emplace(&PhBox::new([1.0, 1.0], [6.0, 6.0]), "wide");

        let query = PhBox::new([1.5, 1.5], [3.0, 3.0]);
        let mut hits: Vec<&str> = tree.query(&query).map(|(_, v)| *v).collect();
        hits.sort();
        assert_eq!(hits, vec!["low", "wide"]);

        let mut contained: Vec<&str> = tree
            .query_with(&query, QueryType::Include, FilterNoOp)
            .map(|(_, v)| *v)
            .collect();
        contained.sort();
        assert!(contained.is_empty());

        let all = PhBox::new([0.0, 0.0], [10.0, 10.0]);
        let contained = tree
            .query_with(&all, QueryType::Include, FilterNoOp)
            .count();
        assert_eq!(contained, 3);
    }
}
