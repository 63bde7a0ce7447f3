//! Sparse child map for mid-range dimensionalities.
//!
//! A sorted vector of `(position, value)` pairs. Lookup and `lower_bound`
//! are binary searches; insertion and removal shift elements. Nodes with
//! `4 <= DIM <= 8` rarely hold more than a handful of children, so the
//! shifting beats the constant factors of anything fancier.

/// Sorted-vector map from hypercube position to `V`.
#[derive(Debug)]
pub struct SparseMap<V> {
    data: Vec<(u64, V)>,
}

impl<V> SparseMap<V> {
    pub fn new() -> Self {
        SparseMap {
            data: Vec::with_capacity(4),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    fn lower_bound_index(&self, pos: u64) -> usize {
        self.data.partition_point(|(p, _)| *p < pos)
    }

    pub fn get(&self, pos: u64) -> Option<&V> {
        self.data
            .binary_search_by_key(&pos, |(p, _)| *p)
            .ok()
            .map(|i| &self.data[i].1)
    }

    pub fn get_mut(&mut self, pos: u64) -> Option<&mut V> {
        match self.data.binary_search_by_key(&pos, |(p, _)| *p) {
            Ok(i) => Some(&mut self.data[i].1),
            Err(_) => None,
        }
    }

    /// Insert a value built by `make` if `pos` is absent; otherwise leave the
    /// existing value untouched.
    pub fn try_emplace_with(&mut self, pos: u64, make: impl FnOnce() -> V) -> (&mut V, bool) {
        match self.data.binary_search_by_key(&pos, |(p, _)| *p) {
            Ok(i) => (&mut self.data[i].1, false),
            Err(i) => {
                self.data.insert(i, (pos, make()));
                (&mut self.data[i].1, true)
            }
        }
    }

    pub fn erase(&mut self, pos: u64) -> Option<V> {
        match self.data.binary_search_by_key(&pos, |(p, _)| *p) {
            Ok(i) => Some(self.data.remove(i).1),
            Err(_) => None,
        }
    }

    pub fn pop_first(&mut self) -> Option<(u64, V)> {
        if self.data.is_empty() {
            return None;
        }
        Some(self.data.remove(0))
    }

    pub fn iter(&self) -> SparseMapIter<'_, V> {
        SparseMapIter {
            data: &self.data,
            index: 0,
        }
    }

    pub fn iter_from(&self, pos: u64) -> SparseMapIter<'_, V> {
        SparseMapIter {
            data: &self.data,
            index: self.lower_bound_index(pos),
        }
    }
}

impl<V> Default for SparseMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Ascending-order iterator over a [`SparseMap`].
pub struct SparseMapIter<'a, V> {
    data: &'a [(u64, V)],
    index: usize,
}

impl<'a, V> Iterator for SparseMapIter<'a, V> {
    type Item = (u64, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let (pos, value) = self.data.get(self.index)?;
        self.index += 1;
        Some((*pos, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_sorted_under_mixed_ops() {
        let mut map = SparseMap::new();
        for pos in [9u64, 3, 120, 44, 0] {
            let (_, inserted) = map.try_emplace_with(pos, || pos as i32);
            assert!(inserted);
        }
        assert_eq!(map.len(), 5);
        let positions: Vec<_> = map.iter().map(|(p, _)| p).collect();
        assert_eq!(positions, vec![0, 3, 9, 44, 120]);

        assert_eq!(map.erase(44), Some(44));
        assert_eq!(map.erase(44), None);
        let positions: Vec<_> = map.iter_from(4).map(|(p, _)| p).collect();
        assert_eq!(positions, vec![9, 120]);
    }

    #[test]
    fn try_emplace_keeps_existing() {
        let mut map = SparseMap::new();
        map.try_emplace_with(7, || 1);
        let (value, inserted) = map.try_emplace_with(7, || 2);
        assert!(!inserted);
        assert_eq!(*value, 1);
    }
}
