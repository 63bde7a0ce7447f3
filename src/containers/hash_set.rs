//! Hash set backed by the B⁺-tree, used as the multi-map bucket.
//!
//! Values are keyed by their 64-bit hash; equal hashes are legal and are
//! resolved by scanning adjacent entries (the scan crosses leaf boundaries).
//! `DefaultHasher` is deterministic for a given build, which keeps bucket
//! iteration order stable within a process.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::b_plus_tree::{BptIter, BptMap};

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// A set of values ordered by value hash.
#[derive(Debug)]
pub struct BptSet<T> {
    tree: BptMap<T>,
}

impl<T: Hash + Eq> BptSet<T> {
    pub fn new() -> Self {
        BptSet {
            tree: BptMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn contains(&self, value: &T) -> bool {
        self.tree
            .get_where(hash_of(value), |v| v == value)
            .is_some()
    }

    /// Insert `value` if no equal value is present. Returns whether the set
    /// changed.
    pub fn insert(&mut self, value: T) -> bool {
        let hash = hash_of(&value);
        if self.tree.get_where(hash, |v| *v == value).is_some() {
            return false;
        }
        self.tree.insert_dup(hash, value);
        true
    }

    /// Remove an equal value, returning it.
    pub fn take(&mut self, value: &T) -> Option<T> {
        self.tree.erase_where(hash_of(value), |v| v == value)
    }

    pub fn remove(&mut self, value: &T) -> bool {
        self.take(value).is_some()
    }

    pub fn iter(&self) -> BptSetIter<'_, T> {
        BptSetIter {
            inner: self.tree.iter(),
        }
    }

    /// Count values satisfying `pred`.
    pub(crate) fn count_matching(&self, mut pred: impl FnMut(&T) -> bool) -> usize {
        self.iter().filter(|v| pred(v)).count()
    }

    /// Move every value satisfying `pred` into `other`, skipping values
    /// `other` already contains. Returns the number of values moved.
    pub(crate) fn drain_matching_into(
        &mut self,
        other: &mut BptSet<T>,
        mut pred: impl FnMut(&T) -> bool,
    ) -> usize {
        let hashes: Vec<u64> = self
            .tree
            .iter()
            .filter(|(_, v)| pred(v))
            .map(|(h, _)| h)
            .collect();
        let mut moved = 0;
        for hash in hashes {
            let taken = self
                .tree
                .erase_where(hash, |v| pred(v) && !other.contains(v));
            if let Some(value) = taken {
                other.insert(value);
                moved += 1;
            }
        }
        moved
    }
}

impl<T: Hash + Eq> Default for BptSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the values of a [`BptSet`] in hash order.
pub struct BptSetIter<'a, T> {
    inner: BptIter<'a, T>,
}

impl<'a, T> Iterator for BptSetIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }
}
