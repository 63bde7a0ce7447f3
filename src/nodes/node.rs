//! Node operations: hypercube-addressed child lookup, insertion with
//! infix/postfix splitting, and prefix matching.

use crate::bits::{diverging_bits, hc_pos, key_equals};
use crate::containers::{
    ArrayMap, ArrayMapIter, BptIter, BptMap, SparseMap, SparseMapIter,
};
use crate::keys::{PhPoint, Scalar};
use crate::nodes::Entry;

/// Child map of a node, keyed by hypercube position.
///
/// The layout is picked by dimensionality when the map is constructed: dense
/// slots for `N <= 3`, a sorted vector for `N <= 8`, a B⁺-tree above that.
/// The selector is a constant expression, so every map of a given tree type
/// only ever inhabits one variant and the dispatch below branch-predicts to
/// a single arm.
#[derive(Debug)]
pub(crate) enum EntryMap<const N: usize, T, S: Scalar> {
    Array(ArrayMap<Entry<N, T, S>>),
    Sparse(SparseMap<Entry<N, T, S>>),
    Tree(BptMap<Entry<N, T, S>>),
}

impl<const N: usize, T, S: Scalar> EntryMap<N, T, S> {
    pub fn new() -> Self {
        if N <= 3 {
            EntryMap::Array(ArrayMap::new(1 << N))
        } else if N <= 8 {
            EntryMap::Sparse(SparseMap::new())
        } else {
            EntryMap::Tree(BptMap::new())
        }
    }

    pub fn len(&self) -> usize {
        match self {
            EntryMap::Array(map) => map.len(),
            EntryMap::Sparse(map) => map.len(),
            EntryMap::Tree(map) => map.len(),
        }
    }

    pub fn get(&self, pos: u64) -> Option<&Entry<N, T, S>> {
        match self {
            EntryMap::Array(map) => map.get(pos),
            EntryMap::Sparse(map) => map.get(pos),
            EntryMap::Tree(map) => map.get(pos),
        }
    }

    pub fn get_mut(&mut self, pos: u64) -> Option<&mut Entry<N, T, S>> {
        match self {
            EntryMap::Array(map) => map.get_mut(pos),
            EntryMap::Sparse(map) => map.get_mut(pos),
            EntryMap::Tree(map) => map.get_mut(pos),
        }
    }

    pub fn try_emplace_with(
        &mut self,
        pos: u64,
        make: impl FnOnce() -> Entry<N, T, S>,
    ) -> (&mut Entry<N, T, S>, bool) {
        match self {
            EntryMap::Array(map) => map.try_emplace_with(pos, make),
            EntryMap::Sparse(map) => map.try_emplace_with(pos, make),
            EntryMap::Tree(map) => map.try_emplace_with(pos, make),
        }
    }

    pub fn erase(&mut self, pos: u64) -> Option<Entry<N, T, S>> {
        match self {
            EntryMap::Array(map) => map.erase(pos),
            EntryMap::Sparse(map) => map.erase(pos),
            EntryMap::Tree(map) => map.erase(pos),
        }
    }

    pub fn pop_first(&mut self) -> Option<(u64, Entry<N, T, S>)> {
        match self {
            EntryMap::Array(map) => map.pop_first(),
            EntryMap::Sparse(map) => map.pop_first(),
            EntryMap::Tree(map) => map.pop_first(),
        }
    }

    pub fn iter(&self) -> EntryMapIter<'_, N, T, S> {
        match self {
            EntryMap::Array(map) => EntryMapIter::Array(map.iter()),
            EntryMap::Sparse(map) => EntryMapIter::Sparse(map.iter()),
            EntryMap::Tree(map) => EntryMapIter::Tree(map.iter()),
        }
    }

    /// Iterate entries with position `>= pos` in ascending order (the
    /// `lower_bound` part of the container contract).
    pub fn iter_from(&self, pos: u64) -> EntryMapIter<'_, N, T, S> {
        match self {
            EntryMap::Array(map) => EntryMapIter::Array(map.iter_from(pos)),
            EntryMap::Sparse(map) => EntryMapIter::Sparse(map.iter_from(pos)),
            EntryMap::Tree(map) => EntryMapIter::Tree(map.iter_from(pos)),
        }
    }
}

/// Ascending-position iterator over an [`EntryMap`].
pub(crate) enum EntryMapIter<'a, const N: usize, T, S: Scalar> {
    Array(ArrayMapIter<'a, Entry<N, T, S>>),
    Sparse(SparseMapIter<'a, Entry<N, T, S>>),
    Tree(BptIter<'a, Entry<N, T, S>>),
}

impl<'a, const N: usize, T, S: Scalar> Iterator for EntryMapIter<'a, N, T, S> {
    type Item = (u64, &'a Entry<N, T, S>);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            EntryMapIter::Array(iter) => iter.next(),
            EntryMapIter::Sparse(iter) => iter.next(),
            EntryMapIter::Tree(iter) => iter.next(),
        }
    }
}

/// A tree node: a child map keyed by hypercube position.
#[derive(Debug)]
pub(crate) struct Node<const N: usize, T, S: Scalar> {
    entries: EntryMap<N, T, S>,
}

impl<const N: usize, T, S: Scalar> Node<N, T, S> {
    pub fn new() -> Self {
        Node {
            entries: EntryMap::new(),
        }
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &EntryMap<N, T, S> {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut EntryMap<N, T, S> {
        &mut self.entries
    }

    /// Find-or-insert `key` below this node (whose parent entry has the
    /// given postfix length).
    ///
    /// The payload travels in `value` and is consumed exactly when a fresh
    /// value entry is created, in which case `inserted` is set. The returned
    /// entry is either the final value entry (fresh or duplicate) or a
    /// subnode entry the caller must descend into.
    pub fn emplace(
        &mut self,
        value: &mut Option<T>,
        inserted: &mut bool,
        key: &PhPoint<N, S>,
        postfix_len: u32,
    ) -> &mut Entry<N, T, S> {
        let pos = hc_pos(key, postfix_len);
        let (entry, fresh) = self.entries.try_emplace_with(pos, || {
            Entry::new_value(*key, value.take().expect("payload available for fresh insert"))
        });
        if fresh {
            *inserted = true;
            return entry;
        }
        Self::handle_collision(entry, value, inserted, key, postfix_len)
    }

    /// The slot for `key` is occupied: either descend, detect a duplicate,
    /// or split the slot with a new intermediate node.
    fn handle_collision<'a>(
        entry: &'a mut Entry<N, T, S>,
        value: &mut Option<T>,
        inserted: &mut bool,
        key: &PhPoint<N, S>,
        postfix_len: u32,
    ) -> &'a mut Entry<N, T, S> {
        let is_node = entry.is_node();
        if is_node && !entry.has_node_infix(postfix_len) {
            // No compressed prefix to disagree with; descend directly.
            return entry;
        }
        let max_conflicting_bits = diverging_bits(key, entry.key());
        let split_len = if is_node {
            entry.node_postfix_len() + 1
        } else {
            0
        };
        if max_conflicting_bits <= split_len {
            // The existing subnode covers all diverging bits (descend), or
            // the keys are identical (duplicate).
            return entry;
        }
        *inserted = true;
        Self::insert_split(entry, value, key, max_conflicting_bits)
    }

    /// Replace `entry` with a new intermediate node holding the previous
    /// occupant and a fresh value for `key`, split at the diverging bit.
    fn insert_split<'a>(
        entry: &'a mut Entry<N, T, S>,
        value: &mut Option<T>,
        key: &PhPoint<N, S>,
        max_conflicting_bits: u32,
    ) -> &'a mut Entry<N, T, S> {
        let new_postfix_len = max_conflicting_bits - 1;
        let pos_new = hc_pos(key, new_postfix_len);
        let pos_existing = hc_pos(entry.key(), new_postfix_len);
        debug_assert_ne!(pos_new, pos_existing);

        let mut sub_node = Node::new();
        sub_node.write_entry(pos_existing, entry);
        sub_node.write_value(
            pos_new,
            *key,
            value.take().expect("payload available for fresh insert"),
        );
        entry.set_node(sub_node, new_postfix_len);
        entry
            .node_mut()
            .entries_mut()
            .get_mut(pos_new)
            .expect("freshly written value entry")
    }

    /// Move the contents of `entry` into this node under `pos`, leaving the
    /// transient empty state behind in the source slot.
    fn write_entry(&mut self, pos: u64, entry: &mut Entry<N, T, S>) {
        let key = *entry.key();
        let moved = if entry.is_node() {
            let postfix_len = entry.node_postfix_len();
            Entry::new_node(key, entry.extract_node(), postfix_len)
        } else {
            Entry::new_value(key, entry.extract_value())
        };
        let (_, inserted) = self.entries.try_emplace_with(pos, move || moved);
        debug_assert!(inserted);
    }

    fn write_value(&mut self, pos: u64, key: PhPoint<N, S>, value: T) {
        let (_, inserted) = self
            .entries
            .try_emplace_with(pos, move || Entry::new_value(key, value));
        debug_assert!(inserted);
    }

    /// Look up `key` below this node; `None` when the slot is empty or the
    /// occupant does not match the key (or its prefix, for subnodes).
    pub fn find(&self, key: &PhPoint<N, S>, postfix_len: u32) -> Option<&Entry<N, T, S>> {
        let pos = hc_pos(key, postfix_len);
        let entry = self.entries.get(pos)?;
        if Self::entry_matches(entry, key, postfix_len) {
            Some(entry)
        } else {
            None
        }
    }

    pub fn find_mut(&mut self, key: &PhPoint<N, S>, postfix_len: u32) -> Option<&mut Entry<N, T, S>> {
        let pos = hc_pos(key, postfix_len);
        let entry = self.entries.get_mut(pos)?;
        if Self::entry_matches(entry, key, postfix_len) {
            Some(entry)
        } else {
            None
        }
    }

    /// Look up the child whose subtree still contains every key sharing
    /// `prefix` above bit `prefix_postfix_len` (window query descent).
    pub fn find_prefix(
        &self,
        prefix: &PhPoint<N, S>,
        prefix_postfix_len: u32,
        node_postfix_len: u32,
    ) -> Option<&Entry<N, T, S>> {
        debug_assert!(prefix_postfix_len <= node_postfix_len);
        let pos = hc_pos(prefix, node_postfix_len);
        let entry = self.entries.get(pos)?;
        if entry.is_value() || entry.node_postfix_len() < prefix_postfix_len {
            return None;
        }
        if Self::entry_matches(entry, prefix, node_postfix_len) {
            Some(entry)
        } else {
            None
        }
    }

    /// Whether an occupied slot actually stores `key`: exact equality for a
    /// value, prefix agreement for a subnode with a non-empty infix.
    pub fn entry_matches(
        entry: &Entry<N, T, S>,
        key: &PhPoint<N, S>,
        parent_postfix_len: u32,
    ) -> bool {
        if entry.is_node() {
            if entry.has_node_infix(parent_postfix_len) {
                return key_equals(entry.key(), key, entry.node_postfix_len() + 1);
            }
            return true;
        }
        entry.key() == key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emplace_value(
        node: &mut Node<2, u32, i64>,
        key: [i64; 2],
        value: u32,
        postfix_len: u32,
    ) -> bool {
        let mut holder = Some(value);
        let mut inserted = false;
        node.emplace(&mut holder, &mut inserted, &key, postfix_len);
        inserted
    }

    #[test]
    fn emplace_into_empty_slot() {
        let mut node = Node::<2, u32, i64>::new();
        assert!(emplace_value(&mut node, [1, 2], 10, 5));
        assert_eq!(node.entry_count(), 1);
        let found = node.find(&[1, 2], 5).expect("stored entry");
        assert_eq!(*found.value_ref(), 10);
    }

    #[test]
    fn duplicate_key_is_not_inserted() {
        let mut node = Node::<2, u32, i64>::new();
        assert!(emplace_value(&mut node, [1, 2], 10, 5));
        assert!(!emplace_value(&mut node, [1, 2], 11, 5));
        assert_eq!(*node.find(&[1, 2], 5).unwrap().value_ref(), 10);
    }

    #[test]
    fn colliding_keys_split_into_subnode() {
        let mut node = Node::<2, u32, i64>::new();
        // Same hc position at postfix 5 (bit 5 equal), diverging lower down.
        assert!(emplace_value(&mut node, [0b100_000, 0], 1, 5));
        assert!(emplace_value(&mut node, [0b100_100, 0], 2, 5));
        assert_eq!(node.entry_count(), 1);

        let slot = node.find(&[0b100_000, 0], 5).expect("split node matches");
        assert!(slot.is_node());
        // Diverging bit is bit 2, so the intermediate node has postfix 2.
        assert_eq!(slot.node_postfix_len(), 2);
        assert_eq!(slot.node_ref().entry_count(), 2);
    }

    #[test]
    fn find_rejects_mismatched_infix() {
        let mut node = Node::<2, u32, i64>::new();
        assert!(emplace_value(&mut node, [0b100_000, 0], 1, 5));
        assert!(emplace_value(&mut node, [0b100_100, 0], 2, 5));
        // Same slot at postfix 5, but disagrees with the subnode prefix.
        assert!(node.find(&[0b101_000, 0], 5).is_none());
    }
}
