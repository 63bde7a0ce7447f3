//! Window (axis-aligned box) traversal.
//!
//! At every node two `N`-bit masks are derived from the query box relative
//! to the node center: `mask_lower` has bit `d` set iff the box minimum
//! requires the upper half of dimension `d`, `mask_upper` iff the box
//! maximum reaches the upper half. A child at hypercube position `pos` can
//! intersect the box iff `(pos | mask_lower) & mask_upper == pos`, which
//! prunes whole quadrants without per-dimension comparisons. Children are
//! visited in ascending position order starting at `mask_lower`.
//!
//! At the very top of the tree (`postfix_len == BITS - 1`) the node center
//! is the origin and the hypercube digit is the sign bit, which inverts the
//! comparison direction; the masks are derived from the signs instead.

use arrayvec::ArrayVec;

use crate::bits::is_in_range;
use crate::filter::Filter;
use crate::keys::{PhPoint, Scalar};
use crate::nodes::{Entry, EntryMapIter};

/// Compute `(mask_lower, mask_upper)` for a node with the given postfix
/// length and center `prefix`.
pub(crate) fn calc_limits<const N: usize, S: Scalar>(
    postfix_len: u32,
    prefix: &PhPoint<N, S>,
    min: &PhPoint<N, S>,
    max: &PhPoint<N, S>,
) -> (u64, u64) {
    debug_assert!(postfix_len < S::BITS);
    let mut lower = 0u64;
    let mut upper = 0u64;
    if postfix_len < S::BITS - 1 {
        for d in 0..N {
            lower <<= 1;
            lower |= u64::from(min[d] >= prefix[d]);
        }
        for d in 0..N {
            upper <<= 1;
            upper |= u64::from(max[d] >= prefix[d]);
        }
    } else {
        // Top of the tree: the digit is the sign bit, and negative values
        // sort below positive ones.
        for d in 0..N {
            upper <<= 1;
            upper |= u64::from(min[d] < S::ZERO);
        }
        for d in 0..N {
            lower <<= 1;
            lower |= u64::from(max[d] < S::ZERO);
        }
    }
    (lower, upper)
}

/// Whether the compressed prefix of a subnode entry still lies inside the
/// window. Nodes without an infix are accepted outright; their digit was
/// already validated by the mask test.
pub(crate) fn node_prefix_in_window<const N: usize, T, S: Scalar>(
    entry: &Entry<N, T, S>,
    parent_postfix_len: u32,
    min: &PhPoint<N, S>,
    max: &PhPoint<N, S>,
) -> bool {
    if !entry.has_node_infix(parent_postfix_len) {
        return true;
    }
    let bits_to_ignore = entry.node_postfix_len() + 1;
    debug_assert!(bits_to_ignore < S::BITS);
    let mask = u64::MAX << bits_to_ignore;
    for d in 0..N {
        let prefix = S::from_bits(entry.key()[d].to_bits() & mask);
        if prefix > max[d] || prefix < S::from_bits(min[d].to_bits() & mask) {
            return false;
        }
    }
    true
}

/// Recursive window traversal with a callback (the `for_each` engine).
pub(crate) fn traverse_window<const N: usize, T, S, F, C>(
    entry: &Entry<N, T, S>,
    min: &PhPoint<N, S>,
    max: &PhPoint<N, S>,
    filter: &F,
    callback: &mut C,
) where
    S: Scalar,
    F: Filter<N, S, T>,
    C: FnMut(&PhPoint<N, S>, &T),
{
    debug_assert!(entry.is_node());
    let postfix_len = entry.node_postfix_len();
    let (mask_lower, mask_upper) = calc_limits(postfix_len, entry.key(), min, max);
    for (pos, child) in entry.node_ref().entries().iter_from(mask_lower) {
        if pos > mask_upper {
            break;
        }
        if (pos | mask_lower) & mask_upper != pos {
            continue;
        }
        if child.is_node() {
            if node_prefix_in_window(child, postfix_len, min, max)
                && filter.is_node_valid(child.key(), child.node_postfix_len() + 1)
            {
                traverse_window(child, min, max, filter, callback);
            }
        } else if is_in_range(child.key(), min, max)
            && filter.is_entry_valid(child.key(), child.value_ref())
        {
            callback(child.key(), child.value_ref());
        }
    }
}

/// Per-node state of the iterative window traversal.
struct WindowNodeIter<'a, const N: usize, T, S: Scalar> {
    iter: EntryMapIter<'a, N, T, S>,
    mask_lower: u64,
    mask_upper: u64,
    postfix_len: u32,
}

impl<'a, const N: usize, T, S: Scalar> WindowNodeIter<'a, N, T, S> {
    fn new(entry: &'a Entry<N, T, S>, min: &PhPoint<N, S>, max: &PhPoint<N, S>) -> Self {
        let postfix_len = entry.node_postfix_len();
        let (mask_lower, mask_upper) = calc_limits(postfix_len, entry.key(), min, max);
        WindowNodeIter {
            iter: entry.node_ref().entries().iter_from(mask_lower),
            mask_lower,
            mask_upper,
            postfix_len,
        }
    }

    /// Next child whose quadrant intersects the window and whose key or
    /// prefix passes the geometric check.
    fn next_candidate(
        &mut self,
        min: &PhPoint<N, S>,
        max: &PhPoint<N, S>,
    ) -> Option<&'a Entry<N, T, S>> {
        while let Some((pos, child)) = self.iter.next() {
            if pos > self.mask_upper {
                return None;
            }
            if (pos | self.mask_lower) & self.mask_upper != pos {
                continue;
            }
            let matches = if child.is_node() {
                node_prefix_in_window(child, self.postfix_len, min, max)
            } else {
                is_in_range(child.key(), min, max)
            };
            if matches {
                return Some(child);
            }
        }
        None
    }
}

/// One-shot forward iterator over the values inside an axis-aligned window.
pub struct WindowIter<'a, const N: usize, T, S: Scalar, F> {
    stack: ArrayVec<WindowNodeIter<'a, N, T, S>, 64>,
    min: PhPoint<N, S>,
    max: PhPoint<N, S>,
    filter: F,
}

impl<'a, const N: usize, T, S: Scalar, F: Filter<N, S, T>> WindowIter<'a, N, T, S, F> {
    pub(crate) fn new(
        start: &'a Entry<N, T, S>,
        min: PhPoint<N, S>,
        max: PhPoint<N, S>,
        filter: F,
    ) -> Self {
        let mut stack = ArrayVec::new();
        stack.push(WindowNodeIter::new(start, &min, &max));
        WindowIter {
            stack,
            min,
            max,
            filter,
        }
    }
}

impl<'a, const N: usize, T, S: Scalar, F: Filter<N, S, T>> Iterator
    for WindowIter<'a, N, T, S, F>
{
    type Item = (&'a PhPoint<N, S>, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let candidate = {
                let top = self.stack.last_mut()?;
                top.next_candidate(&self.min, &self.max)
            };
            match candidate {
                None => {
                    self.stack.pop();
                }
                Some(child) => {
                    if child.is_node() {
                        if self
                            .filter
                            .is_node_valid(child.key(), child.node_postfix_len() + 1)
                        {
                            self.stack.push(WindowNodeIter::new(child, &self.min, &self.max));
                        }
                    } else if self.filter.is_entry_valid(child.key(), child.value_ref()) {
                        return Some((child.key(), child.value_ref()));
                    }
                }
            }
        }
    }
}
