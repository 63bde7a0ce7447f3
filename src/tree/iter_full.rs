//! Full-scan iterator: depth-first over every value in hypercube order.

use arrayvec::ArrayVec;

use crate::filter::Filter;
use crate::keys::{PhPoint, Scalar};
use crate::nodes::{Entry, EntryMapIter};

/// One-shot forward iterator over all values of the tree.
///
/// The stack holds one child-map iterator per level; the trie depth is
/// bounded by the scalar bit width, so the stack never reallocates.
pub struct FullIter<'a, const N: usize, T, S: Scalar, F> {
    stack: ArrayVec<EntryMapIter<'a, N, T, S>, 64>,
    filter: F,
}

impl<'a, const N: usize, T, S: Scalar, F: Filter<N, S, T>> FullIter<'a, N, T, S, F> {
    pub(crate) fn new(root: &'a Entry<N, T, S>, filter: F) -> Self {
        let mut stack = ArrayVec::new();
        stack.push(root.node_ref().entries().iter());
        FullIter { stack, filter }
    }
}

impl<'a, const N: usize, T, S: Scalar, F: Filter<N, S, T>> Iterator for FullIter<'a, N, T, S, F> {
    type Item = (&'a PhPoint<N, S>, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let candidate = {
                let top = self.stack.last_mut()?;
                top.next()
            };
            match candidate {
                None => {
                    self.stack.pop();
                }
                Some((_, child)) => {
                    if child.is_node() {
                        if self
                            .filter
                            .is_node_valid(child.key(), child.node_postfix_len() + 1)
                        {
                            self.stack.push(child.node_ref().entries().iter());
                        }
                    } else if self.filter.is_entry_valid(child.key(), child.value_ref()) {
                        return Some((child.key(), child.value_ref()));
                    }
                }
            }
        }
    }
}
