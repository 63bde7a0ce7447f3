//! Tree introspection: statistics collection and an invariant checker.
//!
//! Both walk the whole tree and are meant for tests, debugging and capacity
//! planning, not for hot paths.

use crate::bits::{hc_pos, key_equals};
use crate::keys::Scalar;
use crate::nodes::Entry;
use crate::tree::RawTree;

/// Aggregate statistics over the tree structure.
#[derive(Debug, Default, Clone)]
pub struct TreeStats {
    /// Number of inner nodes (including the root).
    pub n_nodes: usize,
    /// Number of stored values.
    pub n_values: usize,
    /// Sum of child counts over all nodes.
    pub n_total_children: usize,
    /// Deepest node level in nodes (not bits).
    pub max_depth: u32,
    /// Histogram over infix lengths of node entries.
    pub infix_hist: Vec<usize>,
    /// Histogram over `log2(child count)` per node.
    pub node_size_log_hist: Vec<usize>,
}

impl<const N: usize, T, S: Scalar> RawTree<N, T, S> {
    /// Collect structure statistics.
    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats {
            infix_hist: vec![0; S::BITS as usize + 1],
            node_size_log_hist: vec![0; 34],
            ..TreeStats::default()
        };
        Self::collect_stats(&self.root, 0, &mut stats);
        stats
    }

    fn collect_stats(entry: &Entry<N, T, S>, depth: u32, stats: &mut TreeStats) {
        let node = entry.node_ref();
        stats.n_nodes += 1;
        stats.n_total_children += node.entry_count();
        stats.max_depth = stats.max_depth.max(depth);
        let log = 32 - (node.entry_count() as u32).leading_zeros();
        stats.node_size_log_hist[log as usize] += 1;
        for (_, child) in node.entries().iter() {
            if child.is_node() {
                let infix_len = child.node_infix_len(entry.node_postfix_len());
                stats.infix_hist[infix_len as usize] += 1;
                Self::collect_stats(child, depth + 1, stats);
            } else {
                stats.n_values += 1;
            }
        }
    }

    /// Walk the whole tree and panic on any violated structural invariant:
    /// child counts, node center canonicalization, hypercube addressing,
    /// prefix agreement and the value count.
    pub fn assert_consistent(&self) {
        let count = Self::check_entry(&self.root, true);
        assert_eq!(
            count, self.num_entries,
            "stored size diverges from reachable value count"
        );
    }

    fn check_entry(entry: &Entry<N, T, S>, is_root: bool) -> usize {
        let node = entry.node_ref();
        let postfix_len = entry.node_postfix_len();
        assert!(
            node.entry_count() >= 2 || is_root,
            "non-root node with fewer than two children"
        );

        // Center canonicalization.
        if postfix_len == S::BITS - 1 {
            for d in 0..N {
                assert_eq!(entry.key()[d], S::ZERO, "root center must be the origin");
            }
        } else {
            for d in 0..N {
                let bits = entry.key()[d].to_bits();
                assert_eq!((bits >> postfix_len) & 1, 1, "center bit must be one");
                assert_eq!(bits & !(u64::MAX << postfix_len), 0, "postfix bits must be zero");
            }
        }

        let mut count = 0;
        for (pos, child) in node.entries().iter() {
            assert_eq!(
                hc_pos(child.key(), postfix_len),
                pos,
                "child stored under a foreign hypercube position"
            );
            if postfix_len < S::BITS - 1 {
                assert!(
                    key_equals(child.key(), entry.key(), postfix_len + 1),
                    "child key disagrees with the node prefix"
                );
            }
            if child.is_node() {
                assert!(child.node_postfix_len() < postfix_len);
                count += Self::check_entry(child, false);
            } else {
                count += 1;
            }
        }
        count
    }
}
