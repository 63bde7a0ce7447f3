//! Multi-map bucket semantics: per-key sets, erase-to-empty, relocation.

use phtree::{PhBox, PhTreeMultiMap};
use rand::prelude::*;

#[test]
fn bucket_erase_sequence() {
    let mut tree = PhTreeMultiMap::<2, char>::new();
    assert!(tree.emplace(&[1, 1], 'a'));
    assert!(tree.emplace(&[1, 1], 'b'));
    assert_eq!(tree.len(), 2);

    assert!(tree.remove(&[1, 1], &'a'));
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.count(&[1, 1]), 1);

    assert!(tree.remove(&[1, 1], &'b'));
    assert_eq!(tree.len(), 0);
    assert_eq!(tree.count(&[1, 1]), 0);
    assert!(!tree.remove(&[1, 1], &'b'));
}

#[test]
fn duplicate_values_per_key_are_ignored() {
    let mut tree = PhTreeMultiMap::<2, u32>::new();
    assert!(tree.emplace(&[2, 2], 9));
    assert!(!tree.emplace(&[2, 2], 9));
    assert_eq!(tree.len(), 1);
    // The same value under another key is a separate item.
    assert!(tree.emplace(&[3, 3], 9));
    assert_eq!(tree.len(), 2);
}

#[test]
fn values_at_lists_bucket() {
    let mut tree = PhTreeMultiMap::<2, u32>::new();
    for v in [4u32, 7, 11] {
        tree.emplace(&[5, 5], v);
    }
    let mut values: Vec<u32> = tree.values_at(&[5, 5]).copied().collect();
    values.sort();
    assert_eq!(values, vec![4, 7, 11]);
    assert_eq!(tree.values_at(&[6, 6]).count(), 0);
}

#[test]
fn relocate_value_between_buckets() {
    let mut tree = PhTreeMultiMap::<2, u32>::new();
    tree.emplace(&[1, 1], 1);
    tree.emplace(&[1, 1], 2);

    assert_eq!(tree.relocate(&[1, 1], &[50, 50], &1), 1);
    assert!(tree.contains(&[50, 50], &1));
    assert!(tree.contains(&[1, 1], &2));
    assert_eq!(tree.len(), 2);

    // Absent value moves nothing.
    assert_eq!(tree.relocate(&[1, 1], &[50, 50], &99), 0);
    // Equal value in the target bucket blocks the move.
    tree.emplace(&[1, 1], 1);
    assert_eq!(tree.relocate(&[1, 1], &[50, 50], &1), 0);
    assert!(tree.contains(&[1, 1], &1));
}

#[test]
fn relocate_last_item_drops_source_bucket() {
    let mut tree = PhTreeMultiMap::<2, u32>::new();
    tree.emplace(&[9, 9], 42);
    assert_eq!(tree.relocate(&[9, 9], &[-9, -9], &42), 1);
    assert_eq!(tree.count(&[9, 9]), 0);
    assert_eq!(tree.count(&[-9, -9]), 1);
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.iter().count(), 1);
}

#[test]
fn relocate_if_moves_predicate_matches() {
    let mut tree = PhTreeMultiMap::<2, u32>::new();
    for v in 0..8u32 {
        tree.emplace(&[0, 0], v);
    }
    let moved = tree.relocate_if(&[0, 0], &[100, -100], |v| *v >= 4);
    assert_eq!(moved, 4);
    assert_eq!(tree.count(&[0, 0]), 4);
    assert_eq!(tree.count(&[100, -100]), 4);
    assert_eq!(tree.len(), 8);
}

#[test]
fn window_and_knn_flatten_buckets() {
    let mut tree = PhTreeMultiMap::<2, u32>::new();
    for v in 0..3u32 {
        tree.emplace(&[1, 1], v);
    }
    tree.emplace(&[30, 30], 100);

    let hits = tree.query(&PhBox::new([0, 0], [10, 10])).count();
    assert_eq!(hits, 3);
    assert_eq!(tree.estimate_count(&PhBox::new([0, 0], [40, 40])), 4);

    let nearest: Vec<u32> = tree
        .knn(3, &[0, 0], phtree::DistanceEuclidean)
        .map(|(_, v)| *v)
        .collect();
    assert_eq!(nearest.len(), 3);
    assert!(!nearest.contains(&100));
}

#[test]
fn random_churn_matches_model() {
    use std::collections::{BTreeMap, BTreeSet};
    let mut rng = StdRng::seed_from_u64(0x3a3a);
    let mut tree = PhTreeMultiMap::<2, u32>::new();
    let mut model: BTreeMap<[i64; 2], BTreeSet<u32>> = BTreeMap::new();

    for _ in 0..10_000 {
        let key = [rng.gen_range(-16..16i64), rng.gen_range(-16..16i64)];
        let value = rng.gen_range(0..8u32);
        match rng.gen_range(0..3) {
            0 => {
                let expected = model.entry(key).or_default().insert(value);
                assert_eq!(tree.emplace(&key, value), expected);
            }
            1 => {
                let expected = model
                    .get_mut(&key)
                    .map_or(false, |bucket| bucket.remove(&value));
                if model.get(&key).is_some_and(BTreeSet::is_empty) {
                    model.remove(&key);
                }
                assert_eq!(tree.remove(&key, &value), expected);
            }
            _ => {
                let target = [rng.gen_range(-16..16i64), rng.gen_range(-16..16i64)];
                let moved = tree.relocate(&key, &target, &value);
                let expected = if key == target {
                    usize::from(model.get(&key).is_some_and(|b| b.contains(&value)))
                } else {
                    let source_has = model.get(&key).is_some_and(|b| b.contains(&value));
                    let target_has = model.get(&target).is_some_and(|b| b.contains(&value));
                    if source_has && !target_has {
                        model.get_mut(&key).unwrap().remove(&value);
                        if model.get(&key).is_some_and(BTreeSet::is_empty) {
                            model.remove(&key);
                        }
                        model.entry(target).or_default().insert(value);
                        1
                    } else {
                        0
                    }
                };
                assert_eq!(moved, expected);
            }
        }
        let model_len: usize = model.values().map(BTreeSet::len).sum();
        assert_eq!(tree.len(), model_len);
    }

    for (key, bucket) in &model {
        assert_eq!(tree.count(key), bucket.len());
        for value in bucket {
            assert!(tree.contains(key, value));
        }
    }
    assert_eq!(tree.iter().count(), tree.len());
}
