use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::prelude::*;

use phtree::{DistanceEuclidean, PhBox, PhTree};

fn gen_points(n: usize, seed: u64) -> Vec<[i64; 2]> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| [rng.gen_range(-100_000..100_000), rng.gen_range(-100_000..100_000)])
        .collect()
}

fn bench_insert(c: &mut Criterion) {
    let points = gen_points(10_000, 1);
    c.bench_function("insert_10k", |b| {
        b.iter_batched(
            || points.clone(),
            |points| {
                let mut tree = PhTree::<2, usize>::new();
                for (i, p) in points.iter().enumerate() {
                    tree.try_emplace(p, i);
                }
                tree
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_get(c: &mut Criterion) {
    let points = gen_points(10_000, 2);
    let mut tree = PhTree::<2, usize>::new();
    for (i, p) in points.iter().enumerate() {
        tree.try_emplace(p, i);
    }
    c.bench_function("get_hit", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % points.len();
            black_box(tree.get(&points[i]))
        })
    });
}

fn bench_window_query(c: &mut Criterion) {
    let points = gen_points(50_000, 3);
    let mut tree = PhTree::<2, usize>::new();
    for (i, p) in points.iter().enumerate() {
        tree.try_emplace(p, i);
    }
    let window = PhBox::new([-5_000, -5_000], [5_000, 5_000]);
    c.bench_function("window_query_50k", |b| {
        b.iter(|| black_box(tree.query(&window).count()))
    });
}

fn bench_knn(c: &mut Criterion) {
    let points = gen_points(50_000, 4);
    let mut tree = PhTree::<2, usize>::new();
    for (i, p) in points.iter().enumerate() {
        tree.try_emplace(p, i);
    }
    c.bench_function("knn_10_of_50k", |b| {
        b.iter(|| {
            black_box(
                tree.knn(10, &[123, -456], DistanceEuclidean)
                    .count(),
            )
        })
    });
}

criterion_group!(benches, bench_insert, bench_get, bench_window_query, bench_knn);
criterion_main!(benches);
