//! Top-K selection benchmarks
//!
//! Bounded heap vs randomized quickselect vs full sort baseline, plus the
//! record batch path.
//!
//! Run with: cargo bench --bench topk_benchmarks

use arrow::array::{Float64Array, Int32Array, RecordBatch};
use arrow::datatypes::{DataType, Field, Schema};
use cifar_topk::rng::{seeded, FIXED_SEED};
use cifar_topk::topk::{top_k_indices, top_k_indices_randomized, SortOrder, TopKSelection};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;
use std::sync::Arc;

const SIZES: [usize; 2] = [10_000, 1_000_000];
const KS: [usize; 3] = [10, 100, 1_000];

fn random_keys(n: usize) -> Vec<f64> {
    let mut rng = seeded(FIXED_SEED);
    (0..n).map(|_| rng.gen_range(0.0..1_000_000.0)).collect()
}

/// Heap vs quickselect vs sort-everything on f64 keys
fn bench_slice_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("topk_slice_f64");

    for n in SIZES {
        let keys = random_keys(n);
        for k in KS {
            let label = format!("n={n},k={k}");

            group.bench_with_input(BenchmarkId::new("heap", &label), &keys, |b, keys| {
                b.iter(|| top_k_indices(black_box(keys), k, SortOrder::Descending));
            });

            group.bench_with_input(BenchmarkId::new("randomized", &label), &keys, |b, keys| {
                let mut rng = seeded(FIXED_SEED);
                b.iter(|| {
                    top_k_indices_randomized(black_box(keys), k, SortOrder::Descending, &mut rng)
                });
            });
        }

        // Scalar baseline for comparison
        group.bench_with_input(BenchmarkId::new("full_sort", n), &keys, |b, keys| {
            b.iter(|| {
                let mut sorted = black_box(keys).clone();
                sorted.sort_unstable_by(|a, b| b.total_cmp(a));
                sorted.truncate(KS[KS.len() - 1]);
                sorted
            });
        });
    }

    group.finish();
}

/// Columnar top-K including the `take` gather
fn bench_record_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("topk_record_batch");

    let n = SIZES[1];
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int32, false),
        Field::new("score", DataType::Float64, false),
    ]));
    let ids: Vec<i32> = (0..n).map(|i| i32::try_from(i).unwrap_or(i32::MAX)).collect();
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int32Array::from(ids)),
            Arc::new(Float64Array::from(random_keys(n))),
        ],
    )
    .unwrap();

    for k in KS {
        group.bench_with_input(BenchmarkId::new("float64_desc", k), &batch, |b, batch| {
            b.iter(|| batch.top_k(1, k, SortOrder::Descending).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_slice_selection, bench_record_batch);
criterion_main!(benches);
