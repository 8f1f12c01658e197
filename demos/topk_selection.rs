//! Top-K selection demonstration
//!
//! Picks the most confident predictions out of a batch of classifier scores,
//! first with the slice API, then on an Arrow record batch.
//!
//! Run with: cargo run --example topk_selection --release

use arrow::array::{Float32Array, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use cifar_topk::rng::{seeded, FIXED_SEED};
use cifar_topk::topk::{select_top_k, SortOrder, TopKSelection, TopKSelector};
use rand::Rng;
use std::sync::Arc;
use std::time::Instant;

const CLASSES: [&str; 10] = [
    "airplane", "automobile", "bird", "cat", "deer", "dog", "frog", "horse", "ship", "truck",
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Top-K Selection Example ===\n");

    // One output vector of a 10-class model
    let scores = [0.02f32, 0.01, 0.05, 0.41, 0.03, 0.33, 0.08, 0.04, 0.02, 0.01];
    let top3 = select_top_k(&scores, &CLASSES, 3, SortOrder::Descending)?;
    println!("=== Top-3 classes ===");
    for (rank, (score, class)) in top3.iter().enumerate() {
        println!("    #{}: {class:<10} {score:.2}", rank + 1);
    }
    println!();

    // 1M predictions with random confidences
    let mut rng = seeded(FIXED_SEED);
    let n = 1_000_000;
    let confidences: Vec<f32> = (0..n).map(|_| rng.gen_range(0.0..1.0)).collect();
    let labels: Vec<u32> = (0..n).map(|_| rng.gen_range(0..10)).collect();

    println!("=== Top-10 most confident of {n} predictions ===");
    let start = Instant::now();
    let heap = TopKSelector::new(10).select(&confidences, &labels)?;
    println!("  heap:       {:?}", start.elapsed());

    let start = Instant::now();
    let randomized = TopKSelector::new(10).select_randomized(&confidences, &labels, &mut rng)?;
    println!("  randomized: {:?}", start.elapsed());
    println!("  same selection: {}", heap.indices() == randomized.indices());

    for (rank, (confidence, label)) in heap.iter().enumerate().take(5) {
        println!("    #{}: {:<10} {confidence:.6}", rank + 1, CLASSES[*label as usize]);
    }
    println!();

    // Same selection over a record batch
    let schema = Schema::new(vec![
        Field::new("confidence", DataType::Float32, false),
        Field::new("label", DataType::UInt32, false),
    ]);
    let batch = RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(Float32Array::from(confidences)),
            Arc::new(UInt32Array::from(labels)),
        ],
    )?;

    println!("=== Least confident predictions (record batch) ===");
    let start = Instant::now();
    let bottom = batch.top_k(0, 5, SortOrder::Ascending)?;
    println!("  Time: {:?}", start.elapsed());

    let confidence = bottom
        .column(0)
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or("confidence column is not Float32")?;
    let label = bottom
        .column(1)
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or("label column is not UInt32")?;
    for i in 0..bottom.num_rows() {
        println!(
            "    #{}: {:<10} {:.6}",
            i + 1,
            CLASSES[label.value(i) as usize],
            confidence.value(i)
        );
    }

    Ok(())
}
