//! Linker benchmarks using Criterion.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nalgebra::DMatrix;

use bloblink::{link_across_sequence, match_points, LinkConfig, Table};

/// Build a one-segment table of `n_blobs` drifting blobs over `n_frames`.
fn create_test_table(n_blobs: usize, n_frames: usize) -> Table {
    let mut t = Table::new(&["seq", "time", "x", "y"]);
    for frame in 0..n_frames {
        for blob in 0..n_blobs {
            let x = (blob * 100) as f64 + frame as f64 * 0.5;
            let y = (blob * 50) as f64 + frame as f64 * 0.25;
            t.push_row(vec![0.0, frame as f64, x, y]).expect("valid row");
        }
    }
    t
}

fn benchmark_link_10_blobs_50_frames(c: &mut Criterion) {
    let table = create_test_table(10, 50);
    let config = LinkConfig::new(&["x", "y"], "time", "seq");

    c.bench_function("link_10_blobs_50_frames", |b| {
        b.iter(|| link_across_sequence(black_box(&table), &config).expect("linking succeeds"))
    });
}

fn benchmark_link_50_blobs_20_frames(c: &mut Criterion) {
    let table = create_test_table(50, 20);
    let config = LinkConfig::new(&["x", "y"], "time", "seq");

    c.bench_function("link_50_blobs_20_frames", |b| {
        b.iter(|| link_across_sequence(black_box(&table), &config).expect("linking succeeds"))
    });
}

fn benchmark_match_points_50x50(c: &mut Criterion) {
    // Deterministic pseudo-random distances, diagonal-dominant
    let n = 50;
    let distances = DMatrix::from_fn(n, n, |i, j| {
        let noise = ((i * 31 + j * 17) % 97) as f64 / 97.0;
        if i == j {
            noise * 0.1
        } else {
            1.0 + noise * 10.0
        }
    });

    c.bench_function("match_points_50x50", |b| {
        b.iter(|| match_points(black_box(&distances)))
    });
}

criterion_group!(
    benches,
    benchmark_link_10_blobs_50_frames,
    benchmark_link_50_blobs_20_frames,
    benchmark_match_points_50x50
);
criterion_main!(benches);
