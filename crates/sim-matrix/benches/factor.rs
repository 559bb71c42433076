//! Benchmarks for the two LU backends on resistor meshes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sim_matrix::{BackendKind, Matrix};

/// side×side resistor mesh with every node tied to ground.
fn mesh(side: usize, backend: BackendKind) -> Matrix {
    let n = side * side;
    let mut m = Matrix::with_backend(n, false, backend);
    let stamp = |m: &mut Matrix, a: usize, b: usize, g: f64| {
        for (r, c, v) in [(a, a, g), (b, b, g), (a, b, -g), (b, a, -g)] {
            let h = m.get_or_create_element(r, c).unwrap();
            m.accumulate(h, v);
        }
    };
    for row in 0..side {
        for col in 0..side {
            let node = row * side + col;
            if col + 1 < side {
                stamp(&mut m, node, node + 1, 1e-3);
            }
            if row + 1 < side {
                stamp(&mut m, node, node + side, 1e-3);
            }
            let h = m.get_or_create_element(node, node).unwrap();
            m.accumulate(h, 1e-6);
        }
    }
    m
}

const BACKENDS: [(&str, BackendKind); 2] = [
    ("classical", BackendKind::Classical),
    ("precompiled", BackendKind::Precompiled),
];

fn bench_reorder(c: &mut Criterion) {
    let mut group = c.benchmark_group("reorder");
    for side in [10, 30] {
        for (name, backend) in BACKENDS {
            group.bench_with_input(BenchmarkId::new(name, side), &side, |bencher, &side| {
                bencher.iter_batched(
                    || mesh(side, backend),
                    |mut m| m.reorder(1e-3, 1e-13).unwrap(),
                    criterion::BatchSize::LargeInput,
                );
            });
        }
    }
    group.finish();
}

fn bench_refactor(c: &mut Criterion) {
    let mut group = c.benchmark_group("refactor");
    for side in [10, 30] {
        for (name, backend) in BACKENDS {
            let mut m = mesh(side, backend);
            m.reorder(1e-3, 1e-13).unwrap();
            group.bench_with_input(BenchmarkId::new(name, side), &side, |bencher, _| {
                bencher.iter(|| m.factorize().unwrap());
            });
        }
    }
    group.finish();
}

fn bench_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("solve");
    for side in [10, 30] {
        for (name, backend) in BACKENDS {
            let mut m = mesh(side, backend);
            m.reorder(1e-3, 1e-13).unwrap();
            let n = side * side;
            let rhs: Vec<f64> = (0..n).map(|i| if i == 0 { 1e-3 } else { 0.0 }).collect();
            group.bench_with_input(BenchmarkId::new(name, side), &side, |bencher, _| {
                bencher.iter(|| {
                    let mut x = rhs.clone();
                    m.solve(black_box(&mut x)).unwrap();
                    x
                });
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_reorder, bench_refactor, bench_solve);
criterion_main!(benches);
