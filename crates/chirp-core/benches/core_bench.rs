//! Criterion benchmarks for chirp-core primitives
//!
//! Run with: cargo bench -p chirp-core

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use chirp_core::{CircularBuffer, approx_sin_cubic, approx_sin_quad, approx_sin_taylor};

const BATCH_SIZES: &[usize] = &[1, 16, 64, 256];

// ============================================================================
// Circular buffer benchmarks
// ============================================================================

fn bench_circular_single(c: &mut Criterion) {
    let mut group = c.benchmark_group("CircularBuffer_single");

    for &count in BATCH_SIZES {
        let mut buffer = CircularBuffer::<u64>::new(count.max(2)).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &n| {
            b.iter(|| {
                for i in 0..n {
                    let _ = buffer.try_push(i as u64);
                }
                let mut sum = 0u64;
                let mut out = 0u64;
                while buffer.try_pop(&mut out) {
                    sum += out;
                }
                black_box(sum)
            })
        });
    }

    group.finish();
}

fn bench_circular_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("CircularBuffer_batch");

    for &count in BATCH_SIZES {
        let mut buffer = CircularBuffer::<u64>::new(count.max(2)).unwrap();
        let mut pending = Vec::with_capacity(count);
        let mut drained = Vec::with_capacity(count);

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &n| {
            b.iter(|| {
                pending.extend(0..n as u64);
                buffer.try_push_batch(&mut pending);
                pending.clear();
                buffer.try_pop_batch(&mut drained, 0);
                black_box(drained.len())
            })
        });
    }

    group.finish();
}

// ============================================================================
// Sine approximation benchmarks
// ============================================================================

fn bench_sine(c: &mut Criterion) {
    let mut group = c.benchmark_group("Sine");
    let inputs: Vec<f64> = (0..1024).map(|i| i as f64 * 0.013).collect();

    let variants: [(&str, fn(f64) -> f64); 4] = [
        ("libm", libm::sin),
        ("taylor", approx_sin_taylor),
        ("quad", approx_sin_quad),
        ("cubic", approx_sin_cubic),
    ];

    for (name, f) in variants {
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut sum = 0.0;
                for &x in &inputs {
                    sum += f(black_box(x));
                }
                black_box(sum)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_circular_single, bench_circular_batch, bench_sine);
criterion_main!(benches);
