//! Benchmarks for the Count-Min sketch hot path.
//!
//! `add` dominates the map pass: two to four hashed counter increments plus a
//! heap update per vector.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::Rng;
use rphash::sketch::{KhhSketch, SketchShape};

fn zipfish_stream(n: usize, distinct: i64, seed: u64) -> Vec<i64> {
    // Skewed stream: low labels much more frequent, like lattice cells
    // around cluster cores.
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let u: f64 = rng.random();
            ((distinct as f64) * u * u * u) as i64
        })
        .collect()
}

fn bench_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("sketch_add");
    for &depth in &[2usize, 4] {
        let stream = zipfish_stream(100_000, 10_000, 1);
        group.throughput(Throughput::Elements(stream.len() as u64));
        group.bench_with_input(BenchmarkId::new("depth", depth), &stream, |b, stream| {
            b.iter(|| {
                let shape = SketchShape { depth, width: 4096 };
                let mut sketch = KhhSketch::with_shape(64, shape, 7).unwrap();
                for &item in stream {
                    sketch.add(black_box(item)).unwrap();
                }
                sketch.size()
            });
        });
    }
    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let stream = zipfish_stream(100_000, 10_000, 2);
    let shape = SketchShape { depth: 2, width: 4096 };
    let build = |items: &[i64]| {
        let mut sketch = KhhSketch::with_shape(64, shape, 7).unwrap();
        for &item in items {
            sketch.add(item).unwrap();
        }
        sketch
    };
    let left = build(&stream[..50_000]);
    let right = build(&stream[50_000..]);

    c.bench_function("sketch_merge", |b| {
        b.iter(|| black_box(&left).merge(black_box(&right)).unwrap());
    });
}

criterion_group!(benches, bench_add, bench_merge);
criterion_main!(benches);
