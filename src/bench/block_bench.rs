use block_matmul::{create_matrix, multiply, Generator, LeafKernel, LocalRuntime, RuntimeConfig};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

fn bench_leaf_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("leaf_kernel");

    for n in [32, 64, 128] {
        let a: Vec<f64> = (0..n * n).map(|i| (i % 100) as f64).collect();
        let b: Vec<f64> = (0..n * n).map(|i| (i % 100) as f64).collect();
        group.throughput(Throughput::Elements((2 * n * n * n) as u64));

        for kernel in [LeafKernel::Reference, LeafKernel::Optimized] {
            group.bench_with_input(BenchmarkId::new(format!("{:?}", kernel), n), &n, |bench, &n| {
                bench.iter(|| kernel.multiply(black_box(&a), black_box(&b), n));
            });
        }
    }

    group.finish();
}

fn bench_block_multiply(c: &mut Criterion) {
    let mut group = c.benchmark_group("block_multiply");
    group.sample_size(10);

    for (n, block) in [(256, 64), (512, 64)] {
        // Memo off, otherwise every iteration after the first is a single cache hit
        let rt = LocalRuntime::new(
            RuntimeConfig::new()
                .with_block_size(block)
                .with_cache(false),
        )
        .expect("runtime");
        let a = create_matrix(&rt, n, 0, 0, Generator::Seeded(1)).expect("A");
        let b = create_matrix(&rt, n, 0, 0, Generator::Seeded(2)).expect("B");
        group.throughput(Throughput::Elements((2 * n * n * n) as u64));

        group.bench_with_input(BenchmarkId::new(format!("B={}", block), n), &n, |bench, _| {
            bench.iter(|| {
                let c = multiply(&rt, a, b).expect("multiply");
                rt.delete(&c).expect("delete");
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_leaf_kernels, bench_block_multiply);
criterion_main!(benches);
