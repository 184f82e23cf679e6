use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use hsskit_dense::Matrix;
use hsskit_hss::{CompressionAlgorithm, HSSMatrix, HSSOptions};

fn kernel_matrix(n: usize) -> Matrix<f64> {
    Matrix::from_fn(n, n, |i, j| {
        let d = (i as f64 - j as f64) / n as f64;
        (-50.0 * d * d).exp() + if i == j { 1.0 } else { 0.0 }
    })
}

fn opts(alg: CompressionAlgorithm) -> HSSOptions {
    HSSOptions::default()
        .with_leaf_size(64)
        .with_rel_tol(1e-6)
        .with_abs_tol(1e-12)
        .with_d0(32)
        .with_dd(16)
        .with_compression_algorithm(alg)
}

fn bench_compress(c: &mut Criterion) {
    let mut group = c.benchmark_group("hss_compress");
    group.sample_size(10);

    for &size in &[256, 512, 1024] {
        let a = kernel_matrix(size);
        for alg in [CompressionAlgorithm::Original, CompressionAlgorithm::Stable] {
            group.bench_with_input(BenchmarkId::new(alg.to_string(), size), &size, |b, _| {
                b.iter(|| HSSMatrix::from_dense(&a, opts(alg)));
            });
        }
    }

    group.finish();
}

fn bench_factor_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("hss_ulv");
    group.sample_size(10);

    for &size in &[512, 1024] {
        let a = kernel_matrix(size);
        let Ok(h) = HSSMatrix::from_dense(&a, opts(CompressionAlgorithm::Stable)) else {
            continue;
        };
        group.bench_with_input(BenchmarkId::new("factor", size), &size, |b, _| {
            b.iter(|| h.factor());
        });
        let Ok(f) = h.factor() else {
            continue;
        };
        let rhs = Matrix::from_elem(size, 1, 1.0);
        group.bench_with_input(BenchmarkId::new("solve", size), &size, |b, _| {
            b.iter(|| {
                let mut x = rhs.clone();
                h.solve(&f, &mut x)
            });
        });
        group.bench_with_input(BenchmarkId::new("apply", size), &size, |b, _| {
            b.iter(|| h.apply(&rhs));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compress, bench_factor_solve);
criterion_main!(benches);
