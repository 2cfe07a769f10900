use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array1;
use tncore::prelude::*;

/// Benchmark a full logistic regression fit on 20 000 samples with 10 features
fn benchmark_fit_logistic(c: &mut Criterion) {
    let data = synthetic::classification(20_000, 10, true, 22).unwrap();
    let mut settings = Settings::new();
    settings.model.l2 = 1.0;

    c.bench_function("fit_logistic", |b| {
        b.iter(|| {
            let _ = fit_logistic(
                black_box(data.features.view()),
                black_box(data.labels.view()),
                &settings,
            );
        });
    });
}

/// Benchmark a single Hessian-vector product of the logistic loss
fn benchmark_hessian_product(c: &mut Criterion) {
    let data = synthetic::classification(20_000, 10, true, 22).unwrap();
    let mut loss = LogisticLoss::new(data.features.view(), data.labels.view(), 1.0, true).unwrap();
    loss.update(Array1::from_elem(11, 0.1).view(), true).unwrap();
    let v = Array1::from_elem(11, 1.0);
    let mut out = Array1::zeros(11);

    c.bench_function("logistic_hessian_product", |b| {
        b.iter(|| {
            let hessian = loss.hessian_product().unwrap();
            hessian.apply(black_box(v.view()), out.view_mut());
        });
    });
}

/// Benchmark the chunked dot product on a vector spanning many chunks
fn benchmark_dot(c: &mut Criterion) {
    let a = Array1::from_shape_fn(1 << 20, |i| (i as f64).sin());
    let b = Array1::from_shape_fn(1 << 20, |i| (i as f64).cos());

    c.bench_function("dot", |bench| {
        bench.iter(|| linalg::dot(black_box(&a), black_box(&b)));
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(std::time::Duration::from_secs(10)) // Measure for 10 seconds
        .noise_threshold(0.10); // Performance changes less than 10% will be ignored
    targets = benchmark_fit_logistic, benchmark_hessian_product, benchmark_dot
}
criterion_main!(benches);
