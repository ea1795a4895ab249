use abcd_fit::curve::{self, CurveModel, ExpFall, FitOptions};
use abcd_fit::{fit_weighted, fit_weighted_2d};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn sideband_points() -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let x = vec![1.0, 3.5, 7.0, 11.5, 17.0, 23.5, 33.5];
    let y: Vec<f64> = x.iter().map(|&v| 0.9 - 0.012 * v + 0.0001 * v * v).collect();
    let var = x.iter().map(|&v| 1e-4 * (1.0 + 0.05 * v)).collect();
    (x, y, var)
}

fn bench_poly(c: &mut Criterion) {
    let (x, y, var) = sideband_points();
    let mut group = c.benchmark_group("poly");
    group.bench_function("fit_weighted_order2", |b| {
        b.iter(|| fit_weighted(black_box(&x), black_box(&y), black_box(&var), 2).unwrap())
    });

    let mut xs = Vec::new();
    let mut zs = Vec::new();
    let mut ys = Vec::new();
    let mut vs = Vec::new();
    for pt in [28.0, 31.0, 34.0, 38.0, 43.0, 50.0] {
        for (xi, (yi, vi)) in x.iter().zip(y.iter().zip(&var)) {
            xs.push(*xi);
            zs.push(pt);
            ys.push(yi * (1.0 + 0.002 * pt));
            vs.push(*vi);
        }
    }
    group.bench_function("fit_weighted_2d_smoothing", |b| {
        b.iter(|| {
            fit_weighted_2d(black_box(&xs), black_box(&zs), black_box(&ys), &vs, 2, &[2, 1, 0])
                .unwrap()
        })
    });
    group.finish();
}

fn bench_curve(c: &mut Criterion) {
    let x: Vec<f64> = (0..30).map(|i| 26.5 + i as f64).collect();
    let y: Vec<f64> = x.iter().map(|&v| ExpFall.eval(v, &[5000.0, 0.1, 20.0])).collect();
    let sigma: Vec<f64> = y.iter().map(|v| v.sqrt()).collect();
    let p0 = ExpFall::initial_guess(&y);
    let opts = FitOptions::default();

    c.bench_function("exp_fall_lm", |b| {
        b.iter(|| curve::fit(&ExpFall, black_box(&x), black_box(&y), &sigma, &p0, &opts).unwrap())
    });
}

criterion_group!(benches, bench_poly, bench_curve);
criterion_main!(benches);
