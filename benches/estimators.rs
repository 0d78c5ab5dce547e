//! Benchmarks for the sigma-clipping + estimator pipelines.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array2;

use skyglow::{
    Background, BackgroundEstimator, BackgroundRms, MaskedArray, NoiseEstimator, SigmaClip,
};

/// Deterministic pseudo-noise frame with a few bright pixels, no RNG crate
/// needed in the hot path.
fn synthetic_frame(width: usize, height: usize) -> Array2<f64> {
    let mut state = 0x9e3779b97f4a7c15_u64;
    Array2::from_shape_simple_fn((height, width), move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let uniform = (state >> 11) as f64 / (1u64 << 53) as f64;
        let value = 100.0 + 5.0 * (uniform - 0.5);
        // sprinkle outliers
        if state % 199 == 0 {
            value + 500.0
        } else {
            value
        }
    })
}

fn bench_background(c: &mut Criterion) {
    let sample = MaskedArray::from(synthetic_frame(256, 256));
    let mut group = c.benchmark_group("background_256x256");

    let cases = [
        ("mean", BackgroundEstimator::Mean),
        ("median", BackgroundEstimator::Median),
        ("mmm", BackgroundEstimator::mmm()),
        ("sextractor", BackgroundEstimator::SExtractor),
        ("biweight_location", BackgroundEstimator::biweight_location()),
    ];
    for (name, estimator) in cases {
        let bkg = Background::new(estimator, SigmaClip::default()).unwrap();
        group.bench_function(name, |b| {
            b.iter(|| bkg.estimate(black_box(&sample), None).unwrap())
        });
    }
    group.finish();
}

fn bench_background_rms(c: &mut Criterion) {
    let sample = MaskedArray::from(synthetic_frame(256, 256));
    let mut group = c.benchmark_group("background_rms_256x256");

    let cases = [
        ("std", NoiseEstimator::Std),
        ("mad_std", NoiseEstimator::MadStd),
        ("biweight_midvariance", NoiseEstimator::biweight_midvariance()),
    ];
    for (name, estimator) in cases {
        let rms = BackgroundRms::new(estimator, SigmaClip::default()).unwrap();
        group.bench_function(name, |b| {
            b.iter(|| rms.estimate(black_box(&sample), None).unwrap())
        });
    }
    group.finish();
}

fn bench_axis_reduction(c: &mut Criterion) {
    let sample = MaskedArray::from(synthetic_frame(256, 256));
    let bkg = Background::new(BackgroundEstimator::Median, SigmaClip::default()).unwrap();
    c.bench_function("median_background_per_row_256", |b| {
        b.iter(|| bkg.estimate(black_box(&sample), Some(1)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_background,
    bench_background_rms,
    bench_axis_reduction
);
criterion_main!(benches);
