//! Robust statistic kernels on plain `f64` slices.
//!
//! These are the scalar building blocks the estimators apply to the valid
//! elements of each reduction lane: median, MAD, population moments and
//! Tukey's biweight M-estimators. Callers guarantee the slices are free of
//! NaN/inf ([`crate::MaskedArray`] folds non-finite entries into its mask).

/// MAD (Median Absolute Deviation) to standard deviation conversion factor.
///
/// For a normal distribution, sigma = 1.4826 x MAD. The constant is
/// 1 / inverse-normal-CDF(3/4), fixed here rather than derived at runtime.
pub const MAD_TO_SIGMA: f64 = 1.4826;

/// Calculate the median in-place (partial sort via quickselect).
///
/// Exact even-length handling: averages the two middle elements.
/// Returns NaN for an empty slice.
pub fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }

    let len = values.len();
    let mid = len / 2;

    if len % 2 == 1 {
        let (_, m, _) = values.select_nth_unstable_by(mid, |a, b| a.partial_cmp(b).unwrap());
        *m
    } else {
        let (left, upper, _) = values.select_nth_unstable_by(mid, |a, b| a.partial_cmp(b).unwrap());
        let hi = *upper;
        let lo = left.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        0.5 * (lo + hi)
    }
}

/// Arithmetic mean. NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (ddof = 0). NaN for an empty slice.
pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mu = mean(values);
    values.iter().map(|&x| (x - mu) * (x - mu)).sum::<f64>() / values.len() as f64
}

/// Population standard deviation (ddof = 0). NaN for an empty slice.
pub fn population_std(values: &[f64]) -> f64 {
    population_variance(values).sqrt()
}

/// Median absolute deviation about a given center.
fn mad_about(values: &[f64], center: f64) -> f64 {
    let mut devs: Vec<f64> = values.iter().map(|&v| (v - center).abs()).collect();
    median(&mut devs)
}

/// MAD = median(|x_i - median(x)|). NaN for an empty slice.
pub fn mad(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut scratch = values.to_vec();
    let center = median(&mut scratch);
    mad_about(values, center)
}

/// MAD-based estimate of the standard deviation: [`MAD_TO_SIGMA`] x MAD.
pub fn mad_std(values: &[f64]) -> f64 {
    MAD_TO_SIGMA * mad(values)
}

/// Tukey's biweight location: an iteratively reweighted estimate of central
/// tendency.
///
/// `m` is the initial location guess; when `None` it is the sample median,
/// computed from the data at call time. `c` is the tuning constant that sets
/// the down-weighting radius in units of MAD-scaled distance from `m`.
/// Points with |u| >= 1, u = (x - m) / (c * MAD), receive zero weight; the
/// rest are weighted by (1 - u^2)^2.
///
/// A MAD of zero (constant sample) returns `m` directly.
pub fn biweight_location(values: &[f64], c: f64, m: Option<f64>) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }

    let mut scratch = values.to_vec();
    let sample_median = median(&mut scratch);
    let m0 = m.unwrap_or(sample_median);

    let mad = mad_about(values, sample_median);
    if mad == 0.0 {
        return m0;
    }

    let scale = c * mad;
    let mut num = 0.0;
    let mut den = 0.0;
    for &x in values {
        let d = x - m0;
        let u = d / scale;
        if u.abs() >= 1.0 {
            continue;
        }
        let w = (1.0 - u * u) * (1.0 - u * u);
        num += d * w;
        den += w;
    }

    if den == 0.0 {
        return m0;
    }
    m0 + num / den
}

/// Tukey's biweight midvariance, returned as a dispersion (the square root
/// of the midvariance, in the same units as the data).
///
/// With d = x - m and u = d / (c * MAD), summing over points with |u| < 1:
///
/// sqrt(n) * sqrt(sum(d^2 (1 - u^2)^4)) / |sum((1 - u^2)(1 - 5 u^2))|
///
/// where n counts the included points. `m` defaults to the sample median at
/// call time. A MAD of zero (constant sample) yields 0.0.
pub fn biweight_midvariance(values: &[f64], c: f64, m: Option<f64>) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }

    let mut scratch = values.to_vec();
    let sample_median = median(&mut scratch);
    let m0 = m.unwrap_or(sample_median);

    let mad = mad_about(values, sample_median);
    if mad == 0.0 {
        return 0.0;
    }

    let scale = c * mad;
    let mut n_in = 0usize;
    let mut f1 = 0.0;
    let mut f2 = 0.0;
    for &x in values {
        let d = x - m0;
        let u = d / scale;
        let u2 = u * u;
        if u.abs() < 1.0 {
            n_in += 1;
            let r = 1.0 - u2;
            f1 += d * d * r * r * r * r;
            f2 += r * (1.0 - 5.0 * u2);
        }
    }

    if n_in == 0 || f2 == 0.0 {
        return f64::NAN;
    }
    (n_in as f64).sqrt() * f1.sqrt() / f2.abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn range100() -> Vec<f64> {
        (0..100).map(f64::from).collect()
    }

    #[test]
    fn test_median_odd() {
        let mut values = [5.0, 3.0, 1.0, 4.0, 2.0];
        assert_eq!(median(&mut values), 3.0);
    }

    #[test]
    fn test_median_even() {
        let mut values = [5.0, 3.0, 1.0, 4.0, 2.0, 6.0];
        assert_eq!(median(&mut values), 3.5);
    }

    #[test]
    fn test_median_single() {
        let mut values = [42.0];
        assert_eq!(median(&mut values), 42.0);
    }

    #[test]
    fn test_median_empty() {
        let mut values: [f64; 0] = [];
        assert!(median(&mut values).is_nan());
    }

    #[test]
    fn test_population_std_range() {
        // sqrt((100^2 - 1) / 12) for the discrete uniform 0..99
        assert_relative_eq!(
            population_std(&range100()),
            28.86607004772212,
            epsilon = 1e-10
        );
    }

    #[test]
    fn test_mad_range() {
        assert_relative_eq!(mad(&range100()), 25.0, epsilon = 1e-12);
        assert_relative_eq!(mad_std(&range100()), 37.065, epsilon = 1e-9);
    }

    #[test]
    fn test_mad_constant() {
        let values = [7.0; 10];
        assert_eq!(mad(&values), 0.0);
        assert_eq!(mad_std(&values), 0.0);
    }

    #[test]
    fn test_biweight_location_symmetric() {
        // Symmetric data: the weighted correction sums to zero
        assert_relative_eq!(biweight_location(&range100(), 6.0, None), 49.5, epsilon = 1e-9);
    }

    #[test]
    fn test_biweight_location_constant_sample() {
        assert_eq!(biweight_location(&[3.0; 8], 6.0, None), 3.0);
        // Caller-supplied M wins over the median when MAD degenerates
        assert_eq!(biweight_location(&[3.0; 8], 6.0, Some(5.0)), 5.0);
    }

    #[test]
    fn test_biweight_location_resists_outlier() {
        let mut values = range100();
        values.push(1.0e6);
        let loc = biweight_location(&values, 6.0, None);
        assert!((loc - 50.0).abs() < 1.0, "location {loc} dragged by outlier");
    }

    #[test]
    fn test_biweight_midvariance_range() {
        assert_relative_eq!(
            biweight_midvariance(&range100(), 9.0, None),
            30.0943384858934,
            epsilon = 1e-10
        );
    }

    #[test]
    fn test_biweight_midvariance_constant_sample() {
        assert_eq!(biweight_midvariance(&[1.5; 20], 9.0, None), 0.0);
    }
}
