//! Iterative sigma-clipping outlier rejection.
//!
//! [`SigmaClip`] is an immutable clip configuration plus the clipping
//! operation itself: given a [`MaskedArray`], it repeatedly computes the
//! median and population standard deviation of the currently-valid elements
//! and masks everything outside `[center - sigma_lower * spread,
//! center + sigma_upper * spread]`, until an iteration masks nothing new or
//! the iteration cap is reached. With an axis selector each 1-D lane along
//! that axis is clipped independently; lanes never influence each other's
//! convergence.
//!
//! The input array is never mutated; clipping returns a new array whose mask
//! is the union of the input mask and the rejected elements.

use log::{debug, trace};
use ndarray::{ArrayView1, ArrayViewMut1, Axis, Zip};
use serde::{Deserialize, Serialize};

use crate::masked::{Estimate, MaskedArray};
use crate::stats;
use crate::{Result, SkyglowError};

/// Sigma-clipping configuration.
///
/// Immutable after construction and safe to share across concurrent calls.
/// `sigma_lower` / `sigma_upper` inherit `sigma` when unset; both are always
/// honored, with no symmetric-only fallback path.
///
/// ```
/// use skyglow::{MaskedArray, SigmaClip};
///
/// let mut data: Vec<f64> = (0..20).map(f64::from).collect();
/// data.push(1.0e4);
/// let sample = MaskedArray::from(data);
///
/// let clip = SigmaClip::new(3.0).unwrap();
/// let clipped = clip.clip(&sample, None).unwrap();
/// assert_eq!(clipped.n_masked(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigmaClip {
    enabled: bool,
    sigma: f64,
    sigma_lower: Option<f64>,
    sigma_upper: Option<f64>,
    max_iters: Option<usize>,
}

impl Default for SigmaClip {
    /// Enabled, symmetric 3-sigma bounds, at most 5 iterations.
    fn default() -> Self {
        SigmaClip {
            enabled: true,
            sigma: 3.0,
            sigma_lower: None,
            sigma_upper: None,
            max_iters: Some(5),
        }
    }
}

fn validate_threshold(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(SkyglowError::Configuration(format!(
            "{name} must be a positive finite number, got {value}"
        )));
    }
    Ok(())
}

impl SigmaClip {
    /// Symmetric clipping at `sigma` standard deviations.
    pub fn new(sigma: f64) -> Result<Self> {
        validate_threshold("sigma", sigma)?;
        Ok(SigmaClip {
            sigma,
            ..SigmaClip::default()
        })
    }

    /// Asymmetric clipping with separate lower/upper thresholds.
    pub fn asymmetric(sigma_lower: f64, sigma_upper: f64) -> Result<Self> {
        validate_threshold("sigma_lower", sigma_lower)?;
        validate_threshold("sigma_upper", sigma_upper)?;
        Ok(SigmaClip {
            sigma_lower: Some(sigma_lower),
            sigma_upper: Some(sigma_upper),
            ..SigmaClip::default()
        })
    }

    /// A configuration that performs no clipping at all: `clip` returns the
    /// sample unchanged, mask included.
    pub fn disabled() -> Self {
        SigmaClip {
            enabled: false,
            ..SigmaClip::default()
        }
    }

    /// Set the iteration cap. `Some(0)` performs no clipping passes;
    /// `None` iterates until convergence.
    pub fn with_max_iters(mut self, max_iters: Option<usize>) -> Self {
        self.max_iters = max_iters;
        self
    }

    /// Whether clipping is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The symmetric threshold.
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// The lower threshold actually applied (inherits `sigma` when unset).
    pub fn sigma_lower(&self) -> f64 {
        self.sigma_lower.unwrap_or(self.sigma)
    }

    /// The upper threshold actually applied (inherits `sigma` when unset).
    pub fn sigma_upper(&self) -> f64 {
        self.sigma_upper.unwrap_or(self.sigma)
    }

    /// The iteration cap, `None` meaning until convergence.
    pub fn max_iters(&self) -> Option<usize> {
        self.max_iters
    }

    /// Clip `sample`, returning a new array with additionally-masked
    /// outliers. `axis = None` clips against whole-array statistics;
    /// `axis = Some(ax)` clips each lane along `ax` independently.
    pub fn clip(&self, sample: &MaskedArray, axis: Option<usize>) -> Result<MaskedArray> {
        if let Some(ax) = axis {
            sample.check_axis(ax)?;
        }
        if !self.enabled {
            return Ok(sample.clone());
        }

        let lower_k = self.sigma_lower();
        let upper_k = self.sigma_upper();
        let max_iters = self.max_iters;

        let mut out = sample.clone();
        let mut scratch = Vec::new();
        let mut total_masked = 0usize;
        let mut max_iterations_seen = 0usize;

        match axis {
            None => {
                let n = out.len();
                let (data, mask) = out.parts_mut();
                // Standard layout is a MaskedArray construction invariant
                let data_flat = data.view().into_shape(n).expect("standard layout");
                let mask_flat = mask.view_mut().into_shape(n).expect("standard layout");
                let report =
                    clip_lane(data_flat, mask_flat, lower_k, upper_k, max_iters, &mut scratch);
                total_masked = report.masked;
                max_iterations_seen = report.iterations;
            }
            Some(ax) => {
                let (data, mask) = out.parts_mut();
                Zip::from(data.lanes(Axis(ax)))
                    .and(mask.lanes_mut(Axis(ax)))
                    .for_each(|values, lane_mask| {
                        let report = clip_lane(
                            values,
                            lane_mask,
                            lower_k,
                            upper_k,
                            max_iters,
                            &mut scratch,
                        );
                        total_masked += report.masked;
                        max_iterations_seen = max_iterations_seen.max(report.iterations);
                    });
            }
        }

        debug!(
            "sigma clip masked {} of {} elements in {} iteration(s)",
            total_masked,
            out.len(),
            max_iterations_seen
        );
        Ok(out)
    }
}

struct LaneReport {
    iterations: usize,
    masked: usize,
}

/// Clip one lane in place. Stops when an iteration masks nothing new, the
/// iteration cap is hit, the spread degenerates to zero, or the lane runs
/// out of valid elements.
fn clip_lane(
    data: ArrayView1<'_, f64>,
    mut mask: ArrayViewMut1<'_, bool>,
    lower_k: f64,
    upper_k: f64,
    max_iters: Option<usize>,
    scratch: &mut Vec<f64>,
) -> LaneReport {
    let mut iterations = 0usize;
    let mut masked = 0usize;

    loop {
        if let Some(cap) = max_iters {
            if iterations >= cap {
                break;
            }
        }

        scratch.clear();
        scratch.extend(
            data.iter()
                .zip(mask.iter())
                .filter(|&(_, &m)| !m)
                .map(|(&v, _)| v),
        );
        if scratch.is_empty() {
            break;
        }

        let center = stats::median(scratch);
        let spread = stats::population_std(scratch);
        // A zero-spread lane is already converged; nothing lies outside
        // [center, center] and the bounds would collapse
        if spread == 0.0 {
            break;
        }

        let lower = center - lower_k * spread;
        let upper = center + upper_k * spread;

        let mut newly_masked = 0usize;
        for (&value, m) in data.iter().zip(mask.iter_mut()) {
            if !*m && (value < lower || value > upper) {
                *m = true;
                newly_masked += 1;
            }
        }

        iterations += 1;
        masked += newly_masked;
        trace!("clip iteration {iterations}: masked {newly_masked} new element(s)");

        if newly_masked == 0 {
            break;
        }
    }

    LaneReport { iterations, masked }
}

/// Sigma-clipped (mean, median, standard deviation) of a sample in one call.
///
/// Convenience wrapper for quick-look statistics: clips once, then reduces
/// the clipped sample three ways.
pub fn sigma_clipped_stats(
    sample: &MaskedArray,
    axis: Option<usize>,
    clip: &SigmaClip,
) -> Result<(Estimate, Estimate, Estimate)> {
    let clipped = clip.clip(sample, axis)?;
    Ok((
        clipped.mean(axis)?,
        clipped.median(axis)?,
        clipped.std(axis)?,
    ))
}
