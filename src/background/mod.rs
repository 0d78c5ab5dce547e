//! Background value and background noise estimator strategies.
//!
//! Two closed families of robust statistics, each composed with a
//! [`SigmaClip`] it delegates to before reducing:
//!
//! - [`BackgroundEstimator`] picks the statistic a [`Background`] applies to
//!   estimate the background *level* (mean, median, mode estimators, the
//!   DAOPHOT MMM convention, the SExtractor branch rule, Tukey's biweight
//!   location).
//! - [`NoiseEstimator`] picks the statistic a [`BackgroundRms`] applies to
//!   estimate the background *noise* (standard deviation, MAD-based standard
//!   deviation, Tukey's biweight midvariance).
//!
//! Every pipeline is invoked through one entry point, `estimate(sample,
//! axis)`, directly or via the [`Estimator`] trait; `axis = None` yields a
//! single scalar, `axis = Some(ax)` one scalar per lane along `ax`. Tuning
//! constants are validated when the pipeline is built, before any data is
//! touched.

use serde::{Deserialize, Serialize};

use crate::masked::{Estimate, MaskedArray};
use crate::sigclip::SigmaClip;
use crate::stats;
use crate::{Result, SkyglowError};

/// Default biweight-location tuning constant.
const BIWEIGHT_LOCATION_C: f64 = 6.0;
/// Default biweight-midvariance tuning constant. Not shared with the
/// location default.
const BIWEIGHT_MIDVARIANCE_C: f64 = 9.0;

/// Common entry point shared by [`Background`] and [`BackgroundRms`], so a
/// pipeline of either family can be invoked uniformly (through generics or a
/// trait object) with identical semantics to the inherent method.
pub trait Estimator {
    /// Estimate the statistic of `sample`, globally (`axis = None`) or per
    /// lane along an axis.
    fn estimate(&self, sample: &MaskedArray, axis: Option<usize>) -> Result<Estimate>;
}

/// Strategy for estimating the background level of a clipped sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BackgroundEstimator {
    /// Arithmetic mean.
    Mean,
    /// Median.
    Median,
    /// Mode estimate of the form
    /// `median_factor * median - mean_factor * mean`, valid for unimodal,
    /// mildly skewed distributions.
    ModeEstimator { median_factor: f64, mean_factor: f64 },
    /// The SExtractor rule: `2.5 * median - 1.5 * mean` when the clipped
    /// distribution is nearly symmetric (`|mean - median| / std < 0.3`),
    /// otherwise the median alone; a zero standard deviation falls back to
    /// the mean.
    SExtractor,
    /// Tukey's biweight location with tuning constant `c` and optional
    /// initial guess `m` (the sample median when `None`).
    BiweightLocation { c: f64, m: Option<f64> },
}

impl BackgroundEstimator {
    /// The DAOPHOT MMM convention: a fixed mode estimator
    /// `3 * median - 2 * mean`.
    pub fn mmm() -> Self {
        BackgroundEstimator::ModeEstimator {
            median_factor: 3.0,
            mean_factor: 2.0,
        }
    }

    /// Biweight location with the default tuning constant `c = 6.0`.
    pub fn biweight_location() -> Self {
        BackgroundEstimator::BiweightLocation {
            c: BIWEIGHT_LOCATION_C,
            m: None,
        }
    }

    fn validate(&self) -> Result<()> {
        match *self {
            BackgroundEstimator::Mean
            | BackgroundEstimator::Median
            | BackgroundEstimator::SExtractor => Ok(()),
            BackgroundEstimator::ModeEstimator {
                median_factor,
                mean_factor,
            } => {
                if !median_factor.is_finite() || !mean_factor.is_finite() {
                    return Err(SkyglowError::Configuration(format!(
                        "Mode estimator factors must be finite, got ({median_factor}, {mean_factor})"
                    )));
                }
                Ok(())
            }
            BackgroundEstimator::BiweightLocation { c, m } => validate_biweight(c, m),
        }
    }

    /// Apply the statistic to the valid elements of one lane.
    fn apply(&self, values: &mut [f64]) -> f64 {
        match *self {
            BackgroundEstimator::Mean => stats::mean(values),
            BackgroundEstimator::Median => stats::median(values),
            BackgroundEstimator::ModeEstimator {
                median_factor,
                mean_factor,
            } => median_factor * stats::median(values) - mean_factor * stats::mean(values),
            BackgroundEstimator::SExtractor => {
                let median = stats::median(values);
                let mean = stats::mean(values);
                let std = stats::population_std(values);
                if std == 0.0 {
                    mean
                } else if (mean - median).abs() / std < 0.3 {
                    2.5 * median - 1.5 * mean
                } else {
                    median
                }
            }
            BackgroundEstimator::BiweightLocation { c, m } => {
                stats::biweight_location(values, c, m)
            }
        }
    }
}

/// Strategy for estimating the background noise of a clipped sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NoiseEstimator {
    /// Population standard deviation.
    Std,
    /// MAD-based standard deviation, `1.4826 * MAD`.
    MadStd,
    /// Tukey's biweight midvariance with tuning constant `c` and optional
    /// initial guess `m` (the sample median when `None`).
    BiweightMidvariance { c: f64, m: Option<f64> },
}

impl NoiseEstimator {
    /// Biweight midvariance with the default tuning constant `c = 9.0`.
    pub fn biweight_midvariance() -> Self {
        NoiseEstimator::BiweightMidvariance {
            c: BIWEIGHT_MIDVARIANCE_C,
            m: None,
        }
    }

    fn validate(&self) -> Result<()> {
        match *self {
            NoiseEstimator::Std | NoiseEstimator::MadStd => Ok(()),
            NoiseEstimator::BiweightMidvariance { c, m } => validate_biweight(c, m),
        }
    }

    fn apply(&self, values: &mut [f64]) -> f64 {
        match *self {
            NoiseEstimator::Std => stats::population_std(values),
            NoiseEstimator::MadStd => stats::mad_std(values),
            NoiseEstimator::BiweightMidvariance { c, m } => {
                stats::biweight_midvariance(values, c, m)
            }
        }
    }
}

fn validate_biweight(c: f64, m: Option<f64>) -> Result<()> {
    if !c.is_finite() || c <= 0.0 {
        return Err(SkyglowError::Configuration(format!(
            "Biweight tuning constant c must be positive and finite, got {c}"
        )));
    }
    if let Some(m) = m {
        if !m.is_finite() {
            return Err(SkyglowError::Configuration(format!(
                "Biweight initial guess M must be finite, got {m}"
            )));
        }
    }
    Ok(())
}

/// A background-level pipeline: one [`SigmaClip`] composed with one
/// [`BackgroundEstimator`].
///
/// ```
/// use skyglow::{Background, BackgroundEstimator, MaskedArray, SigmaClip};
///
/// let sample = MaskedArray::from((0..100).map(f64::from).collect::<Vec<_>>());
/// let bkg = Background::new(BackgroundEstimator::mmm(), SigmaClip::default()).unwrap();
/// assert_eq!(bkg.estimate(&sample, None).unwrap().scalar(), Some(49.5));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Background {
    clip: SigmaClip,
    estimator: BackgroundEstimator,
}

impl Background {
    /// Build the pipeline, rejecting invalid tuning constants up front.
    pub fn new(estimator: BackgroundEstimator, clip: SigmaClip) -> Result<Self> {
        estimator.validate()?;
        Ok(Background { clip, estimator })
    }

    /// The clip configuration this pipeline applies first.
    pub fn clip(&self) -> &SigmaClip {
        &self.clip
    }

    /// The statistic this pipeline applies to the clipped sample.
    pub fn estimator(&self) -> &BackgroundEstimator {
        &self.estimator
    }

    /// Estimate the background level of `sample`: sigma-clip, then reduce.
    pub fn estimate(&self, sample: &MaskedArray, axis: Option<usize>) -> Result<Estimate> {
        let clipped = self.clip.clip(sample, axis)?;
        clipped.reduce(axis, |values| self.estimator.apply(values))
    }
}

impl Estimator for Background {
    fn estimate(&self, sample: &MaskedArray, axis: Option<usize>) -> Result<Estimate> {
        Background::estimate(self, sample, axis)
    }
}

/// A background-noise pipeline: one [`SigmaClip`] composed with one
/// [`NoiseEstimator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundRms {
    clip: SigmaClip,
    estimator: NoiseEstimator,
}

impl BackgroundRms {
    /// Build the pipeline, rejecting invalid tuning constants up front.
    pub fn new(estimator: NoiseEstimator, clip: SigmaClip) -> Result<Self> {
        estimator.validate()?;
        Ok(BackgroundRms { clip, estimator })
    }

    /// The clip configuration this pipeline applies first.
    pub fn clip(&self) -> &SigmaClip {
        &self.clip
    }

    /// The statistic this pipeline applies to the clipped sample.
    pub fn estimator(&self) -> &NoiseEstimator {
        &self.estimator
    }

    /// Estimate the background noise of `sample`: sigma-clip, then reduce.
    pub fn estimate(&self, sample: &MaskedArray, axis: Option<usize>) -> Result<Estimate> {
        let clipped = self.clip.clip(sample, axis)?;
        clipped.reduce(axis, |values| self.estimator.apply(values))
    }
}

impl Estimator for BackgroundRms {
    fn estimate(&self, sample: &MaskedArray, axis: Option<usize>) -> Result<Estimate> {
        BackgroundRms::estimate(self, sample, axis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn range100() -> MaskedArray {
        MaskedArray::from((0..100).map(f64::from).collect::<Vec<_>>())
    }

    #[test]
    fn test_invalid_tuning_rejected_at_construction() {
        assert!(matches!(
            Background::new(
                BackgroundEstimator::BiweightLocation { c: -1.0, m: None },
                SigmaClip::default()
            ),
            Err(SkyglowError::Configuration(_))
        ));
        assert!(matches!(
            BackgroundRms::new(
                NoiseEstimator::BiweightMidvariance {
                    c: 9.0,
                    m: Some(f64::INFINITY)
                },
                SigmaClip::default()
            ),
            Err(SkyglowError::Configuration(_))
        ));
        assert!(matches!(
            Background::new(
                BackgroundEstimator::ModeEstimator {
                    median_factor: f64::NAN,
                    mean_factor: 2.0
                },
                SigmaClip::default()
            ),
            Err(SkyglowError::Configuration(_))
        ));
    }

    #[test]
    fn test_mmm_is_fixed_mode_estimator() {
        assert_eq!(
            BackgroundEstimator::mmm(),
            BackgroundEstimator::ModeEstimator {
                median_factor: 3.0,
                mean_factor: 2.0
            }
        );
    }

    #[test]
    fn test_biweight_defaults_are_distinct() {
        let loc = BackgroundEstimator::biweight_location();
        let mv = NoiseEstimator::biweight_midvariance();
        assert_eq!(loc, BackgroundEstimator::BiweightLocation { c: 6.0, m: None });
        assert_eq!(mv, NoiseEstimator::BiweightMidvariance { c: 9.0, m: None });
    }

    #[test]
    fn test_value_estimators_on_uniform_range() {
        for estimator in [
            BackgroundEstimator::Mean,
            BackgroundEstimator::Median,
            BackgroundEstimator::mmm(),
            BackgroundEstimator::SExtractor,
            BackgroundEstimator::biweight_location(),
        ] {
            let bkg = Background::new(estimator, SigmaClip::default()).unwrap();
            let value = bkg.estimate(&range100(), None).unwrap().scalar().unwrap();
            assert_relative_eq!(value, 49.5, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_sextractor_skewed_falls_back_to_median() {
        // |mean - median| / std >= 0.3 for this sample, so the branch picks
        // the median over the mode-like blend
        let mut values = vec![1.0; 10];
        values.extend([2.0, 3.0, 4.0, 20.0, 30.0, 40.0]);
        let sample = MaskedArray::from(values);
        let bkg = Background::new(BackgroundEstimator::SExtractor, SigmaClip::disabled()).unwrap();
        assert_eq!(bkg.estimate(&sample, None).unwrap().scalar(), Some(1.0));
    }

    #[test]
    fn test_sextractor_zero_spread_returns_mean() {
        let sample = MaskedArray::from(vec![4.0; 16]);
        let bkg = Background::new(BackgroundEstimator::SExtractor, SigmaClip::default()).unwrap();
        assert_eq!(bkg.estimate(&sample, None).unwrap().scalar(), Some(4.0));
    }

    #[test]
    fn test_noise_estimators_on_uniform_range() {
        let cases = [
            (NoiseEstimator::Std, 28.86607004772212),
            (NoiseEstimator::MadStd, 37.065),
            (NoiseEstimator::biweight_midvariance(), 30.0943384858934),
        ];
        for (estimator, expected) in cases {
            let rms = BackgroundRms::new(estimator, SigmaClip::default()).unwrap();
            let value = rms.estimate(&range100(), None).unwrap().scalar().unwrap();
            assert_relative_eq!(value, expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_trait_object_dispatch_matches_inherent() {
        let bkg = Background::new(BackgroundEstimator::Median, SigmaClip::default()).unwrap();
        let via_trait: &dyn Estimator = &bkg;
        let sample = range100();
        assert_eq!(
            via_trait.estimate(&sample, None).unwrap(),
            bkg.estimate(&sample, None).unwrap()
        );
    }
}
