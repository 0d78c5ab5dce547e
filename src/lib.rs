//! Skyglow: robust background and noise estimation for detector images
//!
//! This crate estimates a scalar "background level" and a scalar "background
//! noise" for an array of measurements (for example the pixel values of an
//! imaging detector), robust to outliers such as stars or cosmic rays
//! embedded in the background. It is inspired by the background machinery of
//! Python's photutils.
//!
//! The engine has two composable halves:
//!
//! - [`SigmaClip`]: iterative sigma-clipping outlier rejection that expands
//!   the validity mask of a [`MaskedArray`], either globally or independently
//!   along one array axis.
//! - [`Background`] / [`BackgroundRms`]: interchangeable estimator strategies
//!   ([`BackgroundEstimator`], [`NoiseEstimator`]) that consume the clipped
//!   sample and apply a robust statistic (mean, median, mode estimators,
//!   biweight M-estimators, MAD-based standard deviation).
//!
//! ```
//! use skyglow::{Background, BackgroundEstimator, MaskedArray, SigmaClip};
//!
//! let data: Vec<f64> = (0..100).map(f64::from).collect();
//! let sample = MaskedArray::from(data);
//! let bkg = Background::new(BackgroundEstimator::Median, SigmaClip::default()).unwrap();
//! assert_eq!(bkg.estimate(&sample, None).unwrap().scalar(), Some(49.5));
//! ```

use thiserror::Error;

pub mod background;
pub mod masked;
pub mod sigclip;
pub mod stats;

// Re-export commonly used types
pub use background::{Background, BackgroundEstimator, BackgroundRms, Estimator, NoiseEstimator};
pub use masked::{Estimate, MaskedArray};
pub use sigclip::{sigma_clipped_stats, SigmaClip};
pub use stats::MAD_TO_SIGMA;

/// Main error type for the skyglow library
#[derive(Debug, Error)]
pub enum SkyglowError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Shape mismatch: data has shape {data:?} but mask has shape {mask:?}")]
    ShapeMismatch { data: Vec<usize>, mask: Vec<usize> },

    #[error("Axis {axis} is out of bounds for an array of dimension {ndim}")]
    InvalidAxis { axis: usize, ndim: usize },
}

/// Result type for skyglow operations
pub type Result<T> = std::result::Result<T, SkyglowError>;
