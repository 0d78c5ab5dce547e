//! Masked n-dimensional sample arrays and axis-aware reductions.
//!
//! [`MaskedArray`] pairs an `ndarray` data array with a boolean validity
//! mask (`true` = invalid) and provides the reductions the estimators need:
//! mean, median, standard deviation and variance that ignore masked entries,
//! either over the whole array or independently along one axis.
//!
//! Invariants:
//! - masked elements never contribute to any reduction;
//! - non-finite data values are folded into the mask at construction, so
//!   every reduction lane operates on finite numbers only;
//! - reductions never mutate the array, and a fully-masked lane reduces to
//!   NaN rather than panicking.

use ndarray::{Array1, Array2, ArrayD, Axis, IxDyn, Zip};

use crate::stats;
use crate::{Result, SkyglowError};

/// The result of reducing a [`MaskedArray`]: one scalar for a whole-array
/// reduction (`axis = None`), or one scalar per lane with the reduced axis
/// removed (`axis = Some(ax)`).
#[derive(Debug, Clone, PartialEq)]
pub enum Estimate {
    /// Whole-array reduction result.
    Scalar(f64),
    /// Axis-wise reduction result, shaped like the input with the reduced
    /// axis removed.
    PerLane(ArrayD<f64>),
}

impl Estimate {
    /// The scalar value, if this is a whole-array result.
    pub fn scalar(&self) -> Option<f64> {
        match self {
            Estimate::Scalar(v) => Some(*v),
            Estimate::PerLane(_) => None,
        }
    }

    /// The per-lane array, if this is an axis-wise result.
    pub fn per_lane(&self) -> Option<&ArrayD<f64>> {
        match self {
            Estimate::Scalar(_) => None,
            Estimate::PerLane(a) => Some(a),
        }
    }

    /// Consume the estimate, returning the per-lane array if present.
    pub fn into_per_lane(self) -> Option<ArrayD<f64>> {
        match self {
            Estimate::Scalar(_) => None,
            Estimate::PerLane(a) => Some(a),
        }
    }
}

/// An n-dimensional array of measurements with per-element validity masking.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedArray {
    data: ArrayD<f64>,
    // true = invalid; same shape as data, standard layout
    mask: ArrayD<bool>,
}

impl MaskedArray {
    /// Create a masked array from data and an explicit mask (`true` =
    /// invalid). The shapes must agree. Non-finite data values are added to
    /// the mask.
    pub fn new(data: ArrayD<f64>, mask: ArrayD<bool>) -> Result<Self> {
        if data.shape() != mask.shape() {
            return Err(SkyglowError::ShapeMismatch {
                data: data.shape().to_vec(),
                mask: mask.shape().to_vec(),
            });
        }
        let data = data.as_standard_layout().into_owned();
        let mut mask = mask.as_standard_layout().into_owned();
        Zip::from(&data).and(&mut mask).for_each(|&v, m| {
            if !v.is_finite() {
                *m = true;
            }
        });
        Ok(MaskedArray { data, mask })
    }

    /// Create a masked array with every finite element valid.
    pub fn from_data(data: ArrayD<f64>) -> Self {
        let data = data.as_standard_layout().into_owned();
        let mask = data.mapv(|v| !v.is_finite());
        MaskedArray { data, mask }
    }

    /// The underlying data array.
    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    /// The validity mask (`true` = invalid).
    pub fn mask(&self) -> &ArrayD<bool> {
        &self.mask
    }

    /// Array shape.
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    /// Total number of elements, masked or not.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the array holds no elements at all.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of valid (unmasked) elements.
    pub fn n_valid(&self) -> usize {
        self.mask.iter().filter(|&&m| !m).count()
    }

    /// Number of masked elements.
    pub fn n_masked(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    /// A new array whose mask is the union of this mask and `extra`.
    /// The receiver is left untouched.
    pub fn with_extra_mask(&self, extra: &ArrayD<bool>) -> Result<Self> {
        if extra.shape() != self.mask.shape() {
            return Err(SkyglowError::ShapeMismatch {
                data: self.mask.shape().to_vec(),
                mask: extra.shape().to_vec(),
            });
        }
        let mut out = self.clone();
        Zip::from(&mut out.mask).and(extra).for_each(|m, &e| {
            *m = *m || e;
        });
        Ok(out)
    }

    pub(crate) fn check_axis(&self, axis: usize) -> Result<()> {
        if axis >= self.ndim() {
            return Err(SkyglowError::InvalidAxis {
                axis,
                ndim: self.ndim(),
            });
        }
        Ok(())
    }

    /// Split borrow used by the clipper to grow the mask in place while
    /// reading the data.
    pub(crate) fn parts_mut(&mut self) -> (&ArrayD<f64>, &mut ArrayD<bool>) {
        (&self.data, &mut self.mask)
    }

    /// Reduce the valid elements with an arbitrary slice kernel.
    ///
    /// For `axis = None` the kernel sees every valid element once; for
    /// `axis = Some(ax)` it is applied to each 1-D lane along `ax`
    /// independently. Lanes with no valid elements reduce to NaN without the
    /// kernel being called.
    ///
    /// This is the single driver every estimator goes through, so axis
    /// handling and the fully-masked sentinel behave identically across
    /// statistics.
    pub fn reduce<F>(&self, axis: Option<usize>, kernel: F) -> Result<Estimate>
    where
        F: Fn(&mut [f64]) -> f64,
    {
        match axis {
            None => {
                let mut values: Vec<f64> = self
                    .data
                    .iter()
                    .zip(self.mask.iter())
                    .filter(|&(_, &m)| !m)
                    .map(|(&v, _)| v)
                    .collect();
                let result = if values.is_empty() {
                    f64::NAN
                } else {
                    kernel(&mut values)
                };
                Ok(Estimate::Scalar(result))
            }
            Some(ax) => {
                self.check_axis(ax)?;
                let lane_len = self.data.len_of(Axis(ax));
                let mut results = Vec::with_capacity(self.data.len() / lane_len.max(1));
                let mut scratch = Vec::with_capacity(lane_len);
                Zip::from(self.data.lanes(Axis(ax)))
                    .and(self.mask.lanes(Axis(ax)))
                    .for_each(|values, mask| {
                        scratch.clear();
                        scratch.extend(
                            values
                                .iter()
                                .zip(mask.iter())
                                .filter(|&(_, &m)| !m)
                                .map(|(&v, _)| v),
                        );
                        results.push(if scratch.is_empty() {
                            f64::NAN
                        } else {
                            kernel(&mut scratch)
                        });
                    });

                let mut shape = self.data.shape().to_vec();
                shape.remove(ax);
                let out = ArrayD::from_shape_vec(IxDyn(&shape), results)
                    .expect("lane count matches the reduced shape");
                Ok(Estimate::PerLane(out))
            }
        }
    }

    /// Arithmetic mean of the valid elements.
    pub fn mean(&self, axis: Option<usize>) -> Result<Estimate> {
        self.reduce(axis, |v| stats::mean(v))
    }

    /// Median of the valid elements.
    pub fn median(&self, axis: Option<usize>) -> Result<Estimate> {
        self.reduce(axis, stats::median)
    }

    /// Population standard deviation of the valid elements.
    pub fn std(&self, axis: Option<usize>) -> Result<Estimate> {
        self.reduce(axis, |v| stats::population_std(v))
    }

    /// Population variance of the valid elements.
    pub fn var(&self, axis: Option<usize>) -> Result<Estimate> {
        self.reduce(axis, |v| stats::population_variance(v))
    }
}

impl From<Vec<f64>> for MaskedArray {
    fn from(values: Vec<f64>) -> Self {
        MaskedArray::from_data(Array1::from(values).into_dyn())
    }
}

impl From<ArrayD<f64>> for MaskedArray {
    fn from(data: ArrayD<f64>) -> Self {
        MaskedArray::from_data(data)
    }
}

impl From<Array1<f64>> for MaskedArray {
    fn from(data: Array1<f64>) -> Self {
        MaskedArray::from_data(data.into_dyn())
    }
}

impl From<Array2<f64>> for MaskedArray {
    fn from(data: Array2<f64>) -> Self {
        MaskedArray::from_data(data.into_dyn())
    }
}
