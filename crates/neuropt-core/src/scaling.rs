//! Scaling and unscaling of variables from precomputed statistics.
//!
//! Minimum-maximum scaling maps `[minimum, maximum]` onto `[-1, 1]`;
//! mean-standard-deviation scaling produces zero mean and unit deviation.
//! A variable whose range (or deviation) is degenerate is left untouched in
//! both directions, so `unscale(scale(x)) == x` always holds.

use serde::{Deserialize, Serialize};

use crate::dtype::Float;
use crate::statistics::Statistics;

/// Threshold below which a range or deviation is treated as zero.
pub const DEGENERATE_THRESHOLD: f64 = 1e-99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScalingMethod {
    #[default]
    MinimumMaximum,
    MeanStandardDeviation,
    NoScaling,
}

impl ScalingMethod {
    /// Slope of the (affine) scaling map for these statistics.
    fn slope<T: Float>(self, stats: &Statistics<T>) -> T {
        if self.is_degenerate(stats) {
            return T::ONE;
        }
        match self {
            ScalingMethod::MinimumMaximum => T::TWO / stats.range(),
            ScalingMethod::MeanStandardDeviation => T::ONE / stats.standard_deviation,
            ScalingMethod::NoScaling => T::ONE,
        }
    }

    /// Whether these statistics would leave the variable unscaled.
    pub fn is_degenerate<T: Float>(self, stats: &Statistics<T>) -> bool {
        let threshold = T::from_f64(DEGENERATE_THRESHOLD);
        match self {
            ScalingMethod::MinimumMaximum => stats.range().abs() <= threshold,
            ScalingMethod::MeanStandardDeviation => stats.standard_deviation.abs() <= threshold,
            ScalingMethod::NoScaling => false,
        }
    }

    pub fn scale<T: Float>(self, x: T, stats: &Statistics<T>) -> T {
        match self {
            ScalingMethod::MinimumMaximum => {
                if self.is_degenerate(stats) {
                    x
                } else {
                    T::TWO * (x - stats.minimum) / stats.range() - T::ONE
                }
            }
            ScalingMethod::MeanStandardDeviation => {
                if self.is_degenerate(stats) {
                    x
                } else {
                    (x - stats.mean) / stats.standard_deviation
                }
            }
            ScalingMethod::NoScaling => x,
        }
    }

    pub fn unscale<T: Float>(self, y: T, stats: &Statistics<T>) -> T {
        match self {
            ScalingMethod::MinimumMaximum => {
                if self.is_degenerate(stats) {
                    y
                } else {
                    T::HALF * (y + T::ONE) * stats.range() + stats.minimum
                }
            }
            ScalingMethod::MeanStandardDeviation => {
                if self.is_degenerate(stats) {
                    y
                } else {
                    y * stats.standard_deviation + stats.mean
                }
            }
            ScalingMethod::NoScaling => y,
        }
    }

    /// d unscale(y) / dy, constant in `y`.
    pub fn unscale_derivative<T: Float>(self, stats: &Statistics<T>) -> T {
        T::ONE / self.slope(stats)
    }

    /// Scales a slice in place, element `i` using `stats[i]`.
    pub fn scale_slice<T: Float>(self, values: &mut [T], stats: &[Statistics<T>]) {
        for (v, s) in values.iter_mut().zip(stats) {
            *v = self.scale(*v, s);
        }
    }

    /// Unscales a slice in place, element `i` using `stats[i]`.
    pub fn unscale_slice<T: Float>(self, values: &mut [T], stats: &[Statistics<T>]) {
        for (v, s) in values.iter_mut().zip(stats) {
            *v = self.unscale(*v, s);
        }
    }
}
