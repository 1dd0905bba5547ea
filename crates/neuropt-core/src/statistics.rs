use serde::{Deserialize, Serialize};

use crate::dtype::Float;
use crate::error::{NeuroptError, NeuroptResult};

/// Basic descriptive statistics of one variable (or one instance).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct Statistics<T: Float> {
    pub minimum: T,
    pub maximum: T,
    pub mean: T,
    pub standard_deviation: T,
}

impl<T: Float> Statistics<T> {
    pub fn new(minimum: T, maximum: T, mean: T, standard_deviation: T) -> Self {
        Statistics {
            minimum,
            maximum,
            mean,
            standard_deviation,
        }
    }

    /// Statistics of a slice. The standard deviation is the sample (n - 1)
    /// deviation; a single element has deviation zero.
    pub fn from_slice(values: &[T]) -> NeuroptResult<Self> {
        if values.is_empty() {
            return Err(NeuroptError::EmptyData(
                "cannot compute statistics of an empty slice".to_string(),
            ));
        }
        let n = values.len();
        let mut minimum = T::INFINITY;
        let mut maximum = T::NEG_INFINITY;
        let mut sum = T::ZERO;
        for &v in values {
            minimum = minimum.min(v);
            maximum = maximum.max(v);
            sum += v;
        }
        let mean = sum / T::from_usize(n);

        let standard_deviation = if n == 1 {
            T::ZERO
        } else {
            let squares: T = values.iter().map(|&v| (v - mean) * (v - mean)).sum();
            (squares / T::from_usize(n - 1)).sqrt()
        };

        Ok(Statistics {
            minimum,
            maximum,
            mean,
            standard_deviation,
        })
    }

    /// Width of the `[minimum, maximum]` interval.
    pub fn range(&self) -> T {
        self.maximum - self.minimum
    }
}

impl<T: Float> Default for Statistics<T> {
    /// Statistics under which both scaling methods are the identity map.
    fn default() -> Self {
        Statistics {
            minimum: -T::ONE,
            maximum: T::ONE,
            mean: T::ZERO,
            standard_deviation: T::ONE,
        }
    }
}
