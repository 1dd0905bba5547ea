//! Fixed, non-trainable layers wrapped around the perceptron.

use neuropt_core::error::check_len;
use neuropt_core::{NeuroptError, NeuroptResult, ScalingMethod, Statistics};
use serde::{Deserialize, Serialize};

/// Scales raw inputs before the perceptron.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingLayer {
    pub method: ScalingMethod,
    pub statistics: Vec<Statistics<f64>>,
}

impl ScalingLayer {
    pub fn new(method: ScalingMethod, statistics: Vec<Statistics<f64>>) -> Self {
        ScalingLayer { method, statistics }
    }

    pub fn size(&self) -> usize {
        self.statistics.len()
    }

    pub fn forward(&self, input: &[f64]) -> NeuroptResult<Vec<f64>> {
        check_len(self.size(), input.len())?;
        let mut out = input.to_vec();
        self.method.scale_slice(&mut out, &self.statistics);
        Ok(out)
    }
}

/// Maps perceptron outputs back to the targets' original units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnscalingLayer {
    pub method: ScalingMethod,
    pub statistics: Vec<Statistics<f64>>,
}

impl UnscalingLayer {
    pub fn new(method: ScalingMethod, statistics: Vec<Statistics<f64>>) -> Self {
        UnscalingLayer { method, statistics }
    }

    pub fn size(&self) -> usize {
        self.statistics.len()
    }

    pub fn forward(&self, input: &[f64]) -> NeuroptResult<Vec<f64>> {
        check_len(self.size(), input.len())?;
        let mut out = input.to_vec();
        self.method.unscale_slice(&mut out, &self.statistics);
        Ok(out)
    }

    pub fn derivatives(&self) -> Vec<f64> {
        self.statistics
            .iter()
            .map(|s| self.method.unscale_derivative(s))
            .collect()
    }

    /// `dL/dx` from `dL/dy`.
    pub fn backward(&self, delta: &[f64]) -> NeuroptResult<Vec<f64>> {
        check_len(self.size(), delta.len())?;
        Ok(delta
            .iter()
            .zip(self.derivatives())
            .map(|(d, s)| d * s)
            .collect())
    }
}

/// Clamps outputs into per-output `[lower, upper]` bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BoundingParts")]
pub struct BoundingLayer {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

#[derive(Deserialize)]
struct BoundingParts {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl TryFrom<BoundingParts> for BoundingLayer {
    type Error = NeuroptError;

    fn try_from(parts: BoundingParts) -> NeuroptResult<Self> {
        Self::new(parts.lower, parts.upper)
    }
}

impl BoundingLayer {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> NeuroptResult<Self> {
        check_len(lower.len(), upper.len())?;
        if let Some(j) = (0..lower.len()).find(|&j| lower[j] > upper[j]) {
            return Err(NeuroptError::config(format!(
                "bound {j}: lower {} exceeds upper {}",
                lower[j], upper[j]
            )));
        }
        Ok(BoundingLayer { lower, upper })
    }

    pub fn size(&self) -> usize {
        self.lower.len()
    }

    pub fn forward(&self, input: &[f64]) -> NeuroptResult<Vec<f64>> {
        check_len(self.size(), input.len())?;
        Ok(input
            .iter()
            .zip(self.lower.iter().zip(&self.upper))
            .map(|(&x, (&lo, &hi))| x.max(lo).min(hi))
            .collect())
    }

    /// Derivative is 1 inside the bounds and 0 where the input was clamped.
    pub fn backward(&self, input: &[f64], delta: &[f64]) -> NeuroptResult<Vec<f64>> {
        check_len(self.size(), input.len())?;
        check_len(self.size(), delta.len())?;
        Ok((0..self.size())
            .map(|j| {
                if input[j] < self.lower[j] || input[j] > self.upper[j] {
                    0.0
                } else {
                    delta[j]
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn stats() -> Vec<Statistics<f64>> {
        vec![
            Statistics::new(0.0, 10.0, 5.0, 2.0),
            Statistics::new(3.0, 3.0, 3.0, 0.0),
        ]
    }

    #[test]
    fn test_scaling_then_unscaling() {
        for method in [
            ScalingMethod::MinimumMaximum,
            ScalingMethod::MeanStandardDeviation,
            ScalingMethod::NoScaling,
        ] {
            let s = ScalingLayer::new(method, stats());
            let u = UnscalingLayer::new(method, stats());
            let x = [7.5, 3.0];
            let back = u.forward(&s.forward(&x).unwrap()).unwrap();
            assert_abs_diff_eq!(back[0], x[0], epsilon = 1e-12);
            assert_abs_diff_eq!(back[1], x[1], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_minmax_forward_and_unscaling_backward() {
        let s = ScalingLayer::new(ScalingMethod::MinimumMaximum, stats());
        let y = s.forward(&[10.0, 42.0]).unwrap();
        assert_abs_diff_eq!(y[0], 1.0, epsilon = 1e-12);
        // degenerate range is passed through
        assert_abs_diff_eq!(y[1], 42.0, epsilon = 1e-12);

        let u = UnscalingLayer::new(ScalingMethod::MinimumMaximum, stats());
        let back = u.backward(&[1.0, 1.0]).unwrap();
        assert_abs_diff_eq!(back[0], 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(back[1], 1.0, epsilon = 1e-12);
        assert!(s.forward(&[1.0]).is_err());
    }

    #[test]
    fn test_bounding() {
        let b = BoundingLayer::new(vec![0.0, -1.0], vec![1.0, 1.0]).unwrap();
        assert_eq!(b.forward(&[2.0, 0.5]).unwrap(), vec![1.0, 0.5]);
        assert_eq!(b.backward(&[2.0, 0.5], &[3.0, 3.0]).unwrap(), vec![0.0, 3.0]);
        assert!(BoundingLayer::new(vec![1.0], vec![0.0]).is_err());
        assert!(BoundingLayer::new(vec![1.0], vec![]).is_err());
    }
}
