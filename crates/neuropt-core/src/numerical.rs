//! Central-difference numerical differentiation.
//!
//! Costs two function evaluations per coordinate. It backs gradient checks in
//! tests and the numerical gradient mode of the performance functional.

use serde::{Deserialize, Serialize};

use crate::error::{NeuroptError, NeuroptResult};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericalDifferentiation {
    /// Relative step: coordinate `i` is perturbed by `epsilon * max(1, |x_i|)`.
    pub epsilon: f64,
}

impl Default for NumericalDifferentiation {
    fn default() -> Self {
        NumericalDifferentiation { epsilon: 1e-6 }
    }
}

impl NumericalDifferentiation {
    pub fn new(epsilon: f64) -> NeuroptResult<Self> {
        if !(epsilon.is_finite() && epsilon > 0.0) {
            return Err(NeuroptError::config(format!(
                "differentiation step must be finite and > 0, got {epsilon}"
            )));
        }
        Ok(NumericalDifferentiation { epsilon })
    }

    #[inline]
    pub fn step(&self, x: f64) -> f64 {
        self.epsilon * x.abs().max(1.0)
    }

    /// Derivative of a scalar function of one variable.
    pub fn derivative<F>(&self, x: f64, mut f: F) -> NeuroptResult<f64>
    where
        F: FnMut(f64) -> NeuroptResult<f64>,
    {
        let h = self.step(x);
        let forward = f(x + h)?;
        let backward = f(x - h)?;
        Ok((forward - backward) / (2.0 * h))
    }

    /// Gradient of `f` at `x`.
    ///
    /// `f` receives the perturbed point; `x` itself is restored before returning.
    pub fn gradient<F>(&self, x: &[f64], mut f: F) -> NeuroptResult<Vec<f64>>
    where
        F: FnMut(&[f64]) -> NeuroptResult<f64>,
    {
        let mut point = x.to_vec();
        let mut gradient = Vec::with_capacity(x.len());
        for i in 0..x.len() {
            let original = point[i];
            let h = self.step(original);

            point[i] = original + h;
            let forward = f(&point)?;
            point[i] = original - h;
            let backward = f(&point)?;
            point[i] = original;

            gradient.push((forward - backward) / (2.0 * h));
        }
        Ok(gradient)
    }

    /// Jacobian of a vector function, `rows = outputs`, `cols = x.len()`,
    /// returned row-major.
    pub fn jacobian<F>(&self, x: &[f64], outputs: usize, mut f: F) -> NeuroptResult<Vec<f64>>
    where
        F: FnMut(&[f64]) -> NeuroptResult<Vec<f64>>,
    {
        let n = x.len();
        let mut point = x.to_vec();
        let mut jacobian = vec![0.0; outputs * n];
        for j in 0..n {
            let original = point[j];
            let h = self.step(original);

            point[j] = original + h;
            let forward = f(&point)?;
            point[j] = original - h;
            let backward = f(&point)?;
            point[j] = original;

            if forward.len() != outputs || backward.len() != outputs {
                return Err(NeuroptError::shape(&[outputs], &[forward.len()]));
            }
            for i in 0..outputs {
                jacobian[i * n + j] = (forward[i] - backward[i]) / (2.0 * h);
            }
        }
        Ok(jacobian)
    }
}
