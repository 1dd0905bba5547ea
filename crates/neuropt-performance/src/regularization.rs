//! Parameter-norm penalties.

use neuropt_core::vector::norm;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regularization {
    /// `‖θ‖₂`
    NeuralParametersNorm,
    /// `Σ θ²`
    SquaredParametersNorm,
    /// `Σ |θ|`
    AbsoluteParametersNorm,
}

impl Regularization {
    pub fn name(&self) -> &'static str {
        match self {
            Regularization::NeuralParametersNorm => "neural parameters norm",
            Regularization::SquaredParametersNorm => "squared parameters norm",
            Regularization::AbsoluteParametersNorm => "absolute parameters norm",
        }
    }

    pub fn value(&self, parameters: &[f64]) -> f64 {
        match self {
            Regularization::NeuralParametersNorm => norm(parameters),
            Regularization::SquaredParametersNorm => parameters.iter().map(|p| p * p).sum(),
            Regularization::AbsoluteParametersNorm => parameters.iter().map(|p| p.abs()).sum(),
        }
    }

    /// Gradient w.r.t. the parameters. The norm and the absolute value take a
    /// zero subgradient at their kinks.
    pub fn gradient(&self, parameters: &[f64]) -> Vec<f64> {
        match self {
            Regularization::NeuralParametersNorm => {
                let n = norm(parameters);
                if n == 0.0 {
                    vec![0.0; parameters.len()]
                } else {
                    parameters.iter().map(|p| p / n).collect()
                }
            }
            Regularization::SquaredParametersNorm => {
                parameters.iter().map(|p| 2.0 * p).collect()
            }
            Regularization::AbsoluteParametersNorm => parameters
                .iter()
                .map(|&p| if p == 0.0 { 0.0 } else { p.signum() })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use neuropt_core::NumericalDifferentiation;

    const ALL: [Regularization; 3] = [
        Regularization::NeuralParametersNorm,
        Regularization::SquaredParametersNorm,
        Regularization::AbsoluteParametersNorm,
    ];

    #[test]
    fn test_values() {
        let p = [3.0, -4.0];
        assert_abs_diff_eq!(Regularization::NeuralParametersNorm.value(&p), 5.0);
        assert_abs_diff_eq!(Regularization::SquaredParametersNorm.value(&p), 25.0);
        assert_abs_diff_eq!(Regularization::AbsoluteParametersNorm.value(&p), 7.0);
    }

    #[test]
    fn test_gradient_matches_numerical() {
        let p = [0.3, -1.2, 2.5, 0.7];
        let nd = NumericalDifferentiation::default();
        for r in ALL {
            let numerical = nd.gradient(&p, |x| Ok(r.value(x))).unwrap();
            for (a, n) in r.gradient(&p).iter().zip(&numerical) {
                assert_abs_diff_eq!(a, n, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_zero_parameters() {
        let p = [0.0; 3];
        for r in ALL {
            assert_eq!(r.value(&p), 0.0);
            assert_eq!(r.gradient(&p), vec![0.0; 3]);
        }
    }
}
