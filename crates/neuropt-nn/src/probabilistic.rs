use neuropt_core::error::check_len;
use neuropt_core::{NeuroptError, NeuroptResult};
use serde::{Deserialize, Serialize};

use crate::activation::Activation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProbabilisticMethod {
    Softmax,
    /// One-hot on the largest output (first one on ties).
    Competitive,
    #[default]
    NoProbabilistic,
}

/// Turns outputs into class probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProbabilisticLayer {
    pub method: ProbabilisticMethod,
}

impl ProbabilisticLayer {
    pub fn new(method: ProbabilisticMethod) -> Self {
        ProbabilisticLayer { method }
    }

    pub fn is_differentiable(&self) -> bool {
        self.method != ProbabilisticMethod::Competitive
    }

    pub fn forward(&self, input: &[f64]) -> Vec<f64> {
        match self.method {
            ProbabilisticMethod::Softmax => {
                let mut out = input.to_vec();
                Activation::Softmax.activate(&mut out);
                out
            }
            ProbabilisticMethod::Competitive => {
                let mut winner = 0;
                for (j, &v) in input.iter().enumerate() {
                    if v > input[winner] {
                        winner = j;
                    }
                }
                let mut out = vec![0.0; input.len()];
                if !out.is_empty() {
                    out[winner] = 1.0;
                }
                out
            }
            ProbabilisticMethod::NoProbabilistic => input.to_vec(),
        }
    }

    /// `dL/dx` from `dL/dy`, given the layer's own output `y`.
    pub fn backward(&self, output: &[f64], delta: &[f64]) -> NeuroptResult<Vec<f64>> {
        check_len(output.len(), delta.len())?;
        match self.method {
            ProbabilisticMethod::Softmax => {
                let mut d = delta.to_vec();
                Activation::Softmax.backward(output, &mut d)?;
                Ok(d)
            }
            ProbabilisticMethod::Competitive => Err(NeuroptError::config(
                "competitive probabilistic layer has no derivative",
            )),
            ProbabilisticMethod::NoProbabilistic => Ok(delta.to_vec()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_competitive() {
        let l = ProbabilisticLayer::new(ProbabilisticMethod::Competitive);
        assert_eq!(l.forward(&[0.1, 0.7, 0.7, 0.2]), vec![0.0, 1.0, 0.0, 0.0]);
        assert!(!l.is_differentiable());
        assert!(l.backward(&[1.0], &[1.0]).is_err());
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let l = ProbabilisticLayer::new(ProbabilisticMethod::Softmax);
        let y = l.forward(&[1.0, -2.0, 0.5]);
        assert_abs_diff_eq!(y.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        // uniform upstream gradient vanishes through softmax
        let d = l.backward(&y, &[1.0, 1.0, 1.0]).unwrap();
        for v in d {
            assert_abs_diff_eq!(v, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_passthrough() {
        let l = ProbabilisticLayer::default();
        assert_eq!(l.forward(&[3.0, -1.0]), vec![3.0, -1.0]);
        assert_eq!(l.backward(&[3.0, -1.0], &[0.5, 2.0]).unwrap(), vec![0.5, 2.0]);
    }
}
