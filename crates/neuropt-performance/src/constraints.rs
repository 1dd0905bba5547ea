//! Penalty terms on the parameter vector.

use neuropt_core::vector::norm;
use neuropt_core::{NeuroptError, NeuroptResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Constraints {
    /// `Σ max(0, θ - upper)² + max(0, lower - θ)²`
    ParameterBounds { lower: f64, upper: f64 },
    /// `(‖θ‖₂ - target)²`
    ParametersNormTarget { target: f64 },
}

impl Constraints {
    pub fn name(&self) -> &'static str {
        match self {
            Constraints::ParameterBounds { .. } => "parameter bounds",
            Constraints::ParametersNormTarget { .. } => "parameters norm target",
        }
    }

    pub fn validate(&self) -> NeuroptResult<()> {
        match *self {
            Constraints::ParameterBounds { lower, upper } => {
                if lower.is_nan() || upper.is_nan() || lower > upper {
                    return Err(NeuroptError::config(format!(
                        "invalid parameter bounds [{lower}, {upper}]"
                    )));
                }
            }
            Constraints::ParametersNormTarget { target } => {
                if !(target.is_finite() && target >= 0.0) {
                    return Err(NeuroptError::config(format!(
                        "parameters norm target must be finite and >= 0, got {target}"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn value(&self, parameters: &[f64]) -> f64 {
        match *self {
            Constraints::ParameterBounds { lower, upper } => parameters
                .iter()
                .map(|&p| (p - upper).max(0.0).powi(2) + (lower - p).max(0.0).powi(2))
                .sum(),
            Constraints::ParametersNormTarget { target } => (norm(parameters) - target).powi(2),
        }
    }

    pub fn gradient(&self, parameters: &[f64]) -> Vec<f64> {
        match *self {
            Constraints::ParameterBounds { lower, upper } => parameters
                .iter()
                .map(|&p| 2.0 * (p - upper).max(0.0) - 2.0 * (lower - p).max(0.0))
                .collect(),
            Constraints::ParametersNormTarget { target } => {
                let n = norm(parameters);
                if n == 0.0 {
                    return vec![0.0; parameters.len()];
                }
                let scale = 2.0 * (n - target) / n;
                parameters.iter().map(|p| scale * p).collect()
            }
        }
    }
}
