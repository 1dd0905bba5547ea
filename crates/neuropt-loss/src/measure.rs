//! Error measures between network outputs and targets.
//!
//! Inputs are `instances x outputs` matrices. Every measure is averaged over
//! instances (or is a ratio that does not grow with them), so regularization
//! weights mean the same thing for any dataset size. Errors are `y - t`.

use neuropt_core::{Matrix, NeuroptError, NeuroptResult};
use serde::{Deserialize, Serialize};

/// Outputs are clamped into `[CROSS_ENTROPY_CLAMP, 1 - CROSS_ENTROPY_CLAMP]`.
pub const CROSS_ENTROPY_CLAMP: f64 = 1e-15;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum ErrorMeasure {
    /// `(1/N) Σ e²`
    #[default]
    SumSquared,
    /// `(1/(N·outputs)) Σ e²`
    MeanSquared,
    /// `sqrt((1/N) Σ e²)`
    RootMeanSquared,
    /// `Σ e² / Σ (t - mean_t)²`
    NormalizedSquared,
    /// `(1/N) Σ |e|^p`, `p >= 1`
    Minkowski { exponent: f64 },
    /// `-(1/N) Σ t ln y + (1 - t) ln(1 - y)`
    CrossEntropy,
}

/// Value of a measure together with `dE/dy` for every output of every instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorEvaluation {
    pub value: f64,
    pub output_gradients: Matrix<f64>,
}

impl ErrorMeasure {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorMeasure::SumSquared => "sum squared error",
            ErrorMeasure::MeanSquared => "mean squared error",
            ErrorMeasure::RootMeanSquared => "root mean squared error",
            ErrorMeasure::NormalizedSquared => "normalized squared error",
            ErrorMeasure::Minkowski { .. } => "Minkowski error",
            ErrorMeasure::CrossEntropy => "cross-entropy error",
        }
    }

    pub fn validate(&self) -> NeuroptResult<()> {
        if let ErrorMeasure::Minkowski { exponent } = *self {
            if !(exponent.is_finite() && exponent >= 1.0) {
                return Err(NeuroptError::config(format!(
                    "Minkowski exponent must be >= 1, got {exponent}"
                )));
            }
        }
        Ok(())
    }

    fn check(&self, outputs: &Matrix<f64>, targets: &Matrix<f64>) -> NeuroptResult<()> {
        self.validate()?;
        if outputs.shape() != targets.shape() {
            return Err(NeuroptError::shape(
                &[targets.rows(), targets.cols()],
                &[outputs.rows(), outputs.cols()],
            ));
        }
        if outputs.rows() == 0 || outputs.cols() == 0 {
            return Err(NeuroptError::EmptyData(format!(
                "{} over an empty instance set",
                self.name()
            )));
        }
        Ok(())
    }

    pub fn evaluate(&self, outputs: &Matrix<f64>, targets: &Matrix<f64>) -> NeuroptResult<f64> {
        self.check(outputs, targets)?;
        let n = outputs.rows() as f64;
        let pairs = outputs.data().iter().zip(targets.data());
        let squared = || {
            pairs
                .clone()
                .map(|(y, t)| (y - t) * (y - t))
                .sum::<f64>()
        };
        let value = match *self {
            ErrorMeasure::SumSquared => squared() / n,
            ErrorMeasure::MeanSquared => squared() / (n * outputs.cols() as f64),
            ErrorMeasure::RootMeanSquared => (squared() / n).sqrt(),
            ErrorMeasure::NormalizedSquared => squared() / normalization_coefficient(targets)?,
            ErrorMeasure::Minkowski { exponent } => {
                pairs
                    .clone()
                    .map(|(y, t)| (y - t).abs().powf(exponent))
                    .sum::<f64>()
                    / n
            }
            ErrorMeasure::CrossEntropy => {
                -pairs
                    .clone()
                    .map(|(&y, &t)| {
                        let y = clamp_probability(y);
                        t * y.ln() + (1.0 - t) * (1.0 - y).ln()
                    })
                    .sum::<f64>()
                    / n
            }
        };
        Ok(value)
    }

    /// Value and output gradients in one pass over the data.
    pub fn evaluate_with_gradient(
        &self,
        outputs: &Matrix<f64>,
        targets: &Matrix<f64>,
    ) -> NeuroptResult<ErrorEvaluation> {
        let value = self.evaluate(outputs, targets)?;
        let n = outputs.rows() as f64;
        let pairs = outputs.data().iter().zip(targets.data());
        let gradients: Vec<f64> = match *self {
            ErrorMeasure::SumSquared => pairs.map(|(y, t)| 2.0 * (y - t) / n).collect(),
            ErrorMeasure::MeanSquared => {
                let scale = 2.0 / (n * outputs.cols() as f64);
                pairs.map(|(y, t)| scale * (y - t)).collect()
            }
            ErrorMeasure::RootMeanSquared => {
                if value == 0.0 {
                    vec![0.0; outputs.data().len()]
                } else {
                    pairs.map(|(y, t)| (y - t) / (n * value)).collect()
                }
            }
            ErrorMeasure::NormalizedSquared => {
                let coefficient = normalization_coefficient(targets)?;
                pairs.map(|(y, t)| 2.0 * (y - t) / coefficient).collect()
            }
            ErrorMeasure::Minkowski { exponent } => pairs
                .map(|(y, t)| {
                    let e = y - t;
                    if e == 0.0 {
                        0.0
                    } else {
                        exponent * e.abs().powf(exponent - 1.0) * e.signum() / n
                    }
                })
                .collect(),
            ErrorMeasure::CrossEntropy => pairs
                .map(|(&y, &t)| {
                    let y = clamp_probability(y);
                    -(t / y - (1.0 - t) / (1.0 - y)) / n
                })
                .collect(),
        };
        Ok(ErrorEvaluation {
            value,
            output_gradients: Matrix::new(outputs.rows(), outputs.cols(), gradients)?,
        })
    }
}

fn clamp_probability(y: f64) -> f64 {
    y.clamp(CROSS_ENTROPY_CLAMP, 1.0 - CROSS_ENTROPY_CLAMP)
}

/// `Σ (t - mean_t)²` with one mean per target column.
fn normalization_coefficient(targets: &Matrix<f64>) -> NeuroptResult<f64> {
    let means = targets.column_means()?;
    let mut coefficient = 0.0;
    for i in 0..targets.rows() {
        for (t, m) in targets.row(i).iter().zip(means.data()) {
            coefficient += (t - m) * (t - m);
        }
    }
    if coefficient <= 0.0 {
        return Err(NeuroptError::numerical(
            "normalized squared error: targets have zero variance",
        ));
    }
    Ok(coefficient)
}
