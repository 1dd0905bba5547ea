//! Search directions.
//!
//! A [`TrainingDirection`] is configuration; a [`DirectionState`] carries
//! whatever memory the method needs between iterations (previous gradient,
//! inverse Hessian approximation, moments).

use log::trace;
use neuropt_core::vector::dot;
use neuropt_core::{Matrix, NeuroptError, NeuroptResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConjugateGradientFormula {
    FletcherReeves,
    PolakRibiere,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuasiNewtonFormula {
    Bfgs,
    Dfp,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TrainingDirection {
    GradientDescent,
    /// `d = momentum * d_prev - g`
    Momentum { momentum: f64 },
    ConjugateGradient { formula: ConjugateGradientFormula },
    QuasiNewton { formula: QuasiNewtonFormula },
    /// Bias-corrected first and second moments, `d = -m / (sqrt(v) + epsilon)`.
    Adam { beta1: f64, beta2: f64, epsilon: f64 },
}

impl Default for TrainingDirection {
    fn default() -> Self {
        TrainingDirection::QuasiNewton {
            formula: QuasiNewtonFormula::Bfgs,
        }
    }
}

impl TrainingDirection {
    pub fn adam() -> Self {
        TrainingDirection::Adam {
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }

    pub fn validate(&self) -> NeuroptResult<()> {
        match *self {
            TrainingDirection::Momentum { momentum } => {
                if !(0.0..1.0).contains(&momentum) {
                    return Err(NeuroptError::config(format!(
                        "momentum must be in [0, 1), got {momentum}"
                    )));
                }
            }
            TrainingDirection::Adam {
                beta1,
                beta2,
                epsilon,
            } => {
                if !(0.0..1.0).contains(&beta1) || !(0.0..1.0).contains(&beta2) {
                    return Err(NeuroptError::config(format!(
                        "Adam decay rates must be in [0, 1), got {beta1} and {beta2}"
                    )));
                }
                if !(epsilon > 0.0) {
                    return Err(NeuroptError::config(format!(
                        "Adam epsilon must be > 0, got {epsilon}"
                    )));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DirectionState {
    method: TrainingDirection,
    dimension: usize,
    previous_parameters: Option<Vec<f64>>,
    previous_gradient: Option<Vec<f64>>,
    previous_direction: Option<Vec<f64>>,
    inverse_hessian: Matrix<f64>,
    first_moment: Vec<f64>,
    second_moment: Vec<f64>,
    steps: i32,
    since_restart: usize,
}

impl DirectionState {
    pub fn new(method: TrainingDirection, dimension: usize) -> Self {
        let inverse_hessian = match method {
            TrainingDirection::QuasiNewton { .. } => Matrix::identity(dimension),
            _ => Matrix::zeros(0, 0),
        };
        DirectionState {
            method,
            dimension,
            previous_parameters: None,
            previous_gradient: None,
            previous_direction: None,
            inverse_hessian,
            first_moment: vec![0.0; dimension],
            second_moment: vec![0.0; dimension],
            steps: 0,
            since_restart: 0,
        }
    }

    pub fn method(&self) -> TrainingDirection {
        self.method
    }

    /// Forgets all memory and returns the steepest descent direction,
    /// remembering `parameters` and `gradient` for the next update.
    pub fn restart(&mut self, parameters: &[f64], gradient: &[f64]) -> Vec<f64> {
        *self = DirectionState::new(self.method, self.dimension);
        let direction: Vec<f64> = gradient.iter().map(|g| -g).collect();
        self.remember(parameters, gradient, &direction);
        direction
    }

    fn remember(&mut self, parameters: &[f64], gradient: &[f64], direction: &[f64]) {
        self.previous_parameters = Some(parameters.to_vec());
        self.previous_gradient = Some(gradient.to_vec());
        self.previous_direction = Some(direction.to_vec());
        self.since_restart += 1;
    }

    /// Direction for the current point.
    pub fn compute(&mut self, parameters: &[f64], gradient: &[f64]) -> NeuroptResult<Vec<f64>> {
        if parameters.len() != self.dimension || gradient.len() != self.dimension {
            return Err(NeuroptError::shape(&[self.dimension], &[gradient.len()]));
        }
        let direction = match self.method {
            TrainingDirection::GradientDescent => gradient.iter().map(|g| -g).collect(),
            TrainingDirection::Momentum { momentum } => match &self.previous_direction {
                Some(prev) => prev
                    .iter()
                    .zip(gradient)
                    .map(|(d, g)| momentum * d - g)
                    .collect(),
                None => gradient.iter().map(|g| -g).collect(),
            },
            TrainingDirection::ConjugateGradient { formula } => {
                self.conjugate_gradient(formula, gradient)
            }
            TrainingDirection::QuasiNewton { formula } => {
                self.update_inverse_hessian(formula, parameters, gradient)?;
                self.inverse_hessian
                    .dot_vector(gradient)?
                    .into_data()
                    .into_iter()
                    .map(|x| -x)
                    .collect()
            }
            TrainingDirection::Adam {
                beta1,
                beta2,
                epsilon,
            } => self.adam(beta1, beta2, epsilon, gradient),
        };
        self.remember(parameters, gradient, &direction);
        Ok(direction)
    }

    fn conjugate_gradient(&mut self, formula: ConjugateGradientFormula, gradient: &[f64]) -> Vec<f64> {
        let steepest: Vec<f64> = gradient.iter().map(|g| -g).collect();
        let (prev_g, prev_d) = match (&self.previous_gradient, &self.previous_direction) {
            (Some(g), Some(d)) => (g, d),
            _ => return steepest,
        };
        if self.since_restart >= self.dimension.max(1) {
            trace!("conjugate gradient: periodic restart after {} iterations", self.since_restart);
            self.since_restart = 0;
            return steepest;
        }
        let denominator = dot(prev_g, prev_g);
        if denominator <= 0.0 {
            return steepest;
        }
        let beta = match formula {
            ConjugateGradientFormula::FletcherReeves => dot(gradient, gradient) / denominator,
            ConjugateGradientFormula::PolakRibiere => {
                let numerator: f64 = gradient
                    .iter()
                    .zip(prev_g)
                    .map(|(g, p)| g * (g - p))
                    .sum();
                (numerator / denominator).max(0.0)
            }
        };
        let direction: Vec<f64> = steepest
            .iter()
            .zip(prev_d)
            .map(|(s, d)| s + beta * d)
            .collect();
        if dot(&direction, gradient) >= 0.0 {
            trace!("conjugate gradient: not a descent direction, restarting");
            self.since_restart = 0;
            return steepest;
        }
        direction
    }

    fn update_inverse_hessian(
        &mut self,
        formula: QuasiNewtonFormula,
        parameters: &[f64],
        gradient: &[f64],
    ) -> NeuroptResult<()> {
        let (prev_p, prev_g) = match (&self.previous_parameters, &self.previous_gradient) {
            (Some(p), Some(g)) => (p, g),
            _ => return Ok(()),
        };
        let s: Vec<f64> = parameters.iter().zip(prev_p).map(|(a, b)| a - b).collect();
        let y: Vec<f64> = gradient.iter().zip(prev_g).map(|(a, b)| a - b).collect();
        let sy = dot(&s, &y);
        if !(sy > 0.0) || !sy.is_finite() {
            trace!("quasi-Newton: skipping update, s'y = {sy:e}");
            return Ok(());
        }
        let hy = self.inverse_hessian.dot_vector(&y)?.into_data();
        let yhy = dot(&y, &hy);
        match formula {
            QuasiNewtonFormula::Bfgs => {
                // H + (s'y + y'Hy) ss' / (s'y)^2 - (Hy s' + s y'H) / s'y
                self.inverse_hessian.add_outer((sy + yhy) / (sy * sy), &s, &s)?;
                self.inverse_hessian.add_outer(-1.0 / sy, &hy, &s)?;
                self.inverse_hessian.add_outer(-1.0 / sy, &s, &hy)?;
            }
            QuasiNewtonFormula::Dfp => {
                if !(yhy > 0.0) {
                    trace!("quasi-Newton: skipping update, y'Hy = {yhy:e}");
                    return Ok(());
                }
                self.inverse_hessian.add_outer(1.0 / sy, &s, &s)?;
                self.inverse_hessian.add_outer(-1.0 / yhy, &hy, &hy)?;
            }
        }
        Ok(())
    }

    fn adam(&mut self, beta1: f64, beta2: f64, epsilon: f64, gradient: &[f64]) -> Vec<f64> {
        self.steps += 1;
        let correction1 = 1.0 - beta1.powi(self.steps);
        let correction2 = 1.0 - beta2.powi(self.steps);
        let mut direction = Vec::with_capacity(gradient.len());
        for (i, &g) in gradient.iter().enumerate() {
            self.first_moment[i] = beta1 * self.first_moment[i] + (1.0 - beta1) * g;
            self.second_moment[i] = beta2 * self.second_moment[i] + (1.0 - beta2) * g * g;
            let m_hat = self.first_moment[i] / correction1;
            let v_hat = self.second_moment[i] / correction2;
            direction.push(-m_hat / (v_hat.sqrt() + epsilon));
        }
        direction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_first_direction_descends() {
        let methods = [
            TrainingDirection::GradientDescent,
            TrainingDirection::Momentum { momentum: 0.5 },
            TrainingDirection::ConjugateGradient {
                formula: ConjugateGradientFormula::PolakRibiere,
            },
            TrainingDirection::QuasiNewton {
                formula: QuasiNewtonFormula::Dfp,
            },
            TrainingDirection::adam(),
        ];
        let g = [1.0, -2.0];
        for m in methods {
            let mut state = DirectionState::new(m, 2);
            let d = state.compute(&[0.0, 0.0], &g).unwrap();
            assert!(dot(&d, &g) < 0.0, "{m:?}");
        }
    }

    #[test]
    fn test_momentum_accumulates() {
        let mut state = DirectionState::new(TrainingDirection::Momentum { momentum: 0.5 }, 1);
        assert_eq!(state.compute(&[0.0], &[1.0]).unwrap(), vec![-1.0]);
        assert_eq!(state.compute(&[0.0], &[1.0]).unwrap(), vec![-1.5]);
    }

    #[test]
    fn test_adam_first_step_is_unit() {
        let mut state = DirectionState::new(TrainingDirection::adam(), 2);
        let d = state.compute(&[0.0, 0.0], &[4.0, -0.5]).unwrap();
        assert_abs_diff_eq!(d[0], -1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(d[1], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_bfgs_learns_quadratic_hessian() {
        // f(x) = 0.5 x'Ax with A = diag(2, 8); exact steps along the
        // directions make H converge to A^-1 within two updates.
        let grad = |x: &[f64]| vec![2.0 * x[0], 8.0 * x[1]];
        let mut state = DirectionState::new(
            TrainingDirection::QuasiNewton {
                formula: QuasiNewtonFormula::Bfgs,
            },
            2,
        );
        let mut x = vec![1.0, 1.0];
        for _ in 0..2 {
            let g = grad(&x);
            let d = state.compute(&x, &g).unwrap();
            // exact line search on a quadratic: t = -g'd / d'Ad
            let ad = [2.0 * d[0], 8.0 * d[1]];
            let t = -dot(&g, &d) / dot(&d, &ad);
            x = x.iter().zip(&d).map(|(xi, di)| xi + t * di).collect();
        }
        let g = grad(&x);
        let d = state.compute(&x, &g).unwrap();
        // Newton step lands on the minimum
        assert_abs_diff_eq!(x[0] + d[0], 0.0, epsilon = 1e-8);
        assert_abs_diff_eq!(x[1] + d[1], 0.0, epsilon = 1e-8);
    }

    #[test]
    fn test_quasi_newton_skips_bad_curvature() {
        let mut state = DirectionState::new(
            TrainingDirection::QuasiNewton {
                formula: QuasiNewtonFormula::Bfgs,
            },
            1,
        );
        state.compute(&[0.0], &[1.0]).unwrap();
        // gradient decreased while moving forward: s'y < 0
        let d = state.compute(&[1.0], &[0.5]).unwrap();
        assert_eq!(d, vec![-0.5]);
    }

    #[test]
    fn test_validate() {
        assert!(TrainingDirection::Momentum { momentum: 1.0 }.validate().is_err());
        assert!(TrainingDirection::Adam {
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 0.0
        }
        .validate()
        .is_err());
        assert!(TrainingDirection::default().validate().is_ok());
    }

    #[test]
    fn test_dimension_checked() {
        let mut state = DirectionState::new(TrainingDirection::GradientDescent, 2);
        assert!(state.compute(&[0.0], &[1.0]).is_err());
    }
}
