//! Step-size policies: fixed schedules, or a line search along the direction.

use log::trace;
use neuropt_core::vector::dot;
use neuropt_core::{NeuroptError, NeuroptResult};
use serde::{Deserialize, Serialize};

use crate::objective::Objective;

const GOLDEN_RATIO: f64 = 1.618_033_988_749_895;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StepSize {
    Fixed {
        rate: f64,
    },
    /// `rate = initial * gamma^iteration`
    ExponentialDecay {
        initial: f64,
        gamma: f64,
    },
    /// Armijo backtracking: shrink by `contraction` until
    /// `f(x + t·d) <= f(x) + sufficient_decrease · t · g'd`.
    Backtracking {
        initial: f64,
        contraction: f64,
        sufficient_decrease: f64,
        max_steps: usize,
    },
    /// Bracket a minimum along `d`, then narrow it by golden sections.
    GoldenSection {
        first_step: f64,
        tolerance: f64,
        max_steps: usize,
    },
}

impl Default for StepSize {
    fn default() -> Self {
        StepSize::GoldenSection {
            first_step: 0.01,
            tolerance: 1e-6,
            max_steps: 100,
        }
    }
}

impl StepSize {
    pub fn backtracking() -> Self {
        StepSize::Backtracking {
            initial: 1.0,
            contraction: 0.5,
            sufficient_decrease: 1e-4,
            max_steps: 50,
        }
    }

    pub fn is_line_search(&self) -> bool {
        matches!(
            self,
            StepSize::Backtracking { .. } | StepSize::GoldenSection { .. }
        )
    }

    pub fn validate(&self) -> NeuroptResult<()> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(NeuroptError::config(format!("{name} must be finite and > 0, got {v}")))
            }
        };
        match *self {
            StepSize::Fixed { rate } => positive("training rate", rate),
            StepSize::ExponentialDecay { initial, gamma } => {
                positive("initial training rate", initial)?;
                positive("decay factor", gamma)
            }
            StepSize::Backtracking {
                initial,
                contraction,
                sufficient_decrease,
                ..
            } => {
                positive("initial step", initial)?;
                if !(contraction > 0.0 && contraction < 1.0) {
                    return Err(NeuroptError::config(format!(
                        "contraction must be in (0, 1), got {contraction}"
                    )));
                }
                if !(sufficient_decrease > 0.0 && sufficient_decrease < 1.0) {
                    return Err(NeuroptError::config(format!(
                        "sufficient decrease must be in (0, 1), got {sufficient_decrease}"
                    )));
                }
                Ok(())
            }
            StepSize::GoldenSection {
                first_step,
                tolerance,
                ..
            } => {
                positive("first step", first_step)?;
                positive("tolerance", tolerance)
            }
        }
    }

    /// Rate for this iteration. Line searches evaluate the objective along
    /// `direction` and return 0 when no trial point improves on `value`.
    pub fn rate<O: Objective + ?Sized>(
        &self,
        iteration: usize,
        objective: &O,
        parameters: &[f64],
        value: f64,
        gradient: &[f64],
        direction: &[f64],
    ) -> NeuroptResult<f64> {
        match *self {
            StepSize::Fixed { rate } => Ok(rate),
            StepSize::ExponentialDecay { initial, gamma } => {
                Ok(initial * gamma.powi(iteration.min(i32::MAX as usize) as i32))
            }
            StepSize::Backtracking {
                initial,
                contraction,
                sufficient_decrease,
                max_steps,
            } => {
                let slope = dot(gradient, direction);
                let line = Line::new(objective, parameters, direction);
                let mut t = initial;
                for _ in 0..max_steps {
                    if line.value_at(t)? <= value + sufficient_decrease * t * slope {
                        return Ok(t);
                    }
                    t *= contraction;
                }
                trace!("backtracking: no sufficient decrease after {max_steps} steps");
                Ok(0.0)
            }
            StepSize::GoldenSection {
                first_step,
                tolerance,
                max_steps,
            } => {
                let line = Line::new(objective, parameters, direction);
                golden_section(&line, value, first_step, tolerance, max_steps)
            }
        }
    }
}

/// The objective restricted to `parameters + t · direction`.
struct Line<'a, O: ?Sized> {
    objective: &'a O,
    parameters: &'a [f64],
    direction: &'a [f64],
}

impl<'a, O: Objective + ?Sized> Line<'a, O> {
    fn new(objective: &'a O, parameters: &'a [f64], direction: &'a [f64]) -> Self {
        Line {
            objective,
            parameters,
            direction,
        }
    }

    /// Non-finite values and numerical errors count as `+inf`, so the search
    /// backs away from them.
    fn value_at(&self, t: f64) -> NeuroptResult<f64> {
        let trial: Vec<f64> = self
            .parameters
            .iter()
            .zip(self.direction)
            .map(|(p, d)| p + t * d)
            .collect();
        match self.objective.value(&trial) {
            Ok(v) if v.is_finite() => Ok(v),
            Ok(_) => Ok(f64::INFINITY),
            Err(e) if e.is_numerical() => Ok(f64::INFINITY),
            Err(e) => Err(e),
        }
    }
}

fn golden_section<O: Objective + ?Sized>(
    line: &Line<'_, O>,
    value: f64,
    first_step: f64,
    tolerance: f64,
    max_steps: usize,
) -> NeuroptResult<f64> {
    // Bracket: a < b < c with f(b) below f(a) and f(c).
    let fa = value;
    let mut a = 0.0;
    let mut b = first_step;
    let mut fb = line.value_at(b)?;
    let mut evaluations = 1;
    let mut c;
    if fb < fa {
        loop {
            c = b + GOLDEN_RATIO * (b - a);
            let fc = line.value_at(c)?;
            evaluations += 1;
            if fc >= fb {
                break;
            }
            if evaluations >= max_steps {
                return Ok(c);
            }
            a = b;
            b = c;
            fb = fc;
        }
    } else {
        c = b;
        loop {
            if evaluations >= max_steps {
                trace!("golden section: no decrease found along the direction");
                return Ok(0.0);
            }
            b = c / (1.0 + GOLDEN_RATIO);
            fb = line.value_at(b)?;
            evaluations += 1;
            if fb < fa {
                break;
            }
            c = b;
        }
    }

    // Narrow [a, c] keeping the best point seen.
    let (mut best, mut f_best) = (b, fb);
    let r = 1.0 / GOLDEN_RATIO;
    let mut x1 = c - r * (c - a);
    let mut x2 = a + r * (c - a);
    let mut f1 = line.value_at(x1)?;
    let mut f2 = line.value_at(x2)?;
    evaluations += 2;
    while c - a > tolerance && evaluations < max_steps {
        if f1 < f2 {
            c = x2;
            x2 = x1;
            f2 = f1;
            x1 = c - r * (c - a);
            f1 = line.value_at(x1)?;
        } else {
            a = x1;
            x1 = x2;
            f1 = f2;
            x2 = a + r * (c - a);
            f2 = line.value_at(x2)?;
        }
        evaluations += 1;
    }
    for (x, f) in [(x1, f1), (x2, f2)] {
        if f < f_best {
            best = x;
            f_best = f;
        }
    }
    Ok(best)
}
