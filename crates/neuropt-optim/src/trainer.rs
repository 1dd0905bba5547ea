use std::time::Instant;

use log::{debug, info, trace, warn};
use neuropt_core::vector::{dot, norm};
use neuropt_core::{NeuroptError, NeuroptResult};
use serde::{Deserialize, Serialize};

use crate::cancel::CancellationFlag;
use crate::direction::{DirectionState, TrainingDirection};
use crate::history::{
    Convergence, ConvergenceWarning, IterationRecord, TerminationReason, TrainingHistory,
};
use crate::objective::Objective;
use crate::step::StepSize;
use crate::stopping::{IterationState, StoppingCriteria};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub direction: TrainingDirection,
    pub step: StepSize,
    pub stopping: StoppingCriteria,
    /// Log progress every this many iterations (0 disables).
    pub log_period: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            direction: TrainingDirection::default(),
            step: StepSize::default(),
            stopping: StoppingCriteria::default(),
            log_period: 100,
        }
    }
}

impl TrainingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_direction(mut self, direction: TrainingDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_step(mut self, step: StepSize) -> Self {
        self.step = step;
        self
    }

    pub fn with_stopping(mut self, stopping: StoppingCriteria) -> Self {
        self.stopping = stopping;
        self
    }

    pub fn with_log_period(mut self, period: usize) -> Self {
        self.log_period = period;
        self
    }

    pub fn validate(&self) -> NeuroptResult<()> {
        self.direction.validate()?;
        self.step.validate()?;
        self.stopping.validate()
    }
}

/// Outcome of a run: the best parameters found and how the run went.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingResult {
    pub parameters: Vec<f64>,
    pub value: f64,
    pub gradient_norm: f64,
    pub history: TrainingHistory,
}

/// Drives an [`Objective`] from an initial point until a stopping criterion
/// fires.
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    config: TrainingConfig,
    cancellation: Option<CancellationFlag>,
}

struct Best {
    parameters: Vec<f64>,
    value: f64,
    gradient_norm: f64,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Trainer {
            config,
            cancellation: None,
        }
    }

    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = Some(flag);
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    fn cancelled(&self) -> bool {
        self.cancellation.as_ref().is_some_and(|f| f.is_cancelled())
    }

    pub fn train<O: Objective + ?Sized>(
        &self,
        objective: &O,
        initial: &[f64],
    ) -> NeuroptResult<TrainingResult> {
        self.config.validate()?;
        if initial.len() != objective.dimension() {
            return Err(NeuroptError::shape(&[objective.dimension()], &[initial.len()]));
        }
        info!(
            "training {} parameters: {:?} direction, {:?} step",
            initial.len(),
            self.config.direction,
            self.config.step
        );

        let stopping = &self.config.stopping;
        let start = Instant::now();
        let mut state = DirectionState::new(self.config.direction, initial.len());
        let mut parameters = initial.to_vec();
        let mut records: Vec<IterationRecord> = Vec::new();
        let mut best: Option<Best> = None;
        let mut previous_value = None;
        let mut parameters_increment = None;
        let mut last_step = 0.0;
        let mut iteration = 0;

        let termination = loop {
            let (value, gradient) = match objective.value_and_gradient(&parameters) {
                Ok(evaluation) => evaluation,
                Err(e) if e.is_numerical() => {
                    warn!("iteration {iteration}: {e}");
                    break TerminationReason::NumericalError;
                }
                Err(e) => return Err(e),
            };
            let gradient_norm = norm(&gradient);
            if !value.is_finite() || !gradient_norm.is_finite() {
                warn!(
                    "iteration {iteration}: non-finite value ({value}) or gradient norm ({gradient_norm})"
                );
                break TerminationReason::NumericalError;
            }
            if best.as_ref().map_or(true, |b| value < b.value) {
                best = Some(Best {
                    parameters: parameters.clone(),
                    value,
                    gradient_norm,
                });
            }

            let selection_value = match objective.selection_value(&parameters) {
                Ok(v) => v,
                Err(e) if e.is_numerical() => None,
                Err(e) => return Err(e),
            };
            let elapsed = start.elapsed();
            records.push(IterationRecord {
                iteration,
                value,
                gradient_norm,
                step: last_step,
                elapsed,
                selection_value,
            });
            if self.config.log_period > 0 && iteration % self.config.log_period == 0 {
                debug!(
                    "iteration {iteration}: value {value:e}, gradient norm {gradient_norm:e}, step {last_step:e}"
                );
            }

            let check = IterationState {
                iteration,
                value,
                gradient_norm,
                previous_value,
                parameters_increment,
                elapsed,
            };
            if let Some(reason) = stopping.check(&check) {
                break reason;
            }
            if self.cancelled() {
                break TerminationReason::StoppedByUser;
            }

            let steepest: Vec<f64> = gradient.iter().map(|g| -g).collect();
            let mut direction = state.compute(&parameters, &gradient)?;
            if self.config.step.is_line_search() && dot(&direction, &gradient) >= 0.0 {
                trace!("iteration {iteration}: not a descent direction, restarting");
                direction = state.restart(&parameters, &gradient);
            }
            let mut rate = self.config.step.rate(
                iteration,
                objective,
                &parameters,
                value,
                &gradient,
                &direction,
            )?;
            if rate == 0.0 && self.config.step.is_line_search() {
                if direction != steepest {
                    trace!("iteration {iteration}: line search failed, restarting from steepest descent");
                    direction = state.restart(&parameters, &gradient);
                    rate = self.config.step.rate(
                        iteration,
                        objective,
                        &parameters,
                        value,
                        &gradient,
                        &direction,
                    )?;
                }
                if rate == 0.0 {
                    break TerminationReason::Converged(Convergence::NoDescent);
                }
            } else if rate == 0.0 {
                // a decayed schedule keeps running until a resource limit
                trace!("iteration {iteration}: scheduled rate has vanished");
            }

            for (p, d) in parameters.iter_mut().zip(&direction) {
                *p += rate * d;
            }
            parameters_increment = Some(rate.abs() * norm(&direction));
            previous_value = Some(value);
            last_step = rate;
            iteration += 1;
        };

        let best = match best {
            Some(b) => b,
            None => {
                return Err(NeuroptError::numerical(
                    "objective is not finite at the initial parameters",
                ))
            }
        };
        let warning = match termination {
            TerminationReason::MaxIterations | TerminationReason::MaxTime => {
                let w = ConvergenceWarning {
                    reason: termination,
                    value: best.value,
                    gradient_norm: best.gradient_norm,
                };
                warn!("{w}");
                Some(w)
            }
            _ => None,
        };
        info!(
            "training finished after {iteration} iterations: {termination}, value {:e}",
            best.value
        );

        Ok(TrainingResult {
            parameters: best.parameters,
            value: best.value,
            gradient_norm: best.gradient_norm,
            history: TrainingHistory {
                records,
                termination,
                warning,
            },
        })
    }
}
