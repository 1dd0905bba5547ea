use std::time::Duration;

use neuropt_core::{NeuroptError, NeuroptResult};
use serde::{Deserialize, Serialize};

use crate::history::{Convergence, TerminationReason};

/// Stopping criteria. Zero tolerances disable the increment criteria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoppingCriteria {
    /// Stop once the value is at or below this goal.
    pub performance_goal: Option<f64>,
    pub gradient_norm_goal: f64,
    pub minimum_parameters_increment: f64,
    pub minimum_performance_increase: f64,
    pub maximum_iterations: usize,
    pub maximum_time: Duration,
}

impl Default for StoppingCriteria {
    fn default() -> Self {
        StoppingCriteria {
            performance_goal: None,
            gradient_norm_goal: 0.0,
            minimum_parameters_increment: 0.0,
            minimum_performance_increase: 0.0,
            maximum_iterations: 1000,
            maximum_time: Duration::from_secs(3600),
        }
    }
}

/// What the trainer knows at the top of an iteration.
#[derive(Debug, Clone, Copy)]
pub struct IterationState {
    pub iteration: usize,
    pub value: f64,
    pub gradient_norm: f64,
    pub previous_value: Option<f64>,
    /// Norm of the last parameter update, `None` before the first step.
    pub parameters_increment: Option<f64>,
    pub elapsed: Duration,
}

impl StoppingCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_performance_goal(mut self, goal: f64) -> Self {
        self.performance_goal = Some(goal);
        self
    }

    pub fn with_gradient_norm_goal(mut self, goal: f64) -> Self {
        self.gradient_norm_goal = goal;
        self
    }

    pub fn with_minimum_parameters_increment(mut self, tolerance: f64) -> Self {
        self.minimum_parameters_increment = tolerance;
        self
    }

    pub fn with_minimum_performance_increase(mut self, tolerance: f64) -> Self {
        self.minimum_performance_increase = tolerance;
        self
    }

    pub fn with_maximum_iterations(mut self, iterations: usize) -> Self {
        self.maximum_iterations = iterations;
        self
    }

    pub fn with_maximum_time(mut self, time: Duration) -> Self {
        self.maximum_time = time;
        self
    }

    pub fn validate(&self) -> NeuroptResult<()> {
        let tolerances = [
            ("gradient norm goal", self.gradient_norm_goal),
            ("minimum parameters increment", self.minimum_parameters_increment),
            ("minimum performance increase", self.minimum_performance_increase),
        ];
        for (name, value) in tolerances {
            if !(value.is_finite() && value >= 0.0) {
                return Err(NeuroptError::config(format!(
                    "{name} must be finite and >= 0, got {value}"
                )));
            }
        }
        if let Some(goal) = self.performance_goal {
            if goal.is_nan() {
                return Err(NeuroptError::config("performance goal is NaN"));
            }
        }
        Ok(())
    }

    /// First criterion met, in priority order.
    pub fn check(&self, state: &IterationState) -> Option<TerminationReason> {
        if self.performance_goal.is_some_and(|goal| state.value <= goal) {
            return Some(TerminationReason::Converged(Convergence::PerformanceGoal));
        }
        if state.gradient_norm <= self.gradient_norm_goal {
            return Some(TerminationReason::Converged(Convergence::GradientNormGoal));
        }
        if self.minimum_parameters_increment > 0.0
            && state
                .parameters_increment
                .is_some_and(|inc| inc <= self.minimum_parameters_increment)
        {
            return Some(TerminationReason::Converged(
                Convergence::MinimumParametersIncrement,
            ));
        }
        if self.minimum_performance_increase > 0.0
            && state
                .previous_value
                .is_some_and(|prev| prev - state.value <= self.minimum_performance_increase)
        {
            return Some(TerminationReason::Converged(
                Convergence::MinimumPerformanceIncrease,
            ));
        }
        if state.iteration >= self.maximum_iterations {
            return Some(TerminationReason::MaxIterations);
        }
        if state.elapsed >= self.maximum_time {
            return Some(TerminationReason::MaxTime);
        }
        None
    }
}
