use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which tolerance a converged run met.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Convergence {
    PerformanceGoal,
    GradientNormGoal,
    MinimumParametersIncrement,
    MinimumPerformanceIncrease,
    /// No step along steepest descent decreases the value.
    NoDescent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    Converged(Convergence),
    MaxIterations,
    MaxTime,
    StoppedByUser,
    NumericalError,
}

impl TerminationReason {
    pub fn is_converged(&self) -> bool {
        matches!(self, TerminationReason::Converged(_))
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::Converged(c) => write!(f, "converged ({c:?})"),
            TerminationReason::MaxIterations => f.write_str("maximum number of iterations reached"),
            TerminationReason::MaxTime => f.write_str("maximum training time reached"),
            TerminationReason::StoppedByUser => f.write_str("stopped by user"),
            TerminationReason::NumericalError => f.write_str("numerical error"),
        }
    }
}

/// Raised when a run hits a resource limit before any tolerance. The result
/// is still usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceWarning {
    pub reason: TerminationReason,
    pub value: f64,
    pub gradient_norm: f64,
}

impl fmt::Display for ConvergenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} before convergence (value {:e}, gradient norm {:e})",
            self.reason, self.value, self.gradient_norm
        )
    }
}

/// One evaluated point of a run. `step` is the rate that led to this point
/// (0 for the initial one).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub value: f64,
    pub gradient_norm: f64,
    pub step: f64,
    pub elapsed: Duration,
    pub selection_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub records: Vec<IterationRecord>,
    pub termination: TerminationReason,
    pub warning: Option<ConvergenceWarning>,
}

impl TrainingHistory {
    pub fn iter(&self) -> std::slice::Iter<'_, IterationRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&IterationRecord> {
        self.records.last()
    }

    /// Number of completed iterations (steps taken).
    pub fn iterations(&self) -> usize {
        self.records.last().map_or(0, |r| r.iteration)
    }

    pub fn values(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.value).collect()
    }
}

impl<'a> IntoIterator for &'a TrainingHistory {
    type Item = &'a IterationRecord;
    type IntoIter = std::slice::Iter<'a, IterationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
