//! Activation functions of perceptron layers.
//!
//! Every kind is a pair of plain functions stored in a static table: an
//! in-place forward map from combinations to activations, and a backward map
//! that turns `dL/da` into `dL/dz` given the activations. Threshold kinds have
//! no backward entry.

use neuropt_core::{NeuroptError, NeuroptResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activation {
    Linear,
    Logistic,
    HyperbolicTangent,
    Threshold,
    SymmetricThreshold,
    /// Vector-valued; meant for output layers.
    Softmax,
}

type ForwardFn = fn(&mut [f64]);
type BackwardFn = fn(&[f64], &mut [f64]);

struct ActivationEntry {
    name: &'static str,
    forward: ForwardFn,
    backward: Option<BackwardFn>,
}

// Indexed by `Activation as usize`.
static TABLE: [ActivationEntry; 6] = [
    ActivationEntry {
        name: "Linear",
        forward: linear,
        backward: Some(linear_backward),
    },
    ActivationEntry {
        name: "Logistic",
        forward: logistic,
        backward: Some(logistic_backward),
    },
    ActivationEntry {
        name: "HyperbolicTangent",
        forward: hyperbolic_tangent,
        backward: Some(hyperbolic_tangent_backward),
    },
    ActivationEntry {
        name: "Threshold",
        forward: threshold,
        backward: None,
    },
    ActivationEntry {
        name: "SymmetricThreshold",
        forward: symmetric_threshold,
        backward: None,
    },
    ActivationEntry {
        name: "Softmax",
        forward: softmax,
        backward: Some(softmax_backward),
    },
];

impl Activation {
    fn entry(self) -> &'static ActivationEntry {
        &TABLE[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.entry().name
    }

    pub fn is_differentiable(self) -> bool {
        self.entry().backward.is_some()
    }

    /// Maps combinations to activations in place.
    pub fn activate(self, values: &mut [f64]) {
        (self.entry().forward)(values)
    }

    /// Converts `delta` from `dL/da` to `dL/dz` in place.
    pub fn backward(self, activations: &[f64], delta: &mut [f64]) -> NeuroptResult<()> {
        if activations.len() != delta.len() {
            return Err(NeuroptError::shape(&[activations.len()], &[delta.len()]));
        }
        match self.entry().backward {
            Some(f) => {
                f(activations, delta);
                Ok(())
            }
            None => Err(NeuroptError::config(format!(
                "{} activation has no derivative",
                self.name()
            ))),
        }
    }
}

impl std::fmt::Display for Activation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Forward ────────────────────────────────────────────────────────────────

fn linear(_values: &mut [f64]) {}

fn logistic(values: &mut [f64]) {
    for v in values.iter_mut() {
        *v = 1.0 / (1.0 + (-*v).exp());
    }
}

fn hyperbolic_tangent(values: &mut [f64]) {
    for v in values.iter_mut() {
        *v = v.tanh();
    }
}

fn threshold(values: &mut [f64]) {
    for v in values.iter_mut() {
        *v = if *v < 0.0 { 0.0 } else { 1.0 };
    }
}

fn symmetric_threshold(values: &mut [f64]) {
    for v in values.iter_mut() {
        *v = if *v < 0.0 { -1.0 } else { 1.0 };
    }
}

fn softmax(values: &mut [f64]) {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    for v in values.iter_mut() {
        *v /= sum;
    }
}

// ─── Backward ───────────────────────────────────────────────────────────────

fn linear_backward(_activations: &[f64], _delta: &mut [f64]) {}

fn logistic_backward(activations: &[f64], delta: &mut [f64]) {
    for (d, &a) in delta.iter_mut().zip(activations) {
        *d *= a * (1.0 - a);
    }
}

fn hyperbolic_tangent_backward(activations: &[f64], delta: &mut [f64]) {
    for (d, &a) in delta.iter_mut().zip(activations) {
        *d *= 1.0 - a * a;
    }
}

fn softmax_backward(activations: &[f64], delta: &mut [f64]) {
    let weighted: f64 = delta.iter().zip(activations).map(|(d, a)| d * a).sum();
    for (d, &a) in delta.iter_mut().zip(activations) {
        *d = a * (*d - weighted);
    }
}
