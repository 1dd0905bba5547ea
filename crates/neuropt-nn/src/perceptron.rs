use neuropt_core::error::check_len;
use neuropt_core::{NeuroptError, NeuroptResult};
use serde::{Deserialize, Serialize};

use crate::activation::Activation;

/// Shape and activation of one perceptron layer, independent of any parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub inputs: usize,
    pub neurons: usize,
    pub activation: Activation,
}

impl LayerSpec {
    pub fn new(inputs: usize, neurons: usize, activation: Activation) -> Self {
        LayerSpec {
            inputs,
            neurons,
            activation,
        }
    }
}

/// Dense layer `activation(W·x + b)` whose parameters live in the
/// perceptron's arena at `offset`: `neurons` biases, then the
/// `neurons x inputs` weights row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct PerceptronLayer {
    pub inputs: usize,
    pub neurons: usize,
    pub offset: usize,
    pub activation: Activation,
}

impl PerceptronLayer {
    pub fn new(spec: LayerSpec, offset: usize) -> NeuroptResult<Self> {
        if spec.inputs == 0 || spec.neurons == 0 {
            return Err(NeuroptError::config(format!(
                "layer must have at least one input and one neuron, got {}x{}",
                spec.inputs, spec.neurons
            )));
        }
        Ok(PerceptronLayer {
            inputs: spec.inputs,
            neurons: spec.neurons,
            offset,
            activation: spec.activation,
        })
    }

    pub fn spec(&self) -> LayerSpec {
        LayerSpec::new(self.inputs, self.neurons, self.activation)
    }

    pub fn parameters_number(&self) -> usize {
        (self.inputs + 1) * self.neurons
    }

    /// This layer's slice of a full parameter vector.
    pub fn parameters<'p>(&self, all: &'p [f64]) -> &'p [f64] {
        &all[self.offset..self.offset + self.parameters_number()]
    }

    fn parameters_mut<'p>(&self, all: &'p mut [f64]) -> &'p mut [f64] {
        &mut all[self.offset..self.offset + self.parameters_number()]
    }

    pub fn biases<'p>(&self, all: &'p [f64]) -> &'p [f64] {
        &self.parameters(all)[..self.neurons]
    }

    pub fn weights<'p>(&self, all: &'p [f64]) -> &'p [f64] {
        &self.parameters(all)[self.neurons..]
    }

    /// Combinations `W·x + b`.
    pub fn combinations(&self, all: &[f64], input: &[f64]) -> NeuroptResult<Vec<f64>> {
        check_len(self.inputs, input.len())?;
        let biases = self.biases(all);
        let weights = self.weights(all);
        Ok((0..self.neurons)
            .map(|j| {
                let row = &weights[j * self.inputs..(j + 1) * self.inputs];
                biases[j] + row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>()
            })
            .collect())
    }

    pub fn forward(&self, all: &[f64], input: &[f64]) -> NeuroptResult<Vec<f64>> {
        let mut out = self.combinations(all, input)?;
        self.activation.activate(&mut out);
        Ok(out)
    }

    /// Backpropagates `delta` (`dL/da`, overwritten with `dL/dz`) through the
    /// layer, accumulating parameter derivatives into `gradient` (same layout
    /// as `all`) and returning `dL/dx`.
    pub fn backward(
        &self,
        all: &[f64],
        input: &[f64],
        activations: &[f64],
        delta: &mut [f64],
        gradient: &mut [f64],
    ) -> NeuroptResult<Vec<f64>> {
        check_len(self.inputs, input.len())?;
        check_len(self.neurons, delta.len())?;
        check_len(all.len(), gradient.len())?;
        self.activation.backward(activations, delta)?;

        let weights = self.weights(all);
        let mut input_delta = vec![0.0; self.inputs];
        let local = self.parameters_mut(gradient);
        let (bias_grad, weight_grad) = local.split_at_mut(self.neurons);
        for j in 0..self.neurons {
            let dz = delta[j];
            bias_grad[j] += dz;
            let row = j * self.inputs;
            for i in 0..self.inputs {
                weight_grad[row + i] += dz * input[i];
                input_delta[i] += weights[row + i] * dz;
            }
        }
        Ok(input_delta)
    }
}
