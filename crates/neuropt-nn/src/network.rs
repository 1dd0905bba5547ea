use neuropt_core::error::check_len;
use neuropt_core::{Matrix, NeuroptError, NeuroptResult};
use rayon::prelude::*;

use crate::mlp::{MultilayerPerceptron, PerceptronPass};
use crate::probabilistic::ProbabilisticLayer;
use crate::processing::{BoundingLayer, ScalingLayer, UnscalingLayer};

/// A multilayer perceptron with its optional fixed layers, applied in the
/// order scaling, perceptron, unscaling, probabilistic, bounding.
#[derive(Debug, Clone, PartialEq)]
pub struct NeuralNetwork {
    pub(crate) scaling: Option<ScalingLayer>,
    pub(crate) perceptron: MultilayerPerceptron,
    pub(crate) unscaling: Option<UnscalingLayer>,
    pub(crate) probabilistic: Option<ProbabilisticLayer>,
    pub(crate) bounding: Option<BoundingLayer>,
}

/// Intermediate values of one forward pass, kept for backpropagation.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkPass {
    pub perceptron: PerceptronPass,
    pub unscaled: Vec<f64>,
    pub probabilistic: Vec<f64>,
    pub output: Vec<f64>,
}

impl NeuralNetwork {
    pub fn new(perceptron: MultilayerPerceptron) -> Self {
        NeuralNetwork {
            scaling: None,
            perceptron,
            unscaling: None,
            probabilistic: None,
            bounding: None,
        }
    }

    /// Perceptron with default activations and no fixed layers.
    pub fn from_architecture(architecture: &[usize]) -> NeuroptResult<Self> {
        Ok(Self::new(MultilayerPerceptron::new(architecture)?))
    }

    pub fn with_scaling_layer(mut self, layer: ScalingLayer) -> NeuroptResult<Self> {
        check_len(self.inputs_number(), layer.size())?;
        self.scaling = Some(layer);
        Ok(self)
    }

    pub fn with_unscaling_layer(mut self, layer: UnscalingLayer) -> NeuroptResult<Self> {
        check_len(self.outputs_number(), layer.size())?;
        self.unscaling = Some(layer);
        Ok(self)
    }

    pub fn with_probabilistic_layer(mut self, layer: ProbabilisticLayer) -> Self {
        self.probabilistic = Some(layer);
        self
    }

    pub fn with_bounding_layer(mut self, layer: BoundingLayer) -> NeuroptResult<Self> {
        check_len(self.outputs_number(), layer.size())?;
        self.bounding = Some(layer);
        Ok(self)
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn perceptron(&self) -> &MultilayerPerceptron {
        &self.perceptron
    }

    pub fn perceptron_mut(&mut self) -> &mut MultilayerPerceptron {
        &mut self.perceptron
    }

    pub fn scaling_layer(&self) -> Option<&ScalingLayer> {
        self.scaling.as_ref()
    }

    pub fn unscaling_layer(&self) -> Option<&UnscalingLayer> {
        self.unscaling.as_ref()
    }

    pub fn probabilistic_layer(&self) -> Option<&ProbabilisticLayer> {
        self.probabilistic.as_ref()
    }

    pub fn bounding_layer(&self) -> Option<&BoundingLayer> {
        self.bounding.as_ref()
    }

    pub fn inputs_number(&self) -> usize {
        self.perceptron.inputs_number()
    }

    pub fn outputs_number(&self) -> usize {
        self.perceptron.outputs_number()
    }

    pub fn parameters_number(&self) -> usize {
        self.perceptron.parameters_number()
    }

    pub fn parameters(&self) -> &[f64] {
        self.perceptron.parameters()
    }

    pub fn set_parameters(&mut self, parameters: &[f64]) -> NeuroptResult<()> {
        self.perceptron.set_parameters(parameters)
    }

    /// Whether backpropagation can run through every layer.
    pub fn is_differentiable(&self) -> bool {
        self.perceptron.is_differentiable()
            && self.probabilistic.map_or(true, |p| p.is_differentiable())
    }

    /// Fails with a `Configuration` error naming the first layer without a
    /// derivative.
    pub fn check_differentiable(&self) -> NeuroptResult<()> {
        for (l, layer) in self.perceptron.layers().iter().enumerate() {
            if !layer.activation.is_differentiable() {
                return Err(NeuroptError::config(format!(
                    "layer {l} uses the {} activation, which has no derivative",
                    layer.activation
                )));
            }
        }
        if let Some(p) = &self.probabilistic {
            if !p.is_differentiable() {
                return Err(NeuroptError::config(format!(
                    "{:?} probabilistic layer has no derivative",
                    p.method
                )));
            }
        }
        Ok(())
    }

    // ─── Forward / Backward ─────────────────────────────────────────────────

    pub fn forward(&self, input: &[f64]) -> NeuroptResult<Vec<f64>> {
        self.forward_with(self.perceptron.parameters(), input)
    }

    pub fn forward_with(&self, parameters: &[f64], input: &[f64]) -> NeuroptResult<Vec<f64>> {
        Ok(self.forward_pass(parameters, input)?.output)
    }

    pub fn forward_pass(&self, parameters: &[f64], input: &[f64]) -> NeuroptResult<NetworkPass> {
        check_len(self.inputs_number(), input.len())?;
        let scaled = match &self.scaling {
            Some(s) => s.forward(input)?,
            None => input.to_vec(),
        };
        let perceptron = self.perceptron.forward_pass(parameters, &scaled)?;
        let unscaled = match &self.unscaling {
            Some(u) => u.forward(perceptron.output())?,
            None => perceptron.output().to_vec(),
        };
        let probabilistic = match &self.probabilistic {
            Some(p) => p.forward(&unscaled),
            None => unscaled.clone(),
        };
        let output = match &self.bounding {
            Some(b) => b.forward(&probabilistic)?,
            None => probabilistic.clone(),
        };
        Ok(NetworkPass {
            perceptron,
            unscaled,
            probabilistic,
            output,
        })
    }

    /// Accumulates `dL/dθ` into `gradient` from `dL/dy` at the network output.
    pub fn backward(
        &self,
        parameters: &[f64],
        pass: &NetworkPass,
        output_delta: &[f64],
        gradient: &mut [f64],
    ) -> NeuroptResult<()> {
        check_len(self.outputs_number(), output_delta.len())?;
        let mut delta = match &self.bounding {
            Some(b) => b.backward(&pass.probabilistic, output_delta)?,
            None => output_delta.to_vec(),
        };
        if let Some(p) = &self.probabilistic {
            delta = p.backward(&pass.probabilistic, &delta)?;
        }
        if let Some(u) = &self.unscaling {
            delta = u.backward(&delta)?;
        }
        self.perceptron
            .backward(parameters, &pass.perceptron, &delta, gradient)?;
        Ok(())
    }

    /// Outputs for every row of `inputs` (instances x inputs), in parallel.
    pub fn calculate_outputs(&self, inputs: &Matrix<f64>) -> NeuroptResult<Matrix<f64>> {
        check_len(self.inputs_number(), inputs.cols())?;
        let rows: Vec<Vec<f64>> = (0..inputs.rows())
            .into_par_iter()
            .map(|i| self.forward(inputs.row(i)))
            .collect::<NeuroptResult<_>>()?;
        Matrix::new(
            rows.len(),
            self.outputs_number(),
            rows.into_iter().flatten().collect(),
        )
    }
}
