use neuropt_core::error::check_len;
use neuropt_core::{Matrix, NeuroptError, NeuroptResult, Vector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::activation::Activation;
use crate::perceptron::{LayerSpec, PerceptronLayer};

/// Feed-forward stack of perceptron layers over one flat parameter arena.
///
/// ```text
/// [ layer 0: biases | weights ][ layer 1: biases | weights ] ...
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PerceptronParts", into = "PerceptronParts")]
pub struct MultilayerPerceptron {
    layers: Vec<PerceptronLayer>,
    parameters: Vec<f64>,
}

/// Serialized form; offsets are rebuilt and checked on the way in.
#[derive(Serialize, Deserialize)]
struct PerceptronParts {
    layers: Vec<LayerSpec>,
    parameters: Vec<f64>,
}

impl TryFrom<PerceptronParts> for MultilayerPerceptron {
    type Error = NeuroptError;

    fn try_from(parts: PerceptronParts) -> NeuroptResult<Self> {
        Self::from_parameters(&parts.layers, parts.parameters)
    }
}

impl From<MultilayerPerceptron> for PerceptronParts {
    fn from(mlp: MultilayerPerceptron) -> Self {
        PerceptronParts {
            layers: mlp.layer_specs(),
            parameters: mlp.parameters,
        }
    }
}

/// Per-layer activations of one forward pass. `activations[l]` is the output
/// of layer `l`; the input of layer `l` is `activations[l - 1]` (or the
/// network input for `l = 0`).
#[derive(Debug, Clone, PartialEq)]
pub struct PerceptronPass {
    pub input: Vec<f64>,
    pub activations: Vec<Vec<f64>>,
}

impl PerceptronPass {
    pub fn output(&self) -> &[f64] {
        self.activations.last().map(Vec::as_slice).unwrap_or(&self.input)
    }

    fn layer_input(&self, l: usize) -> &[f64] {
        if l == 0 {
            &self.input
        } else {
            &self.activations[l - 1]
        }
    }
}

// ─── Construction ───────────────────────────────────────────────────────────

impl MultilayerPerceptron {
    /// Build from a layer-size sequence `[inputs, hidden.., outputs]` with
    /// hyperbolic tangent hidden layers and a linear output layer.
    /// Parameters start at zero.
    pub fn new(architecture: &[usize]) -> NeuroptResult<Self> {
        Self::with_activations(
            architecture,
            Activation::HyperbolicTangent,
            Activation::Linear,
        )
    }

    pub fn with_activations(
        architecture: &[usize],
        hidden: Activation,
        output: Activation,
    ) -> NeuroptResult<Self> {
        if architecture.len() < 2 {
            return Err(NeuroptError::config(format!(
                "architecture needs at least inputs and outputs, got {architecture:?}"
            )));
        }
        let last = architecture.len() - 2;
        let specs: Vec<LayerSpec> = architecture
            .windows(2)
            .enumerate()
            .map(|(l, w)| LayerSpec::new(w[0], w[1], if l == last { output } else { hidden }))
            .collect();
        Self::from_layers(&specs)
    }

    /// Build from explicit layer specifications. Each layer's input count must
    /// equal the previous layer's neuron count.
    pub fn from_layers(specs: &[LayerSpec]) -> NeuroptResult<Self> {
        if specs.is_empty() {
            return Err(NeuroptError::config("perceptron needs at least one layer"));
        }
        let mut layers = Vec::with_capacity(specs.len());
        let mut offset = 0;
        for (l, spec) in specs.iter().enumerate() {
            if l > 0 && spec.inputs != specs[l - 1].neurons {
                return Err(NeuroptError::config(format!(
                    "layer {l} takes {} inputs but layer {} has {} neurons",
                    spec.inputs,
                    l - 1,
                    specs[l - 1].neurons
                )));
            }
            let layer = PerceptronLayer::new(*spec, offset)?;
            offset += layer.parameters_number();
            layers.push(layer);
        }
        Ok(MultilayerPerceptron {
            layers,
            parameters: vec![0.0; offset],
        })
    }

    /// Build from layer specifications and an existing parameter vector.
    pub fn from_parameters(specs: &[LayerSpec], parameters: Vec<f64>) -> NeuroptResult<Self> {
        let mut mlp = Self::from_layers(specs)?;
        check_len(mlp.parameters.len(), parameters.len())?;
        mlp.parameters = parameters;
        Ok(mlp)
    }

    // ─── Topology ───────────────────────────────────────────────────────────

    pub fn layers(&self) -> &[PerceptronLayer] {
        &self.layers
    }

    pub fn layer_specs(&self) -> Vec<LayerSpec> {
        self.layers.iter().map(PerceptronLayer::spec).collect()
    }

    pub fn layers_number(&self) -> usize {
        self.layers.len()
    }

    pub fn inputs_number(&self) -> usize {
        self.layers[0].inputs
    }

    pub fn outputs_number(&self) -> usize {
        self.layers[self.layers.len() - 1].neurons
    }

    /// Whether every layer has a closed-form derivative.
    pub fn is_differentiable(&self) -> bool {
        self.layers.iter().all(|l| l.activation.is_differentiable())
    }

    fn layer(&self, l: usize) -> NeuroptResult<&PerceptronLayer> {
        self.layers.get(l).ok_or(NeuroptError::IndexOutOfBounds {
            index: l,
            axis: 0,
            size: self.layers.len(),
        })
    }

    pub fn set_activation(&mut self, l: usize, activation: Activation) -> NeuroptResult<()> {
        let size = self.layers.len();
        let layer = self.layers.get_mut(l).ok_or(NeuroptError::IndexOutOfBounds {
            index: l,
            axis: 0,
            size,
        })?;
        layer.activation = activation;
        Ok(())
    }

    // ─── Parameters ─────────────────────────────────────────────────────────

    pub fn parameters_number(&self) -> usize {
        self.parameters.len()
    }

    pub fn parameters(&self) -> &[f64] {
        &self.parameters
    }

    pub fn set_parameters(&mut self, parameters: &[f64]) -> NeuroptResult<()> {
        check_len(self.parameters.len(), parameters.len())?;
        self.parameters.copy_from_slice(parameters);
        Ok(())
    }

    /// Weight matrix (`neurons x inputs`) of layer `l`.
    pub fn layer_weights(&self, l: usize) -> NeuroptResult<Matrix<f64>> {
        let layer = self.layer(l)?;
        Matrix::new(
            layer.neurons,
            layer.inputs,
            layer.weights(&self.parameters).to_vec(),
        )
    }

    pub fn layer_biases(&self, l: usize) -> NeuroptResult<Vector<f64>> {
        let layer = self.layer(l)?;
        Ok(Vector::from_slice(layer.biases(&self.parameters)))
    }

    pub fn set_layer_weights(&mut self, l: usize, weights: &Matrix<f64>) -> NeuroptResult<()> {
        let layer = self.layer(l)?;
        if weights.shape() != (layer.neurons, layer.inputs) {
            return Err(NeuroptError::shape(
                &[layer.neurons, layer.inputs],
                &[weights.rows(), weights.cols()],
            ));
        }
        let start = layer.offset + layer.neurons;
        self.parameters[start..start + weights.data().len()].copy_from_slice(weights.data());
        Ok(())
    }

    pub fn set_layer_biases(&mut self, l: usize, biases: &[f64]) -> NeuroptResult<()> {
        let layer = self.layer(l)?;
        check_len(layer.neurons, biases.len())?;
        let start = layer.offset;
        self.parameters[start..start + biases.len()].copy_from_slice(biases);
        Ok(())
    }

    /// Uniform initialization in `[minimum, maximum]`.
    pub fn randomize_uniform(&mut self, minimum: f64, maximum: f64, seed: Option<u64>) {
        let mut rng = rng(seed);
        for p in self.parameters.iter_mut() {
            *p = minimum + (maximum - minimum) * rng.gen::<f64>();
        }
    }

    /// Normal initialization (Box-Muller).
    pub fn randomize_normal(&mut self, mean: f64, standard_deviation: f64, seed: Option<u64>) {
        let mut rng = rng(seed);
        let n = self.parameters.len();
        let mut i = 0;
        while i < n {
            let u1: f64 = rng.gen::<f64>().max(1e-10);
            let u2: f64 = rng.gen::<f64>();
            let r = (-2.0 * u1.ln()).sqrt();
            let theta = 2.0 * std::f64::consts::PI * u2;
            self.parameters[i] = mean + standard_deviation * r * theta.cos();
            if i + 1 < n {
                self.parameters[i + 1] = mean + standard_deviation * r * theta.sin();
            }
            i += 2;
        }
    }

    // ─── Forward / Backward ─────────────────────────────────────────────────

    /// Output for one input using the stored parameters.
    pub fn forward(&self, input: &[f64]) -> NeuroptResult<Vec<f64>> {
        self.forward_with(&self.parameters, input)
    }

    /// Output for one input against an external parameter vector.
    pub fn forward_with(&self, parameters: &[f64], input: &[f64]) -> NeuroptResult<Vec<f64>> {
        check_len(self.parameters.len(), parameters.len())?;
        let mut x = input.to_vec();
        for layer in &self.layers {
            x = layer.forward(parameters, &x)?;
        }
        Ok(x)
    }

    /// Forward pass keeping every layer's activations for backpropagation.
    pub fn forward_pass(&self, parameters: &[f64], input: &[f64]) -> NeuroptResult<PerceptronPass> {
        check_len(self.parameters.len(), parameters.len())?;
        let mut activations: Vec<Vec<f64>> = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let x = activations.last().map(Vec::as_slice).unwrap_or(input);
            let a = layer.forward(parameters, x)?;
            activations.push(a);
        }
        Ok(PerceptronPass {
            input: input.to_vec(),
            activations,
        })
    }

    /// Accumulates `dL/dθ` into `gradient` given `dL/dy` at the output and
    /// returns `dL/dx` at the input.
    pub fn backward(
        &self,
        parameters: &[f64],
        pass: &PerceptronPass,
        output_delta: &[f64],
        gradient: &mut [f64],
    ) -> NeuroptResult<Vec<f64>> {
        check_len(self.outputs_number(), output_delta.len())?;
        let mut delta = output_delta.to_vec();
        for (l, layer) in self.layers.iter().enumerate().rev() {
            delta = layer.backward(
                parameters,
                pass.layer_input(l),
                &pass.activations[l],
                &mut delta,
                gradient,
            )?;
        }
        Ok(delta)
    }

    /// Outputs for every row of `inputs`, evaluated in parallel.
    pub fn forward_batch(&self, inputs: &Matrix<f64>) -> NeuroptResult<Matrix<f64>> {
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

fn rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use neuropt_core::NumericalDifferentiation;

    #[test]
    fn test_architecture_defaults() {
        let mlp = MultilayerPerceptron::new(&[2, 3, 1]).unwrap();
        assert_eq!(mlp.layers_number(), 2);
        assert_eq!(mlp.layers()[0].activation, Activation::HyperbolicTangent);
        assert_eq!(mlp.layers()[1].activation, Activation::Linear);
        assert_eq!(mlp.parameters_number(), 3 * 3 + 4);
        assert_eq!(mlp.layers()[1].offset, 9);
        assert_eq!(mlp.inputs_number(), 2);
        assert_eq!(mlp.outputs_number(), 1);
    }

    #[test]
    fn test_invalid_chaining() {
        let specs = [
            LayerSpec::new(2, 3, Activation::Logistic),
            LayerSpec::new(4, 1, Activation::Linear),
        ];
        assert!(matches!(
            MultilayerPerceptron::from_layers(&specs),
            Err(NeuroptError::Configuration(_))
        ));
        assert!(MultilayerPerceptron::new(&[3]).is_err());
    }

    #[test]
    fn test_set_parameters_checks_length() {
        let mut mlp = MultilayerPerceptron::new(&[2, 1]).unwrap();
        assert!(matches!(
            mlp.set_parameters(&[1.0, 2.0]),
            Err(NeuroptError::ShapeMismatch { .. })
        ));
        mlp.set_parameters(&[0.5, 1.0, 2.0]).unwrap();
        assert_eq!(mlp.layer_biases(0).unwrap().data(), &[0.5]);
        assert_eq!(mlp.layer_weights(0).unwrap().data(), &[1.0, 2.0]);
    }

    #[test]
    fn test_layer_weights_roundtrip() {
        let mut mlp = MultilayerPerceptron::new(&[2, 2, 1]).unwrap();
        let w = Matrix::new(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        mlp.set_layer_weights(0, &w).unwrap();
        mlp.set_layer_biases(1, &[7.0]).unwrap();
        assert_eq!(mlp.layer_weights(0).unwrap(), w);
        assert_eq!(mlp.parameters()[2..6], [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(mlp.parameters()[6], 7.0);
        assert!(mlp.set_layer_weights(1, &w).is_err());
        assert!(mlp.layer_biases(5).is_err());
    }

    #[test]
    fn test_forward_linear() {
        let mut mlp = MultilayerPerceptron::new(&[2, 1]).unwrap();
        mlp.set_parameters(&[0.0, 1.0, 1.0]).unwrap();
        assert_abs_diff_eq!(mlp.forward(&[2.0, 3.0]).unwrap()[0], 5.0, epsilon = 1e-12);
        let batch = Matrix::from_rows(&[vec![1.0, 1.0], vec![2.0, 2.0]]).unwrap();
        let out = mlp.forward_batch(&batch).unwrap();
        assert_eq!(out.data(), &[2.0, 4.0]);
    }

    #[test]
    fn test_randomize_is_seeded() {
        let mut a = MultilayerPerceptron::new(&[3, 4, 2]).unwrap();
        let mut b = a.clone();
        a.randomize_uniform(-1.0, 1.0, Some(3));
        b.randomize_uniform(-1.0, 1.0, Some(3));
        assert_eq!(a.parameters(), b.parameters());
        assert!(a.parameters().iter().all(|p| (-1.0..=1.0).contains(p)));

        a.randomize_normal(0.0, 1.0, Some(5));
        b.randomize_normal(0.0, 1.0, Some(5));
        assert_eq!(a.parameters(), b.parameters());
    }

    #[test]
    fn test_backward_matches_numerical() {
        let specs = [
            LayerSpec::new(3, 4, Activation::HyperbolicTangent),
            LayerSpec::new(4, 3, Activation::Logistic),
            LayerSpec::new(3, 2, Activation::Softmax),
        ];
        let mut mlp = MultilayerPerceptron::from_layers(&specs).unwrap();
        mlp.randomize_uniform(-1.0, 1.0, Some(11));
        let params = mlp.parameters().to_vec();
        let x = [0.2, -0.4, 0.9];
        let upstream = [1.5, -0.5];

        let pass = mlp.forward_pass(&params, &x).unwrap();
        let mut grad = vec![0.0; params.len()];
        mlp.backward(&params, &pass, &upstream, &mut grad).unwrap();

        let numerical = NumericalDifferentiation::default()
            .gradient(&params, |p| {
                let y = mlp.forward_with(p, &x)?;
                Ok(y.iter().zip(&upstream).map(|(y, u)| y * u).sum())
            })
            .unwrap();
        for (a, n) in grad.iter().zip(&numerical) {
            assert_abs_diff_eq!(*a, *n, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_deserialize_rebuilds_offsets() {
        let mut mlp = MultilayerPerceptron::new(&[2, 3, 1]).unwrap();
        mlp.randomize_normal(0.0, 1.0, Some(5));
        let json = serde_json::to_string(&mlp).unwrap();
        assert!(!json.contains("offset"));
        let back: MultilayerPerceptron = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mlp);
    }

    #[test]
    fn test_deserialize_rejects_inconsistent_parts() {
        let linear = r#"{"inputs":2,"neurons":1,"activation":"Linear"}"#;
        let short = format!(r#"{{"layers":[{linear}],"parameters":[0.1]}}"#);
        assert!(serde_json::from_str::<MultilayerPerceptron>(&short).is_err());

        let empty = r#"{"layers":[],"parameters":[]}"#;
        assert!(serde_json::from_str::<MultilayerPerceptron>(empty).is_err());

        let unchained = format!(r#"{{"layers":[{linear},{linear}],"parameters":[0,0,0,0,0,0]}}"#);
        assert!(serde_json::from_str::<MultilayerPerceptron>(&unchained).is_err());
    }
}
