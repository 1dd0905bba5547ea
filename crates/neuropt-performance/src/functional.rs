//! The performance functional: a weighted sum of an error term over a dataset
//! subset, a parameter-norm regularization and parameter constraints.

use std::ops::Range;

use neuropt_core::error::check_len;
use neuropt_core::{Matrix, NeuroptError, NeuroptResult, NumericalDifferentiation};
use neuropt_data::{DataSet, InstanceSubset};
use neuropt_loss::ErrorMeasure;
use neuropt_nn::{NetworkPass, NeuralNetwork};
use neuropt_optim::Objective;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::constraints::Constraints;
use crate::regularization::Regularization;

/// Instances handled by one parallel task.
pub const DEFAULT_CHUNK_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum GradientMethod {
    /// Back-propagation through the layer stack.
    #[default]
    Analytic,
    /// Central differences over the whole value.
    Numerical { epsilon: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceConfig {
    pub objective: Option<ErrorMeasure>,
    pub objective_weight: f64,
    pub regularization: Option<Regularization>,
    pub regularization_weight: f64,
    pub constraints: Option<Constraints>,
    pub constraints_weight: f64,
    pub gradient_method: GradientMethod,
    pub subset: InstanceSubset,
    pub chunk_size: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        PerformanceConfig {
            objective: Some(ErrorMeasure::default()),
            objective_weight: 1.0,
            regularization: None,
            regularization_weight: 1.0,
            constraints: None,
            constraints_weight: 1.0,
            gradient_method: GradientMethod::Analytic,
            subset: InstanceSubset::Training,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl PerformanceConfig {
    pub fn new(objective: ErrorMeasure) -> Self {
        PerformanceConfig {
            objective: Some(objective),
            ..Self::default()
        }
    }

    pub fn with_objective(mut self, objective: ErrorMeasure) -> Self {
        self.objective = Some(objective);
        self
    }

    pub fn without_objective(mut self) -> Self {
        self.objective = None;
        self
    }

    pub fn with_objective_weight(mut self, weight: f64) -> Self {
        self.objective_weight = weight;
        self
    }

    pub fn with_regularization(mut self, regularization: Regularization, weight: f64) -> Self {
        self.regularization = Some(regularization);
        self.regularization_weight = weight;
        self
    }

    pub fn with_constraints(mut self, constraints: Constraints, weight: f64) -> Self {
        self.constraints = Some(constraints);
        self.constraints_weight = weight;
        self
    }

    pub fn with_gradient_method(mut self, method: GradientMethod) -> Self {
        self.gradient_method = method;
        self
    }

    pub fn with_subset(mut self, subset: InstanceSubset) -> Self {
        self.subset = subset;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn validate(&self) -> NeuroptResult<()> {
        let weights = [
            ("objective weight", self.objective_weight),
            ("regularization weight", self.regularization_weight),
            ("constraints weight", self.constraints_weight),
        ];
        for (name, weight) in weights {
            if !(weight.is_finite() && weight >= 0.0) {
                return Err(NeuroptError::config(format!(
                    "{name} must be finite and >= 0, got {weight}"
                )));
            }
        }
        if self.chunk_size == 0 {
            return Err(NeuroptError::config("chunk size must be > 0"));
        }
        if let Some(measure) = &self.objective {
            measure.validate()?;
        }
        if let Some(constraints) = &self.constraints {
            constraints.validate()?;
        }
        if let GradientMethod::Numerical { epsilon } = self.gradient_method {
            NumericalDifferentiation::new(epsilon)?;
        }
        Ok(())
    }
}

/// Input and target rows of one instance subset.
#[derive(Debug, Clone)]
struct Batch {
    inputs: Matrix<f64>,
    targets: Matrix<f64>,
}

impl Batch {
    fn load(dataset: &DataSet, subset: InstanceSubset) -> NeuroptResult<Self> {
        Ok(Batch {
            inputs: dataset.inputs(subset)?,
            targets: dataset.targets(subset)?,
        })
    }

    fn len(&self) -> usize {
        self.inputs.rows()
    }
}

/// Borrows one network and one dataset for the duration of a training run.
///
/// Every evaluation takes an explicit parameter vector, so the optimizer can
/// try points without touching the network.
#[derive(Debug)]
pub struct PerformanceFunctional<'a> {
    network: &'a NeuralNetwork,
    dataset: &'a DataSet,
    config: PerformanceConfig,
    batch: Batch,
    selection: Option<Batch>,
}

impl<'a> PerformanceFunctional<'a> {
    pub fn new(
        network: &'a NeuralNetwork,
        dataset: &'a DataSet,
        config: PerformanceConfig,
    ) -> NeuroptResult<Self> {
        config.validate()?;
        if dataset.inputs_number() != network.inputs_number()
            || dataset.targets_number() != network.outputs_number()
        {
            return Err(NeuroptError::shape(
                &[network.inputs_number(), network.outputs_number()],
                &[dataset.inputs_number(), dataset.targets_number()],
            ));
        }
        let batch = Batch::load(dataset, config.subset)?;
        let selection = if config.subset != InstanceSubset::Selection
            && dataset.instances_number(InstanceSubset::Selection) > 0
        {
            Some(Batch::load(dataset, InstanceSubset::Selection)?)
        } else {
            None
        };
        Ok(PerformanceFunctional {
            network,
            dataset,
            config,
            batch,
            selection,
        })
    }

    pub fn network(&self) -> &NeuralNetwork {
        self.network
    }

    pub fn dataset(&self) -> &DataSet {
        self.dataset
    }

    pub fn config(&self) -> &PerformanceConfig {
        &self.config
    }

    fn objective(&self) -> NeuroptResult<ErrorMeasure> {
        self.config
            .objective
            .ok_or_else(|| NeuroptError::config("performance functional has no objective term"))
    }

    fn check_batch(&self, batch: &Batch) -> NeuroptResult<()> {
        if batch.len() == 0 {
            return Err(NeuroptError::EmptyData(format!(
                "no instances in the {:?} subset",
                self.config.subset
            )));
        }
        Ok(())
    }

    fn chunks(&self, n: usize) -> Vec<Range<usize>> {
        let size = self.config.chunk_size;
        (0..n)
            .step_by(size)
            .map(|start| start..(start + size).min(n))
            .collect()
    }

    /// Network outputs for every instance of `batch` at `parameters`.
    fn outputs(&self, parameters: &[f64], batch: &Batch) -> NeuroptResult<Matrix<f64>> {
        let rows: Vec<Vec<f64>> = self
            .chunks(batch.len())
            .into_par_iter()
            .map(|range| {
                range
                    .map(|i| self.network.forward_with(parameters, batch.inputs.row(i)))
                    .collect::<NeuroptResult<Vec<_>>>()
            })
            .collect::<NeuroptResult<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect();
        Matrix::new(
            batch.len(),
            self.network.outputs_number(),
            rows.into_iter().flatten().collect(),
        )
    }

    /// Value of the error term alone (unweighted).
    pub fn objective_value(&self, parameters: &[f64]) -> NeuroptResult<f64> {
        let measure = self.objective()?;
        check_len(self.network.parameters_number(), parameters.len())?;
        self.check_batch(&self.batch)?;
        let outputs = self.outputs(parameters, &self.batch)?;
        measure.evaluate(&outputs, &self.batch.targets)
    }

    /// Weighted value of the regularization and constraints terms.
    fn penalty_value(&self, parameters: &[f64]) -> f64 {
        let regularization = self
            .config
            .regularization
            .map_or(0.0, |r| self.config.regularization_weight * r.value(parameters));
        let constraints = self
            .config
            .constraints
            .map_or(0.0, |c| self.config.constraints_weight * c.value(parameters));
        regularization + constraints
    }

    fn add_penalty_gradient(&self, parameters: &[f64], gradient: &mut [f64]) {
        if let Some(r) = self.config.regularization {
            let w = self.config.regularization_weight;
            for (g, d) in gradient.iter_mut().zip(r.gradient(parameters)) {
                *g += w * d;
            }
        }
        if let Some(c) = self.config.constraints {
            let w = self.config.constraints_weight;
            for (g, d) in gradient.iter_mut().zip(c.gradient(parameters)) {
                *g += w * d;
            }
        }
    }

    /// Total performance at `parameters`.
    pub fn evaluate(&self, parameters: &[f64]) -> NeuroptResult<f64> {
        let objective = self.objective_value(parameters)?;
        let value = self.config.objective_weight * objective + self.penalty_value(parameters);
        if !value.is_finite() {
            return Err(NeuroptError::numerical(format!("performance is {value}")));
        }
        Ok(value)
    }

    pub fn gradient(&self, parameters: &[f64]) -> NeuroptResult<Vec<f64>> {
        Ok(self.evaluate_with_gradient(parameters)?.1)
    }

    /// Value and gradient w.r.t. the flat parameter vector.
    pub fn evaluate_with_gradient(&self, parameters: &[f64]) -> NeuroptResult<(f64, Vec<f64>)> {
        let (value, gradient) = match self.config.gradient_method {
            GradientMethod::Analytic => self.analytic_gradient(parameters)?,
            GradientMethod::Numerical { epsilon } => {
                let value = self.evaluate(parameters)?;
                let gradient = NumericalDifferentiation::new(epsilon)?
                    .gradient(parameters, |p| self.evaluate(p))?;
                (value, gradient)
            }
        };
        if !value.is_finite() || gradient.iter().any(|g| !g.is_finite()) {
            return Err(NeuroptError::numerical("non-finite performance gradient"));
        }
        Ok((value, gradient))
    }

    fn analytic_gradient(&self, parameters: &[f64]) -> NeuroptResult<(f64, Vec<f64>)> {
        let measure = self.objective()?;
        self.network.check_differentiable()?;
        check_len(self.network.parameters_number(), parameters.len())?;
        self.check_batch(&self.batch)?;

        let batch = &self.batch;
        let chunks = self.chunks(batch.len());

        let passes: Vec<Vec<NetworkPass>> = chunks
            .par_iter()
            .map(|range| {
                range
                    .clone()
                    .map(|i| self.network.forward_pass(parameters, batch.inputs.row(i)))
                    .collect::<NeuroptResult<Vec<_>>>()
            })
            .collect::<NeuroptResult<_>>()?;
        let outputs = Matrix::new(
            batch.len(),
            self.network.outputs_number(),
            passes
                .iter()
                .flatten()
                .flat_map(|pass| pass.output.iter().copied())
                .collect(),
        )?;

        let evaluation = measure.evaluate_with_gradient(&outputs, &batch.targets)?;
        let seeds = &evaluation.output_gradients;

        let partials: Vec<Vec<f64>> = chunks
            .par_iter()
            .zip(passes.par_iter())
            .map(|(range, chunk)| -> NeuroptResult<Vec<f64>> {
                let mut partial = vec![0.0; parameters.len()];
                for (i, pass) in range.clone().zip(chunk) {
                    self.network
                        .backward(parameters, pass, seeds.row(i), &mut partial)?;
                }
                Ok(partial)
            })
            .collect::<NeuroptResult<_>>()?;

        // chunk order keeps the sum independent of scheduling
        let w = self.config.objective_weight;
        let mut gradient = vec![0.0; parameters.len()];
        for partial in &partials {
            for (g, p) in gradient.iter_mut().zip(partial) {
                *g += w * p;
            }
        }
        self.add_penalty_gradient(parameters, &mut gradient);

        let value = w * evaluation.value + self.penalty_value(parameters);
        Ok((value, gradient))
    }

    /// Error term over the selection subset, `None` when there is none.
    pub fn selection_error(&self, parameters: &[f64]) -> NeuroptResult<Option<f64>> {
        let Some(selection) = &self.selection else {
            return Ok(None);
        };
        let measure = self.objective()?;
        check_len(self.network.parameters_number(), parameters.len())?;
        let outputs = self.outputs(parameters, selection)?;
        measure.evaluate(&outputs, &selection.targets).map(Some)
    }
}

impl Objective for PerformanceFunctional<'_> {
    fn dimension(&self) -> usize {
        self.network.parameters_number()
    }

    fn value(&self, parameters: &[f64]) -> NeuroptResult<f64> {
        self.evaluate(parameters)
    }

    fn value_and_gradient(&self, parameters: &[f64]) -> NeuroptResult<(f64, Vec<f64>)> {
        self.evaluate_with_gradient(parameters)
    }

    fn selection_value(&self, parameters: &[f64]) -> NeuroptResult<Option<f64>> {
        self.selection_error(parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use neuropt_core::{ScalingMethod, Statistics};
    use neuropt_data::InstanceUse;
    use neuropt_nn::{
        Activation, LayerSpec, MultilayerPerceptron, ProbabilisticLayer, ProbabilisticMethod,
        ScalingLayer, UnscalingLayer,
    };

    fn dataset() -> DataSet {
        let inputs: Vec<Vec<f64>> = (0..20)
            .map(|i| {
                let x = i as f64 / 10.0;
                vec![x, (x * 1.3).sin()]
            })
            .collect();
        let targets: Vec<Vec<f64>> = inputs
            .iter()
            .map(|x| vec![x[0] + 0.5 * x[1], (x[0] * x[1]).tanh()])
            .collect();
        DataSet::from_pairs(&inputs, &targets).unwrap()
    }

    fn network(output: Activation) -> NeuralNetwork {
        let mut mlp = MultilayerPerceptron::from_layers(&[
            LayerSpec::new(2, 4, Activation::HyperbolicTangent),
            LayerSpec::new(4, 2, output),
        ])
        .unwrap();
        mlp.randomize_uniform(-0.8, 0.8, Some(5));
        NeuralNetwork::new(mlp)
            .with_scaling_layer(ScalingLayer::new(
                ScalingMethod::MeanStandardDeviation,
                vec![
                    Statistics::new(0.0, 1.9, 0.95, 0.6),
                    Statistics::new(-1.0, 1.0, 0.2, 0.7),
                ],
            ))
            .unwrap()
            .with_unscaling_layer(UnscalingLayer::new(
                ScalingMethod::MinimumMaximum,
                vec![
                    Statistics::new(0.0, 3.0, 1.5, 1.0),
                    Statistics::new(-1.0, 1.0, 0.0, 0.5),
                ],
            ))
            .unwrap()
    }

    fn assert_gradients_agree(network: &NeuralNetwork, data: &DataSet, config: PerformanceConfig) {
        let analytic = PerformanceFunctional::new(network, data, config.clone()).unwrap();
        let numerical = PerformanceFunctional::new(
            network,
            data,
            config.with_gradient_method(GradientMethod::Numerical { epsilon: 1e-6 }),
        )
        .unwrap();
        let params = network.parameters();
        let (va, ga) = analytic.evaluate_with_gradient(params).unwrap();
        let (vn, gn) = numerical.evaluate_with_gradient(params).unwrap();
        assert_relative_eq!(va, vn, max_relative = 1e-12);
        for (a, n) in ga.iter().zip(&gn) {
            assert_relative_eq!(*a, *n, max_relative = 1e-4, epsilon = 1e-7);
        }
    }

    #[test]
    fn test_gradient_matches_numerical() {
        let data = dataset();
        let net = network(Activation::Linear);
        for measure in [
            ErrorMeasure::SumSquared,
            ErrorMeasure::MeanSquared,
            ErrorMeasure::RootMeanSquared,
            ErrorMeasure::NormalizedSquared,
            ErrorMeasure::Minkowski { exponent: 1.5 },
        ] {
            assert_gradients_agree(&net, &data, PerformanceConfig::new(measure));
        }
    }

    #[test]
    fn test_gradient_with_softmax_and_penalties() {
        let inputs: Vec<Vec<f64>> = (0..12).map(|i| vec![i as f64 / 6.0, 1.0 - i as f64 / 12.0]).collect();
        let targets: Vec<Vec<f64>> = (0..12)
            .map(|i| if i % 3 == 0 { vec![1.0, 0.0] } else { vec![0.0, 1.0] })
            .collect();
        let data = DataSet::from_pairs(&inputs, &targets).unwrap();
        let mut mlp = MultilayerPerceptron::from_layers(&[
            LayerSpec::new(2, 3, Activation::Logistic),
            LayerSpec::new(3, 2, Activation::Linear),
        ])
        .unwrap();
        mlp.randomize_normal(0.0, 0.5, Some(8));
        let net = NeuralNetwork::new(mlp)
            .with_probabilistic_layer(ProbabilisticLayer::new(ProbabilisticMethod::Softmax));
        let config = PerformanceConfig::new(ErrorMeasure::CrossEntropy)
            .with_regularization(Regularization::SquaredParametersNorm, 0.01)
            .with_constraints(
                Constraints::ParameterBounds {
                    lower: -0.3,
                    upper: 0.3,
                },
                2.0,
            );
        assert_gradients_agree(&net, &data, config);
    }

    #[test]
    fn test_terms_are_summed_with_weights() {
        let data = dataset();
        let net = network(Activation::Linear);
        let params = net.parameters();
        let base = PerformanceFunctional::new(&net, &data, PerformanceConfig::default()).unwrap();
        let objective = base.evaluate(params).unwrap();

        let config = PerformanceConfig::default()
            .with_objective_weight(0.5)
            .with_regularization(Regularization::NeuralParametersNorm, 0.1)
            .with_constraints(Constraints::ParametersNormTarget { target: 1.0 }, 3.0);
        let f = PerformanceFunctional::new(&net, &data, config).unwrap();
        let expected = 0.5 * objective
            + 0.1 * Regularization::NeuralParametersNorm.value(params)
            + 3.0 * Constraints::ParametersNormTarget { target: 1.0 }.value(params);
        assert_relative_eq!(f.evaluate(params).unwrap(), expected, max_relative = 1e-12);
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let data = dataset();
        let net = network(Activation::Linear);
        let params = net.parameters();
        let one = PerformanceFunctional::new(&net, &data, PerformanceConfig::default().with_chunk_size(3))
            .unwrap();
        let (v1, g1) = one.evaluate_with_gradient(params).unwrap();
        let (v2, g2) = one.evaluate_with_gradient(params).unwrap();
        assert_eq!(v1, v2);
        assert_eq!(g1, g2);

        let whole = PerformanceFunctional::new(&net, &data, PerformanceConfig::default()).unwrap();
        let (v3, g3) = whole.evaluate_with_gradient(params).unwrap();
        assert_relative_eq!(v1, v3, max_relative = 1e-12);
        for (a, b) in g1.iter().zip(&g3) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_missing_objective_is_configuration_error() {
        let data = dataset();
        let net = network(Activation::Linear);
        let f = PerformanceFunctional::new(&net, &data, PerformanceConfig::default().without_objective())
            .unwrap();
        assert!(matches!(f.evaluate(net.parameters()), Err(NeuroptError::Configuration(_))));
        assert!(matches!(
            f.evaluate_with_gradient(net.parameters()),
            Err(NeuroptError::Configuration(_))
        ));
    }

    #[test]
    fn test_threshold_needs_numerical_gradient() {
        let data = dataset();
        let net = network(Activation::Threshold);
        let analytic = PerformanceFunctional::new(&net, &data, PerformanceConfig::default()).unwrap();
        assert!(analytic.evaluate(net.parameters()).is_ok());
        assert!(matches!(
            analytic.evaluate_with_gradient(net.parameters()),
            Err(NeuroptError::Configuration(_))
        ));

        let numerical = PerformanceFunctional::new(
            &net,
            &data,
            PerformanceConfig::default().with_gradient_method(GradientMethod::Numerical { epsilon: 1e-6 }),
        )
        .unwrap();
        assert!(numerical.evaluate_with_gradient(net.parameters()).is_ok());
    }

    #[test]
    fn test_shape_mismatch() {
        let data = dataset();
        let net = NeuralNetwork::from_architecture(&[3, 2]).unwrap();
        assert!(matches!(
            PerformanceFunctional::new(&net, &data, PerformanceConfig::default()),
            Err(NeuroptError::ShapeMismatch { .. })
        ));

        let net = network(Activation::Linear);
        let f = PerformanceFunctional::new(&net, &data, PerformanceConfig::default()).unwrap();
        assert!(matches!(f.evaluate(&[0.0; 3]), Err(NeuroptError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_selection_error() {
        let mut data = dataset();
        let net = network(Activation::Linear);
        let f = PerformanceFunctional::new(&net, &data, PerformanceConfig::default()).unwrap();
        assert_eq!(f.selection_error(net.parameters()).unwrap(), None);

        for i in 15..20 {
            data.instances_mut().set_use(i, InstanceUse::Selection).unwrap();
        }
        let f = PerformanceFunctional::new(&net, &data, PerformanceConfig::default()).unwrap();
        let selection = f.selection_error(net.parameters()).unwrap().unwrap();

        let on_selection = PerformanceFunctional::new(
            &net,
            &data,
            PerformanceConfig::default().with_subset(InstanceSubset::Selection),
        )
        .unwrap();
        assert_relative_eq!(selection, on_selection.objective_value(net.parameters()).unwrap());
    }

    #[test]
    fn test_empty_subset() {
        let data = dataset();
        let net = network(Activation::Linear);
        let f = PerformanceFunctional::new(
            &net,
            &data,
            PerformanceConfig::default().with_subset(InstanceSubset::Testing),
        )
        .unwrap();
        assert!(matches!(f.evaluate(net.parameters()), Err(NeuroptError::EmptyData(_))));
    }

    #[test]
    fn test_invalid_config() {
        assert!(PerformanceConfig::default().with_objective_weight(-1.0).validate().is_err());
        assert!(PerformanceConfig::default().with_chunk_size(0).validate().is_err());
        assert!(PerformanceConfig::new(ErrorMeasure::Minkowski { exponent: 0.5 })
            .validate()
            .is_err());
    }
}
