//! Training a network against a dataset.
//!
//! The performance functional borrows the network for the whole run, so the
//! best parameters are written back only once it is dropped.

use log::info;
use neuropt_core::NeuroptResult;
use neuropt_data::DataSet;
use neuropt_nn::NeuralNetwork;
use neuropt_optim::{CancellationFlag, Trainer, TrainingConfig, TrainingHistory, TrainingResult};
use neuropt_performance::{PerformanceConfig, PerformanceFunctional};

/// Trains `network` in place and returns its final parameters and the history.
pub fn train(
    network: &mut NeuralNetwork,
    dataset: &DataSet,
    performance: &PerformanceConfig,
    training: &TrainingConfig,
) -> NeuroptResult<(Vec<f64>, TrainingHistory)> {
    let result = run(network, dataset, performance, Trainer::new(training.clone()))?;
    Ok((result.parameters, result.history))
}

/// Like [`train`], stopping at the next iteration boundary once `flag` is set.
pub fn train_with_cancellation(
    network: &mut NeuralNetwork,
    dataset: &DataSet,
    performance: &PerformanceConfig,
    training: &TrainingConfig,
    flag: CancellationFlag,
) -> NeuroptResult<(Vec<f64>, TrainingHistory)> {
    let trainer = Trainer::new(training.clone()).with_cancellation(flag);
    let result = run(network, dataset, performance, trainer)?;
    Ok((result.parameters, result.history))
}

/// Like [`train`], returning the final value and gradient norm as well.
pub fn train_detailed(
    network: &mut NeuralNetwork,
    dataset: &DataSet,
    performance: &PerformanceConfig,
    training: &TrainingConfig,
) -> NeuroptResult<TrainingResult> {
    run(network, dataset, performance, Trainer::new(training.clone()))
}

fn run(
    network: &mut NeuralNetwork,
    dataset: &DataSet,
    performance: &PerformanceConfig,
    trainer: Trainer,
) -> NeuroptResult<TrainingResult> {
    let result = {
        let functional = PerformanceFunctional::new(network, dataset, performance.clone())?;
        trainer.train(&functional, network.parameters())?
    };
    network.set_parameters(&result.parameters)?;
    info!(
        "network updated: {} ({} iterations)",
        result.history.termination,
        result.history.iterations()
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use neuropt_core::{NeuroptError, ScalingMethod};
    use neuropt_data::InstanceUse;
    use neuropt_loss::ErrorMeasure;
    use neuropt_nn::{Activation, LayerSpec, MultilayerPerceptron, ScalingLayer, UnscalingLayer};
    use neuropt_optim::{
        ConjugateGradientFormula, StepSize, StoppingCriteria, TerminationReason, TrainingDirection,
    };
    use neuropt_performance::GradientMethod;

    fn sum_dataset() -> DataSet {
        DataSet::from_pairs(
            &[vec![1.0, 1.0], vec![2.0, 2.0], vec![3.0, 3.0]],
            &[vec![2.0], vec![4.0], vec![6.0]],
        )
        .unwrap()
    }

    fn linear_network() -> NeuralNetwork {
        let mlp = MultilayerPerceptron::from_layers(&[LayerSpec::new(2, 1, Activation::Linear)])
            .unwrap();
        NeuralNetwork::new(mlp)
    }

    fn tight_stopping() -> StoppingCriteria {
        StoppingCriteria::new()
            .with_performance_goal(1e-14)
            .with_gradient_norm_goal(1e-10)
            .with_maximum_iterations(200)
    }

    #[test]
    fn test_linear_sum_is_learned() {
        let data = sum_dataset();
        let mut net = linear_network();
        let training = TrainingConfig::new().with_stopping(tight_stopping());
        let result =
            train_detailed(&mut net, &data, &PerformanceConfig::default(), &training).unwrap();

        assert!(result.history.termination.is_converged());
        assert!(result.value < 1e-10);
        // layout: bias, then weights
        let p = net.parameters();
        assert_eq!(p, result.parameters.as_slice());
        assert_abs_diff_eq!(p[0], 0.0, epsilon = 1e-4);
        assert_abs_diff_eq!(p[1] + p[2], 2.0, epsilon = 1e-4);
        assert_abs_diff_eq!(p[1], 1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(net.forward(&[4.0, 4.0]).unwrap()[0], 8.0, epsilon = 1e-3);
    }

    #[test]
    fn test_every_direction_trains() {
        let data = sum_dataset();
        let directions = [
            TrainingDirection::ConjugateGradient {
                formula: ConjugateGradientFormula::FletcherReeves,
            },
            TrainingDirection::ConjugateGradient {
                formula: ConjugateGradientFormula::PolakRibiere,
            },
            TrainingDirection::default(),
        ];
        for direction in directions {
            let mut net = linear_network();
            let training = TrainingConfig::new()
                .with_direction(direction)
                .with_stopping(tight_stopping().with_maximum_iterations(1000));
            let (_, history) =
                train(&mut net, &data, &PerformanceConfig::default(), &training).unwrap();
            let last = history.last().unwrap();
            assert!(last.value < 1e-8, "{direction:?}: {}", last.value);
        }

        let mut net = linear_network();
        let training = TrainingConfig::new()
            .with_direction(TrainingDirection::GradientDescent)
            .with_step(StepSize::Fixed { rate: 0.02 })
            .with_stopping(StoppingCriteria::new().with_performance_goal(1e-8).with_maximum_iterations(20_000));
        let (_, history) = train(&mut net, &data, &PerformanceConfig::default(), &training).unwrap();
        assert_eq!(
            history.termination,
            TerminationReason::Converged(neuropt_optim::Convergence::PerformanceGoal)
        );
    }

    #[test]
    fn test_numerical_gradient_trains() {
        let data = sum_dataset();
        let mut net = linear_network();
        let performance = PerformanceConfig::default()
            .with_gradient_method(GradientMethod::Numerical { epsilon: 1e-6 });
        let training = TrainingConfig::new().with_stopping(
            StoppingCriteria::new()
                .with_performance_goal(1e-10)
                .with_maximum_iterations(200),
        );
        let (params, _) = train(&mut net, &data, &performance, &training).unwrap();
        assert_abs_diff_eq!(params[1] + params[2], 2.0, epsilon = 1e-3);
    }

    #[test]
    fn test_cancellation_before_first_step() {
        let data = sum_dataset();
        let mut net = linear_network();
        let before = net.parameters().to_vec();
        let flag = CancellationFlag::new();
        flag.cancel();
        let (params, history) = train_with_cancellation(
            &mut net,
            &data,
            &PerformanceConfig::default(),
            &TrainingConfig::new(),
            flag,
        )
        .unwrap();
        assert_eq!(history.termination, TerminationReason::StoppedByUser);
        assert!(history.iterations() <= 2);
        assert_eq!(params, before);
        assert_eq!(net.parameters(), before.as_slice());
    }

    #[test]
    fn test_configuration_error_leaves_network_untouched() {
        let data = sum_dataset();
        let mut mlp = MultilayerPerceptron::from_layers(&[LayerSpec::new(2, 1, Activation::Threshold)])
            .unwrap();
        mlp.set_parameters(&[0.1, 0.2, 0.3]).unwrap();
        let mut net = NeuralNetwork::new(mlp);
        let r = train(&mut net, &data, &PerformanceConfig::default(), &TrainingConfig::new());
        assert!(matches!(r, Err(NeuroptError::Configuration(_))));
        assert_eq!(net.parameters(), &[0.1, 0.2, 0.3]);

        let r = train(
            &mut linear_network(),
            &data,
            &PerformanceConfig::default().without_objective(),
            &TrainingConfig::new(),
        );
        assert!(matches!(r, Err(NeuroptError::Configuration(_))));
    }

    #[test]
    fn test_scaled_network_with_selection() {
        let inputs: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64 * 0.25]).collect();
        let targets: Vec<Vec<f64>> = inputs.iter().map(|x| vec![3.0 * x[0].sin() + 10.0]).collect();
        let mut data = DataSet::from_pairs(&inputs, &targets).unwrap();
        for i in (0..40).step_by(5) {
            data.instances_mut().set_use(i, InstanceUse::Selection).unwrap();
        }
        let input_stats = data.input_statistics().unwrap();
        let target_stats = data.target_statistics().unwrap();

        let mut mlp = MultilayerPerceptron::new(&[1, 6, 1]).unwrap();
        mlp.randomize_normal(0.0, 0.5, Some(3));
        let mut net = NeuralNetwork::new(mlp)
            .with_scaling_layer(ScalingLayer::new(ScalingMethod::MinimumMaximum, input_stats))
            .unwrap()
            .with_unscaling_layer(UnscalingLayer::new(
                ScalingMethod::MeanStandardDeviation,
                target_stats,
            ))
            .unwrap();

        let performance = PerformanceConfig::new(ErrorMeasure::NormalizedSquared);
        let training = TrainingConfig::new()
            .with_stopping(StoppingCriteria::new().with_maximum_iterations(300));
        let result = train_detailed(&mut net, &data, &performance, &training).unwrap();

        let first = result.history.iter().next().unwrap();
        assert!(result.value < first.value);
        assert!(result.history.iter().all(|r| r.selection_value.is_some()));
        let values = result.history.values();
        assert!(values.windows(2).all(|w| w[1] <= w[0] + 1e-12));
    }

    #[test]
    fn test_descriptor_round_trip_after_training() {
        let data = sum_dataset();
        let mut net = linear_network();
        let training = TrainingConfig::new().with_stopping(tight_stopping());
        train(&mut net, &data, &PerformanceConfig::default(), &training).unwrap();

        let json = net.to_json().unwrap();
        let restored = NeuralNetwork::from_json(&json).unwrap();
        assert_eq!(restored.parameters(), net.parameters());
        let _: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            restored.forward(&[1.5, 2.5]).unwrap(),
            net.forward(&[1.5, 2.5]).unwrap()
        );
    }
}
