//! # neuropt
//!
//! Training engine for feed-forward neural networks.
//!
//! ## Modules
//!
//! - **core**: Vectors, matrices, statistics, scaling and numerical differentiation
//! - **data**: In-memory dataset view with instance and variable roles
//! - **nn**: Multilayer perceptron over a flat parameter vector, plus fixed scaling, unscaling, probabilistic and bounding layers
//! - **loss**: Error measures and their output gradients
//! - **performance**: Objective, regularization and constraints combined into one functional
//! - **optim**: Training directions, step-size policies, stopping criteria and the training loop
//!
//! ```ignore
//! use neuropt::prelude::*;
//!
//! let data = DataSet::from_pairs(&inputs, &targets)?;
//! let mut network = NeuralNetwork::from_architecture(&[2, 4, 1])?;
//! let (parameters, history) = train(
//!     &mut network,
//!     &data,
//!     &PerformanceConfig::default(),
//!     &TrainingConfig::default(),
//! )?;
//! ```

pub mod train;

/// Numeric containers.
pub use neuropt_core as core;

/// Dataset view.
pub use neuropt_data as data;

/// Network layers.
pub use neuropt_nn as nn;

/// Error measures.
pub use neuropt_loss as loss;

/// Performance functional.
pub use neuropt_performance as performance;

/// Optimization algorithms.
pub use neuropt_optim as optim;

pub use train::{train, train_detailed, train_with_cancellation};

pub mod prelude {
    pub use crate::train::{train, train_detailed, train_with_cancellation};
    pub use neuropt_core::{Matrix, NeuroptError, NeuroptResult, ScalingMethod, Statistics};
    pub use neuropt_data::{DataSet, InstanceSubset, InstanceUse};
    pub use neuropt_loss::ErrorMeasure;
    pub use neuropt_nn::{Activation, LayerSpec, MultilayerPerceptron, NeuralNetwork};
    pub use neuropt_optim::{
        CancellationFlag, StepSize, StoppingCriteria, TrainingConfig, TrainingDirection,
        TrainingHistory,
    };
    pub use neuropt_performance::{
        Constraints, GradientMethod, PerformanceConfig, Regularization,
    };
}
