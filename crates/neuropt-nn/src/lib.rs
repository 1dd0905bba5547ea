pub mod activation;
pub mod descriptor;
pub mod mlp;
pub mod network;
pub mod perceptron;
pub mod probabilistic;
pub mod processing;

pub use activation::Activation;
pub use descriptor::NetworkDescriptor;
pub use mlp::{MultilayerPerceptron, PerceptronPass};
pub use network::{NetworkPass, NeuralNetwork};
pub use perceptron::{LayerSpec, PerceptronLayer};
pub use probabilistic::{ProbabilisticLayer, ProbabilisticMethod};
pub use processing::{BoundingLayer, ScalingLayer, UnscalingLayer};
