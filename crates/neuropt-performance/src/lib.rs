//! Composite performance functional over a network and a dataset.

pub mod constraints;
pub mod functional;
pub mod regularization;

pub use constraints::Constraints;
pub use functional::{GradientMethod, PerformanceConfig, PerformanceFunctional, DEFAULT_CHUNK_SIZE};
pub use regularization::Regularization;
