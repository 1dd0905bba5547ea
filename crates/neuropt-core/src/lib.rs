pub mod dtype;
pub mod error;
pub mod matrix;
pub mod numerical;
pub mod scaling;
pub mod statistics;
pub mod vector;

pub use dtype::Float;
pub use error::{NeuroptError, NeuroptResult};
pub use matrix::Matrix;
pub use numerical::NumericalDifferentiation;
pub use scaling::ScalingMethod;
pub use statistics::Statistics;
pub use vector::Vector;
