pub mod measure;

pub use measure::{ErrorEvaluation, ErrorMeasure};
