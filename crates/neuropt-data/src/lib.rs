pub mod dataset;
pub mod instances;
pub mod variables;

pub use dataset::DataSet;
pub use instances::{InstanceSubset, InstanceUse, Instances};
pub use variables::{VariableUse, Variables};
