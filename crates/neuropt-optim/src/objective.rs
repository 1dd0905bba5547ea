use neuropt_core::NeuroptResult;

/// A differentiable scalar function of a flat parameter vector.
///
/// Implementations report non-finite results either by returning them (the
/// trainer checks) or with a `Numerical` error; any other error aborts the run.
pub trait Objective {
    /// Length of the parameter vector.
    fn dimension(&self) -> usize;

    fn value(&self, parameters: &[f64]) -> NeuroptResult<f64>;

    fn value_and_gradient(&self, parameters: &[f64]) -> NeuroptResult<(f64, Vec<f64>)>;

    /// Value on held-out data, if there is any.
    fn selection_value(&self, _parameters: &[f64]) -> NeuroptResult<Option<f64>> {
        Ok(None)
    }
}
