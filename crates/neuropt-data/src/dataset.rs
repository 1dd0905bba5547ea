use neuropt_core::{Matrix, NeuroptError, NeuroptResult, ScalingMethod, Statistics};
use serde::{Deserialize, Serialize};

use crate::instances::{InstanceSubset, Instances};
use crate::variables::Variables;

/// Materialized dataset: an instances x variables matrix with a row
/// partition and column roles.
///
/// Loading from files is left to callers; this type only slices what is
/// already in memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSet {
    data: Matrix<f64>,
    variables: Variables,
    instances: Instances,
}

impl DataSet {
    /// Every row is a training instance; the first `inputs` columns are inputs.
    pub fn new(data: Matrix<f64>, inputs: usize) -> NeuroptResult<Self> {
        let variables = Variables::new(data.cols(), inputs)?;
        let instances = Instances::new(data.rows());
        Ok(DataSet {
            data,
            variables,
            instances,
        })
    }

    pub fn with_roles(
        data: Matrix<f64>,
        variables: Variables,
        instances: Instances,
    ) -> NeuroptResult<Self> {
        if variables.len() != data.cols() {
            return Err(NeuroptError::shape(&[data.cols()], &[variables.len()]));
        }
        if instances.len() != data.rows() {
            return Err(NeuroptError::shape(&[data.rows()], &[instances.len()]));
        }
        Ok(DataSet {
            data,
            variables,
            instances,
        })
    }

    /// Build from paired input and target rows.
    pub fn from_pairs(inputs: &[Vec<f64>], targets: &[Vec<f64>]) -> NeuroptResult<Self> {
        if inputs.len() != targets.len() {
            return Err(NeuroptError::shape(&[inputs.len()], &[targets.len()]));
        }
        if inputs.is_empty() {
            return Err(NeuroptError::EmptyData("dataset has no instances".to_string()));
        }
        let n_inputs = inputs[0].len();
        let n_targets = targets[0].len();
        for (x, t) in inputs.iter().zip(targets) {
            if x.len() != n_inputs || t.len() != n_targets {
                return Err(NeuroptError::shape(&[n_inputs, n_targets], &[x.len(), t.len()]));
            }
        }
        let rows: Vec<Vec<f64>> = inputs
            .iter()
            .zip(targets)
            .map(|(x, t)| x.iter().chain(t).copied().collect())
            .collect();
        DataSet::new(Matrix::from_rows(&rows)?, n_inputs)
    }

    pub fn data(&self) -> &Matrix<f64> {
        &self.data
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn instances(&self) -> &Instances {
        &self.instances
    }

    pub fn instances_mut(&mut self) -> &mut Instances {
        &mut self.instances
    }

    pub fn inputs_number(&self) -> usize {
        self.variables.inputs_number()
    }

    pub fn targets_number(&self) -> usize {
        self.variables.targets_number()
    }

    pub fn instances_number(&self, subset: InstanceSubset) -> usize {
        self.instances.count(subset)
    }

    /// Input matrix (instances x inputs) of a subset.
    pub fn inputs(&self, subset: InstanceSubset) -> NeuroptResult<Matrix<f64>> {
        self.data.submatrix(
            &self.instances.indices(subset),
            &self.variables.input_indices(),
        )
    }

    /// Target matrix (instances x targets) of a subset.
    pub fn targets(&self, subset: InstanceSubset) -> NeuroptResult<Matrix<f64>> {
        self.data.submatrix(
            &self.instances.indices(subset),
            &self.variables.target_indices(),
        )
    }

    // ─── Statistics and Scaling ─────────────────────────────────────────────

    /// Per-variable statistics over all used instances.
    pub fn variable_statistics(&self) -> NeuroptResult<Vec<Statistics<f64>>> {
        self.data
            .select_rows(&self.instances.indices(InstanceSubset::All))?
            .column_statistics()
    }

    pub fn input_statistics(&self) -> NeuroptResult<Vec<Statistics<f64>>> {
        self.inputs(InstanceSubset::All)?.column_statistics()
    }

    pub fn target_statistics(&self) -> NeuroptResult<Vec<Statistics<f64>>> {
        self.targets(InstanceSubset::All)?.column_statistics()
    }

    /// Scales the input columns in place and returns the statistics used.
    pub fn scale_inputs(&mut self, method: ScalingMethod) -> NeuroptResult<Vec<Statistics<f64>>> {
        let stats = self.input_statistics()?;
        self.apply_to_columns(&self.variables.input_indices(), &stats, method, true)?;
        Ok(stats)
    }

    /// Scales the target columns in place and returns the statistics used.
    pub fn scale_targets(&mut self, method: ScalingMethod) -> NeuroptResult<Vec<Statistics<f64>>> {
        let stats = self.target_statistics()?;
        self.apply_to_columns(&self.variables.target_indices(), &stats, method, true)?;
        Ok(stats)
    }

    pub fn unscale_inputs(
        &mut self,
        method: ScalingMethod,
        stats: &[Statistics<f64>],
    ) -> NeuroptResult<()> {
        self.apply_to_columns(&self.variables.input_indices(), stats, method, false)
    }

    pub fn unscale_targets(
        &mut self,
        method: ScalingMethod,
        stats: &[Statistics<f64>],
    ) -> NeuroptResult<()> {
        self.apply_to_columns(&self.variables.target_indices(), stats, method, false)
    }

    fn apply_to_columns(
        &mut self,
        columns: &[usize],
        stats: &[Statistics<f64>],
        method: ScalingMethod,
        scale: bool,
    ) -> NeuroptResult<()> {
        if columns.len() != stats.len() {
            return Err(NeuroptError::shape(&[columns.len()], &[stats.len()]));
        }
        for i in 0..self.data.rows() {
            let row = self.data.row_mut(i);
            for (&j, s) in columns.iter().zip(stats) {
                row[j] = if scale {
                    method.scale(row[j], s)
                } else {
                    method.unscale(row[j], s)
                };
            }
        }
        Ok(())
    }
}
