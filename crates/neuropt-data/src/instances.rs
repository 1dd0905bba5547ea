use neuropt_core::{NeuroptError, NeuroptResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Role of one instance (row) of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstanceUse {
    Training,
    Selection,
    Testing,
    Unused,
}

/// Which rows an evaluation runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InstanceSubset {
    #[default]
    Training,
    Selection,
    Testing,
    /// Every instance that is not `Unused`.
    All,
}

impl InstanceSubset {
    fn contains(self, usage: InstanceUse) -> bool {
        match self {
            InstanceSubset::Training => usage == InstanceUse::Training,
            InstanceSubset::Selection => usage == InstanceUse::Selection,
            InstanceSubset::Testing => usage == InstanceUse::Testing,
            InstanceSubset::All => usage != InstanceUse::Unused,
        }
    }
}

/// Row partition of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instances {
    uses: Vec<InstanceUse>,
}

impl Instances {
    /// All `n` instances used for training.
    pub fn new(n: usize) -> Self {
        Instances {
            uses: vec![InstanceUse::Training; n],
        }
    }

    pub fn len(&self) -> usize {
        self.uses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uses.is_empty()
    }

    pub fn uses(&self) -> &[InstanceUse] {
        &self.uses
    }

    pub fn set_use(&mut self, index: usize, usage: InstanceUse) -> NeuroptResult<()> {
        let size = self.uses.len();
        let slot = self.uses.get_mut(index).ok_or(NeuroptError::IndexOutOfBounds {
            index,
            axis: 0,
            size,
        })?;
        *slot = usage;
        Ok(())
    }

    /// Row indices of a subset, in ascending order.
    pub fn indices(&self, subset: InstanceSubset) -> Vec<usize> {
        self.uses
            .iter()
            .enumerate()
            .filter(|(_, &u)| subset.contains(u))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn count(&self, subset: InstanceSubset) -> usize {
        self.uses.iter().filter(|&&u| subset.contains(u)).count()
    }

    fn check_ratios(training: f64, selection: f64, testing: f64) -> NeuroptResult<f64> {
        let total = training + selection + testing;
        if [training, selection, testing].iter().any(|r| !r.is_finite() || *r < 0.0)
            || total <= 0.0
        {
            return Err(NeuroptError::config(format!(
                "split ratios must be non-negative with a positive sum, got \
                 ({training}, {selection}, {testing})"
            )));
        }
        Ok(total)
    }

    fn assign(&mut self, order: &[usize], training: f64, selection: f64, total: f64) {
        let n = order.len();
        let n_selection = (n as f64 * selection / total).round() as usize;
        let n_training = ((n as f64 * training / total).round() as usize).min(n - n_selection);

        for (k, &i) in order.iter().enumerate() {
            self.uses[i] = if k < n_training {
                InstanceUse::Training
            } else if k < n_training + n_selection {
                InstanceUse::Selection
            } else {
                InstanceUse::Testing
            };
        }
    }

    /// Random split by ratios (normalized by their sum).
    pub fn split_random(
        &mut self,
        training: f64,
        selection: f64,
        testing: f64,
        seed: Option<u64>,
    ) -> NeuroptResult<()> {
        let total = Self::check_ratios(training, selection, testing)?;
        let mut order: Vec<usize> = (0..self.uses.len()).collect();
        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        order.shuffle(&mut rng);
        self.assign(&order, training, selection, total);
        Ok(())
    }

    /// Contiguous split: first training rows, then selection, then testing.
    pub fn split_sequential(
        &mut self,
        training: f64,
        selection: f64,
        testing: f64,
    ) -> NeuroptResult<()> {
        let total = Self::check_ratios(training, selection, testing)?;
        let order: Vec<usize> = (0..self.uses.len()).collect();
        self.assign(&order, training, selection, total);
        Ok(())
    }
}
