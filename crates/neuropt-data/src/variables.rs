use neuropt_core::{NeuroptError, NeuroptResult};
use serde::{Deserialize, Serialize};

/// Role of one variable (column) of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableUse {
    Input,
    Target,
    Unused,
}

/// Column roles of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variables {
    uses: Vec<VariableUse>,
}

impl Variables {
    /// The first `inputs` columns are inputs, the rest are targets.
    pub fn new(total: usize, inputs: usize) -> NeuroptResult<Self> {
        if inputs == 0 || inputs >= total {
            return Err(NeuroptError::config(format!(
                "need at least one input and one target, got {inputs} inputs of {total} variables"
            )));
        }
        let uses = (0..total)
            .map(|j| if j < inputs { VariableUse::Input } else { VariableUse::Target })
            .collect();
        Ok(Variables { uses })
    }

    pub fn from_uses(uses: Vec<VariableUse>) -> NeuroptResult<Self> {
        let v = Variables { uses };
        if v.input_indices().is_empty() || v.target_indices().is_empty() {
            return Err(NeuroptError::config(
                "need at least one input and one target variable",
            ));
        }
        Ok(v)
    }

    pub fn len(&self) -> usize {
        self.uses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uses.is_empty()
    }

    pub fn uses(&self) -> &[VariableUse] {
        &self.uses
    }

    fn indices_of(&self, usage: VariableUse) -> Vec<usize> {
        self.uses
            .iter()
            .enumerate()
            .filter(|(_, &u)| u == usage)
            .map(|(j, _)| j)
            .collect()
    }

    pub fn input_indices(&self) -> Vec<usize> {
        self.indices_of(VariableUse::Input)
    }

    pub fn target_indices(&self) -> Vec<usize> {
        self.indices_of(VariableUse::Target)
    }

    pub fn inputs_number(&self) -> usize {
        self.uses.iter().filter(|&&u| u == VariableUse::Input).count()
    }

    pub fn targets_number(&self) -> usize {
        self.uses.iter().filter(|&&u| u == VariableUse::Target).count()
    }
}
