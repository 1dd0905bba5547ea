use thiserror::Error;

/// Error type shared by every neuropt crate.
///
/// Shape and configuration errors are caller bugs and abort the current
/// operation. Numerical errors are raised when a value or gradient stops being
/// finite; the trainer catches them and stops the run with its best state.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NeuroptError {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Index out of bounds: index {index} for axis {axis} with size {size}")]
    IndexOutOfBounds {
        index: usize,
        axis: usize,
        size: usize,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl NeuroptError {
    pub fn shape(expected: &[usize], got: &[usize]) -> Self {
        NeuroptError::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        NeuroptError::Configuration(msg.into())
    }

    pub fn numerical(msg: impl Into<String>) -> Self {
        NeuroptError::Numerical(msg.into())
    }

    pub fn is_numerical(&self) -> bool {
        matches!(self, NeuroptError::Numerical(_))
    }
}

pub type NeuroptResult<T> = Result<T, NeuroptError>;

/// Fails with a `ShapeMismatch` unless `got == expected`.
#[inline]
pub fn check_len(expected: usize, got: usize) -> NeuroptResult<()> {
    if expected != got {
        return Err(NeuroptError::shape(&[expected], &[got]));
    }
    Ok(())
}
