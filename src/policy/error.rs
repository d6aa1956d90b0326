//! Error types for policy parameter handling.

use thiserror::Error;

/// Errors raised when building or installing a [`PolicyParameters`](super::PolicyParameters) set.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    #[error("parameter '{name}' is missing")]
    Missing { name: String },

    #[error("parameter '{name}' has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("parameter '{name}' with shape {shape:?} holds {len} values")]
    ValueCount {
        name: String,
        shape: Vec<usize>,
        len: usize,
    },

    #[error("parameter '{name}' contains non-finite values")]
    NonFinite { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_mismatch_display() {
        let e = ParameterError::ShapeMismatch {
            name: "actor.weight".into(),
            expected: vec![2, 21],
            actual: vec![2, 20],
        };
        assert_eq!(
            e.to_string(),
            "parameter 'actor.weight' has shape [2, 20], expected [2, 21]"
        );
    }
}
