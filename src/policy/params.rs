//! Full snapshot of a policy's trainable weights.
//!
//! Parameters travel between workers and to disk only as complete snapshots,
//! never as deltas.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::ParameterError;

/// One named tensor, stored row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterTensor {
    pub shape: Vec<usize>,
    pub values: Vec<f64>,
}

impl ParameterTensor {
    /// Number of scalars implied by the shape.
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Ordered map from parameter name to tensor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyParameters {
    tensors: BTreeMap<String, ParameterTensor>,
}

impl PolicyParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a tensor. Fails if `values` does not fill `shape`.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        shape: Vec<usize>,
        values: Vec<f64>,
    ) -> Result<(), ParameterError> {
        let name = name.into();
        let tensor = ParameterTensor { shape, values };
        if tensor.numel() != tensor.values.len() {
            return Err(ParameterError::ValueCount {
                name,
                shape: tensor.shape,
                len: tensor.values.len(),
            });
        }
        self.tensors.insert(name, tensor);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ParameterTensor> {
        self.tensors.get(name)
    }

    /// Returns the tensor `name`, checking that it has the expected shape.
    pub fn expect_shape(&self, name: &str, shape: &[usize]) -> Result<&[f64], ParameterError> {
        let t = self.get(name).ok_or_else(|| ParameterError::Missing {
            name: name.to_string(),
        })?;
        if t.shape != shape {
            return Err(ParameterError::ShapeMismatch {
                name: name.to_string(),
                expected: shape.to_vec(),
                actual: t.shape.clone(),
            });
        }
        Ok(&t.values)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterTensor)> {
        self.tensors.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    /// Number of tensors.
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Total number of scalars across all tensors.
    pub fn num_scalars(&self) -> usize {
        self.tensors.values().map(|t| t.values.len()).sum()
    }

    /// Checks that every tensor fills its shape and holds only finite values.
    pub fn validate(&self) -> Result<(), ParameterError> {
        for (name, t) in &self.tensors {
            if t.numel() != t.values.len() {
                return Err(ParameterError::ValueCount {
                    name: name.clone(),
                    shape: t.shape.clone(),
                    len: t.values.len(),
                });
            }
            if t.values.iter().any(|v| !v.is_finite()) {
                return Err(ParameterError::NonFinite { name: name.clone() });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_rejects_wrong_value_count() {
        let mut p = PolicyParameters::new();
        let err = p.insert("w", vec![2, 3], vec![0.0; 5]).unwrap_err();
        assert!(matches!(err, ParameterError::ValueCount { len: 5, .. }));
        assert!(p.is_empty());
    }

    #[test]
    fn expect_shape_checks_name_and_shape() {
        let mut p = PolicyParameters::new();
        p.insert("w", vec![2, 3], vec![1.0; 6]).unwrap();
        assert_eq!(p.expect_shape("w", &[2, 3]).unwrap().len(), 6);
        assert!(matches!(
            p.expect_shape("w", &[3, 2]),
            Err(ParameterError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            p.expect_shape("b", &[2]),
            Err(ParameterError::Missing { .. })
        ));
    }

    #[test]
    fn validate_flags_non_finite() {
        let mut p = PolicyParameters::new();
        p.insert("b", vec![2], vec![0.0, f64::NAN]).unwrap();
        assert_eq!(
            p.validate(),
            Err(ParameterError::NonFinite { name: "b".into() })
        );
    }

    #[test]
    fn names_are_ordered() {
        let mut p = PolicyParameters::new();
        p.insert("critic.bias", vec![1], vec![0.0]).unwrap();
        p.insert("actor.bias", vec![2], vec![0.0, 0.0]).unwrap();
        assert_eq!(p.names().collect::<Vec<_>>(), vec!["actor.bias", "critic.bias"]);
        assert_eq!(p.num_scalars(), 3);
    }
}
