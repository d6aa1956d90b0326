//! Policy network trait.

use super::error::ParameterError;
use super::params::PolicyParameters;
use crate::training::{LossFunction, LossReport, TrainingBatch};
use crate::types::{Action, Observation};

/// Output of a stochastic forward pass over a batch of observations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prediction {
    /// Sampled (unclamped) actions.
    pub actions: Vec<Action>,
    /// Value estimates.
    pub values: Vec<f64>,
    /// Log-probabilities of the sampled actions.
    pub log_probs: Vec<f64>,
}

/// An actor-critic network with a Gaussian action head.
///
/// Inputs are flattened feature rows (see [`Observation::features`]), one
/// row per robot.
pub trait PolicyNetwork: Send {
    /// Samples one action per row and reports its value and log-probability.
    fn predict(&mut self, states: &[Vec<f64>]) -> Prediction;

    /// Mean actions, used for evaluation.
    fn predict_deterministic(&self, states: &[Vec<f64>]) -> Vec<Action>;

    /// Value estimates for each row.
    fn values(&self, states: &[Vec<f64>]) -> Vec<f64>;

    /// Log-probabilities of `actions` under the current parameters.
    fn log_probs(&self, states: &[Vec<f64>], actions: &[Action]) -> Vec<f64>;

    /// Takes one optimizer step on `batch`.
    fn train(&mut self, batch: &TrainingBatch, loss: &LossFunction) -> LossReport;

    /// Full snapshot of the trainable weights.
    fn parameters(&self) -> PolicyParameters;

    /// Overwrites all weights. Nothing is changed if validation fails.
    fn set_parameters(&mut self, params: &PolicyParameters) -> Result<(), ParameterError>;

    /// Returns a human-readable name for this network.
    fn name(&self) -> &str;
}

/// Flattens observations into feature rows.
pub fn feature_rows(observations: &[Observation]) -> Vec<Vec<f64>> {
    observations.iter().map(Observation::features).collect()
}
