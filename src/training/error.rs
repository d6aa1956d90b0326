//! Error types for the policy update engine.

use thiserror::Error;

use crate::policy::ParameterError;

/// Errors raised by [`PolicyUpdater`](super::PolicyUpdater).
///
/// Every variant except `NonFiniteLoss` is raised before the policy is
/// touched. `NonFiniteLoss` is raised after the pre-update parameters have
/// been reinstalled.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UpdateError {
    #[error("experience bundle has no slots")]
    EmptyBundle,

    #[error("slot {slot} has an empty trajectory")]
    EmptyTrajectory { slot: usize },

    #[error("slot {slot} has {log_probs} log-probabilities for {states} states")]
    LogProbMismatch {
        slot: usize,
        states: usize,
        log_probs: usize,
    },

    #[error("slot {slot}: {field} has {actual} entries, expected {expected}")]
    FieldLengthMismatch {
        slot: usize,
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("loss became non-finite in epoch {epoch}; parameters restored")]
    NonFiniteLoss { epoch: usize },

    #[error(transparent)]
    Parameters(#[from] ParameterError),
}
