//! Crate-level error type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::distributed::CommError;
use crate::environment::EnvironmentError;
use crate::memory::MemoryError;
use crate::orchestrator::CheckpointError;
use crate::policy::ParameterError;
use crate::training::UpdateError;

/// Any error that aborts a training run.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("experience buffer: {0}")]
    Memory(#[from] MemoryError),

    #[error("environment: {0}")]
    Environment(#[from] EnvironmentError),

    #[error("policy update: {0}")]
    Update(#[from] UpdateError),

    #[error("policy parameters: {0}")]
    Parameters(#[from] ParameterError),

    #[error("communication: {0}")]
    Comm(#[from] CommError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_module_errors() {
        let e: TrainError = MemoryError::BatchLengthMismatch {
            field: "state",
            expected: 2,
            actual: 1,
        }
        .into();
        assert_eq!(
            e.to_string(),
            "experience buffer: state batch has 1 entries but 2 slots are active"
        );

        let e: TrainError = CommError::Disconnected { peer: 1 }.into();
        assert!(matches!(e, TrainError::Comm(_)));
    }
}
