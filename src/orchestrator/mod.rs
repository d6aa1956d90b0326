//! Training orchestrator: episode loop, training state, checkpoints and
//! telemetry.

pub mod checkpoint;
pub mod metrics;
pub mod state;
pub mod trainer;

#[cfg(test)]
mod tests;

pub use checkpoint::{CheckpointError, CheckpointKind, CheckpointStore};
pub use metrics::{EpisodeSummary, EvaluationMetrics, TrainingReport};
pub use state::{GoalTracker, TrainingState};
pub use trainer::{run_local, Trainer};
