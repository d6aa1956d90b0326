//! Error types for the environment wrapper.

use thiserror::Error;

/// Errors raised by [`Environment`](super::Environment).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvironmentError {
    /// `step` was called with a different number of actions than active robots.
    #[error("expected {expected} actions (one per active robot), got {actual}")]
    ActionCountMismatch { expected: usize, actual: usize },

    /// `step` was called after the episode ended; call `reset` first.
    #[error("episode {episode} is over; reset the environment before stepping")]
    EpisodeOver { episode: usize },
}
