//! Experience buffers for the swarm.
//!
//! Provides the per-robot [`Trajectory`] log and the [`SwarmMemory`] that
//! routes batched per-step data to the robots that are still active.

pub mod error;
pub mod swarm;
pub mod trajectory;

pub use error::MemoryError;
pub use swarm::SwarmMemory;
pub use trajectory::Trajectory;
