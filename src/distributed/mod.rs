//! Distributed synchronization layer.
//!
//! Workers coordinate only through blocking collectives on a
//! [`Communicator`]. Buffers never cross workers except when gathered, and
//! parameters only move as full snapshots broadcast by the coordinator.

pub mod comm;
pub mod local;
pub mod sync;

pub use comm::{CommError, Communicator, SoloCommunicator, COORDINATOR};
pub use local::{launch, LocalCommunicator};
pub use sync::{broadcast_parameters, ExperienceSync, SyncStatus};
