//! swarmrl - decentralized multi-robot navigation trained with PPO/A2C
//!
//! Every robot in a swarm shares one actor-critic policy. Experience is
//! buffered per robot, shaped into rewards, gathered across workers and used
//! by a single coordinator to update the policy, whose parameters are then
//! broadcast back to every worker.

pub mod config;
pub mod distributed;
pub mod environment;
pub mod error;
pub mod memory;
pub mod orchestrator;
pub mod policy;
pub mod reward;
pub mod training;
pub mod types;

pub use config::{Algorithm, PpoConfig, TrainerConfig};
pub use error::TrainError;
pub use memory::{SwarmMemory, Trajectory};
pub use orchestrator::{run_local, Trainer, TrainingReport};
pub use policy::{PolicyNetwork, PolicyParameters};
pub use reward::RewardShaper;
pub use types::{Action, Observation, Position};
