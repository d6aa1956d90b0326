//! Policy update engine.
//!
//! Provides discounted returns, the flat training batch, loss bookkeeping and
//! the PPO/A2C updater.

pub mod batch;
pub mod error;
pub mod loss;
pub mod ppo;
pub mod returns;

pub use batch::TrainingBatch;
pub use error::UpdateError;
pub use loss::{clipped_surrogate, LossFunction, LossReport, Objective};
pub use ppo::{PolicyUpdater, UpdateReport};
pub use returns::{discounted_returns, normalize};
