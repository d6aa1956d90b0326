//! Policy networks.
//!
//! [`PolicyNetwork`] is the seam between the trainer and whatever computes
//! actions, values and gradients. [`LinearGaussianPolicy`] is always
//! available; the neural [`TchActorCritic`](network::TchActorCritic)
//! requires the `rl-nn` feature flag.

pub mod error;
pub mod gaussian;
pub mod params;
pub mod trait_;

#[cfg(feature = "rl-nn")]
pub mod network;

pub use error::ParameterError;
pub use gaussian::{GaussianPolicyConfig, LinearGaussianPolicy};
pub use params::{ParameterTensor, PolicyParameters};
pub use trait_::{feature_rows, PolicyNetwork, Prediction};

#[cfg(feature = "rl-nn")]
pub use network::TchActorCritic;
