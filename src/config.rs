//! Configuration for the policy updater and the training run.
//!
//! All structs deserialize from JSON with missing fields taking their
//! defaults, so a config file only needs the values it changes.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::environment::ArenaConfig;
use crate::policy::GaussianPolicyConfig;
use crate::reward::{AdaptiveReward, AdaptiveRewardConfig, RewardShaper, SparseReward, SparseRewardConfig};

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Policy update algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Clipped surrogate, `k_epochs` passes per update.
    #[default]
    Ppo,
    /// Advantage actor-critic, one pass per update.
    A2c,
}

/// Hyperparameters of the policy updater.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PpoConfig {
    pub algorithm: Algorithm,
    /// Discount factor γ.
    pub gamma: f64,
    /// Optimization epochs per update.
    pub k_epochs: usize,
    /// PPO clip parameter ε.
    pub eps_clip: f64,
    /// Value loss coefficient.
    pub value_coef: f64,
    /// Entropy bonus coefficient.
    pub entropy_coef: f64,
    /// Learning rate.
    pub lr: f64,
    /// Maximum gradient norm (0 disables clipping).
    pub max_grad_norm: f64,
    /// Initial action standard deviation.
    pub action_std: f64,
    /// Mini-batch size (0 = full batch).
    pub batch_size: usize,
    /// Normalize returns over the batch before computing advantages. The
    /// value head then also regresses onto the normalized returns.
    pub normalize_returns: bool,
    /// Seed for minibatch shuffles and network initialization.
    pub seed: u64,
}

impl Default for PpoConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Ppo,
            gamma: 0.99,
            k_epochs: 4,
            eps_clip: 0.2,
            value_coef: 0.5,
            entropy_coef: 0.01,
            lr: 3e-4,
            max_grad_norm: 0.5,
            action_std: 0.5,
            batch_size: 0,
            normalize_returns: true,
            seed: 0,
        }
    }
}

impl PpoConfig {
    /// Checks ranges of every field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.gamma > 0.0 && self.gamma <= 1.0) {
            return Err(invalid("gamma", format!("{} is outside (0, 1]", self.gamma)));
        }
        if self.k_epochs == 0 {
            return Err(invalid("k_epochs", "must be at least 1"));
        }
        if !(self.eps_clip > 0.0) {
            return Err(invalid("eps_clip", format!("{} must be positive", self.eps_clip)));
        }
        if !(self.lr > 0.0) {
            return Err(invalid("lr", format!("{} must be positive", self.lr)));
        }
        if !(self.action_std > 0.0) {
            return Err(invalid("action_std", format!("{} must be positive", self.action_std)));
        }
        if self.value_coef < 0.0 || self.entropy_coef < 0.0 || self.max_grad_norm < 0.0 {
            return Err(invalid(
                "value_coef/entropy_coef/max_grad_norm",
                "must not be negative",
            ));
        }
        Ok(())
    }

    /// Network hyperparameters derived from this config.
    pub fn network_config(&self) -> GaussianPolicyConfig {
        GaussianPolicyConfig {
            action_std: self.action_std,
            lr: self.lr,
            max_grad_norm: self.max_grad_norm,
            seed: self.seed,
            ..GaussianPolicyConfig::default()
        }
    }
}

/// Reward strategy selected at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardKind {
    #[default]
    Sparse,
    Adaptive,
}

/// Settings of a full training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Name used in checkpoint file names.
    pub env_name: String,
    pub max_episodes: usize,
    /// Step budget per episode.
    pub max_timesteps: u32,
    /// Bundle length that triggers a policy update.
    pub update_experience: usize,
    /// Global experience count that triggers a gather to the coordinator.
    pub sync_experience: usize,
    /// Rolling goal-reached fraction that ends training.
    pub solved_percentage: f64,
    /// Number of completions in the rolling goal window.
    pub goal_window: usize,
    /// Episodes between summaries and best-checkpoint checks.
    pub log_interval: usize,
    pub ckpt_folder: PathBuf,
    /// Load `{ckpt_folder}/ppo_continuous_{env_name}.json` before training.
    pub restore: bool,
    /// Level passed to every environment reset.
    pub level: usize,
    pub reward: RewardKind,
    pub sparse_reward: SparseRewardConfig,
    pub adaptive_reward: AdaptiveRewardConfig,
    pub arena: ArenaConfig,
    pub ppo: PpoConfig,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            env_name: "swarm".to_string(),
            max_episodes: 1000,
            max_timesteps: 200,
            update_experience: 2000,
            sync_experience: 200,
            solved_percentage: 0.9,
            goal_window: 100,
            log_interval: 10,
            ckpt_folder: PathBuf::from("checkpoints"),
            restore: false,
            level: 0,
            reward: RewardKind::Sparse,
            sparse_reward: SparseRewardConfig::default(),
            adaptive_reward: AdaptiveRewardConfig::default(),
            arena: ArenaConfig::default(),
            ppo: PpoConfig::default(),
        }
    }
}

impl TrainerConfig {
    /// Loads a config from a JSON file and validates it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Parses a config from JSON text and validates it.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks thresholds and nested configs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.env_name.is_empty() {
            return Err(invalid("env_name", "must not be empty"));
        }
        if self.max_timesteps == 0 {
            return Err(invalid("max_timesteps", "must be at least 1"));
        }
        if self.update_experience == 0 {
            return Err(invalid("update_experience", "must be positive"));
        }
        if self.sync_experience == 0 {
            return Err(invalid("sync_experience", "must be positive"));
        }
        if !(self.solved_percentage > 0.0 && self.solved_percentage <= 1.0) {
            return Err(invalid(
                "solved_percentage",
                format!("{} is outside (0, 1]", self.solved_percentage),
            ));
        }
        if self.goal_window == 0 {
            return Err(invalid("goal_window", "must be positive"));
        }
        if self.log_interval == 0 {
            return Err(invalid("log_interval", "must be positive"));
        }
        self.arena.validate()?;
        self.ppo.validate()
    }

    /// Builds the configured reward strategy.
    pub fn reward_shaper(&self) -> Box<dyn RewardShaper> {
        match self.reward {
            RewardKind::Sparse => Box::new(SparseReward::new(self.sparse_reward.clone())),
            RewardKind::Adaptive => Box::new(AdaptiveReward::new(self.adaptive_reward.clone())),
        }
    }
}
