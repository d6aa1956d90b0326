//! Terminal-dominant reward with asymmetric distance shaping.

use serde::{Deserialize, Serialize};

use super::{RewardBreakdown, RewardComponent, RewardContext, RewardShaper};

/// Constants for [`SparseReward`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SparseRewardConfig {
    /// Reward for reaching the goal.
    pub arrival: f64,
    /// Reward (negative) for hitting a wall or another robot.
    pub collision: f64,
    /// Reward (negative) for running out of steps.
    pub out_of_time: f64,
    /// Weight applied to distance reduction when moving closer.
    pub approach_weight: f64,
    /// Weight applied to distance change when moving away.
    pub retreat_weight: f64,
}

impl Default for SparseRewardConfig {
    fn default() -> Self {
        Self {
            arrival: 2500.0,
            collision: -2500.0,
            out_of_time: -500.0,
            approach_weight: 300.0,
            retreat_weight: 100.0,
        }
    }
}

/// Large fixed terminal rewards; otherwise proportional to distance progress.
///
/// Approaching the goal is weighted more than retreating is penalized, which
/// keeps oscillating back and forth from being reward-neutral.
#[derive(Debug, Clone, Default)]
pub struct SparseReward {
    config: SparseRewardConfig,
}

impl SparseReward {
    /// Creates the shaper with the given constants.
    pub fn new(config: SparseRewardConfig) -> Self {
        Self { config }
    }
}

impl RewardShaper for SparseReward {
    fn shape(&self, ctx: &RewardContext) -> RewardBreakdown {
        let c = &self.config;
        if ctx.reached_goal {
            return RewardBreakdown::single(RewardComponent::Arrival, c.arrival);
        }
        if ctx.collided {
            return RewardBreakdown::single(RewardComponent::Collision, c.collision);
        }
        if ctx.timed_out {
            return RewardBreakdown::single(RewardComponent::OutOfTime, c.out_of_time);
        }

        let progress = ctx.progress();
        let weight = if progress > 0.0 {
            c.approach_weight
        } else {
            c.retreat_weight
        };
        RewardBreakdown::single(RewardComponent::Distance, weight * progress)
    }

    fn name(&self) -> &str {
        "sparse"
    }
}
