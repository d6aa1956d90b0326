//! Dense reward with distance bands and an angular-velocity penalty.

use serde::{Deserialize, Serialize};

use super::{RewardBreakdown, RewardComponent, RewardContext, RewardShaper};

/// Constants for [`AdaptiveReward`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveRewardConfig {
    pub arrival: f64,
    pub collision: f64,
    pub out_of_time: f64,
    /// Progress weight inside `close_distance` of the goal.
    pub close_weight: f64,
    /// Progress weight elsewhere, and for moving away.
    pub far_weight: f64,
    /// Distance below which the close weight applies.
    pub close_distance: f64,
    /// Penalty per unit of angular velocity above the threshold.
    pub angular_penalty: f64,
    /// Angular velocity magnitude above which the penalty applies.
    pub angular_threshold: f64,
}

impl Default for AdaptiveRewardConfig {
    fn default() -> Self {
        Self {
            arrival: 30.0,
            collision: -20.0,
            out_of_time: -10.0,
            close_weight: 4.0,
            far_weight: 2.0,
            close_distance: 0.5,
            angular_penalty: -0.2,
            angular_threshold: 0.8,
        }
    }
}

/// Same terminal precedence as [`super::SparseReward`], denser shaping.
#[derive(Debug, Clone, Default)]
pub struct AdaptiveReward {
    config: AdaptiveRewardConfig,
}

impl AdaptiveReward {
    /// Creates the shaper with the given constants.
    pub fn new(config: AdaptiveRewardConfig) -> Self {
        Self { config }
    }
}

impl RewardShaper for AdaptiveReward {
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
        let weight = if progress > 0.0 && ctx.distance_new < c.close_distance {
            c.close_weight
        } else {
            c.far_weight
        };
        let mut breakdown = RewardBreakdown::single(RewardComponent::Distance, weight * progress);

        let spin = ctx.kinematics.angular_velocity.abs();
        if spin > c.angular_threshold {
            breakdown.set(RewardComponent::Smoothness, c.angular_penalty * spin);
        }
        breakdown
    }

    fn name(&self) -> &str {
        "adaptive"
    }
}
