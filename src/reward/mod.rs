//! Reward shaping strategies.
//!
//! A [`RewardShaper`] maps one robot's step outcome to a named breakdown of
//! reward components. The environment only ever sees the trait, so shapers can
//! be swapped at construction time without touching environment or buffer
//! code.
//!
//! Both shipped shapers follow the same precedence: arrival, then collision,
//! then timeout, then the non-terminal shaping terms. Exactly one branch fires
//! per step.

pub mod adaptive;
pub mod sparse;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::RobotKinematics;

pub use adaptive::{AdaptiveReward, AdaptiveRewardConfig};
pub use sparse::{SparseReward, SparseRewardConfig};

/// Named reward component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RewardComponent {
    Arrival,
    Collision,
    OutOfTime,
    Distance,
    Smoothness,
}

impl fmt::Display for RewardComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewardComponent::Arrival => write!(f, "arrival"),
            RewardComponent::Collision => write!(f, "collision"),
            RewardComponent::OutOfTime => write!(f, "out_of_time"),
            RewardComponent::Distance => write!(f, "distance"),
            RewardComponent::Smoothness => write!(f, "smoothness"),
        }
    }
}

/// Per-step reward decomposition. The scalar used for training is [`RewardBreakdown::total`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RewardBreakdown {
    components: BTreeMap<RewardComponent, f64>,
}

impl RewardBreakdown {
    /// Creates an empty breakdown.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a breakdown holding a single component.
    pub fn single(component: RewardComponent, value: f64) -> Self {
        let mut b = Self::new();
        b.set(component, value);
        b
    }

    /// Sets the value of a component, replacing any previous value.
    pub fn set(&mut self, component: RewardComponent, value: f64) {
        self.components.insert(component, value);
    }

    /// Returns the value of a component, if present.
    pub fn get(&self, component: RewardComponent) -> Option<f64> {
        self.components.get(&component).copied()
    }

    /// Returns true if the component is present.
    pub fn contains(&self, component: RewardComponent) -> bool {
        self.components.contains_key(&component)
    }

    /// Iterates over `(component, value)` pairs in component order.
    pub fn iter(&self) -> impl Iterator<Item = (RewardComponent, f64)> + '_ {
        self.components.iter().map(|(c, v)| (*c, *v))
    }

    /// Number of components present.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns true if no component is present.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Sum of all components.
    pub fn total(&self) -> f64 {
        self.components.values().sum()
    }
}

/// Everything a shaper may look at for one robot and one step.
#[derive(Debug, Clone, Copy)]
pub struct RewardContext {
    pub kinematics: RobotKinematics,
    /// Distance to goal before the step.
    pub distance_old: f64,
    /// Distance to goal after the step.
    pub distance_new: f64,
    pub reached_goal: bool,
    pub collided: bool,
    pub timed_out: bool,
}

impl RewardContext {
    /// Builds a context, taking both distances from the kinematic snapshot.
    pub fn from_kinematics(
        kinematics: RobotKinematics,
        reached_goal: bool,
        collided: bool,
        timed_out: bool,
    ) -> Self {
        Self {
            kinematics,
            distance_old: kinematics.distance_old(),
            distance_new: kinematics.distance_new(),
            reached_goal,
            collided,
            timed_out,
        }
    }

    /// Reduction in distance to the goal during the step (positive = closer).
    pub fn progress(&self) -> f64 {
        self.distance_old - self.distance_new
    }
}

/// Strategy mapping a robot's step outcome to a reward breakdown.
pub trait RewardShaper: Send + Sync {
    /// Computes the reward components for one robot and one step.
    fn shape(&self, ctx: &RewardContext) -> RewardBreakdown;

    /// Returns a human-readable name for this shaper.
    fn name(&self) -> &str;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::types::Position;

    /// Context for a robot that moved from `old` to `new` along the x axis
    /// towards a goal at the origin.
    pub fn ctx_moving(old: f64, new: f64, angular_velocity: f64) -> RewardContext {
        let kinematics = RobotKinematics {
            position: Position::new(new, 0.0),
            last_position: Position::new(old, 0.0),
            goal: Position::origin(),
            heading: 0.0,
            linear_velocity: 0.5,
            angular_velocity,
        };
        RewardContext::from_kinematics(kinematics, false, false, false)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::ctx_moving;
    use super::*;

    #[test]
    fn breakdown_total_sums_components() {
        let mut b = RewardBreakdown::new();
        b.set(RewardComponent::Distance, 1.5);
        b.set(RewardComponent::Smoothness, -0.5);
        assert!((b.total() - 1.0).abs() < 1e-12);
        assert_eq!(b.len(), 2);
        assert_eq!(b.get(RewardComponent::Arrival), None);
    }

    #[test]
    fn context_progress_positive_when_closer() {
        let ctx = ctx_moving(2.0, 1.5, 0.0);
        assert!((ctx.progress() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn shapers_are_interchangeable_behind_the_trait() {
        let shapers: Vec<Box<dyn RewardShaper>> = vec![
            Box::new(SparseReward::default()),
            Box::new(AdaptiveReward::default()),
        ];
        let mut ctx = ctx_moving(1.0, 0.9, 0.0);
        ctx.reached_goal = true;
        for s in &shapers {
            let b = s.shape(&ctx);
            assert_eq!(b.len(), 1, "{} produced {:?}", s.name(), b);
            assert!(b.contains(RewardComponent::Arrival));
        }
    }
}
