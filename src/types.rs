//! Core value types shared by the simulation, the buffers and the networks.
//!
//! Defines planar positions, robot kinematic snapshots, the continuous
//! action pair and the per-robot observation record.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of continuous action dimensions (linear, angular velocity).
pub const ACTION_DIM: usize = 2;

/// A 2D position in the arena, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    /// Creates a new position.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Origin position (0, 0).
    pub fn origin() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    /// Euclidean distance to another position.
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Returns the unit direction vector from `self` toward `target`.
    ///
    /// Returns `(0, 0)` if positions are coincident.
    pub fn direction_to(&self, target: &Position) -> (f64, f64) {
        let dx = target.x - self.x;
        let dy = target.y - self.y;
        let dist = (dx * dx + dy * dy).sqrt();
        if dist < 1e-12 {
            (0.0, 0.0)
        } else {
            (dx / dist, dy / dist)
        }
    }

    /// Angle of the vector from `self` to `target`, in radians.
    pub fn bearing_to(&self, target: &Position) -> f64 {
        (target.y - self.y).atan2(target.x - self.x)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// Kinematic snapshot of one robot, as seen by the reward shaper.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobotKinematics {
    /// Position after the most recent step.
    pub position: Position,
    /// Position before the most recent step.
    pub last_position: Position,
    /// Goal position assigned to this robot.
    pub goal: Position,
    /// Heading in radians.
    pub heading: f64,
    /// Linear velocity applied during the most recent step.
    pub linear_velocity: f64,
    /// Angular velocity applied during the most recent step.
    pub angular_velocity: f64,
}

impl RobotKinematics {
    /// Distance to the goal before the most recent step.
    pub fn distance_old(&self) -> f64 {
        self.last_position.distance_to(&self.goal)
    }

    /// Distance to the goal after the most recent step.
    pub fn distance_new(&self) -> f64 {
        self.position.distance_to(&self.goal)
    }
}

/// Continuous action for one robot.
///
/// Values are raw policy outputs. The simulation clamps them to `[-1, 1]`
/// when applying; buffers store the unclamped sample so that log-probabilities
/// stay consistent between collection and update.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Action {
    pub linear: f64,
    pub angular: f64,
}

impl Action {
    /// Creates a new action.
    pub fn new(linear: f64, angular: f64) -> Self {
        Self { linear, angular }
    }

    /// Returns the action as `[linear, angular]`.
    pub fn as_array(&self) -> [f64; ACTION_DIM] {
        [self.linear, self.angular]
    }

    /// Builds an action from `[linear, angular]`.
    pub fn from_array(values: [f64; ACTION_DIM]) -> Self {
        Self {
            linear: values[0],
            angular: values[1],
        }
    }

    /// Returns the action clamped to the actuator range `[-1, 1]`.
    pub fn clamped(&self) -> Self {
        Self {
            linear: self.linear.clamp(-1.0, 1.0),
            angular: self.angular.clamp(-1.0, 1.0),
        }
    }
}

/// Observation of a single robot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Observation {
    /// Normalized range readings, one per ray.
    pub lidar: Vec<f64>,
    /// `(sin, cos)` of the angle between heading and goal bearing.
    pub orientation_to_goal: [f64; 2],
    /// Normalized distance to the goal.
    pub distance_to_goal: f64,
    /// `(linear, angular)` velocity applied in the previous step.
    pub velocity: [f64; 2],
}

impl Observation {
    /// Number of scalar features produced by [`Observation::features`].
    pub fn feature_dim(n_rays: usize) -> usize {
        n_rays + 5
    }

    /// Flattens the observation as `lidar ++ orientation ++ distance ++ velocity`.
    pub fn features(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(Self::feature_dim(self.lidar.len()));
        out.extend_from_slice(&self.lidar);
        out.extend_from_slice(&self.orientation_to_goal);
        out.push(self.distance_to_goal);
        out.extend_from_slice(&self.velocity);
        out
    }
}
