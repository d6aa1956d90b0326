//! Interface to the physics/sensor simulation.

use crate::types::{Action, Observation, RobotKinematics};

/// Why a robot stopped (or did not stop) during one simulation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Termination {
    /// Touched a wall or another robot.
    pub collision: bool,
    /// Entered its goal area.
    pub reached_goal: bool,
    /// The step budget ran out while the robot was still driving.
    pub timed_out: bool,
}

impl Termination {
    /// Returns true if any terminal condition holds.
    pub fn is_done(&self) -> bool {
        self.collision || self.reached_goal || self.timed_out
    }
}

/// A multi-robot simulation driven one step at a time.
///
/// Robots are addressed by their index `0..num_robots()`. An index keeps
/// referring to the same robot for the whole episode.
pub trait Simulation: Send {
    /// Starts a new episode on the given level; every robot becomes active.
    fn reset(&mut self, level: usize);

    /// Advances every robot that has `Some` action by one step.
    ///
    /// `actions` has one entry per robot. The result has one entry per robot:
    /// `Some` for robots that were active before the step (whether or not they
    /// terminated during it), `None` for robots that were already inactive.
    /// `steps_left` is the remaining budget *after* this step; robots still
    /// driving when it reaches zero must report `timed_out`.
    fn step(&mut self, actions: &[Option<Action>], steps_left: u32) -> Vec<Option<Termination>>;

    /// Current observation of a robot.
    fn observation(&self, robot: usize) -> Observation;

    /// Current kinematic snapshot of a robot.
    fn kinematics(&self, robot: usize) -> RobotKinematics;

    /// Number of robots in the current episode.
    fn num_robots(&self) -> usize;

    /// Returns true while the robot has not terminated in this episode.
    fn is_active(&self, robot: usize) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn termination_is_done() {
        assert!(!Termination::default().is_done());
        assert!(Termination {
            timed_out: true,
            ..Termination::default()
        }
        .is_done());
    }
}
