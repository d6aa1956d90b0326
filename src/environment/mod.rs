//! Multi-robot environment.
//!
//! [`Environment`] wraps a [`Simulation`] with a step budget and a reward
//! strategy. The trainer talks to the environment only in terms of *active*
//! robots: `step` takes one action per active robot (ascending robot order)
//! and reports one [`RobotStep`] per robot that was active before the step,
//! which is exactly the batch shape the swarm buffer expects.

pub mod arena;
pub mod error;
pub mod simulation;

pub use arena::{ArenaConfig, KinematicArena};
pub use error::EnvironmentError;
pub use simulation::{Simulation, Termination};

use tracing::debug;

use crate::reward::{RewardBreakdown, RewardContext, RewardShaper};
use crate::types::{Action, Observation};

/// Outcome of one step for one robot.
#[derive(Debug, Clone)]
pub struct RobotStep {
    /// Robot index.
    pub robot: usize,
    /// Observation after the step.
    pub observation: Observation,
    /// Scalar reward (sum of the breakdown).
    pub reward: f64,
    /// Named reward components.
    pub breakdown: RewardBreakdown,
    /// True if the robot terminated during this step.
    pub done: bool,
    /// True if the robot reached its goal during this step.
    pub reached_goal: bool,
}

/// Per-robot results of one environment step, in ascending robot order.
#[derive(Debug, Clone, Default)]
pub struct StepOutcome {
    pub robots: Vec<RobotStep>,
}

impl StepOutcome {
    /// Number of robots that were active before the step.
    pub fn len(&self) -> usize {
        self.robots.len()
    }

    /// Returns true if no robot was active.
    pub fn is_empty(&self) -> bool {
        self.robots.is_empty()
    }

    pub fn rewards(&self) -> Vec<f64> {
        self.robots.iter().map(|r| r.reward).collect()
    }

    pub fn dones(&self) -> Vec<bool> {
        self.robots.iter().map(|r| r.done).collect()
    }

    pub fn reached_goals(&self) -> Vec<bool> {
        self.robots.iter().map(|r| r.reached_goal).collect()
    }

    /// Sum of the rewards of all robots.
    pub fn total_reward(&self) -> f64 {
        self.robots.iter().map(|r| r.reward).sum()
    }

    /// Number of robots that reached their goal this step.
    pub fn goals_reached(&self) -> usize {
        self.robots.iter().filter(|r| r.reached_goal).count()
    }
}

/// Simulation plus step budget plus reward strategy.
pub struct Environment<S: Simulation> {
    simulation: S,
    shaper: Box<dyn RewardShaper>,
    steps: u32,
    steps_left: u32,
    level: usize,
    episode: usize,
}

impl<S: Simulation> Environment<S> {
    /// Creates an environment with a per-episode budget of `steps` steps.
    pub fn new(simulation: S, shaper: Box<dyn RewardShaper>, steps: u32) -> Self {
        Self {
            simulation,
            shaper,
            steps,
            steps_left: 0,
            level: 0,
            episode: 0,
        }
    }

    /// Starts a new episode on `level` and returns the observations of all robots.
    pub fn reset(&mut self, level: usize) -> Vec<Observation> {
        self.simulation.reset(level);
        self.level = level;
        self.steps_left = self.steps;
        self.episode += 1;
        debug!(
            episode = self.episode,
            level,
            robots = self.simulation.num_robots(),
            shaper = self.shaper.name(),
            "environment reset"
        );
        (0..self.simulation.num_robots())
            .map(|i| self.simulation.observation(i))
            .collect()
    }

    /// Advances the episode by one step.
    ///
    /// `actions` holds one action per active robot, in ascending robot order.
    pub fn step(&mut self, actions: &[Action]) -> Result<StepOutcome, EnvironmentError> {
        if self.is_done() {
            return Err(EnvironmentError::EpisodeOver {
                episode: self.episode,
            });
        }
        let active = self.active_robots();
        if actions.len() != active.len() {
            return Err(EnvironmentError::ActionCountMismatch {
                expected: active.len(),
                actual: actions.len(),
            });
        }

        let mut per_robot: Vec<Option<Action>> = vec![None; self.simulation.num_robots()];
        for (&robot, &action) in active.iter().zip(actions) {
            per_robot[robot] = Some(action);
        }

        self.steps_left = self.steps_left.saturating_sub(1);
        let terminations = self.simulation.step(&per_robot, self.steps_left);

        let robots = terminations
            .into_iter()
            .enumerate()
            .filter_map(|(robot, term)| term.map(|t| (robot, t)))
            .map(|(robot, term)| {
                let ctx = RewardContext::from_kinematics(
                    self.simulation.kinematics(robot),
                    term.reached_goal,
                    term.collision,
                    term.timed_out,
                );
                let breakdown = self.shaper.shape(&ctx);
                RobotStep {
                    robot,
                    observation: self.simulation.observation(robot),
                    reward: breakdown.total(),
                    breakdown,
                    done: term.is_done(),
                    reached_goal: term.reached_goal,
                }
            })
            .collect();
        Ok(StepOutcome { robots })
    }

    /// True when every robot is inactive or the step budget is exhausted.
    pub fn is_done(&self) -> bool {
        self.steps_left == 0 || self.active_robots().is_empty()
    }

    /// Number of robots in the current episode.
    pub fn num_robots(&self) -> usize {
        self.simulation.num_robots()
    }

    /// Indices of robots still active, ascending.
    pub fn active_robots(&self) -> Vec<usize> {
        (0..self.simulation.num_robots())
            .filter(|&i| self.simulation.is_active(i))
            .collect()
    }

    /// Observations of the active robots, ascending robot order.
    pub fn active_observations(&self) -> Vec<Observation> {
        self.active_robots()
            .into_iter()
            .map(|i| self.simulation.observation(i))
            .collect()
    }

    pub fn steps_left(&self) -> u32 {
        self.steps_left
    }

    pub fn level(&self) -> usize {
        self.level
    }

    /// Number of episodes started so far.
    pub fn episode(&self) -> usize {
        self.episode
    }

    pub fn shaper_name(&self) -> &str {
        self.shaper.name()
    }

    pub fn simulation(&self) -> &S {
        &self.simulation
    }

    pub fn simulation_mut(&mut self) -> &mut S {
        &mut self.simulation
    }
}
