//! Per-robot trajectory storage.

use serde::{Deserialize, Serialize};

use crate::types::{Action, Observation};

/// Ordered log of one robot slot's experience since its last flush.
///
/// Fields are appended independently (the collection loop inserts states,
/// actions and log-probabilities before the environment step, rewards and
/// terminal flags after it), so they are kept as parallel columns. Index `t`
/// across all columns describes step `t` of the slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub states: Vec<Observation>,
    pub actions: Vec<Action>,
    pub rewards: Vec<f64>,
    pub is_terminals: Vec<bool>,
    pub reached_goal: Vec<bool>,
    pub log_probs: Vec<f64>,
}

impl Trajectory {
    /// Creates a new empty trajectory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded steps (counted on the state column).
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns true if no step has been recorded.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Returns true if every column that an update consumes has the same length.
    pub fn is_aligned(&self) -> bool {
        let n = self.states.len();
        self.actions.len() == n
            && self.rewards.len() == n
            && self.is_terminals.len() == n
            && self.log_probs.len() == n
    }

    /// Number of episodes in this trajectory that ended in a terminal step.
    pub fn completed_episodes(&self) -> usize {
        self.is_terminals.iter().filter(|t| **t).count()
    }

    /// Clears all stored data.
    pub fn clear(&mut self) {
        self.states.clear();
        self.actions.clear();
        self.rewards.clear();
        self.is_terminals.clear();
        self.reached_goal.clear();
        self.log_probs.clear();
    }
}
