//! Training state owned by the orchestrator.

use std::collections::VecDeque;

/// Rolling window over the most recent robot completions.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalTracker {
    capacity: usize,
    outcomes: VecDeque<bool>,
}

impl GoalTracker {
    /// Creates a tracker that remembers the last `capacity` completions.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            outcomes: VecDeque::with_capacity(capacity),
        }
    }

    /// Records one completion; `true` if the robot reached its goal.
    pub fn record(&mut self, reached_goal: bool) {
        if self.outcomes.len() == self.capacity {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(reached_goal);
    }

    pub fn extend(&mut self, outcomes: impl IntoIterator<Item = bool>) {
        for o in outcomes {
            self.record(o);
        }
    }

    /// Fraction of remembered completions that reached the goal (0 when empty).
    pub fn success_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        self.outcomes.iter().filter(|r| **r).count() as f64 / self.outcomes.len() as f64
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.outcomes.clear();
    }
}

/// Counters and accumulators of one training run.
///
/// Accumulators cover the current log interval and are reset by
/// [`TrainingState::take_interval`].
#[derive(Debug, Clone)]
pub struct TrainingState {
    /// Index of the current episode, starting at 1.
    pub episode: usize,
    pub goals: GoalTracker,
    /// Sum of per-step mean rewards over the interval.
    pub running_reward: f64,
    /// Sum of episode lengths over the interval.
    pub running_length: f64,
    pub best_reward: f64,
    pub updates: usize,
    pub solved: bool,
}

impl TrainingState {
    pub fn new(goal_window: usize) -> Self {
        Self {
            episode: 0,
            goals: GoalTracker::new(goal_window),
            running_reward: 0.0,
            running_length: 0.0,
            best_reward: f64::NEG_INFINITY,
            updates: 0,
            solved: false,
        }
    }

    /// Advances the episode counter and returns the new episode index.
    pub fn start_episode(&mut self) -> usize {
        self.episode += 1;
        self.episode
    }

    /// Adds one step's mean robot reward to the interval accumulator.
    pub fn add_step_reward(&mut self, mean_reward: f64) {
        self.running_reward += mean_reward;
    }

    /// Adds a finished episode's length to the interval accumulator.
    pub fn add_episode_length(&mut self, steps: usize) {
        self.running_length += steps as f64;
    }

    /// Returns `(reward, length)` accumulators and resets them.
    pub fn take_interval(&mut self) -> (f64, f64) {
        let out = (self.running_reward, self.running_length);
        self.running_reward = 0.0;
        self.running_length = 0.0;
        out
    }

    /// Returns true if `reward` beats the best recorded reward.
    pub fn beats_best(&self, reward: f64) -> bool {
        reward > self.best_reward
    }

    /// Records `reward` as the best so far. Call once its checkpoint is written.
    pub fn record_best(&mut self, reward: f64) {
        if self.beats_best(reward) {
            self.best_reward = reward;
        }
    }

    /// Best interval reward so far, if any interval was completed.
    pub fn best(&self) -> Option<f64> {
        self.best_reward.is_finite().then_some(self.best_reward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_keeps_only_recent_completions() {
        let mut t = GoalTracker::new(4);
        t.extend([false, false, false, false]);
        assert_eq!(t.success_rate(), 0.0);
        t.extend([true, true, true]);
        assert_eq!(t.len(), 4);
        assert!((t.success_rate() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn empty_tracker_rate_is_zero() {
        assert_eq!(GoalTracker::new(100).success_rate(), 0.0);
    }

    #[test]
    fn interval_accumulators_reset() {
        let mut s = TrainingState::new(100);
        assert_eq!(s.start_episode(), 1);
        s.add_step_reward(1.5);
        s.add_step_reward(0.5);
        s.add_episode_length(12);
        assert_eq!(s.take_interval(), (2.0, 12.0));
        assert_eq!(s.take_interval(), (0.0, 0.0));
    }

    #[test]
    fn first_interval_is_always_best() {
        let mut s = TrainingState::new(100);
        assert_eq!(s.best(), None);
        assert!(s.beats_best(-50.0));
        s.record_best(-50.0);
        assert!(!s.beats_best(-60.0));
        assert_eq!(s.best(), Some(-50.0));
    }
}
