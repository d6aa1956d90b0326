//! Swarm memory: one trajectory per robot slot plus the active-set mask.

use serde::{Deserialize, Serialize};

use super::error::MemoryError;
use super::trajectory::Trajectory;
use crate::types::{Action, Observation};

/// Experience store for a whole swarm.
///
/// Robots finish at different times. Per-step batches coming from the
/// environment only contain entries for robots that are still active, so each
/// insert maps batch entry `i` onto the `i`-th active slot in ascending slot
/// order. A slot stops receiving data once a terminal flag was inserted for it
/// and starts again when every slot has terminated (a new round).
///
/// Insert order per step: `insert_state`, `insert_action`, `insert_log_prob`,
/// then `insert_reward`, optionally `insert_reached_goal`, and finally
/// `insert_is_terminal`, which is the only insert that changes the mask.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwarmMemory {
    trajectories: Vec<Trajectory>,
    terminated: Vec<bool>,
    /// Ascending indices of the slots not yet terminated in this round.
    active: Vec<usize>,
}

impl SwarmMemory {
    /// Creates a memory with `slots` empty trajectories, all active.
    pub fn new(slots: usize) -> Self {
        Self {
            trajectories: vec![Trajectory::new(); slots],
            terminated: vec![false; slots],
            active: (0..slots).collect(),
        }
    }

    /// Number of robot slots.
    pub fn slot_count(&self) -> usize {
        self.trajectories.len()
    }

    /// Returns the trajectory of a slot.
    pub fn slot(&self, slot: usize) -> Result<&Trajectory, MemoryError> {
        self.trajectories
            .get(slot)
            .ok_or(MemoryError::SlotOutOfRange {
                slot,
                slots: self.trajectories.len(),
            })
    }

    /// Iterates over all slot trajectories in slot order.
    pub fn trajectories(&self) -> impl Iterator<Item = &Trajectory> {
        self.trajectories.iter()
    }

    /// Returns true if the slot still awaits termination in the current round.
    pub fn is_active(&self, slot: usize) -> bool {
        self.terminated.get(slot).is_some_and(|t| !t)
    }

    /// Active-set mask, one entry per slot.
    pub fn active_mask(&self) -> Vec<bool> {
        self.terminated.iter().map(|t| !t).collect()
    }

    /// Absolute indices of the active slots, ascending.
    pub fn active_slots(&self) -> &[usize] {
        &self.active
    }

    /// Number of active slots.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Appends one observation per active slot.
    pub fn insert_state(&mut self, batch: &[Observation]) -> Result<(), MemoryError> {
        self.route("state", batch, |t, s| t.states.push(s.clone()))
    }

    /// Appends one action per active slot.
    pub fn insert_action(&mut self, batch: &[Action]) -> Result<(), MemoryError> {
        self.route("action", batch, |t, a| t.actions.push(*a))
    }

    /// Appends one reward per active slot.
    pub fn insert_reward(&mut self, batch: &[f64]) -> Result<(), MemoryError> {
        self.route("reward", batch, |t, r| t.rewards.push(*r))
    }

    /// Appends one log-probability per active slot.
    pub fn insert_log_prob(&mut self, batch: &[f64]) -> Result<(), MemoryError> {
        self.route("log_prob", batch, |t, p| t.log_probs.push(*p))
    }

    /// Appends one goal flag per active slot.
    pub fn insert_reached_goal(&mut self, batch: &[bool]) -> Result<(), MemoryError> {
        self.route("reached_goal", batch, |t, g| t.reached_goal.push(*g))
    }

    /// Appends one terminal flag per active slot and updates the mask.
    ///
    /// Slots whose flag is true become inactive. If that leaves no active
    /// slot, every slot is reactivated and a new round begins.
    pub fn insert_is_terminal(&mut self, batch: &[bool]) -> Result<(), MemoryError> {
        Self::check_len("is_terminal", self.active.len(), batch.len())?;
        for (&slot, done) in self.active.iter().zip(batch) {
            self.trajectories[slot].is_terminals.push(*done);
            if *done {
                self.terminated[slot] = true;
            }
        }
        if batch.iter().any(|done| *done) {
            let terminated = &self.terminated;
            self.active.retain(|&slot| !terminated[slot]);
        }
        if self.active.is_empty() {
            self.terminated.iter_mut().for_each(|t| *t = false);
            self.refresh_active();
        }
        Ok(())
    }

    /// Empties every trajectory. The mask is left untouched.
    pub fn clear(&mut self) {
        for t in &mut self.trajectories {
            t.clear();
        }
    }

    /// Moves the recorded experience out, leaving empty trajectories behind.
    ///
    /// The returned memory carries a copy of the current mask. Equivalent to
    /// cloning and then calling [`SwarmMemory::clear`].
    pub fn take(&mut self) -> SwarmMemory {
        let trajectories = self
            .trajectories
            .iter_mut()
            .map(std::mem::take)
            .collect();
        SwarmMemory {
            trajectories,
            terminated: self.terminated.clone(),
            active: self.active.clone(),
        }
    }

    /// Appends the slots of `other` after the slots of `self`.
    ///
    /// This widens the swarm: slot `j` of `other` becomes slot
    /// `self.slot_count() + j`. Histories of equal slot indices are never
    /// interleaved.
    pub fn merge(&mut self, other: SwarmMemory) {
        let offset = self.trajectories.len();
        self.trajectories.extend(other.trajectories);
        self.terminated.extend(other.terminated);
        self.active.extend(other.active.into_iter().map(|slot| slot + offset));
    }

    /// Consuming form of [`SwarmMemory::merge`].
    pub fn merged(mut self, other: SwarmMemory) -> SwarmMemory {
        self.merge(other);
        self
    }

    /// Drops slots that hold no experience.
    pub fn retain_nonempty(&mut self) {
        let mut keep = self.trajectories.iter().map(|t| !t.is_empty());
        self.terminated.retain(|_| keep.next().unwrap_or(false));
        self.trajectories.retain(|t| !t.is_empty());
        self.refresh_active();
    }

    /// Sum of the lengths of all trajectories.
    pub fn total_length(&self) -> usize {
        self.trajectories.iter().map(Trajectory::len).sum()
    }

    /// Returns true if no slot holds experience.
    pub fn is_empty(&self) -> bool {
        self.total_length() == 0
    }

    /// All states, slot by slot, each slot in temporal order.
    pub fn flatten_states(&self) -> Vec<&Observation> {
        self.trajectories.iter().flat_map(|t| &t.states).collect()
    }

    /// All actions, in the same order as [`SwarmMemory::flatten_states`].
    pub fn flatten_actions(&self) -> Vec<Action> {
        self.trajectories
            .iter()
            .flat_map(|t| t.actions.iter().copied())
            .collect()
    }

    /// All log-probabilities, in the same order as [`SwarmMemory::flatten_states`].
    pub fn flatten_log_probs(&self) -> Vec<f64> {
        self.trajectories
            .iter()
            .flat_map(|t| t.log_probs.iter().copied())
            .collect()
    }

    /// All rewards, in the same order as [`SwarmMemory::flatten_states`].
    pub fn flatten_rewards(&self) -> Vec<f64> {
        self.trajectories
            .iter()
            .flat_map(|t| t.rewards.iter().copied())
            .collect()
    }

    fn route<T>(
        &mut self,
        field: &'static str,
        batch: &[T],
        mut push: impl FnMut(&mut Trajectory, &T),
    ) -> Result<(), MemoryError> {
        Self::check_len(field, self.active.len(), batch.len())?;
        for (&slot, item) in self.active.iter().zip(batch) {
            push(&mut self.trajectories[slot], item);
        }
        Ok(())
    }

    fn refresh_active(&mut self) {
        self.active = self
            .terminated
            .iter()
            .enumerate()
            .filter(|(_, t)| !**t)
            .map(|(i, _)| i)
            .collect();
    }

    fn check_len(field: &'static str, expected: usize, actual: usize) -> Result<(), MemoryError> {
        if expected == actual {
            Ok(())
        } else {
            Err(MemoryError::BatchLengthMismatch {
                field,
                expected,
                actual,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(v: f64) -> Observation {
        Observation {
            distance_to_goal: v,
            ..Observation::default()
        }
    }

    /// Records one full step for every active slot.
    fn record_step(mem: &mut SwarmMemory, reward: f64, terminals: &[bool]) {
        let n = mem.active_count();
        mem.insert_state(&vec![obs(reward); n]).unwrap();
        mem.insert_action(&vec![Action::new(0.0, 0.0); n]).unwrap();
        mem.insert_log_prob(&vec![-1.0; n]).unwrap();
        mem.insert_reward(&vec![reward; n]).unwrap();
        mem.insert_is_terminal(terminals).unwrap();
    }

    #[test]
    fn routing_skips_inactive_slots() {
        let mut mem = SwarmMemory::new(3);
        record_step(&mut mem, 0.0, &[false, true, false]);
        assert_eq!(mem.active_mask(), vec![true, false, true]);

        mem.insert_reward(&[10.0, 20.0]).unwrap();
        assert_eq!(mem.slot(0).unwrap().rewards, vec![0.0, 10.0]);
        assert_eq!(mem.slot(1).unwrap().rewards, vec![0.0]);
        assert_eq!(mem.slot(2).unwrap().rewards, vec![0.0, 20.0]);
    }

    #[test]
    fn batch_length_must_match_active_count() {
        let mut mem = SwarmMemory::new(3);
        mem.insert_is_terminal(&[false, true, false]).unwrap();
        let err = mem.insert_reward(&[1.0, 2.0, 3.0]).unwrap_err();
        assert_eq!(
            err,
            MemoryError::BatchLengthMismatch {
                field: "reward",
                expected: 2,
                actual: 3
            }
        );
        // Nothing was written.
        assert!(mem.slot(0).unwrap().rewards.is_empty());
    }

    #[test]
    fn all_terminal_rolls_the_round_over() {
        let mut mem = SwarmMemory::new(3);
        mem.insert_is_terminal(&[true, true, true]).unwrap();
        assert_eq!(mem.active_mask(), vec![true, true, true]);
    }

    #[test]
    fn staggered_terminations_roll_over_on_last_robot() {
        let mut mem = SwarmMemory::new(3);
        record_step(&mut mem, 1.0, &[false, true, false]);
        record_step(&mut mem, 1.0, &[true, false]);
        assert_eq!(mem.active_slots(), &[2]);
        record_step(&mut mem, 1.0, &[true]);
        assert_eq!(mem.active_count(), 3);
        assert_eq!(mem.slot(0).unwrap().len(), 2);
        assert_eq!(mem.slot(1).unwrap().len(), 1);
        assert_eq!(mem.slot(2).unwrap().len(), 3);
        assert_eq!(mem.total_length(), 6);
    }

    #[test]
    fn total_length_is_sum_of_slot_lengths() {
        let mut mem = SwarmMemory::new(4);
        for step in 0..5 {
            let terminals: Vec<bool> = (0..mem.active_count()).map(|i| i == step % 2).collect();
            record_step(&mut mem, step as f64, &terminals);
        }
        let sum: usize = mem.trajectories().map(Trajectory::len).sum();
        assert_eq!(mem.total_length(), sum);
    }

    #[test]
    fn clear_keeps_mask() {
        let mut mem = SwarmMemory::new(2);
        record_step(&mut mem, 1.0, &[true, false]);
        mem.clear();
        assert_eq!(mem.total_length(), 0);
        assert_eq!(mem.active_mask(), vec![false, true]);
    }

    #[test]
    fn take_moves_experience_out() {
        let mut mem = SwarmMemory::new(2);
        record_step(&mut mem, 1.0, &[true, false]);
        let taken = mem.take();
        assert_eq!(taken.total_length(), 2);
        assert_eq!(taken.active_mask(), vec![false, true]);
        assert_eq!(mem.total_length(), 0);
        assert_eq!(mem.active_mask(), vec![false, true]);
    }

    #[test]
    fn merge_concatenates_slots_and_masks() {
        let mut a = SwarmMemory::new(2);
        record_step(&mut a, 1.0, &[false, true]);
        let mut b = SwarmMemory::new(1);
        record_step(&mut b, 2.0, &[false]);
        record_step(&mut b, 2.0, &[false]);

        let expected = a.total_length() + b.total_length();
        let merged = a.merged(b);
        assert_eq!(merged.slot_count(), 3);
        assert_eq!(merged.total_length(), expected);
        assert_eq!(merged.active_mask(), vec![true, false, true]);
        assert_eq!(merged.slot(2).unwrap().rewards, vec![2.0, 2.0]);
        assert_eq!(merged.active_slots(), &[0, 2]);
    }

    #[test]
    fn flatten_is_slot_major_then_temporal() {
        let mut mem = SwarmMemory::new(2);
        mem.insert_state(&[obs(0.0), obs(10.0)]).unwrap();
        mem.insert_log_prob(&[-0.1, -1.0]).unwrap();
        mem.insert_is_terminal(&[false, false]).unwrap();
        mem.insert_state(&[obs(1.0), obs(11.0)]).unwrap();
        mem.insert_log_prob(&[-0.2, -1.1]).unwrap();
        mem.insert_is_terminal(&[false, false]).unwrap();

        let states: Vec<f64> = mem
            .flatten_states()
            .iter()
            .map(|o| o.distance_to_goal)
            .collect();
        assert_eq!(states, vec![0.0, 1.0, 10.0, 11.0]);
        assert_eq!(mem.flatten_log_probs(), vec![-0.1, -0.2, -1.0, -1.1]);
    }

    #[test]
    fn retain_nonempty_drops_idle_slots() {
        let mut mem = SwarmMemory::new(3);
        mem.insert_is_terminal(&[false, true, false]).unwrap();
        mem.clear();
        mem.insert_state(&[obs(1.0), obs(2.0)]).unwrap();
        mem.retain_nonempty();
        assert_eq!(mem.slot_count(), 2);
        assert_eq!(mem.active_mask(), vec![true, true]);
        assert_eq!(mem.active_slots(), &[0, 1]);
    }

    #[test]
    fn active_slots_track_the_mask() {
        let mut mem = SwarmMemory::new(4);
        record_step(&mut mem, 0.0, &[false, true, false, true]);
        assert_eq!(mem.active_slots(), &[0, 2]);
        record_step(&mut mem, 0.0, &[true, false]);
        assert_eq!(mem.active_slots(), &[2]);
        mem.insert_reward(&[7.0]).unwrap();
        assert_eq!(mem.slot(2).unwrap().rewards, vec![0.0, 0.0, 7.0]);

        let taken = mem.take();
        assert_eq!(taken.active_slots(), &[2]);
        mem.insert_is_terminal(&[true]).unwrap();
        assert_eq!(mem.active_slots(), &[0, 1, 2, 3]);
    }
}
