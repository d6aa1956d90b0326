//! Flat training batch built from an aggregated experience bundle.

use super::error::UpdateError;
use super::returns::{discounted_returns, normalize};
use crate::memory::{SwarmMemory, Trajectory};
use crate::types::Action;

/// Column-wise training data, one row per recorded step.
///
/// Rows follow the bundle's flatten order: slots ascending, time ascending
/// within a slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingBatch {
    /// Flattened observation features.
    pub states: Vec<Vec<f64>>,
    pub actions: Vec<Action>,
    /// Log-probabilities recorded at collection time.
    pub old_log_probs: Vec<f64>,
    /// Discounted returns.
    pub returns: Vec<f64>,
    /// Advantage estimates (filled by [`TrainingBatch::set_advantages`]).
    pub advantages: Vec<f64>,
}

impl TrainingBatch {
    /// Validates every slot of `bundle` and computes per-slot returns.
    ///
    /// Fails on an empty bundle, on any empty slot, and on any slot whose
    /// columns disagree in length. Advantages are left empty.
    pub fn from_bundle(
        bundle: &SwarmMemory,
        gamma: f64,
        normalize_returns: bool,
    ) -> Result<Self, UpdateError> {
        if bundle.slot_count() == 0 {
            return Err(UpdateError::EmptyBundle);
        }
        for (slot, t) in bundle.trajectories().enumerate() {
            validate_slot(slot, t)?;
        }

        let mut batch = Self::default();
        for t in bundle.trajectories() {
            batch.states.extend(t.states.iter().map(|s| s.features()));
            batch.actions.extend_from_slice(&t.actions);
            batch.old_log_probs.extend_from_slice(&t.log_probs);
            batch
                .returns
                .extend(discounted_returns(&t.rewards, &t.is_terminals, gamma));
        }
        if normalize_returns {
            normalize(&mut batch.returns);
        }
        Ok(batch)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Sets `advantages = returns - values`, optionally normalized.
    pub fn set_advantages(&mut self, values: &[f64], normalize_advantages: bool) {
        self.advantages = self
            .returns
            .iter()
            .zip(values)
            .map(|(g, v)| g - v)
            .collect();
        if normalize_advantages {
            normalize(&mut self.advantages);
        }
    }

    /// Copies the given rows into a new batch.
    pub fn select(&self, rows: &[usize]) -> Self {
        Self {
            states: rows.iter().map(|&i| self.states[i].clone()).collect(),
            actions: rows.iter().map(|&i| self.actions[i]).collect(),
            old_log_probs: rows.iter().map(|&i| self.old_log_probs[i]).collect(),
            returns: rows.iter().map(|&i| self.returns[i]).collect(),
            advantages: rows
                .iter()
                .filter_map(|&i| self.advantages.get(i).copied())
                .collect(),
        }
    }
}

fn validate_slot(slot: usize, t: &Trajectory) -> Result<(), UpdateError> {
    let states = t.states.len();
    if states == 0 {
        return Err(UpdateError::EmptyTrajectory { slot });
    }
    if t.log_probs.len() != states {
        return Err(UpdateError::LogProbMismatch {
            slot,
            states,
            log_probs: t.log_probs.len(),
        });
    }
    for (field, actual) in [
        ("actions", t.actions.len()),
        ("rewards", t.rewards.len()),
        ("is_terminals", t.is_terminals.len()),
    ] {
        if actual != states {
            return Err(UpdateError::FieldLengthMismatch {
                slot,
                field,
                expected: states,
                actual,
            });
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::test_support::record_step;
    use super::*;

    #[test]
    fn returns_are_computed_per_slot() {
        let mut m = SwarmMemory::new(2);
        record_step(&mut m, 0.1, &[1.0, 10.0], &[false, false]);
        record_step(&mut m, 0.2, &[1.0, 10.0], &[false, true]);
        record_step(&mut m, 0.3, &[1.0], &[true]);

        let batch = TrainingBatch::from_bundle(&m, 0.5, false).unwrap();
        assert_eq!(batch.len(), 5);
        // slot 0: [1, 1, 1] then slot 1: [10, 10]
        let expected = [1.75, 1.5, 1.0, 15.0, 10.0];
        for (g, e) in batch.returns.iter().zip(expected) {
            assert!((g - e).abs() < 1e-10, "{g} != {e}");
        }
        assert_eq!(batch.states[0].len(), 7);
    }

    #[test]
    fn normalized_returns_have_zero_mean_unit_std() {
        let mut m = SwarmMemory::new(2);
        record_step(&mut m, 0.1, &[1.0, 10.0], &[false, false]);
        record_step(&mut m, 0.2, &[1.0, 10.0], &[true, true]);

        let raw = TrainingBatch::from_bundle(&m, 0.5, false).unwrap();
        let batch = TrainingBatch::from_bundle(&m, 0.5, true).unwrap();
        let n = batch.len() as f64;
        let mean = batch.returns.iter().sum::<f64>() / n;
        let var = batch.returns.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / n;
        assert!(mean.abs() < 1e-9);
        assert!((var.sqrt() - 1.0).abs() < 1e-3);
        // Ordering is preserved: slot 1 returns stay above slot 0 returns.
        assert!(batch.returns[2] > batch.returns[0]);
        assert!((raw.returns[0] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn empty_slot_is_rejected() {
        let mut m = SwarmMemory::new(2);
        record_step(&mut m, 0.1, &[1.0, 1.0], &[true, false]);
        m.clear();
        record_step(&mut m, 0.1, &[1.0], &[false]);
        assert_eq!(
            TrainingBatch::from_bundle(&m, 0.9, false),
            Err(UpdateError::EmptyTrajectory { slot: 0 })
        );
    }

    #[test]
    fn empty_bundle_is_rejected() {
        assert_eq!(
            TrainingBatch::from_bundle(&SwarmMemory::default(), 0.9, false),
            Err(UpdateError::EmptyBundle)
        );
    }

    #[test]
    fn missing_log_prob_is_rejected() {
        let mut m = SwarmMemory::new(1);
        record_step(&mut m, 0.1, &[1.0], &[false]);
        m.insert_state(&[crate::types::Observation::default()]).unwrap();
        m.insert_action(&[Action::default()]).unwrap();
        m.insert_reward(&[0.0]).unwrap();
        m.insert_is_terminal(&[false]).unwrap();
        assert_eq!(
            TrainingBatch::from_bundle(&m, 0.9, false),
            Err(UpdateError::LogProbMismatch {
                slot: 0,
                states: 2,
                log_probs: 1
            })
        );
    }

    #[test]
    fn select_copies_rows() {
        let mut m = SwarmMemory::new(1);
        record_step(&mut m, 0.1, &[1.0], &[false]);
        record_step(&mut m, 0.2, &[2.0], &[true]);
        let mut batch = TrainingBatch::from_bundle(&m, 1.0, false).unwrap();
        batch.set_advantages(&[0.0, 0.0], false);
        let sub = batch.select(&[1]);
        assert_eq!(sub.len(), 1);
        assert!((sub.returns[0] - 2.0).abs() < 1e-12);
        assert!((sub.advantages[0] - 2.0).abs() < 1e-12);
    }
}
