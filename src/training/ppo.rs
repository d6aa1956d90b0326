//! Policy update engine (PPO and A2C).
//!
//! Turns an aggregated experience bundle into optimizer steps:
//! per-slot discounted returns, advantages from the critic, then
//! `k_epochs` passes of shuffled minibatches through
//! [`PolicyNetwork::train`].

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info};

use super::batch::TrainingBatch;
use super::error::UpdateError;
use super::loss::{LossFunction, LossReport, Objective};
use crate::config::{Algorithm, PpoConfig};
use crate::memory::SwarmMemory;
use crate::policy::PolicyNetwork;

/// Summary of one call to [`PolicyUpdater::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UpdateReport {
    /// Rows in the training batch.
    pub samples: usize,
    /// Slots in the bundle.
    pub slots: usize,
    pub epochs: usize,
    /// Optimizer steps taken.
    pub minibatches: usize,
    /// Mean loss over all optimizer steps.
    pub loss: LossReport,
}

/// Runs policy updates with fixed hyperparameters and a seeded shuffle.
#[derive(Debug, Clone)]
pub struct PolicyUpdater {
    config: PpoConfig,
    rng: StdRng,
    updates: usize,
}

impl PolicyUpdater {
    pub fn new(config: PpoConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            updates: 0,
        }
    }

    pub fn config(&self) -> &PpoConfig {
        &self.config
    }

    /// Number of successful updates so far.
    pub fn updates(&self) -> usize {
        self.updates
    }

    /// Loss used for every optimizer step.
    pub fn loss_function(&self) -> LossFunction {
        let objective = match self.config.algorithm {
            Algorithm::Ppo => Objective::ClippedSurrogate {
                eps_clip: self.config.eps_clip,
            },
            Algorithm::A2c => Objective::PolicyGradient,
        };
        LossFunction {
            objective,
            value_coef: self.config.value_coef,
            entropy_coef: self.config.entropy_coef,
        }
    }

    /// Number of passes over the batch per update.
    pub fn epochs(&self) -> usize {
        match self.config.algorithm {
            Algorithm::Ppo => self.config.k_epochs,
            Algorithm::A2c => 1,
        }
    }

    /// Runs one update of `policy` on `bundle`.
    ///
    /// The bundle is only read. Validation happens before the policy is
    /// touched, so a rejected bundle leaves the parameters unchanged.
    pub fn update<P: PolicyNetwork + ?Sized>(
        &mut self,
        policy: &mut P,
        bundle: &SwarmMemory,
    ) -> Result<UpdateReport, UpdateError> {
        let mut batch =
            TrainingBatch::from_bundle(bundle, self.config.gamma, self.config.normalize_returns)?;
        let values = policy.values(&batch.states);
        batch.set_advantages(&values, true);

        let n = batch.len();
        let chunk = match self.config.batch_size {
            0 => n,
            size => size.min(n),
        };
        let loss = self.loss_function();
        let epochs = self.epochs();
        let snapshot = policy.parameters();

        let mut total = LossReport::default();
        let mut steps = 0usize;
        let mut rows: Vec<usize> = (0..n).collect();
        for epoch in 0..epochs {
            rows.shuffle(&mut self.rng);
            for minibatch in rows.chunks(chunk) {
                let report = policy.train(&batch.select(minibatch), &loss);
                if !report.is_finite() {
                    policy.set_parameters(&snapshot)?;
                    return Err(UpdateError::NonFiniteLoss { epoch });
                }
                total += report;
                steps += 1;
            }
            debug!(epoch, steps, "update epoch finished");
        }

        self.updates += 1;
        let report = UpdateReport {
            samples: n,
            slots: bundle.slot_count(),
            epochs,
            minibatches: steps,
            loss: total.scaled(steps),
        };
        info!(
            update = self.updates,
            network = policy.name(),
            samples = report.samples,
            slots = report.slots,
            loss = %report.loss,
            "policy updated"
        );
        Ok(report)
    }
}
