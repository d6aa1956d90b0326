//! Pure-Rust actor-critic with a linear Gaussian actor and a linear critic.
//!
//! The actor outputs a mean action `μ = W·x + b` and keeps a learned
//! log-standard-deviation per action dimension. The critic is `V = u·x + c`.
//! Gradients of the loss are computed analytically; the optimizer is plain
//! SGD with global gradient-norm clipping.

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use super::error::ParameterError;
use super::params::PolicyParameters;
use super::trait_::{PolicyNetwork, Prediction};
use crate::training::{LossFunction, LossReport, Objective, TrainingBatch};
use crate::types::{Action, ACTION_DIM};

const LOG_STD_MIN: f64 = -5.0;
const LOG_STD_MAX: f64 = 2.0;

/// Hyperparameters of [`LinearGaussianPolicy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaussianPolicyConfig {
    /// Initial action standard deviation.
    pub action_std: f64,
    /// SGD learning rate.
    pub lr: f64,
    /// Global gradient-norm limit (0 disables clipping).
    pub max_grad_norm: f64,
    /// Scale of the uniform weight initialization.
    pub init_scale: f64,
    /// Seed for initialization and action sampling.
    pub seed: u64,
}

impl Default for GaussianPolicyConfig {
    fn default() -> Self {
        Self {
            action_std: 0.5,
            lr: 3e-4,
            max_grad_norm: 0.5,
            init_scale: 0.01,
            seed: 0,
        }
    }
}

/// Linear actor-critic. See the module docs.
#[derive(Debug, Clone)]
pub struct LinearGaussianPolicy {
    obs_dim: usize,
    config: GaussianPolicyConfig,
    /// Row-major `[ACTION_DIM, obs_dim]`.
    actor_weight: Vec<f64>,
    actor_bias: [f64; ACTION_DIM],
    log_std: [f64; ACTION_DIM],
    critic_weight: Vec<f64>,
    critic_bias: f64,
    rng: StdRng,
}

/// Gradients with the same layout as the parameters.
#[derive(Debug, Clone)]
struct Gradients {
    actor_weight: Vec<f64>,
    actor_bias: [f64; ACTION_DIM],
    log_std: [f64; ACTION_DIM],
    critic_weight: Vec<f64>,
    critic_bias: f64,
}

impl Gradients {
    fn zeros(obs_dim: usize) -> Self {
        Self {
            actor_weight: vec![0.0; ACTION_DIM * obs_dim],
            actor_bias: [0.0; ACTION_DIM],
            log_std: [0.0; ACTION_DIM],
            critic_weight: vec![0.0; obs_dim],
            critic_bias: 0.0,
        }
    }

    fn norm(&self) -> f64 {
        let sq: f64 = self
            .actor_weight
            .iter()
            .chain(&self.actor_bias)
            .chain(&self.log_std)
            .chain(&self.critic_weight)
            .map(|g| g * g)
            .sum::<f64>()
            + self.critic_bias * self.critic_bias;
        sq.sqrt()
    }
}

impl LinearGaussianPolicy {
    pub const ACTOR_WEIGHT: &'static str = "actor.weight";
    pub const ACTOR_BIAS: &'static str = "actor.bias";
    pub const LOG_STD: &'static str = "actor.log_std";
    pub const CRITIC_WEIGHT: &'static str = "critic.weight";
    pub const CRITIC_BIAS: &'static str = "critic.bias";

    /// Creates a randomly initialized policy for `obs_dim` input features.
    pub fn new(obs_dim: usize, config: GaussianPolicyConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let scale = config.init_scale;
        let mut init = |n: usize| -> Vec<f64> {
            (0..n)
                .map(|_| {
                    if scale > 0.0 {
                        rng.gen_range(-scale..scale)
                    } else {
                        0.0
                    }
                })
                .collect()
        };
        let actor_weight = init(ACTION_DIM * obs_dim);
        let critic_weight = init(obs_dim);
        let log_std = config.action_std.max(1e-6).ln();
        Self {
            obs_dim,
            actor_weight,
            actor_bias: [0.0; ACTION_DIM],
            log_std: [log_std; ACTION_DIM],
            critic_weight,
            critic_bias: 0.0,
            rng,
            config,
        }
    }

    /// Number of input features.
    pub fn obs_dim(&self) -> usize {
        self.obs_dim
    }

    pub fn config(&self) -> &GaussianPolicyConfig {
        &self.config
    }

    /// Current action standard deviations.
    pub fn action_std(&self) -> [f64; ACTION_DIM] {
        self.log_std.map(f64::exp)
    }

    fn mean(&self, x: &[f64]) -> [f64; ACTION_DIM] {
        let mut mu = self.actor_bias;
        for (k, m) in mu.iter_mut().enumerate() {
            let row = &self.actor_weight[k * self.obs_dim..(k + 1) * self.obs_dim];
            *m += dot(row, x);
        }
        mu
    }

    fn value(&self, x: &[f64]) -> f64 {
        dot(&self.critic_weight, x) + self.critic_bias
    }

    fn log_prob(&self, mu: &[f64; ACTION_DIM], action: &[f64; ACTION_DIM]) -> f64 {
        (0..ACTION_DIM)
            .map(|k| {
                let z = (action[k] - mu[k]) / self.log_std[k].exp();
                -0.5 * z * z - self.log_std[k] - 0.5 * (2.0 * PI).ln()
            })
            .sum()
    }

    fn entropy(&self) -> f64 {
        self.log_std
            .iter()
            .map(|ls| ls + 0.5 * (2.0 * PI * std::f64::consts::E).ln())
            .sum()
    }

    /// Loss and analytic gradients on `batch`.
    fn loss_and_gradients(&self, batch: &TrainingBatch, loss: &LossFunction) -> (LossReport, Gradients) {
        let n = batch.len();
        let mut grads = Gradients::zeros(self.obs_dim);
        let mut report = LossReport::default();
        if n == 0 {
            return (report, grads);
        }
        let inv_n = 1.0 / n as f64;
        let std = self.action_std();
        let mut clipped = 0usize;

        for i in 0..n {
            let x = &batch.states[i];
            let a = batch.actions[i].as_array();
            let advantage = batch.advantages.get(i).copied().unwrap_or(0.0);
            let mu = self.mean(x);
            let lp = self.log_prob(&mu, &a);

            let (sample_loss, dlp) = loss.objective.sample_loss(lp, batch.old_log_probs[i], advantage);
            report.policy_loss += sample_loss * inv_n;
            report.approx_kl += (batch.old_log_probs[i] - lp) * inv_n;
            if matches!(loss.objective, Objective::ClippedSurrogate { .. }) && dlp == 0.0 && advantage != 0.0 {
                clipped += 1;
            }

            let dlp = dlp * inv_n;
            for k in 0..ACTION_DIM {
                let z = (a[k] - mu[k]) / std[k];
                // d lp / d mu_k = z / s_k, d lp / d log_std_k = z^2 - 1
                let dmu = dlp * z / std[k];
                grads.actor_bias[k] += dmu;
                let row = &mut grads.actor_weight[k * self.obs_dim..(k + 1) * self.obs_dim];
                for (g, xi) in row.iter_mut().zip(x) {
                    *g += dmu * xi;
                }
                grads.log_std[k] += dlp * (z * z - 1.0);
            }

            let v = self.value(x);
            let err = v - batch.returns[i];
            report.value_loss += err * err * inv_n;
            let dv = loss.value_coef * 2.0 * err * inv_n;
            grads.critic_bias += dv;
            for (g, xi) in grads.critic_weight.iter_mut().zip(x) {
                *g += dv * xi;
            }
        }

        report.entropy = self.entropy();
        for g in grads.log_std.iter_mut() {
            *g -= loss.entropy_coef;
        }
        report.total =
            report.policy_loss + loss.value_coef * report.value_loss - loss.entropy_coef * report.entropy;
        report.clip_fraction = clipped as f64 * inv_n;
        (report, grads)
    }

    fn apply(&mut self, mut grads: Gradients) {
        let norm = grads.norm();
        let limit = self.config.max_grad_norm;
        if limit > 0.0 && norm > limit {
            let k = limit / norm;
            grads.actor_weight.iter_mut().for_each(|g| *g *= k);
            grads.actor_bias.iter_mut().for_each(|g| *g *= k);
            grads.log_std.iter_mut().for_each(|g| *g *= k);
            grads.critic_weight.iter_mut().for_each(|g| *g *= k);
            grads.critic_bias *= k;
        }
        let lr = self.config.lr;
        for (w, g) in self.actor_weight.iter_mut().zip(&grads.actor_weight) {
            *w -= lr * g;
        }
        for (w, g) in self.critic_weight.iter_mut().zip(&grads.critic_weight) {
            *w -= lr * g;
        }
        for k in 0..ACTION_DIM {
            self.actor_bias[k] -= lr * grads.actor_bias[k];
            self.log_std[k] = (self.log_std[k] - lr * grads.log_std[k]).clamp(LOG_STD_MIN, LOG_STD_MAX);
        }
        self.critic_bias -= lr * grads.critic_bias;
    }
}

impl PolicyNetwork for LinearGaussianPolicy {
    fn predict(&mut self, states: &[Vec<f64>]) -> Prediction {
        let std = self.action_std();
        let mut out = Prediction::default();
        for x in states {
            let mu = self.mean(x);
            let mut a = [0.0; ACTION_DIM];
            for k in 0..ACTION_DIM {
                let z: f64 = self.rng.sample(StandardNormal);
                a[k] = mu[k] + std[k] * z;
            }
            out.log_probs.push(self.log_prob(&mu, &a));
            out.values.push(self.value(x));
            out.actions.push(Action::from_array(a));
        }
        out
    }

    fn predict_deterministic(&self, states: &[Vec<f64>]) -> Vec<Action> {
        states.iter().map(|x| Action::from_array(self.mean(x))).collect()
    }

    fn values(&self, states: &[Vec<f64>]) -> Vec<f64> {
        states.iter().map(|x| self.value(x)).collect()
    }

    fn log_probs(&self, states: &[Vec<f64>], actions: &[Action]) -> Vec<f64> {
        states
            .iter()
            .zip(actions)
            .map(|(x, a)| self.log_prob(&self.mean(x), &a.as_array()))
            .collect()
    }

    fn train(&mut self, batch: &TrainingBatch, loss: &LossFunction) -> LossReport {
        let (report, grads) = self.loss_and_gradients(batch, loss);
        if report.is_finite() {
            self.apply(grads);
        }
        report
    }

    fn parameters(&self) -> PolicyParameters {
        let mut p = PolicyParameters::new();
        let entries = [
            (Self::ACTOR_WEIGHT, vec![ACTION_DIM, self.obs_dim], self.actor_weight.clone()),
            (Self::ACTOR_BIAS, vec![ACTION_DIM], self.actor_bias.to_vec()),
            (Self::LOG_STD, vec![ACTION_DIM], self.log_std.to_vec()),
            (Self::CRITIC_WEIGHT, vec![1, self.obs_dim], self.critic_weight.clone()),
            (Self::CRITIC_BIAS, vec![1], vec![self.critic_bias]),
        ];
        for (name, shape, values) in entries {
            // Shapes are derived from the stored vectors, so insert cannot fail.
            let _ = p.insert(name, shape, values);
        }
        p
    }

    fn set_parameters(&mut self, params: &PolicyParameters) -> Result<(), ParameterError> {
        let d = self.obs_dim;
        let actor_weight = params.expect_shape(Self::ACTOR_WEIGHT, &[ACTION_DIM, d])?;
        let actor_bias = params.expect_shape(Self::ACTOR_BIAS, &[ACTION_DIM])?;
        let log_std = params.expect_shape(Self::LOG_STD, &[ACTION_DIM])?;
        let critic_weight = params.expect_shape(Self::CRITIC_WEIGHT, &[1, d])?;
        let critic_bias = params.expect_shape(Self::CRITIC_BIAS, &[1])?;
        params.validate()?;

        self.actor_weight.copy_from_slice(actor_weight);
        self.actor_bias.copy_from_slice(actor_bias);
        self.log_std.copy_from_slice(log_std);
        self.critic_weight.copy_from_slice(critic_weight);
        self.critic_bias = critic_bias[0];
        Ok(())
    }

    fn name(&self) -> &str {
        "linear-gaussian"
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
