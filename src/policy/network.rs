//! Neural actor-critic using tch-rs (PyTorch bindings).
//!
//! This module is only available with the `rl-nn` feature.

use tch::{nn, nn::Module, nn::OptimizerConfig, Device, Kind, Tensor};

use super::error::ParameterError;
use super::params::PolicyParameters;
use super::trait_::{PolicyNetwork, Prediction};
use crate::training::{LossFunction, LossReport, Objective, TrainingBatch};
use crate::types::{Action, ACTION_DIM};

/// MLP actor-critic with a state-independent Gaussian action head.
///
/// Actor: `obs_dim → 64 → 64 → 2` with tanh activations.
/// Critic: `obs_dim → 64 → 64 → 1` with tanh activations.
pub struct TchActorCritic {
    vs: nn::VarStore,
    actor: nn::Sequential,
    critic: nn::Sequential,
    log_std: Tensor,
    opt: nn::Optimizer,
    max_grad_norm: f64,
    device: Device,
}

impl TchActorCritic {
    /// Creates a new network with an Adam optimizer.
    pub fn new(
        obs_dim: usize,
        action_std: f64,
        lr: f64,
        max_grad_norm: f64,
        device: Device,
    ) -> Result<Self, tch::TchError> {
        let vs = nn::VarStore::new(device);
        let p = &vs.root();
        let actor = mlp(&(p / "actor"), obs_dim as i64, ACTION_DIM as i64);
        let critic = mlp(&(p / "critic"), obs_dim as i64, 1);
        let log_std = p.var(
            "log_std",
            &[ACTION_DIM as i64],
            nn::Init::Const(action_std.max(1e-6).ln()),
        );
        let opt = nn::Adam::default().build(&vs, lr)?;
        Ok(Self {
            vs,
            actor,
            critic,
            log_std,
            opt,
            max_grad_norm,
            device,
        })
    }

    fn states_tensor(&self, states: &[Vec<f64>]) -> Tensor {
        let n = states.len() as i64;
        let dim = states.first().map_or(0, Vec::len) as i64;
        let flat: Vec<f64> = states.iter().flatten().copied().collect();
        Tensor::from_slice(&flat)
            .reshape([n, dim])
            .to_kind(Kind::Float)
            .to_device(self.device)
    }

    fn actions_tensor(&self, actions: &[Action]) -> Tensor {
        let flat: Vec<f64> = actions.iter().flat_map(|a| a.as_array()).collect();
        Tensor::from_slice(&flat)
            .reshape([actions.len() as i64, ACTION_DIM as i64])
            .to_kind(Kind::Float)
            .to_device(self.device)
    }

    fn column(&self, values: &[f64]) -> Tensor {
        Tensor::from_slice(values)
            .to_kind(Kind::Float)
            .to_device(self.device)
    }

    /// Gaussian log-density of `actions` summed over action dimensions.
    fn log_prob(&self, mu: &Tensor, actions: &Tensor) -> Tensor {
        let z = (actions - mu) / self.log_std.exp();
        let per_dim = z.pow_tensor_scalar(2) * -0.5
            - &self.log_std
            - 0.5 * (2.0 * std::f64::consts::PI).ln();
        per_dim.sum_dim_intlist([-1].as_slice(), false, Kind::Float)
    }

    fn entropy(&self) -> Tensor {
        (&self.log_std + 0.5 * (2.0 * std::f64::consts::PI * std::f64::consts::E).ln())
            .sum(Kind::Float)
    }
}

fn mlp(p: &nn::Path, input: i64, output: i64) -> nn::Sequential {
    nn::seq()
        .add(nn::linear(p / "l1", input, 64, Default::default()))
        .add_fn(|x| x.tanh())
        .add(nn::linear(p / "l2", 64, 64, Default::default()))
        .add_fn(|x| x.tanh())
        .add(nn::linear(p / "l3", 64, output, Default::default()))
}

fn to_actions(t: &Tensor) -> Vec<Action> {
    let flat: Vec<f64> = Vec::<f64>::try_from(t.to_kind(Kind::Double).flatten(0, -1)).unwrap_or_default();
    flat.chunks_exact(ACTION_DIM)
        .map(|c| Action::new(c[0], c[1]))
        .collect()
}

fn to_vec(t: &Tensor) -> Vec<f64> {
    Vec::<f64>::try_from(t.to_kind(Kind::Double).flatten(0, -1)).unwrap_or_default()
}

impl PolicyNetwork for TchActorCritic {
    fn predict(&mut self, states: &[Vec<f64>]) -> Prediction {
        if states.is_empty() {
            return Prediction::default();
        }
        tch::no_grad(|| {
            let x = self.states_tensor(states);
            let mu = self.actor.forward(&x);
            let actions = &mu + self.log_std.exp() * mu.randn_like();
            let log_probs = self.log_prob(&mu, &actions);
            let values = self.critic.forward(&x).squeeze_dim(-1);
            Prediction {
                actions: to_actions(&actions),
                values: to_vec(&values),
                log_probs: to_vec(&log_probs),
            }
        })
    }

    fn predict_deterministic(&self, states: &[Vec<f64>]) -> Vec<Action> {
        if states.is_empty() {
            return Vec::new();
        }
        tch::no_grad(|| to_actions(&self.actor.forward(&self.states_tensor(states))))
    }

    fn values(&self, states: &[Vec<f64>]) -> Vec<f64> {
        if states.is_empty() {
            return Vec::new();
        }
        tch::no_grad(|| to_vec(&self.critic.forward(&self.states_tensor(states)).squeeze_dim(-1)))
    }

    fn log_probs(&self, states: &[Vec<f64>], actions: &[Action]) -> Vec<f64> {
        if states.is_empty() {
            return Vec::new();
        }
        tch::no_grad(|| {
            let mu = self.actor.forward(&self.states_tensor(states));
            to_vec(&self.log_prob(&mu, &self.actions_tensor(actions)))
        })
    }

    fn train(&mut self, batch: &TrainingBatch, loss: &LossFunction) -> LossReport {
        if batch.is_empty() {
            return LossReport::default();
        }
        let x = self.states_tensor(&batch.states);
        let actions = self.actions_tensor(&batch.actions);
        let old_log_probs = self.column(&batch.old_log_probs);
        let advantages = self.column(&batch.advantages);
        let returns = self.column(&batch.returns);

        let mu = self.actor.forward(&x);
        let new_log_probs = self.log_prob(&mu, &actions);

        let (policy_loss, clip_fraction) = match loss.objective {
            Objective::ClippedSurrogate { eps_clip } => {
                let ratio = (&new_log_probs - &old_log_probs).exp();
                let surr1 = &ratio * &advantages;
                let surr2 = ratio.clamp(1.0 - eps_clip, 1.0 + eps_clip) * &advantages;
                let clipped = surr2.lt_tensor(&surr1).to_kind(Kind::Float).mean(Kind::Float);
                (-surr1.min_other(&surr2).mean(Kind::Float), clipped)
            }
            Objective::PolicyGradient => (
                -(&new_log_probs * &advantages).mean(Kind::Float),
                Tensor::from(0.0f32),
            ),
        };
        let values = self.critic.forward(&x).squeeze_dim(-1);
        let value_loss = (&values - &returns).pow_tensor_scalar(2).mean(Kind::Float);
        let entropy = self.entropy();
        let total = &policy_loss + &value_loss * loss.value_coef - &entropy * loss.entropy_coef;

        let report = LossReport {
            policy_loss: f64::try_from(&policy_loss).unwrap_or(f64::NAN),
            value_loss: f64::try_from(&value_loss).unwrap_or(f64::NAN),
            entropy: f64::try_from(&entropy).unwrap_or(f64::NAN),
            total: f64::try_from(&total).unwrap_or(f64::NAN),
            approx_kl: f64::try_from((&old_log_probs - &new_log_probs).mean(Kind::Float))
                .unwrap_or(0.0),
            clip_fraction: f64::try_from(&clip_fraction).unwrap_or(0.0),
        };
        if report.is_finite() {
            if self.max_grad_norm > 0.0 {
                self.opt.backward_step_clip_norm(&total, self.max_grad_norm);
            } else {
                self.opt.backward_step(&total);
            }
        }
        report
    }

    fn parameters(&self) -> PolicyParameters {
        let mut params = PolicyParameters::new();
        for (name, t) in self.vs.variables() {
            let shape: Vec<usize> = t.size().iter().map(|&d| d as usize).collect();
            // Shape comes from the tensor itself, so insert cannot fail.
            let _ = params.insert(name, shape, to_vec(&t));
        }
        params
    }

    fn set_parameters(&mut self, params: &PolicyParameters) -> Result<(), ParameterError> {
        params.validate()?;
        let mut vars = self.vs.variables();
        for (name, var) in &vars {
            let shape: Vec<usize> = var.size().iter().map(|&d| d as usize).collect();
            params.expect_shape(name, &shape)?;
        }
        tch::no_grad(|| {
            for (name, var) in vars.iter_mut() {
                if let Some(src) = params.get(name) {
                    let shape: Vec<i64> = src.shape.iter().map(|&d| d as i64).collect();
                    let value = Tensor::from_slice(&src.values)
                        .reshape(shape.as_slice())
                        .to_kind(var.kind())
                        .to_device(self.device);
                    var.copy_(&value);
                }
            }
        });
        Ok(())
    }

    fn name(&self) -> &str {
        "tch-actor-critic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net() -> TchActorCritic {
        TchActorCritic::new(7, 0.5, 3e-4, 0.5, Device::Cpu).unwrap()
    }

    #[test]
    fn predict_shapes() {
        let mut n = net();
        let pred = n.predict(&vec![vec![0.1; 7]; 3]);
        assert_eq!(pred.actions.len(), 3);
        assert_eq!(pred.values.len(), 3);
        assert_eq!(pred.log_probs.len(), 3);
    }

    #[test]
    fn parameters_round_trip_between_networks() {
        let src = net();
        let mut dst = net();
        dst.set_parameters(&src.parameters()).unwrap();
        let x = vec![vec![0.3; 7]];
        let a = src.predict_deterministic(&x);
        let b = dst.predict_deterministic(&x);
        assert!((a[0].linear - b[0].linear).abs() < 1e-6);
    }

    #[test]
    fn train_returns_finite_loss() {
        let mut n = net();
        let states = vec![vec![0.2; 7]; 4];
        let pred = n.predict(&states);
        let batch = TrainingBatch {
            states,
            actions: pred.actions,
            old_log_probs: pred.log_probs,
            returns: vec![1.0, 0.5, -0.5, 0.0],
            advantages: vec![1.0, -1.0, 0.5, -0.5],
        };
        let report = n.train(&batch, &LossFunction::default());
        assert!(report.is_finite());
    }
}
