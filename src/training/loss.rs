//! Policy objectives and loss bookkeeping.
//!
//! Ratio convention: `ratio = exp(new_log_prob - old_log_prob)`, the
//! surrogate is `min(ratio·A, clip(ratio, 1-ε, 1+ε)·A)` and the policy loss
//! is its negative mean.

use std::fmt;
use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

/// Policy term of the loss.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Objective {
    /// PPO clipped surrogate.
    ClippedSurrogate { eps_clip: f64 },
    /// A2C: advantage-weighted log-likelihood.
    PolicyGradient,
}

impl Objective {
    /// Per-sample policy loss and its derivative with respect to the new log-probability.
    pub fn sample_loss(&self, new_log_prob: f64, old_log_prob: f64, advantage: f64) -> (f64, f64) {
        match *self {
            Objective::ClippedSurrogate { eps_clip } => {
                let ratio = (new_log_prob - old_log_prob).exp();
                let (surrogate, unclipped) = clipped_surrogate(ratio, advantage, eps_clip);
                let grad = if unclipped { -advantage * ratio } else { 0.0 };
                (-surrogate, grad)
            }
            Objective::PolicyGradient => (-advantage * new_log_prob, -advantage),
        }
    }
}

/// `min(ratio·A, clip(ratio)·A)`, plus whether the unclipped branch was taken.
pub fn clipped_surrogate(ratio: f64, advantage: f64, eps_clip: f64) -> (f64, bool) {
    let surr1 = ratio * advantage;
    let surr2 = ratio.clamp(1.0 - eps_clip, 1.0 + eps_clip) * advantage;
    if surr1 <= surr2 {
        (surr1, true)
    } else {
        (surr2, false)
    }
}

/// Policy objective plus the weights of the value and entropy terms.
///
/// `total = policy_loss + value_coef · value_loss - entropy_coef · entropy`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossFunction {
    pub objective: Objective,
    pub value_coef: f64,
    pub entropy_coef: f64,
}

impl Default for LossFunction {
    fn default() -> Self {
        Self {
            objective: Objective::ClippedSurrogate { eps_clip: 0.2 },
            value_coef: 0.5,
            entropy_coef: 0.01,
        }
    }
}

/// Scalar diagnostics of one optimizer step, or the mean over several.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LossReport {
    pub policy_loss: f64,
    pub value_loss: f64,
    pub entropy: f64,
    pub total: f64,
    /// Mean of `old_log_prob - new_log_prob`.
    pub approx_kl: f64,
    /// Fraction of samples where the clipped branch was taken.
    pub clip_fraction: f64,
}

impl LossReport {
    pub fn is_finite(&self) -> bool {
        self.total.is_finite() && self.policy_loss.is_finite() && self.value_loss.is_finite()
    }

    /// Divides every field by `n`.
    pub fn scaled(mut self, n: usize) -> Self {
        if n > 0 {
            let k = n as f64;
            self.policy_loss /= k;
            self.value_loss /= k;
            self.entropy /= k;
            self.total /= k;
            self.approx_kl /= k;
            self.clip_fraction /= k;
        }
        self
    }
}

impl AddAssign for LossReport {
    fn add_assign(&mut self, rhs: Self) {
        self.policy_loss += rhs.policy_loss;
        self.value_loss += rhs.value_loss;
        self.entropy += rhs.entropy;
        self.total += rhs.total;
        self.approx_kl += rhs.approx_kl;
        self.clip_fraction += rhs.clip_fraction;
    }
}

impl fmt::Display for LossReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "loss={:.4} policy={:.4} value={:.4} entropy={:.4} kl={:.5} clip={:.2}",
            self.total,
            self.policy_loss,
            self.value_loss,
            self.entropy,
            self.approx_kl,
            self.clip_fraction
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surrogate_inside_clip_range_is_unclipped() {
        let (s, unclipped) = clipped_surrogate(1.1, 2.0, 0.2);
        assert!((s - 2.2).abs() < 1e-12);
        assert!(unclipped);
    }

    #[test]
    fn surrogate_clips_large_ratio_with_positive_advantage() {
        let (s, unclipped) = clipped_surrogate(1.5, 1.0, 0.2);
        assert!((s - 1.2).abs() < 1e-12);
        assert!(!unclipped);
    }

    #[test]
    fn surrogate_keeps_large_ratio_with_negative_advantage() {
        // min picks the more pessimistic unclipped term.
        let (s, unclipped) = clipped_surrogate(1.5, -1.0, 0.2);
        assert!((s + 1.5).abs() < 1e-12);
        assert!(unclipped);
    }

    #[test]
    fn clipped_sample_has_zero_gradient() {
        let obj = Objective::ClippedSurrogate { eps_clip: 0.2 };
        let (loss, grad) = obj.sample_loss(0.5, 0.0, 1.0);
        assert!((loss + 1.2).abs() < 1e-12);
        assert_eq!(grad, 0.0);
    }

    #[test]
    fn policy_gradient_sample_loss() {
        let (loss, grad) = Objective::PolicyGradient.sample_loss(-0.5, -0.1, 2.0);
        assert!((loss - 1.0).abs() < 1e-12);
        assert!((grad + 2.0).abs() < 1e-12);
    }

    #[test]
    fn report_mean() {
        let mut acc = LossReport::default();
        acc += LossReport {
            total: 1.0,
            ..LossReport::default()
        };
        acc += LossReport {
            total: 3.0,
            ..LossReport::default()
        };
        assert!((acc.scaled(2).total - 2.0).abs() < 1e-12);
    }
}
