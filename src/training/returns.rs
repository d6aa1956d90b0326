//! Discounted returns and advantage normalization.

/// Stabilizer added to the standard deviation when normalizing.
pub const NORMALIZE_EPS: f64 = 1e-5;

/// Computes `G_t = r_t + γ·G_{t+1}` backwards over one slot's trajectory.
///
/// The accumulator restarts at every terminal step, so returns never cross
/// an episode boundary. The last step of the slot bootstraps from zero.
///
/// # Arguments
///
/// * `rewards` - Per-step rewards of one slot
/// * `is_terminals` - Per-step terminal flags, same length as `rewards`
/// * `gamma` - Discount factor
pub fn discounted_returns(rewards: &[f64], is_terminals: &[bool], gamma: f64) -> Vec<f64> {
    let mut returns = vec![0.0; rewards.len()];
    let mut running = 0.0;
    for t in (0..rewards.len()).rev() {
        if is_terminals.get(t).copied().unwrap_or(false) {
            running = 0.0;
        }
        running = rewards[t] + gamma * running;
        returns[t] = running;
    }
    returns
}

/// Shifts and scales `values` in place to zero mean and unit variance.
///
/// Uses the population standard deviation plus [`NORMALIZE_EPS`].
pub fn normalize(values: &mut [f64]) {
    let n = values.len();
    if n == 0 {
        return;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    let std = var.sqrt() + NORMALIZE_EPS;
    for v in values.iter_mut() {
        *v = (*v - mean) / std;
    }
}
