//! Training telemetry and policy evaluation.

use std::fmt;

use crate::environment::{Environment, EnvironmentError, Simulation};
use crate::policy::{feature_rows, PolicyNetwork};
use crate::reward::RewardComponent;
use crate::training::UpdateReport;

/// Scalar summary of one log interval, produced on the coordinator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeSummary {
    /// Last episode of the interval.
    pub episode: usize,
    /// Average over workers and episodes of the summed per-step mean reward.
    pub mean_reward: f64,
    /// Average episode length in steps.
    pub avg_length: f64,
    /// Rolling goal-reached percentage (0 to 100).
    pub goal_percentage: f64,
    /// Robots across all workers in the last episode.
    pub robots: usize,
}

impl fmt::Display for EpisodeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Episode: {}, Avg reward: {:.2}, Avg steps: {:.2}, Goals: {:.1}%, Robots: {}",
            self.episode, self.mean_reward, self.avg_length, self.goal_percentage, self.robots
        )
    }
}

/// What a training run did. Summaries are only filled on the coordinator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingReport {
    /// Episodes run (the same on every rank).
    pub episodes: usize,
    /// Policy updates applied.
    pub updates: usize,
    /// True if training ended because the goal rate crossed the threshold.
    pub solved: bool,
    /// Best interval reward, if any interval completed.
    pub best_reward: Option<f64>,
    pub summaries: Vec<EpisodeSummary>,
    pub last_update: Option<UpdateReport>,
}

/// Aggregated metrics of a deterministic evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationMetrics {
    /// Mean of the summed robot rewards per episode.
    pub mean_episode_reward: f64,
    /// Mean episode length in steps.
    pub mean_length: f64,
    /// Percentage of robots that reached their goal.
    pub goal_percentage: f64,
    /// Percentage of robots that collided.
    pub collision_percentage: f64,
    /// Percentage of robots that ran out of time.
    pub timeout_percentage: f64,
    /// Number of episodes evaluated.
    pub n_episodes: usize,
}

#[derive(Debug, Default)]
struct EpisodeStats {
    reward: f64,
    steps: usize,
    robots: usize,
    goals: usize,
    collisions: usize,
    timeouts: usize,
}

impl EvaluationMetrics {
    /// Runs `n_episodes` episodes with the policy's mean actions.
    ///
    /// # Arguments
    ///
    /// * `env` - Environment to evaluate in
    /// * `policy` - Policy to evaluate (not modified)
    /// * `n_episodes` - Number of episodes to run
    /// * `level` - Level passed to every reset
    pub fn evaluate<S, P>(
        env: &mut Environment<S>,
        policy: &P,
        n_episodes: usize,
        level: usize,
    ) -> Result<Self, EnvironmentError>
    where
        S: Simulation,
        P: PolicyNetwork + ?Sized,
    {
        let mut all_stats = Vec::with_capacity(n_episodes);

        for _ in 0..n_episodes {
            env.reset(level);
            let mut stats = EpisodeStats {
                robots: env.num_robots(),
                ..EpisodeStats::default()
            };

            while !env.is_done() {
                let actions = policy.predict_deterministic(&feature_rows(&env.active_observations()));
                let outcome = env.step(&actions)?;
                stats.steps += 1;
                stats.reward += outcome.total_reward();
                for r in outcome.robots.iter().filter(|r| r.done) {
                    if r.reached_goal {
                        stats.goals += 1;
                    } else if r.breakdown.contains(RewardComponent::Collision) {
                        stats.collisions += 1;
                    } else if r.breakdown.contains(RewardComponent::OutOfTime) {
                        stats.timeouts += 1;
                    }
                }
            }
            all_stats.push(stats);
        }

        let n = all_stats.len().max(1) as f64;
        let robots = all_stats.iter().map(|s| s.robots).sum::<usize>().max(1) as f64;
        let pct = |f: fn(&EpisodeStats) -> usize| {
            all_stats.iter().map(f).sum::<usize>() as f64 / robots * 100.0
        };

        Ok(Self {
            mean_episode_reward: all_stats.iter().map(|s| s.reward).sum::<f64>() / n,
            mean_length: all_stats.iter().map(|s| s.steps as f64).sum::<f64>() / n,
            goal_percentage: pct(|s: &EpisodeStats| s.goals),
            collision_percentage: pct(|s: &EpisodeStats| s.collisions),
            timeout_percentage: pct(|s: &EpisodeStats| s.timeouts),
            n_episodes,
        })
    }
}

impl fmt::Display for EvaluationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Evaluation Metrics ({} episodes) ===", self.n_episodes)?;
        writeln!(f, "  Mean episode reward:  {:.2}", self.mean_episode_reward)?;
        writeln!(f, "  Mean length:          {:.1}", self.mean_length)?;
        writeln!(f, "  Goals reached:        {:.1}%", self.goal_percentage)?;
        writeln!(f, "  Collisions:           {:.1}%", self.collision_percentage)?;
        writeln!(f, "  Timeouts:             {:.1}%", self.timeout_percentage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{ArenaConfig, KinematicArena};
    use crate::policy::{GaussianPolicyConfig, LinearGaussianPolicy};
    use crate::reward::SparseReward;

    #[test]
    fn evaluate_completes() {
        let arena = KinematicArena::new(ArenaConfig {
            n_robots: 3,
            ..ArenaConfig::default()
        });
        let obs_dim = arena.config().observation_dim();
        let mut env = Environment::new(arena, Box::new(SparseReward::default()), 15);
        let policy = LinearGaussianPolicy::new(obs_dim, GaussianPolicyConfig::default());

        let metrics = EvaluationMetrics::evaluate(&mut env, &policy, 3, 0).unwrap();
        assert_eq!(metrics.n_episodes, 3);
        assert!(metrics.mean_length > 0.0 && metrics.mean_length <= 15.0);
        // Every robot ends one way or another.
        let total = metrics.goal_percentage + metrics.collision_percentage + metrics.timeout_percentage;
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn summary_display() {
        let s = EpisodeSummary {
            episode: 20,
            mean_reward: 12.3456,
            avg_length: 50.0,
            goal_percentage: 75.0,
            robots: 8,
        };
        assert_eq!(
            s.to_string(),
            "Episode: 20, Avg reward: 12.35, Avg steps: 50.00, Goals: 75.0%, Robots: 8"
        );
    }
}
