//! Training orchestrator.
//!
//! Every worker runs the same loop. All ranks issue the same sequence of
//! collectives, so episode boundaries, updates and the stop decision happen
//! in lockstep:
//!
//! 1. Reset the environment; every tick, step it while it is running and
//!    record the step into the local swarm buffer.
//! 2. Gather goal outcomes, then exchange experience. When an update is due
//!    the coordinator trains on the bundle and broadcasts new parameters.
//! 3. Stop the episode once no worker has a running environment.
//! 4. After the episode the coordinator decides `solved` and broadcasts it.
//! 5. Every `log_interval` episodes the reward and length accumulators are
//!    reduced, summarized and, if best so far, checkpointed.

use tracing::{debug, info, warn};

use super::checkpoint::{CheckpointError, CheckpointKind, CheckpointStore};
use super::metrics::{EpisodeSummary, TrainingReport};
use super::state::TrainingState;
use crate::config::{ConfigError, TrainerConfig};
use crate::distributed::{broadcast_parameters, launch, Communicator, ExperienceSync};
use crate::environment::{ArenaConfig, Environment, KinematicArena, Simulation};
use crate::error::TrainError;
use crate::memory::SwarmMemory;
use crate::policy::{feature_rows, LinearGaussianPolicy, PolicyNetwork, PolicyParameters};
use crate::training::PolicyUpdater;

/// One worker's training loop.
pub struct Trainer<S: Simulation, P: PolicyNetwork, C: Communicator> {
    config: TrainerConfig,
    env: Environment<S>,
    policy: P,
    comm: C,
    memory: SwarmMemory,
    sync: ExperienceSync,
    updater: PolicyUpdater,
    state: TrainingState,
    checkpoints: CheckpointStore,
}

impl<S: Simulation, P: PolicyNetwork, C: Communicator> Trainer<S, P, C> {
    /// Validates `config` and assembles a worker.
    pub fn new(config: TrainerConfig, env: Environment<S>, policy: P, comm: C) -> Result<Self, TrainError> {
        config.validate()?;
        Ok(Self {
            memory: SwarmMemory::new(env.num_robots()),
            sync: ExperienceSync::new(config.sync_experience, config.update_experience),
            updater: PolicyUpdater::new(config.ppo.clone()),
            state: TrainingState::new(config.goal_window),
            checkpoints: CheckpointStore::new(config.ckpt_folder.clone(), config.env_name.clone()),
            config,
            env,
            policy,
            comm,
        })
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn into_policy(self) -> P {
        self.policy
    }

    pub fn state(&self) -> &TrainingState {
        &self.state
    }

    pub fn memory(&self) -> &SwarmMemory {
        &self.memory
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    /// Runs training until `max_episodes` or until solved. Collective.
    pub fn run(&mut self) -> Result<TrainingReport, TrainError> {
        self.install_initial_parameters()?;
        let mut report = TrainingReport::default();

        for _ in 0..self.config.max_episodes {
            let episode = self.state.start_episode();
            self.run_episode(&mut report)?;

            let robots = self.comm.reduce_sum(self.env.num_robots())?;
            let solved = self.check_solved(episode)?;
            report.episodes = episode;
            if solved {
                self.state.solved = true;
                report.solved = true;
                break;
            }

            if episode % self.config.log_interval == 0 {
                if let Some(summary) = self.log_interval(episode, robots.unwrap_or(0))? {
                    report.summaries.push(summary);
                }
            }
        }

        report.updates = self.state.updates;
        report.best_reward = self.state.best();
        info!(
            rank = self.comm.rank(),
            episodes = report.episodes,
            updates = report.updates,
            solved = report.solved,
            "training finished"
        );
        Ok(report)
    }

    /// Loads the restore checkpoint on the coordinator, then gives every rank
    /// the coordinator's parameters.
    fn install_initial_parameters(&mut self) -> Result<(), TrainError> {
        if self.config.restore && self.comm.is_coordinator() {
            let params = self.checkpoints.load(CheckpointKind::Base)?;
            self.policy.set_parameters(&params)?;
            info!(path = %self.checkpoints.path(CheckpointKind::Base).display(), "restored parameters");
        }
        broadcast_parameters(&self.comm, &mut self.policy)?;
        Ok(())
    }

    fn run_episode(&mut self, report: &mut TrainingReport) -> Result<(), TrainError> {
        self.env.reset(self.config.level);
        if self.memory.slot_count() != self.env.num_robots() {
            self.memory = SwarmMemory::new(self.env.num_robots());
        }

        let mut running = true;
        for t in 0..self.config.max_timesteps as usize {
            let mut completions = Vec::new();
            if running {
                let states = self.env.active_observations();
                let prediction = self.policy.predict(&feature_rows(&states));
                self.memory.insert_state(&states)?;
                self.memory.insert_action(&prediction.actions)?;
                self.memory.insert_log_prob(&prediction.log_probs)?;

                let outcome = self.env.step(&prediction.actions)?;
                self.memory.insert_reward(&outcome.rewards())?;
                self.memory.insert_reached_goal(&outcome.reached_goals())?;
                self.memory.insert_is_terminal(&outcome.dones())?;

                if !outcome.is_empty() {
                    self.state
                        .add_step_reward(outcome.total_reward() / outcome.len() as f64);
                }
                completions.extend(
                    outcome
                        .robots
                        .iter()
                        .filter(|r| r.done)
                        .map(|r| r.reached_goal),
                );
            }

            if let Some(all) = self.comm.gather(completions)? {
                self.state.goals.extend(all.into_iter().flatten());
            }

            let status = self.sync.exchange(&self.comm, &mut self.memory)?;
            if status.update_due {
                if self.comm.is_coordinator() {
                    let bundle = self.sync.take_bundle();
                    let update = self.updater.update(&mut self.policy, &bundle)?;
                    report.last_update = Some(update);
                }
                broadcast_parameters(&self.comm, &mut self.policy)?;
                self.state.updates += 1;
            }

            if running && self.env.is_done() {
                running = false;
                self.state.add_episode_length(t + 1);
            }
            let still_running = self.comm.all_reduce_sum(usize::from(running))?;
            if still_running == 0 {
                break;
            }
        }
        debug!(
            rank = self.comm.rank(),
            episode = self.state.episode,
            buffered = self.memory.total_length(),
            "episode finished"
        );
        Ok(())
    }

    /// Coordinator checks the goal rate; the verdict is broadcast.
    fn check_solved(&mut self, episode: usize) -> Result<bool, TrainError> {
        let verdict = if self.comm.is_coordinator() {
            let rate = self.state.goals.success_rate();
            let solved = !self.state.goals.is_empty() && rate >= self.config.solved_percentage;
            if solved {
                info!(episode, goal_rate = rate, "goal rate reached, saving as solved");
                self.checkpoints
                    .save(CheckpointKind::Solved, &self.policy.parameters(), episode)?;
            }
            Some(solved)
        } else {
            None
        };
        Ok(self.comm.broadcast(verdict)?)
    }

    fn log_interval(&mut self, episode: usize, robots: usize) -> Result<Option<EpisodeSummary>, TrainError> {
        let (reward, length) = self.state.take_interval();
        let reward = self.comm.reduce_sum(reward)?;
        let length = self.comm.reduce_sum(length)?;
        let (Some(reward), Some(length)) = (reward, length) else {
            return Ok(None);
        };

        let divisor = (self.config.log_interval * self.comm.size()) as f64;
        let summary = EpisodeSummary {
            episode,
            mean_reward: reward / divisor,
            avg_length: length / divisor,
            goal_percentage: self.state.goals.success_rate() * 100.0,
            robots,
        };
        info!(
            episode,
            reward = summary.mean_reward,
            steps = summary.avg_length,
            goals = summary.goal_percentage,
            robots,
            "{summary}"
        );

        let params = self.policy.parameters();
        self.save_best(&params, summary.mean_reward, episode)?;
        self.checkpoints.save(CheckpointKind::Base, &params, episode)?;
        Ok(Some(summary))
    }

    /// Writes the best checkpoint if `reward` beats the best so far.
    ///
    /// The best reward only moves once the checkpoint is on disk. Parameters
    /// that fail validation are skipped with a warning and return `false`.
    pub(crate) fn save_best(
        &mut self,
        params: &PolicyParameters,
        reward: f64,
        episode: usize,
    ) -> Result<bool, TrainError> {
        if !self.state.beats_best(reward) {
            return Ok(false);
        }
        match self.checkpoints.save(CheckpointKind::Best, params, episode) {
            Ok(_) => {
                self.state.record_best(reward);
                info!(episode, best = reward, "new best average reward");
                Ok(true)
            }
            Err(CheckpointError::Invalid(e)) => {
                warn!(episode, error = %e, "best checkpoint skipped");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Trains `workers` in-process workers on [`KinematicArena`]s with
/// [`LinearGaussianPolicy`] networks and returns their reports in rank order.
///
/// Worker `r` seeds its arena with `config.arena.seed + r`.
pub fn run_local(config: &TrainerConfig, workers: usize) -> Result<Vec<TrainingReport>, TrainError> {
    config.validate()?;
    if workers == 0 {
        return Err(ConfigError::Invalid {
            field: "workers",
            reason: "must be at least 1".into(),
        }
        .into());
    }
    let results = launch(workers, |comm| {
        let arena = KinematicArena::new(ArenaConfig {
            seed: config.arena.seed.wrapping_add(comm.rank() as u64),
            ..config.arena.clone()
        });
        let obs_dim = arena.config().observation_dim();
        let env = Environment::new(arena, config.reward_shaper(), config.max_timesteps);
        let policy = LinearGaussianPolicy::new(obs_dim, config.ppo.network_config());
        Trainer::new(config.clone(), env, policy, comm)?.run()
    })?;
    results.into_iter().collect()
}
