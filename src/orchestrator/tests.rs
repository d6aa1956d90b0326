//! Multi-worker scenarios for the training orchestrator.

use super::*;
use crate::config::{ConfigError, TrainerConfig};
use crate::distributed::{launch, Communicator, LocalCommunicator};
use crate::environment::{ArenaConfig, Environment, KinematicArena, Simulation, Termination};
use crate::error::TrainError;
use crate::policy::{GaussianPolicyConfig, LinearGaussianPolicy, PolicyNetwork, PolicyParameters};
use crate::reward::SparseReward;
use crate::types::{Action, Observation, Position, RobotKinematics};

/// Robots that reach their goal on the `reach_after`-th step.
struct ScriptedSimulation {
    robots: usize,
    reach_after: u32,
    steps: u32,
    active: Vec<bool>,
}

impl ScriptedSimulation {
    fn new(robots: usize, reach_after: u32) -> Self {
        Self {
            robots,
            reach_after,
            steps: 0,
            active: Vec::new(),
        }
    }
}

impl Simulation for ScriptedSimulation {
    fn reset(&mut self, _level: usize) {
        self.steps = 0;
        self.active = vec![true; self.robots];
    }

    fn step(&mut self, _actions: &[Option<Action>], steps_left: u32) -> Vec<Option<Termination>> {
        self.steps += 1;
        let reached = self.steps >= self.reach_after;
        self.active
            .iter_mut()
            .map(|active| {
                if !*active {
                    return None;
                }
                let term = Termination {
                    reached_goal: reached,
                    timed_out: !reached && steps_left == 0,
                    collision: false,
                };
                *active = !term.is_done();
                Some(term)
            })
            .collect()
    }

    fn observation(&self, _robot: usize) -> Observation {
        Observation {
            lidar: vec![1.0, 1.0],
            orientation_to_goal: [0.0, 1.0],
            distance_to_goal: 1.0 / (1.0 + self.steps as f64),
            velocity: [0.0, 0.0],
        }
    }

    fn kinematics(&self, _robot: usize) -> RobotKinematics {
        RobotKinematics {
            position: Position::new(1.0 / (1.0 + self.steps as f64), 0.0),
            last_position: Position::new(1.0 / self.steps.max(1) as f64, 0.0),
            goal: Position::origin(),
            heading: 0.0,
            linear_velocity: 0.5,
            angular_velocity: 0.0,
        }
    }

    fn num_robots(&self) -> usize {
        self.active.len()
    }

    fn is_active(&self, robot: usize) -> bool {
        self.active.get(robot).copied().unwrap_or(false)
    }
}

fn quick_config(folder: &std::path::Path) -> TrainerConfig {
    let mut config = TrainerConfig {
        env_name: "test".into(),
        max_episodes: 4,
        max_timesteps: 20,
        update_experience: 12,
        sync_experience: 4,
        solved_percentage: 1.0,
        log_interval: 2,
        ckpt_folder: folder.to_path_buf(),
        arena: ArenaConfig {
            n_robots: 2,
            n_rays: 4,
            ..ArenaConfig::default()
        },
        ..TrainerConfig::default()
    };
    config.ppo.k_epochs = 2;
    config.ppo.lr = 1e-3;
    config
}

fn policy_for(config: &TrainerConfig, obs_dim: usize, seed: u64) -> LinearGaussianPolicy {
    LinearGaussianPolicy::new(
        obs_dim,
        GaussianPolicyConfig {
            seed,
            ..config.ppo.network_config()
        },
    )
}

fn arena_trainer(
    config: &TrainerConfig,
    comm: LocalCommunicator,
) -> Trainer<KinematicArena, LinearGaussianPolicy, LocalCommunicator> {
    let arena = KinematicArena::new(ArenaConfig {
        seed: config.arena.seed + comm.rank() as u64,
        ..config.arena.clone()
    });
    let obs_dim = arena.config().observation_dim();
    let env = Environment::new(arena, config.reward_shaper(), config.max_timesteps);
    // Distinct seeds so that parameter agreement has to come from broadcasts.
    let policy = policy_for(config, obs_dim, 100 + comm.rank() as u64);
    Trainer::new(config.clone(), env, policy, comm).unwrap()
}

mod single_worker {
    use super::*;

    #[test]
    fn runs_all_episodes_and_updates() {
        let dir = tempfile::tempdir().unwrap();
        let config = quick_config(dir.path());
        let reports = run_local(&config, 1).unwrap();
        let report = &reports[0];

        assert_eq!(report.episodes, 4);
        assert!(!report.solved);
        assert!(report.updates >= 1);
        assert!(report.last_update.is_some());
        assert_eq!(report.summaries.len(), 2);
        assert_eq!(report.summaries[1].episode, 4);
        assert_eq!(report.summaries[1].robots, 2);
        assert!(report.best_reward.is_some());

        let store = CheckpointStore::new(dir.path(), "test");
        assert!(store.exists(CheckpointKind::Best));
        assert!(store.exists(CheckpointKind::Base));
        assert!(!store.exists(CheckpointKind::Solved));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrainerConfig {
            log_interval: 0,
            ..quick_config(dir.path())
        };
        assert!(matches!(run_local(&config, 1), Err(TrainError::Config(_))));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = quick_config(dir.path());
        assert!(matches!(
            run_local(&config, 0),
            Err(TrainError::Config(ConfigError::Invalid { field: "workers", .. }))
        ));
    }

    #[test]
    fn arena_smaller_than_robots_fails_before_launch() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = quick_config(dir.path());
        config.arena.width = 0.8;
        config.arena.height = 0.8;
        assert!(matches!(
            run_local(&config, 1),
            Err(TrainError::Config(ConfigError::Invalid { field: "arena.width", .. }))
        ));
    }

    #[test]
    fn skipped_best_checkpoint_keeps_previous_best() {
        let dir = tempfile::tempdir().unwrap();
        let config = quick_config(dir.path());
        let comm = LocalCommunicator::mesh(1).pop().unwrap();
        let mut trainer = arena_trainer(&config, comm);

        let mut broken = PolicyParameters::new();
        broken.insert("w", vec![1], vec![f64::NAN]).unwrap();
        assert!(!trainer.save_best(&broken, 5.0, 2).unwrap());
        assert_eq!(trainer.state().best(), None);
        assert!(!trainer.checkpoints().exists(CheckpointKind::Best));

        let valid = trainer.policy().parameters();
        assert!(trainer.save_best(&valid, 1.0, 4).unwrap());
        assert_eq!(trainer.state().best(), Some(1.0));
        assert!(trainer.checkpoints().exists(CheckpointKind::Best));
        assert!(!trainer.save_best(&valid, 0.5, 6).unwrap());
    }

    #[test]
    fn missing_restore_checkpoint_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrainerConfig {
            restore: true,
            ..quick_config(dir.path())
        };
        assert!(matches!(
            run_local(&config, 1),
            Err(TrainError::Checkpoint(CheckpointError::Io { .. }))
        ));
    }
}

mod multi_worker {
    use super::*;

    #[test]
    fn workers_agree_on_episodes_and_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let config = quick_config(dir.path());
        let results = launch(3, |comm| {
            let mut trainer = arena_trainer(&config, comm);
            let report = trainer.run().unwrap();
            (report, trainer.into_policy().parameters())
        })
        .unwrap();

        let (first_report, first_params) = &results[0];
        assert!(first_report.updates >= 1);
        assert_eq!(first_report.summaries.len(), 2);
        assert_eq!(first_report.summaries[0].robots, 6);
        for (report, params) in &results[1..] {
            assert_eq!(report.episodes, first_report.episodes);
            assert_eq!(report.updates, first_report.updates);
            assert!(report.summaries.is_empty());
            assert_eq!(params, first_params);
        }
    }

    #[test]
    fn restore_installs_coordinator_checkpoint_everywhere() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrainerConfig {
            restore: true,
            max_episodes: 1,
            update_experience: 1_000_000,
            sync_experience: 1_000_000,
            log_interval: 10,
            ..quick_config(dir.path())
        };
        let obs_dim = config.arena.observation_dim();
        let saved = policy_for(&config, obs_dim, 999).parameters();
        CheckpointStore::new(dir.path(), "test")
            .save(CheckpointKind::Base, &saved, 0)
            .unwrap();

        let params = launch(2, |comm| {
            let mut trainer = arena_trainer(&config, comm);
            trainer.run().unwrap();
            trainer.into_policy().parameters()
        })
        .unwrap();
        assert!(params.iter().all(|p| *p == saved));
    }

    #[test]
    fn solved_stops_every_worker_in_the_same_episode() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrainerConfig {
            max_episodes: 50,
            solved_percentage: 0.9,
            ..quick_config(dir.path())
        };
        let reports = launch(2, |comm| {
            let env = Environment::new(
                ScriptedSimulation::new(3, 2),
                Box::new(SparseReward::default()),
                config.max_timesteps,
            );
            let policy = policy_for(&config, Observation::feature_dim(2), 5);
            Trainer::new(config.clone(), env, policy, comm)
                .unwrap()
                .run()
                .unwrap()
        })
        .unwrap();

        for report in &reports {
            assert!(report.solved);
            assert_eq!(report.episodes, 1);
        }
        assert!(CheckpointStore::new(dir.path(), "test").exists(CheckpointKind::Solved));
    }
}
