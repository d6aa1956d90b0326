//! Train a swarm navigation policy with in-process workers.
//!
//! Run:
//! ```sh
//! cargo run --example train_swarm -- --workers 4 --episodes 200
//! cargo run --example train_swarm -- --config train.json
//! ```
//!
//! With the neural actor-critic (requires libtorch):
//! ```sh
//! cargo run --example train_swarm --features rl-nn -- --workers 2
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::env;
use std::process;

use swarmrl::TrainerConfig;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    let mut config = match arg_value(&args, "--config") {
        Some(path) => TrainerConfig::from_json_file(path).unwrap_or_else(|e| {
            eprintln!("{e}");
            process::exit(2);
        }),
        None => TrainerConfig::default(),
    };
    if let Some(episodes) = arg_value(&args, "--episodes").and_then(|s| s.parse().ok()) {
        config.max_episodes = episodes;
    }
    if let Some(folder) = arg_value(&args, "--ckpt") {
        config.ckpt_folder = folder.into();
    }
    if args.iter().any(|a| a == "--restore") {
        config.restore = true;
    }
    let workers: usize = arg_value(&args, "--workers")
        .and_then(|s| s.parse().ok())
        .unwrap_or(2);

    println!("=== Swarm PPO Training ===\n");
    println!("  Environment: {}", config.env_name);
    println!("  Algorithm:   {:?}", config.ppo.algorithm);
    println!("  Workers:     {}", workers);
    println!("  Robots:      {} per worker", config.arena.n_robots);
    println!("  Episodes:    {}", config.max_episodes);
    println!("  Checkpoints: {}", config.ckpt_folder.display());
    println!();

    match train(&config, workers) {
        Ok(report) => {
            println!();
            println!("Episodes run:  {}", report.episodes);
            println!("Updates:       {}", report.updates);
            println!("Solved:        {}", report.solved);
            if let Some(best) = report.best_reward {
                println!("Best reward:   {:.3}", best);
            }
            for summary in &report.summaries {
                println!("  {}", summary);
            }
        }
        Err(e) => {
            eprintln!("training failed: {e}");
            process::exit(1);
        }
    }
}

#[cfg(not(feature = "rl-nn"))]
fn train(config: &TrainerConfig, workers: usize) -> Result<swarmrl::TrainingReport, swarmrl::TrainError> {
    let mut reports = swarmrl::run_local(config, workers)?;
    Ok(reports.swap_remove(0))
}

#[cfg(feature = "rl-nn")]
fn train(config: &TrainerConfig, workers: usize) -> Result<swarmrl::TrainingReport, swarmrl::TrainError> {
    use swarmrl::config::ConfigError;
    use swarmrl::distributed::{launch, Communicator};
    use swarmrl::environment::{ArenaConfig, Environment, KinematicArena};
    use swarmrl::policy::TchActorCritic;
    use swarmrl::Trainer;
    use tch::Device;

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
        let ppo = &config.ppo;
        let policy = match TchActorCritic::new(obs_dim, ppo.action_std, ppo.lr, ppo.max_grad_norm, Device::Cpu) {
            Ok(policy) => policy,
            Err(e) => {
                eprintln!("cannot build network: {e}");
                process::exit(1);
            }
        };
        Trainer::new(config.clone(), env, policy, comm)?.run()
    })?;
    let mut reports = results.into_iter().collect::<Result<Vec<_>, _>>()?;
    Ok(reports.swap_remove(0))
}

fn arg_value<'a>(args: &'a [String], key: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}
