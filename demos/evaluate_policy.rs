// Evaluate a saved policy checkpoint on the kinematic arena.
//
// Run from the repo root after training:
//   cargo run --example evaluate_policy -- --ckpt checkpoints --kind best --episodes 50

use std::env;
use std::process;

use swarmrl::environment::{Environment, KinematicArena};
use swarmrl::orchestrator::{CheckpointKind, CheckpointStore, EvaluationMetrics};
use swarmrl::policy::{LinearGaussianPolicy, PolicyNetwork};
use swarmrl::TrainerConfig;

fn main() {
    let args: Vec<String> = env::args().collect();
    let mut config = match arg_value(&args, "--config") {
        Some(path) => TrainerConfig::from_json_file(path).unwrap_or_else(|e| {
            eprintln!("{e}");
            process::exit(2);
        }),
        None => TrainerConfig::default(),
    };
    if let Some(folder) = arg_value(&args, "--ckpt") {
        config.ckpt_folder = folder.into();
    }
    let kind = match arg_value(&args, "--kind").unwrap_or("best") {
        "base" => CheckpointKind::Base,
        "best" => CheckpointKind::Best,
        "solved" => CheckpointKind::Solved,
        other => {
            eprintln!("Unknown --kind '{}'; expected 'base', 'best' or 'solved'.", other);
            process::exit(2);
        }
    };
    let episodes: usize = arg_value(&args, "--episodes")
        .and_then(|s| s.parse().ok())
        .unwrap_or(25);

    let store = CheckpointStore::new(config.ckpt_folder.clone(), config.env_name.clone());
    let params = store.load(kind).unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(1);
    });

    let arena = KinematicArena::new(config.arena.clone());
    let obs_dim = arena.config().observation_dim();
    let mut policy = LinearGaussianPolicy::new(obs_dim, config.ppo.network_config());
    if let Err(e) = policy.set_parameters(&params) {
        eprintln!("checkpoint does not fit the arena: {e}");
        process::exit(1);
    }

    let mut env = Environment::new(arena, config.reward_shaper(), config.max_timesteps);
    match EvaluationMetrics::evaluate(&mut env, &policy, episodes, config.level) {
        Ok(metrics) => {
            println!("Policy: {} ({})", policy.name(), store.path(kind).display());
            println!("{}", metrics);
        }
        Err(e) => {
            eprintln!("evaluation failed: {e}");
            process::exit(1);
        }
    }
}

fn arg_value<'a>(args: &'a [String], key: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}
