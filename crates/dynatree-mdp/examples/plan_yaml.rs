use std::path::PathBuf;

use dynatree_core::{EnvironmentModel, Planner, PlannerConfig};
use dynatree_mdp::load_model;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn main() {
    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("crates/dynatree-mdp/examples/drifting.mdp.yaml"));
    let config = match args.next() {
        Some(config_path) => {
            PlannerConfig::from_yaml_path(config_path).expect("failed to load planner config")
        }
        None => PlannerConfig::from_default_yaml().expect("default config must parse"),
    };

    let mut model = load_model(&path).expect("failed to compile MDP YAML");
    let (mut state, mut time) = model.reset().expect("reset failed");
    let mut env_rng = ChaCha8Rng::seed_from_u64(config.seed ^ 0x5eed);
    let mut planner = Planner::new(model, config).expect("invalid planner config");

    let mut episode_return = 0.0;
    while !planner
        .model()
        .is_terminal(&state, time)
        .expect("terminal check failed")
    {
        let report = planner.plan(&state, time).expect("planning failed");
        let mdp = planner.model().mdp();
        let action_name = mdp.action_id(state, report.action).unwrap_or("?");
        let transition = planner
            .model()
            .step(&state, &report.action, time, &mut env_rng)
            .expect("step failed");

        println!(
            "{time} state={} action={action_name} reward={:.3} simulations={}",
            mdp.state_id(state).unwrap_or("?"),
            transition.reward,
            report.metrics.iterations_completed
        );

        episode_return += transition.reward;
        state = transition.state;
        time = transition.time_index;
    }

    println!(
        "episode finished in {} at {time} with return {episode_return:.3}",
        planner.model().mdp().state_id(state).unwrap_or("?")
    );
}
