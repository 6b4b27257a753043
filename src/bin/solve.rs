//! Command-line front end for the placement solver (spec §6 "External
//! interfaces"): reads a JSON input template, generates a concrete
//! problem instance, dispatches to the named solver, and prints the
//! resulting placement/routing plus requested metrics as JSON.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::EnvFilter;

use edgeplace::model::schema::InputTemplate;
use edgeplace::orchestrator::{self, SolverParams};

/// Solve a hierarchical edge/fog/cloud service-placement instance.
#[derive(Parser, Debug)]
#[command(name = "solve", about = "Service placement and request-routing solver", long_about = None)]
struct Cli {
    /// Path to the JSON input template.
    #[arg(long)]
    input: PathBuf,

    /// Solver name: cloud, heuristic, greedy, soga, soga_hi, moga, moga_pareto, cluster, milp.
    #[arg(long, default_value = "soga")]
    solver: String,

    /// Total node count to generate, including CORE and CLOUD.
    #[arg(long, default_value_t = 12)]
    nb_nodes: usize,

    /// Total number of app instantiations to generate across app types.
    #[arg(long, default_value_t = 4)]
    nb_apps: usize,

    /// Total user population to scatter across base stations.
    #[arg(long, default_value_t = 200)]
    nb_users: usize,

    #[arg(long, default_value_t = 200)]
    nb_generations: usize,

    #[arg(long, default_value_t = 100)]
    population_size: usize,

    #[arg(long, default_value_t = 0.20)]
    elite_proportion: f64,

    #[arg(long, default_value_t = 0.15)]
    mutant_proportion: f64,

    #[arg(long, default_value_t = 0.70)]
    elite_probability: f64,

    #[arg(long, default_value_t = 1)]
    pool_size: usize,

    #[arg(long, default_value_t = 0.02)]
    stop_threshold: f64,

    /// `moga_pareto`'s preferred-objective epsilon (spec §4.6 "preferred" mode).
    #[arg(long, default_value_t = 0.01)]
    preferred_epsilon: f64,

    /// Single-objective target (soga, soga_hi, cluster).
    #[arg(long)]
    objective: Option<String>,

    /// Comma-separated multi-objective targets (moga, moga_pareto).
    #[arg(long, value_delimiter = ',')]
    objectives: Option<Vec<String>>,

    /// Named seed to decode directly for the `heuristic` solver.
    #[arg(long)]
    version: Option<String>,

    #[arg(long)]
    no_heuristic: bool,

    /// RNG seed; shared between instance generation and the solver.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let text = fs::read_to_string(&cli.input)?;
    let template = InputTemplate::from_json(&text)?;

    let mut rng = ChaCha8Rng::seed_from_u64(cli.seed.unwrap_or_else(rand::random));
    let instance = template.generate(cli.nb_nodes, cli.nb_apps, cli.nb_users, &mut rng)?;

    let params = SolverParams {
        nb_generations: cli.nb_generations,
        population_size: cli.population_size,
        elite_proportion: cli.elite_proportion,
        mutant_proportion: cli.mutant_proportion,
        elite_probability: cli.elite_probability,
        pool_size: cli.pool_size,
        stop_threshold: cli.stop_threshold,
        objective: cli.objective,
        objectives: cli.objectives,
        preferred_epsilon: cli.preferred_epsilon,
        use_heuristic: !cli.no_heuristic,
        version: cli.version,
        seed: cli.seed,
    };

    let output = orchestrator::solve(&instance, &cli.solver, &params)?;

    let body = serde_json::json!({
        "place": output.place,
        "load": output.load,
        "metrics": output.metric_handle,
        "elapsed_seconds": output.elapsed_time.as_secs_f64(),
    });
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
