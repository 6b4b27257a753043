//! Top-level orchestrator: the `solve(input, solver_name, params)` entry
//! point (spec C8).
//!
//! Grounded in `util/solve.py`'s dispatch table: an abstract solver name
//! selects a pipeline built from the same handful of building blocks
//! (C1-C7), parameters are assembled once, and the result is wrapped
//! with the metrics the caller asked for plus a wall-clock timing.
//! Unlike the original's per-solver script, every pipeline here is a
//! thin composition of [`crate::brkga`], [`crate::nsga2`], [`crate::cluster`]
//! and [`crate::decoder`] rather than a bespoke implementation per name.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};

use crate::brkga::{self, BrkgaConfig};
use crate::chromosome::{Chromosome, GeneLayout};
use crate::cluster::{self, ClusterParams};
use crate::decoder;
use crate::engine::{Decoder, EngineConfig};
use crate::error::{Result, SolverError};
use crate::metrics::{self, Filter};
use crate::model::{ProblemInstance, Solution};
use crate::nsga2::{self, Nsga2Config};
use crate::seeds;

/// Solver names the orchestrator knows how to dispatch (spec §4.8).
pub const SOLVER_NAMES: &[&str] =
    &["cloud", "heuristic", "greedy", "soga", "soga_hi", "moga", "moga_pareto", "cluster", "milp"];

const HEURISTIC_SEED_NAMES: &[&str] = &["cloud", "net_delay", "deadline", "cluster_medoids", "cluster_medoids_sc"];

/// Parameters accepted by every pipeline (spec §6 "Solver invocation
/// surface"); a given solver name only consults the subset it needs.
#[derive(Debug, Clone)]
pub struct SolverParams {
    pub nb_generations: usize,
    pub population_size: usize,
    pub elite_proportion: f64,
    pub mutant_proportion: f64,
    pub elite_probability: f64,
    pub pool_size: usize,
    /// NSGA-II's MGBM convergence threshold; also used to derive a
    /// stagnation-window fraction for single-objective solvers.
    pub stop_threshold: f64,
    /// Single-objective solver target (`soga`, `soga_hi`, `cluster`).
    pub objective: Option<String>,
    /// Multi-objective solver targets (`moga`, `moga_pareto`).
    pub objectives: Option<Vec<String>>,
    /// `moga_pareto`'s preferred-objective tolerance on objective 0 (spec
    /// §4.6 "preferred" mode, scenario S4). Ignored by plain `moga`.
    pub preferred_epsilon: f64,
    /// Prime the initial population with the heuristic seed library
    /// (spec C2) instead of pure random keys.
    pub use_heuristic: bool,
    /// Solver-specific variant selector: currently used by `heuristic`
    /// to pick which named seed to decode directly (default
    /// `"net_delay"`).
    pub version: Option<String>,
    pub seed: Option<u64>,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            nb_generations: 200,
            population_size: 100,
            elite_proportion: 0.20,
            mutant_proportion: 0.15,
            elite_probability: 0.70,
            pool_size: 1,
            stop_threshold: 0.02,
            objective: None,
            objectives: None,
            preferred_epsilon: 0.01,
            use_heuristic: true,
            version: None,
            seed: None,
        }
    }
}

/// The result of a `solve()` call: the decoded placement/routing plus
/// whatever metrics were requested and the wall-clock time taken.
#[derive(Debug, Clone)]
pub struct Output {
    pub place: Vec<Vec<bool>>,
    pub load: Vec<Vec<Vec<u64>>>,
    /// Every requested objective's value against the returned solution,
    /// keyed by metric name.
    pub metric_handle: HashMap<String, f64>,
    pub elapsed_time: Duration,
}

impl Output {
    fn from_solution(instance: &ProblemInstance, solution: &Solution, objectives: &[String]) -> Result<Self> {
        let mut metric_handle = HashMap::with_capacity(objectives.len());
        for name in objectives {
            let value = metrics::by_name(name, instance, solution, &Filter::all())?;
            metric_handle.insert(name.clone(), value);
        }
        Ok(Self {
            place: solution.place.clone(),
            load: solution.load.clone(),
            metric_handle,
            elapsed_time: Duration::ZERO,
        })
    }
}

/// Dispatches `solver_name` to its pipeline, runs it against `instance`,
/// and returns the decoded solution with timing and metrics attached.
#[instrument(skip(instance, params), fields(solver = solver_name))]
pub fn solve(instance: &ProblemInstance, solver_name: &str, params: &SolverParams) -> Result<Output> {
    if !SOLVER_NAMES.contains(&solver_name) {
        return Err(SolverError::UnknownSolverOrSeed(solver_name.to_string()));
    }
    let objectives = resolve_objectives(solver_name, params)?;

    let started = Instant::now();
    let solution = match solver_name {
        "cloud" => solve_cloud(instance),
        "heuristic" => solve_heuristic(instance, params)?,
        "greedy" => solve_greedy(instance),
        "soga" => solve_soga(instance, params, &objectives[0], params.use_heuristic),
        "soga_hi" => solve_soga(instance, params, &objectives[0], true),
        "moga" => solve_moga(instance, params, &objectives, params.use_heuristic, false),
        "moga_pareto" => solve_moga(instance, params, &objectives, params.use_heuristic, true),
        "cluster" => solve_cluster(instance, params, &objectives[0])?,
        "milp" => {
            return Err(SolverError::UnknownSolverOrSeed(
                "milp requires an external mixed-integer solver not available in-process".to_string(),
            ));
        }
        other => unreachable!("solver name {other} already validated against SOLVER_NAMES"),
    };
    let elapsed = started.elapsed();

    debug!(generations = params.nb_generations, population = params.population_size, "solve finished");
    let mut output = Output::from_solution(instance, &solution, &objectives)?;
    output.elapsed_time = elapsed;
    info!(elapsed_ms = elapsed.as_millis(), "solve complete");
    Ok(output)
}

fn resolve_objectives(solver_name: &str, params: &SolverParams) -> Result<Vec<String>> {
    let names: Vec<String> = match solver_name {
        "moga" | "moga_pareto" => match &params.objectives {
            Some(names) if !names.is_empty() => names.clone(),
            _ => vec!["avg_response_time".to_string(), "avg_resource_usage".to_string()],
        },
        _ => match &params.objective {
            Some(name) => vec![name.clone()],
            None => vec!["avg_response_time".to_string()],
        },
    };
    for name in &names {
        if !metrics::METRIC_NAMES.contains(&name.as_str()) {
            return Err(SolverError::UnknownObjective(name.clone()));
        }
    }
    Ok(names)
}

/// Decodes the all-zero (cloud-only) seed chromosome directly, without
/// any search.
fn solve_cloud(instance: &ProblemInstance) -> Solution {
    let layout = GeneLayout::new(instance);
    let chromosome = Chromosome::new(layout, seeds::cloud(layout));
    decoder::decode(instance, &chromosome)
}

/// Decodes a single named heuristic seed directly, without any search
/// (`params.version` selects the seed, default `net_delay`).
fn solve_heuristic(instance: &ProblemInstance, params: &SolverParams) -> Result<Solution> {
    let layout = GeneLayout::new(instance);
    let name = params.version.as_deref().unwrap_or("net_delay");
    let keys = seeds::by_name(name, layout, instance)?;
    let chromosome = Chromosome::new(layout, keys);
    Ok(decoder::decode(instance, &chromosome))
}

/// Decodes a fully neutral chromosome (max instance budget, uniform
/// placement/request priority) directly: a pure greedy baseline driven
/// only by the decoder's net-delay/load scoring, with no GA search and
/// no heuristic bias.
fn solve_greedy(instance: &ProblemInstance) -> Solution {
    let layout = GeneLayout::new(instance);
    let mut keys = vec![0.5; layout.len()];
    for a in 0..instance.nb_apps() {
        keys[layout.instance_fraction_index(a)] = 1.0;
    }
    let chromosome = Chromosome::new(layout, keys);
    decoder::decode(instance, &chromosome)
}

struct ScalarDecoder<'a> {
    instance: &'a ProblemInstance,
    layout: GeneLayout,
    objective: &'a str,
    use_heuristic: bool,
}

impl<'a> Decoder for ScalarDecoder<'a> {
    type Fitness = f64;

    fn decode(&self, keys: &[f64]) -> f64 {
        let chromosome = Chromosome::new(self.layout, keys.to_vec());
        let solution = decoder::decode(self.instance, &chromosome);
        metrics::by_name(self.objective, self.instance, &solution, &Filter::all()).unwrap_or(f64::INFINITY)
    }

    fn seed_chromosome(&self, index: usize) -> Option<Vec<f64>> {
        if !self.use_heuristic {
            return None;
        }
        let name = HEURISTIC_SEED_NAMES.get(index)?;
        seeds::by_name(name, self.layout, self.instance).ok()
    }
}

struct ParetoDecoder<'a> {
    instance: &'a ProblemInstance,
    layout: GeneLayout,
    objectives: &'a [String],
    use_heuristic: bool,
}

impl<'a> Decoder for ParetoDecoder<'a> {
    type Fitness = Vec<f64>;

    fn decode(&self, keys: &[f64]) -> Vec<f64> {
        let chromosome = Chromosome::new(self.layout, keys.to_vec());
        let solution = decoder::decode(self.instance, &chromosome);
        self.objectives
            .iter()
            .map(|name| metrics::by_name(name, self.instance, &solution, &Filter::all()).unwrap_or(f64::INFINITY))
            .collect()
    }

    fn seed_chromosome(&self, index: usize) -> Option<Vec<f64>> {
        if !self.use_heuristic {
            return None;
        }
        let name = HEURISTIC_SEED_NAMES.get(index)?;
        seeds::by_name(name, self.layout, self.instance).ok()
    }
}

/// Stagnation window derived from `stop_threshold`: smaller thresholds
/// demand more consecutive non-improving generations before giving up.
/// `stop_threshold <= 0` disables stagnation (generation budget only).
fn stagnation_limit(params: &SolverParams) -> usize {
    if params.stop_threshold <= 0.0 {
        0
    } else {
        ((1.0 / params.stop_threshold).round() as usize).max(1)
    }
}

fn engine_config_base(params: &SolverParams, chromosome_length: usize) -> BrkgaConfig {
    let config = BrkgaConfig::new(chromosome_length)
        .with_population_size(params.population_size)
        .with_max_generations(params.nb_generations)
        .with_elite_fraction(params.elite_proportion)
        .with_mutant_fraction(params.mutant_proportion)
        .with_elite_inheritance_prob(params.elite_probability)
        .with_stagnation_limit(stagnation_limit(params))
        .with_parallel(params.pool_size > 1);
    match params.seed {
        Some(seed) => config.with_seed(seed),
        None => config,
    }
}

fn solve_soga(instance: &ProblemInstance, params: &SolverParams, objective: &str, use_heuristic: bool) -> Solution {
    let layout = GeneLayout::new(instance);
    let decoder_adapter = ScalarDecoder { instance, layout, objective, use_heuristic };
    let config = engine_config_base(params, layout.len());
    let result = brkga::run(&decoder_adapter, &config);
    let chromosome = Chromosome::new(layout, result.best_keys);
    decoder::decode(instance, &chromosome)
}

/// `preferred`: `moga_pareto`'s epsilon-preferred dominance mode (spec
/// §4.6, S4) — objective 0 gates dominance within `params.preferred_epsilon`
/// instead of every objective counting equally, as plain `moga` does.
fn solve_moga(
    instance: &ProblemInstance,
    params: &SolverParams,
    objectives: &[String],
    use_heuristic: bool,
    preferred: bool,
) -> Solution {
    let layout = GeneLayout::new(instance);
    let decoder_adapter = ParetoDecoder { instance, layout, objectives, use_heuristic };

    let mut engine = EngineConfig::new(layout.len());
    engine.population_size = params.population_size;
    engine.max_generations = params.nb_generations;
    engine.elite_fraction = params.elite_proportion;
    engine.mutant_fraction = params.mutant_proportion;
    engine.elite_inheritance_prob = params.elite_probability;
    engine.parallel = params.pool_size > 1;
    engine.seed = params.seed;

    let epsilon = if preferred { params.preferred_epsilon } else { 0.0 };
    let config = Nsga2Config { engine, epsilon, mgbm_threshold: params.stop_threshold };
    let result = nsga2::run(&decoder_adapter, &config);

    // The crowding-preferred front-0 member at rank 0 is the
    // representative solution carried in `Output`; the rest of the
    // front is discarded here since `Output` carries a single solution.
    let best_idx = result.front_0[0];
    let chromosome = Chromosome::new(layout, result.population[best_idx].clone());
    decoder::decode(instance, &chromosome)
}

fn solve_cluster(instance: &ProblemInstance, params: &SolverParams, objective: &str) -> Result<Solution> {
    let cluster_params = ClusterParams {
        population_size: params.population_size,
        max_generations: params.nb_generations,
        elite_fraction: params.elite_proportion,
        mutant_fraction: params.mutant_proportion,
        elite_inheritance_prob: params.elite_probability,
        stagnation_limit: stagnation_limit(params),
        objective: objective.to_string(),
        use_heuristic: params.use_heuristic,
        seed: params.seed,
        parallel: params.pool_size > 1,
    };
    cluster::solve(instance, &cluster_params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::app::App;
    use crate::model::node::{Node, NodeType, PowerModel};
    use crate::model::resource::{Linear, Resource, ResourceKind};
    use std::collections::HashMap as Map;

    fn instance() -> ProblemInstance {
        let resources = vec![Resource { name: "CPU".into(), unit: "cores".into(), kind: ResourceKind::Float, precision: 4 }];
        let apps = vec![App {
            id: 0,
            type_tag: "a".into(),
            deadline: 10.0,
            work_size: 1.0,
            request_rate: 1.0,
            max_instances: 2,
            availability: 0.99,
            demand: Map::from([("CPU".to_string(), Linear::new(1.0, 0.0))]),
        }];
        let node = |id: usize, kind: NodeType, cap: f64| Node {
            id,
            kind,
            position: None,
            capacity: Map::from([("CPU".to_string(), cap)]),
            power: PowerModel { idle: 1.0, max: 2.0 },
            cost: Map::new(),
            availability: 1.0,
        };
        let nodes = vec![node(0, NodeType::Bs, 10.0), node(1, NodeType::Core, 100.0), node(2, NodeType::Cloud, f64::INFINITY)];
        let net_delay = vec![vec![vec![0.0, 1.0, 5.0], vec![1.0, 0.0, 4.0], vec![5.0, 4.0, 0.0]]];
        let users = vec![vec![4, 0, 0]];
        ProblemInstance::new(resources, apps, nodes, net_delay, users).unwrap()
    }

    #[test]
    fn unknown_solver_name_is_an_error() {
        let instance = instance();
        assert!(solve(&instance, "not-a-solver", &SolverParams::default()).is_err());
    }

    #[test]
    fn unknown_objective_name_is_an_error() {
        let instance = instance();
        let params = SolverParams { objective: Some("not_a_metric".to_string()), ..SolverParams::default() };
        assert!(solve(&instance, "soga", &params).is_err());
    }

    #[test]
    fn cloud_solver_places_everything_on_cloud() {
        let instance = instance();
        let output = solve(&instance, "cloud", &SolverParams::default()).unwrap();
        assert!(output.place[0][instance.cloud_index()]);
        assert!(!output.place[0][0]);
    }

    #[test]
    fn soga_solver_returns_a_valid_solution_and_requested_metric() {
        let instance = instance();
        let params = SolverParams {
            population_size: 20,
            nb_generations: 5,
            objective: Some("avg_response_time".to_string()),
            seed: Some(7),
            ..SolverParams::default()
        };
        let output = solve(&instance, "soga", &params).unwrap();
        let solution = Solution { place: output.place.clone(), load: output.load.clone() };
        assert!(solution.validate(&instance).is_none());
        assert!(output.metric_handle.contains_key("avg_response_time"));
    }

    #[test]
    fn moga_solver_reports_both_requested_objectives() {
        let instance = instance();
        let params = SolverParams {
            population_size: 20,
            nb_generations: 5,
            objectives: Some(vec!["avg_response_time".to_string(), "avg_resource_usage".to_string()]),
            seed: Some(9),
            ..SolverParams::default()
        };
        let output = solve(&instance, "moga", &params).unwrap();
        assert!(output.metric_handle.contains_key("avg_response_time"));
        assert!(output.metric_handle.contains_key("avg_resource_usage"));
    }

    #[test]
    fn moga_pareto_wires_a_nonzero_preferred_epsilon() {
        let instance = instance();
        let params = SolverParams {
            population_size: 20,
            nb_generations: 5,
            objectives: Some(vec!["avg_response_time".to_string(), "avg_resource_usage".to_string()]),
            seed: Some(9),
            ..SolverParams::default()
        };
        let output = solve(&instance, "moga_pareto", &params).unwrap();
        let solution = Solution { place: output.place.clone(), load: output.load.clone() };
        assert!(solution.validate(&instance).is_none());
        assert!(params.preferred_epsilon > 0.0);
    }

    #[test]
    fn milp_is_not_implemented_in_process() {
        let instance = instance();
        assert!(solve(&instance, "milp", &SolverParams::default()).is_err());
    }
}
