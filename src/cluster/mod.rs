//! Cluster-decomposition alternative top-level driver (spec C7).
//!
//! Grounded in `algo/cluster.py`: rather than searching the full joint
//! placement space at once, each app is decomposed into k-medoid groups
//! of the base stations it serves, and every group is solved as an
//! independent, much smaller sub-instance (its own app, its own node
//! set, a reduced `max_instances`) before the sub-solutions are merged
//! back into one global `(place, load)`. Apps are processed in
//! deadline-ascending order so the tightest-latency apps claim capacity
//! first; remaining capacity is threaded through every sub-instance in
//! sequence.

use crate::chromosome::{Chromosome, GeneLayout};
use crate::decoder;
use crate::engine::Decoder;
use crate::error::Result;
use crate::kmedoids::{self, Clustering, KMedoids};
use crate::metrics::{self, Filter};
use crate::model::{Node, ProblemInstance, Solution};
use crate::seeds;

/// Knobs for the cluster solver's inner (per sub-instance) BRKGA runs.
#[derive(Debug, Clone)]
pub struct ClusterParams {
    pub population_size: usize,
    pub max_generations: usize,
    pub elite_fraction: f64,
    pub mutant_fraction: f64,
    pub elite_inheritance_prob: f64,
    pub stagnation_limit: usize,
    /// Metric name each sub-instance's BRKGA run optimizes.
    pub objective: String,
    /// When set, primes every sub-instance's initial population with
    /// the named heuristic seeds (spec C2) ahead of random individuals.
    pub use_heuristic: bool,
    pub seed: Option<u64>,
    pub parallel: bool,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            population_size: 60,
            max_generations: 150,
            elite_fraction: 0.20,
            mutant_fraction: 0.15,
            elite_inheritance_prob: 0.70,
            stagnation_limit: 30,
            objective: "avg_response_time".to_string(),
            use_heuristic: true,
            seed: None,
            parallel: false,
        }
    }
}

const HEURISTIC_SEED_NAMES: &[&str] = &["cloud", "net_delay", "deadline", "cluster_medoids", "cluster_medoids_sc"];

/// Decomposes and solves `instance` cluster-by-cluster, app-by-app, and
/// returns the merged global solution (spec §4.7).
pub fn solve(instance: &ProblemInstance, params: &ClusterParams) -> Result<Solution> {
    let nb_apps = instance.nb_apps();
    let nb_nodes = instance.nb_nodes();
    let nb_resources = instance.resources.len();

    let mut solution = Solution::empty(nb_apps, nb_nodes);
    let mut remaining: Vec<Vec<f64>> =
        (0..nb_nodes).map(|h| (0..nb_resources).map(|r| instance.nodes[h].capacity_of(&instance.resources[r].name)).collect()).collect();

    let mut app_order: Vec<usize> = (0..nb_apps).collect();
    app_order.sort_by(|&a, &b| instance.apps[a].deadline.partial_cmp(&instance.apps[b].deadline).unwrap());

    for a in app_order {
        let features = app_features(instance, a);
        let max_instances = instance.apps[a].max_instances;
        let max_k = if features.is_empty() { 1 } else { features.len().min(max_instances) };

        let mut km = KMedoids::new();
        let clustering = if features.is_empty() {
            Clustering { clusters: vec![Vec::new()], medoids: vec![None] }
        } else {
            let candidates: Vec<usize> = (1..=max_k).collect();
            kmedoids::select_k(&mut km, &candidates, &features, &instance.net_delay[a]).1
        };
        let k_star = clustering.clusters.len().max(1);
        let sub_max_instances = (max_instances / k_star).max(1);

        for (cluster_idx, members) in clustering.clusters.iter().enumerate() {
            let cloud = instance.cloud_index();
            let core = instance.core_index();
            let mut subset: Vec<usize> = members.clone();
            subset.push(core);
            subset.push(cloud);

            let sub_instance = build_sub_instance(instance, a, &subset, sub_max_instances, &remaining)?;
            let sub_solution = solve_sub_instance(&sub_instance, params, a, cluster_idx);
            merge_sub_solution(instance, &mut solution, &mut remaining, a, &subset, &sub_solution);
        }
    }

    decoder::local_search_repair(instance, &mut solution);
    Ok(solution)
}

/// Base stations (or any node) with at least one user of app `a`.
fn app_features(instance: &ProblemInstance, a: usize) -> Vec<usize> {
    (0..instance.nb_nodes()).filter(|&b| instance.nodes[b].is_base_station() && instance.users[a][b] > 0).collect()
}

/// Builds a single-app sub-instance restricted to `subset` (cluster
/// members followed by CORE, CLOUD), with node capacities reduced by
/// whatever has already been committed elsewhere and the app's instance
/// budget overridden to `sub_max_instances`.
fn build_sub_instance(
    instance: &ProblemInstance,
    a: usize,
    subset: &[usize],
    sub_max_instances: usize,
    remaining: &[Vec<f64>],
) -> Result<ProblemInstance> {
    let nb_resources = instance.resources.len();

    let mut app = instance.apps[a].clone();
    app.id = 0;
    app.max_instances = sub_max_instances.min(subset.len()).max(1);

    let sub_nodes: Vec<Node> = subset
        .iter()
        .enumerate()
        .map(|(local, &h)| {
            let mut node = instance.nodes[h].clone();
            node.id = local;
            for r in 0..nb_resources {
                let name = instance.resources[r].name.clone();
                if node.capacity_of(&name).is_finite() {
                    node.capacity.insert(name, remaining[h][r].max(0.0));
                }
            }
            node
        })
        .collect();

    let sub_net_delay = vec![subset.iter().map(|&i| subset.iter().map(|&j| instance.net_delay[a][i][j]).collect()).collect()];
    let sub_users = vec![subset.iter().map(|&h| instance.users[a][h]).collect()];

    ProblemInstance::new(instance.resources.clone(), vec![app], sub_nodes, sub_net_delay, sub_users)
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

/// Runs a single BRKGA search over `sub_instance` and decodes its best
/// individual. `app` and `cluster_idx` only vary the RNG seed so that
/// distinct sub-instances explore independent search trajectories while
/// the whole decomposition stays reproducible given `params.seed`.
fn solve_sub_instance(sub_instance: &ProblemInstance, params: &ClusterParams, app: usize, cluster_idx: usize) -> Solution {
    let layout = GeneLayout::new(sub_instance);
    let decoder_adapter = ScalarDecoder { instance: sub_instance, layout, objective: &params.objective, use_heuristic: params.use_heuristic };

    let config = crate::brkga::BrkgaConfig::new(layout.len())
        .with_population_size(params.population_size)
        .with_max_generations(params.max_generations)
        .with_elite_fraction(params.elite_fraction)
        .with_mutant_fraction(params.mutant_fraction)
        .with_elite_inheritance_prob(params.elite_inheritance_prob)
        .with_stagnation_limit(params.stagnation_limit)
        .with_parallel(params.parallel);
    let config = match params.seed {
        Some(seed) => config.with_seed(seed ^ ((app as u64) << 32) ^ (cluster_idx as u64)),
        None => config,
    };

    let result = crate::brkga::run(&decoder_adapter, &config);
    let chromosome = Chromosome::new(layout, result.best_keys);
    decoder::decode(sub_instance, &chromosome)
}

/// Folds a sub-instance's single-app solution back into the global
/// solution at app `a`, and debits the committed demand from
/// `remaining`.
fn merge_sub_solution(
    instance: &ProblemInstance,
    solution: &mut Solution,
    remaining: &mut [Vec<f64>],
    a: usize,
    subset: &[usize],
    sub_solution: &Solution,
) {
    let nb_resources = instance.resources.len();
    for (local_h, &h) in subset.iter().enumerate() {
        if sub_solution.place[0][local_h] {
            solution.place[a][h] = true;
        }
        for (local_b, &b) in subset.iter().enumerate() {
            let load = sub_solution.load[0][local_b][local_h];
            if load > 0 {
                solution.load[a][b][h] += load;
            }
        }
    }

    for (local_h, &h) in subset.iter().enumerate() {
        if !sub_solution.place[0][local_h] {
            continue;
        }
        let node_load = sub_solution.node_load(0, local_h) as f64;
        for r in 0..nb_resources {
            let name = &instance.resources[r].name;
            if !instance.nodes[h].capacity_of(name).is_finite() {
                continue;
            }
            let lin = instance.apps[a].demand_of(name);
            remaining[h][r] -= lin.eval(node_load);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::app::App;
    use crate::model::node::{Node, NodeType, PowerModel};
    use crate::model::resource::{Linear, Resource, ResourceKind};
    use std::collections::HashMap;

    fn instance() -> ProblemInstance {
        let resources = vec![Resource { name: "CPU".into(), unit: "cores".into(), kind: ResourceKind::Float, precision: 4 }];
        let apps = vec![
            App {
                id: 0,
                type_tag: "a".into(),
                deadline: 5.0,
                work_size: 1.0,
                request_rate: 1.0,
                max_instances: 2,
                availability: 0.99,
                demand: HashMap::from([("CPU".to_string(), Linear::new(1.0, 0.0))]),
            },
            App {
                id: 1,
                type_tag: "b".into(),
                deadline: 20.0,
                work_size: 1.0,
                request_rate: 1.0,
                max_instances: 2,
                availability: 0.99,
                demand: HashMap::from([("CPU".to_string(), Linear::new(1.0, 0.0))]),
            },
        ];
        let node = |id: usize, kind: NodeType, cap: f64| Node {
            id,
            kind,
            position: None,
            capacity: HashMap::from([("CPU".to_string(), cap)]),
            power: PowerModel { idle: 1.0, max: 2.0 },
            cost: HashMap::new(),
            availability: 1.0,
        };
        let nodes = vec![
            node(0, NodeType::Bs, 10.0),
            node(1, NodeType::Bs, 10.0),
            node(2, NodeType::Bs, 10.0),
            node(3, NodeType::Bs, 10.0),
            node(4, NodeType::Core, 100.0),
            node(5, NodeType::Cloud, f64::INFINITY),
        ];
        let nb_nodes = nodes.len();
        let net_delay = vec![vec![vec![1.0; nb_nodes]; nb_nodes]; 2];
        let users = vec![vec![3, 3, 0, 0, 0, 0], vec![0, 0, 2, 2, 0, 0]];
        ProblemInstance::new(resources, apps, nodes, net_delay, users).unwrap()
    }

    #[test]
    fn cluster_solve_produces_a_valid_solution() {
        let instance = instance();
        let params = ClusterParams { population_size: 12, max_generations: 5, stagnation_limit: 5, seed: Some(11), ..ClusterParams::default() };
        let solution = solve(&instance, &params).unwrap();
        assert!(solution.validate(&instance).is_none(), "{:?}", solution.validate(&instance));
    }

    #[test]
    fn cluster_solve_respects_instance_budget() {
        let instance = instance();
        let params = ClusterParams { population_size: 12, max_generations: 5, stagnation_limit: 5, seed: Some(3), ..ClusterParams::default() };
        let solution = solve(&instance, &params).unwrap();
        for a in 0..instance.nb_apps() {
            assert!(solution.active_instances(a).len() <= instance.apps[a].max_instances);
        }
    }
}
