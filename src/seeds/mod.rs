//! Heuristic seed chromosomes for the BRKGA/NSGA-II initial population
//! (spec C2).
//!
//! Grounded in `algo/util/ga_heuristic.py` / `algo/util/ga_bootstrap.py`:
//! each seed is a deterministic gene vector built from some structural
//! property of the instance (net delay, deadline tightness, node
//! clustering) rather than drawn at random, biasing the initial
//! population toward known-good regions of the search space while
//! leaving the rest of the population to explore freely.

use crate::chromosome::GeneLayout;
use crate::error::{Result, SolverError};
use crate::kmedoids;
use crate::model::ProblemInstance;

const NEUTRAL: f64 = 0.5;

/// All genes zero. Region 2's CLOUD-node priority is irrelevant because
/// the decoder always considers CLOUD as a fallback candidate regardless
/// of its priority key, so this seed decodes to a cloud-only placement.
pub fn cloud(layout: GeneLayout) -> Vec<f64> {
    vec![0.0; layout.len()]
}

/// Maximal instance budget, per-node placement priority favoring low
/// average network delay, neutral request-scheduling priority.
pub fn net_delay(layout: GeneLayout, instance: &ProblemInstance) -> Vec<f64> {
    let mut keys = vec![NEUTRAL; layout.len()];
    for a in 0..instance.nb_apps() {
        keys[layout.instance_fraction_index(a)] = 1.0;
        let avg_delay: Vec<f64> = (0..instance.nb_nodes())
            .map(|h| average_delay(instance, a, h))
            .collect();
        let max_delay = avg_delay.iter().cloned().fold(0.0, f64::max).max(1e-9);
        for h in 0..instance.nb_nodes() {
            keys[layout.placement_priority_index(a, h)] = 1.0 - avg_delay[h] / max_delay;
        }
    }
    keys
}

/// Mean network delay from every base station `b` to candidate node `h`
/// for app `a` (spec §4.2: `avg_delay(a,h) = mean_b NetDelay[a][b][h]`) —
/// a plain, unweighted mean over `b`, not weighted by user count.
fn average_delay(instance: &ProblemInstance, a: usize, h: usize) -> f64 {
    let values: Vec<f64> = (0..instance.nb_nodes())
        .map(|b| instance.net_delay[a][b][h])
        .filter(|d| d.is_finite())
        .collect();
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Maximal instance budget, region-3 priority favoring tight-deadline
/// apps' requests, neutral placement priority.
pub fn deadline(layout: GeneLayout, instance: &ProblemInstance) -> Vec<f64> {
    let mut keys = vec![NEUTRAL; layout.len()];
    for a in 0..instance.nb_apps() {
        keys[layout.instance_fraction_index(a)] = 1.0;
    }
    let max_deadline = instance
        .apps
        .iter()
        .map(|app| app.deadline)
        .fold(0.0, f64::max)
        .max(1e-9);
    for (rank, (a, _b)) in instance.canonical_requests().into_iter().enumerate() {
        let deadline = instance.apps[a].deadline;
        keys[layout.request_priority_index(rank)] = 1.0 - deadline / max_deadline;
    }
    keys
}

/// Per-app k-medoid clustering of the base stations serving that app
/// (spec §4.2 `cluster_metoids`): `features = {b : Users[a][b] > 0}`,
/// `k = min(|features|, max_instances_a)`, and every node's placement
/// priority favors proximity to the nearest medoid.
pub fn cluster_medoids(layout: GeneLayout, instance: &ProblemInstance) -> Vec<f64> {
    let mut keys = vec![NEUTRAL; layout.len()];
    for a in 0..instance.nb_apps() {
        let features = app_features(instance, a);
        let k = features.len().min(instance.apps[a].max_instances);
        let mut km = kmedoids::KMedoids::new();
        let clustering = km.fit(k, &features, &instance.net_delay[a]);
        apply_cluster_priorities(&mut keys, layout, instance, a, &clustering);
    }
    keys
}

/// As `cluster_medoids`, but each app searches `k` in
/// `1..=min(|features|, max_instances_a)` and keeps the silhouette-best
/// split (spec §4.2 `cluster_metoids_sc`).
pub fn cluster_medoids_silhouette(layout: GeneLayout, instance: &ProblemInstance) -> Vec<f64> {
    let mut keys = vec![NEUTRAL; layout.len()];
    for a in 0..instance.nb_apps() {
        let features = app_features(instance, a);
        let max_k = features.len().min(instance.apps[a].max_instances);
        if max_k == 0 {
            keys[layout.instance_fraction_index(a)] = 1.0;
            continue;
        }
        let candidates: Vec<usize> = (1..=max_k).collect();
        let mut km = kmedoids::KMedoids::new();
        let (_, clustering) = kmedoids::select_k(&mut km, &candidates, &features, &instance.net_delay[a]);
        apply_cluster_priorities(&mut keys, layout, instance, a, &clustering);
    }
    keys
}

/// Base stations (and any other node) with at least one user of app `a`.
fn app_features(instance: &ProblemInstance, a: usize) -> Vec<usize> {
    (0..instance.nb_nodes()).filter(|&b| instance.users[a][b] > 0).collect()
}

fn apply_cluster_priorities(
    keys: &mut [f64],
    layout: GeneLayout,
    instance: &ProblemInstance,
    a: usize,
    clustering: &kmedoids::Clustering,
) {
    keys[layout.instance_fraction_index(a)] = 1.0;
    let distances = &instance.net_delay[a];
    let nb_nodes = instance.nb_nodes();

    let dist_to_medoid: Vec<f64> = (0..nb_nodes).map(|h| clustering.distance_to_nearest_medoid(h, distances)).collect();
    let max_dist = dist_to_medoid.iter().cloned().filter(|d| d.is_finite()).fold(0.0, f64::max).max(1e-9);

    for h in 0..nb_nodes {
        let d = dist_to_medoid[h];
        let priority = if d.is_finite() { 1.0 - d / max_dist } else { 0.0 };
        keys[layout.placement_priority_index(a, h)] = priority;
    }
}

/// Element-wise `1 - x` (the Boolean-complement seed used to explore the
/// opposite region of the search space from an existing seed).
pub fn invert(seed: &[f64]) -> Vec<f64> {
    seed.iter().map(|x| 1.0 - x).collect()
}

/// Convex combination `sum(weights[i] * seeds[i])`. Weights need not sum
/// to 1; they are normalized internally. Panics if `seeds` is empty or
/// lengths mismatch.
pub fn merge(seeds: &[Vec<f64>], weights: &[f64]) -> Vec<f64> {
    assert!(!seeds.is_empty(), "merge requires at least one seed");
    assert_eq!(seeds.len(), weights.len());
    let len = seeds[0].len();
    let total_weight: f64 = weights.iter().sum::<f64>().max(1e-9);
    (0..len)
        .map(|i| {
            seeds
                .iter()
                .zip(weights)
                .map(|(seed, w)| seed[i] * w)
                .sum::<f64>()
                / total_weight
        })
        .collect()
}

/// Resolves a seed by name, for the orchestrator's `--seed` surface.
pub fn by_name(name: &str, layout: GeneLayout, instance: &ProblemInstance) -> Result<Vec<f64>> {
    match name {
        "cloud" => Ok(cloud(layout)),
        "net_delay" => Ok(net_delay(layout, instance)),
        "deadline" => Ok(deadline(layout, instance)),
        "cluster_medoids" => Ok(cluster_medoids(layout, instance)),
        "cluster_medoids_sc" => Ok(cluster_medoids_silhouette(layout, instance)),
        other => Err(SolverError::UnknownSolverOrSeed(other.to_string())),
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
        let resources = vec![Resource {
            name: "CPU".into(),
            unit: "cores".into(),
            kind: ResourceKind::Float,
            precision: 4,
        }];
        let apps = vec![App {
            id: 0,
            type_tag: "a".into(),
            deadline: 10.0,
            work_size: 1.0,
            request_rate: 1.0,
            max_instances: 2,
            availability: 0.99,
            demand: HashMap::from([("CPU".to_string(), Linear::new(1.0, 0.0))]),
        }];
        let nodes = vec![
            Node {
                id: 0,
                kind: NodeType::Bs,
                position: None,
                capacity: HashMap::from([("CPU".to_string(), 10.0)]),
                power: PowerModel { idle: 1.0, max: 2.0 },
                cost: HashMap::new(),
                availability: 1.0,
            },
            Node {
                id: 1,
                kind: NodeType::Core,
                position: None,
                capacity: HashMap::from([("CPU".to_string(), 100.0)]),
                power: PowerModel { idle: 1.0, max: 2.0 },
                cost: HashMap::new(),
                availability: 1.0,
            },
            Node {
                id: 2,
                kind: NodeType::Cloud,
                position: None,
                capacity: HashMap::from([("CPU".to_string(), f64::INFINITY)]),
                power: PowerModel { idle: 1.0, max: 2.0 },
                cost: HashMap::new(),
                availability: 1.0,
            },
        ];
        let net_delay = vec![vec![
            vec![0.0, 1.0, 5.0],
            vec![1.0, 0.0, 4.0],
            vec![5.0, 4.0, 0.0],
        ]];
        let users = vec![vec![2, 0, 0]];
        ProblemInstance::new(resources, apps, nodes, net_delay, users).unwrap()
    }

    #[test]
    fn cloud_seed_is_all_zero() {
        let instance = instance();
        let layout = GeneLayout::new(&instance);
        assert!(cloud(layout).iter().all(|&x| x == 0.0));
    }

    #[test]
    fn net_delay_seed_favors_low_delay_nodes() {
        let instance = instance();
        let layout = GeneLayout::new(&instance);
        let keys = net_delay(layout, &instance);
        let p0 = keys[layout.placement_priority_index(0, 0)];
        let p2 = keys[layout.placement_priority_index(0, 2)];
        assert!(p0 > p2, "closer node should get higher priority");
    }

    #[test]
    fn invert_is_involutive() {
        let instance = instance();
        let layout = GeneLayout::new(&instance);
        let keys = net_delay(layout, &instance);
        let twice = invert(&invert(&keys));
        for (a, b) in keys.iter().zip(twice.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn merge_is_a_convex_combination() {
        let a = vec![0.0, 1.0];
        let b = vec![1.0, 0.0];
        let merged = merge(&[a, b], &[1.0, 1.0]);
        assert!((merged[0] - 0.5).abs() < 1e-12);
        assert!((merged[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn unknown_seed_name_is_an_error() {
        let instance = instance();
        let layout = GeneLayout::new(&instance);
        assert!(by_name("not-a-seed", layout, &instance).is_err());
    }
}
