//! The chromosome decoder: greedy capacity-aware placement + routing,
//! followed by a local-search repair pass that enforces the per-app
//! instance budget (spec C3).
//!
//! Grounded in `algo/greedy.py` (best-first node selection under a
//! linear capacity model) and `algo/sp.py::Decoder._decode_local_search`
//! (the exact instance-budget repair: while an app uses more instances
//! than allowed, move the least-loaded non-CLOUD instance's traffic to
//! CLOUD and deactivate it). The gene-driven placement priority
//! (region 2) replaces the original's fixed net-delay visiting order,
//! letting the search explore different node orderings per app.

use crate::chromosome::Chromosome;
use crate::model::{ProblemInstance, Solution};

/// Decodes a chromosome into a `(place, load)` solution.
pub fn decode(instance: &ProblemInstance, chromosome: &Chromosome) -> Solution {
    let nb_apps = instance.nb_apps();
    let nb_nodes = instance.nb_nodes();

    let mut solution = Solution::empty(nb_apps, nb_nodes);
    let mut used_capacity = vec![vec![0.0f64; instance.resources.len()]; nb_nodes];

    // Steps 1-2: fixed per-app candidate sets, independent of the
    // request being routed.
    let candidates: Vec<Vec<usize>> = (0..nb_apps).map(|a| candidate_list(instance, chromosome, a)).collect();

    // Step 3: the canonical request list, sorted once by descending
    // region-3 priority; a stable sort keeps ties in canonical order.
    let canonical = instance.canonical_requests();
    let mut order: Vec<usize> = (0..canonical.len()).collect();
    order.sort_by(|&i, &j| {
        chromosome.request_priority(j).partial_cmp(&chromosome.request_priority(i)).unwrap()
    });

    // Step 4: greedy placement + routing, one request unit at a time so
    // that interleaved apps see each other's incremental capacity use.
    for rank in order {
        let (a, b) = canonical[rank];
        let h = best_admitting_node(instance, &candidates[a], &used_capacity, &solution, a, b);
        commit(instance, &mut solution, &mut used_capacity, a, b, h);
    }

    local_search_repair(instance, &mut solution);
    solution
}

fn instance_budget(instance: &ProblemInstance, chromosome: &Chromosome, a: usize) -> usize {
    let app = &instance.apps[a];
    let fraction = chromosome.instance_fraction(a).clamp(0.0, 1.0);
    let raw = (fraction * app.max_instances as f64).ceil() as usize;
    raw.clamp(0, instance.nb_nodes())
}

/// The candidate node list for app `a` (spec step 2): the top
/// `nb_instances_a` nodes by region-2 priority, with CLOUD always
/// appended as a guaranteed-fit fallback.
fn candidate_list(instance: &ProblemInstance, chromosome: &Chromosome, a: usize) -> Vec<usize> {
    let budget = instance_budget(instance, chromosome, a);
    let cloud = instance.cloud_index();

    let mut order: Vec<usize> = (0..instance.nb_nodes()).filter(|&h| h != cloud).collect();
    order.sort_by(|&h1, &h2| {
        chromosome.placement_priority(a, h2).partial_cmp(&chromosome.placement_priority(a, h1)).unwrap()
    });
    order.truncate(budget);
    order.push(cloud);
    order
}

/// `score(a,b,h) = NetDelay[a][b][h] + proc_delay_est(a,h)` (spec step
/// 4): the network delay plus an estimate of the processing delay *if*
/// one more request were routed here, given the node's current load.
fn score(instance: &ProblemInstance, a: usize, b: usize, h: usize, current_load: u64) -> f64 {
    let net_delay = instance.net_delay[a][b][h];
    let app = &instance.apps[a];
    let cpu = app.cpu_demand();
    let denom = (1.0 + current_load as f64) * (cpu.k1 - app.work_size) + cpu.k2;
    let proc_delay_est = if denom > 0.0 { app.work_size / denom } else { f64::INFINITY };
    net_delay + proc_delay_est
}

/// Re-sorts `candidates` by ascending `score` and returns the first node
/// that admits one more unit of load for `(a, b)`. CLOUD is always a
/// member of `candidates` and has infinite capacity, so this always
/// terminates.
fn best_admitting_node(
    instance: &ProblemInstance,
    candidates: &[usize],
    used_capacity: &[Vec<f64>],
    solution: &Solution,
    a: usize,
    b: usize,
) -> usize {
    let mut scored: Vec<(usize, f64)> = candidates
        .iter()
        .map(|&h| (h, score(instance, a, b, h, solution.node_load(a, h))))
        .collect();
    scored.sort_by(|x, y| x.1.partial_cmp(&y.1).unwrap());

    for (h, _) in scored {
        if admits_one_more(instance, h, &used_capacity[h], a, solution.place[a][h]) {
            return h;
        }
    }
    unreachable!("CLOUD has infinite capacity and is always a candidate")
}

/// Whether node `h` can admit one more unit of app `a`'s load without
/// exceeding any resource's capacity (`capacity[h,r] − used[h,r] ≥ k1_r +
/// (1 − place[a,h])·k2_r`, spec step 4). `used` is `h`'s current
/// per-resource aggregate demand.
fn admits_one_more(instance: &ProblemInstance, h: usize, used: &[f64], a: usize, already_placed: bool) -> bool {
    let node = &instance.nodes[h];
    let app = &instance.apps[a];
    for (r, resource) in instance.resources.iter().enumerate() {
        let capacity = node.capacity_of(&resource.name);
        if !capacity.is_finite() {
            continue;
        }
        let lin = app.demand_of(&resource.name);
        let k2_term = if already_placed { 0.0 } else { lin.k2 };
        let projected = used[r] + lin.k1 + k2_term;
        if projected > capacity + 1e-9 {
            return false;
        }
    }
    true
}

/// Records one committed unit of `(a, b)` routed to `h`: marks the
/// instance active (paying its fixed `k2` term the first time) and
/// accumulates its `k1` per-request term into `used_capacity[h]`.
fn commit(
    instance: &ProblemInstance,
    solution: &mut Solution,
    used_capacity: &mut [Vec<f64>],
    a: usize,
    b: usize,
    h: usize,
) {
    let already_placed = solution.place[a][h];
    if !already_placed {
        solution.place[a][h] = true;
    }
    solution.load[a][b][h] += 1;

    let app = &instance.apps[a];
    for (r, resource) in instance.resources.iter().enumerate() {
        let lin = app.demand_of(&resource.name);
        used_capacity[h][r] += lin.k1 + if already_placed { 0.0 } else { lin.k2 };
    }
}

/// Enforces `active_instances(a) <= max_instances(a)` by moving the
/// least-loaded non-CLOUD instance's traffic to CLOUD, repeatedly, until
/// the app is within budget. CLOUD is activated first so it is always
/// available as the offload target.
pub fn local_search_repair(instance: &ProblemInstance, solution: &mut Solution) {
    let cloud = instance.cloud_index();
    for a in 0..instance.nb_apps() {
        let max_instances = instance.apps[a].max_instances;
        loop {
            let active = solution.active_instances(a);
            if active.len() <= max_instances {
                break;
            }
            if !solution.place[a][cloud] {
                solution.place[a][cloud] = true;
            }
            let victim = active
                .iter()
                .copied()
                .filter(|&h| h != cloud)
                .min_by_key(|&h| solution.node_load(a, h))
                .expect("more active instances than the budget allows implies a non-CLOUD victim exists");

            for b in 0..instance.nb_nodes() {
                let amount = solution.load[a][b][victim];
                if amount > 0 {
                    solution.load[a][b][victim] = 0;
                    solution.load[a][b][cloud] += amount;
                }
            }
            solution.place[a][victim] = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chromosome::GeneLayout;
    use crate::model::app::App;
    use crate::model::node::{Node, NodeType, PowerModel};
    use crate::model::resource::{Linear, Resource, ResourceKind};
    use std::collections::HashMap;

    fn instance_with_max_instances(max_instances: usize) -> ProblemInstance {
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
            max_instances,
            availability: 0.99,
            demand: HashMap::from([("CPU".to_string(), Linear::new(1.0, 0.0))]),
        }];
        let mut nodes = Vec::new();
        for id in 0..3 {
            nodes.push(Node {
                id,
                kind: NodeType::Bs,
                position: None,
                capacity: HashMap::from([("CPU".to_string(), 2.0)]),
                power: PowerModel { idle: 1.0, max: 2.0 },
                cost: HashMap::new(),
                availability: 1.0,
            });
        }
        nodes.push(Node {
            id: 3,
            kind: NodeType::Core,
            position: None,
            capacity: HashMap::from([("CPU".to_string(), 100.0)]),
            power: PowerModel { idle: 1.0, max: 2.0 },
            cost: HashMap::new(),
            availability: 1.0,
        });
        nodes.push(Node {
            id: 4,
            kind: NodeType::Cloud,
            position: None,
            capacity: HashMap::from([("CPU".to_string(), f64::INFINITY)]),
            power: PowerModel { idle: 1.0, max: 2.0 },
            cost: HashMap::new(),
            availability: 1.0,
        });
        let nb_nodes = nodes.len();
        let net_delay = vec![vec![vec![1.0; nb_nodes]; nb_nodes]];
        let users = vec![vec![2, 2, 2, 0, 0]];
        ProblemInstance::new(resources, apps, nodes, net_delay, users).unwrap()
    }

    #[test]
    fn decode_respects_max_instances() {
        let instance = instance_with_max_instances(1);
        let layout = GeneLayout::new(&instance);
        let chromosome = Chromosome::new(layout, vec![1.0; layout.len()]);
        let solution = decode(&instance, &chromosome);
        assert!(solution.validate(&instance).is_none());
        assert!(solution.active_instances(0).len() <= 1);
    }

    #[test]
    fn decode_conserves_all_requests() {
        let instance = instance_with_max_instances(3);
        let layout = GeneLayout::new(&instance);
        let chromosome = Chromosome::new(layout, vec![0.7; layout.len()]);
        let solution = decode(&instance, &chromosome);
        assert!(solution.validate(&instance).is_none());
        for b in 0..instance.nb_nodes() {
            let total: u64 = (0..instance.nb_nodes()).map(|h| solution.load[0][b][h]).sum();
            assert_eq!(total, instance.requests(0, b));
        }
    }

    #[test]
    fn decode_with_zero_fraction_is_cloud_only() {
        let instance = instance_with_max_instances(2);
        let layout = GeneLayout::new(&instance);
        let mut keys = vec![1.0; layout.len()];
        keys[layout.instance_fraction_index(0)] = 0.0;
        let chromosome = Chromosome::new(layout, keys);
        let solution = decode(&instance, &chromosome);
        assert_eq!(solution.active_instances(0), vec![instance.cloud_index()]);
    }

    #[test]
    fn local_search_repair_is_idempotent_once_within_budget() {
        let instance = instance_with_max_instances(2);
        let layout = GeneLayout::new(&instance);
        let chromosome = Chromosome::new(layout, vec![1.0; layout.len()]);
        let mut solution = decode(&instance, &chromosome);
        let before = solution.active_instances(0).len();
        local_search_repair(&instance, &mut solution);
        assert_eq!(solution.active_instances(0).len(), before);
    }

    #[test]
    fn multiple_apps_sharing_a_node_accumulate_capacity_use() {
        let resources = vec![Resource {
            name: "CPU".into(),
            unit: "cores".into(),
            kind: ResourceKind::Float,
            precision: 4,
        }];
        let app = |id: usize| App {
            id,
            type_tag: "a".into(),
            deadline: 10.0,
            work_size: 1.0,
            request_rate: 1.0,
            max_instances: 1,
            availability: 0.99,
            demand: HashMap::from([("CPU".to_string(), Linear::new(1.0, 0.0))]),
        };
        let apps = vec![app(0), app(1)];
        let nodes = vec![
            Node {
                id: 0,
                kind: NodeType::Bs,
                position: None,
                capacity: HashMap::from([("CPU".to_string(), 3.0)]),
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
        let net_delay = vec![vec![vec![1.0; 3]; 3]; 2];
        let users = vec![vec![2, 0, 0], vec![2, 0, 0]];
        let instance = ProblemInstance::new(resources, apps, nodes, net_delay, users).unwrap();
        let layout = GeneLayout::new(&instance);
        let chromosome = Chromosome::new(layout, vec![1.0; layout.len()]);
        let solution = decode(&instance, &chromosome);
        assert!(solution.validate(&instance).is_none());
        // Both apps want BS (capacity 3): together their demand (2+2=4)
        // must not silently "fit" by only tracking the last app's usage.
        let bs_demand: u64 = (0..2).map(|a| solution.node_load(a, 0)).sum();
        assert!(bs_demand <= 3, "BS capacity of 3 must be respected across both apps, got {bs_demand}");
    }

    /// A single BS request, routed under the `net_delay` seed, should
    /// settle locally at the BS rather than hop to CORE or CLOUD when the
    /// BS has ample capacity and the lowest delay to its own users.
    fn three_tier_instance(bs_capacity: f64) -> ProblemInstance {
        let resources = vec![Resource { name: "CPU".into(), unit: "cores".into(), kind: ResourceKind::Float, precision: 4 }];
        let apps = vec![App {
            id: 0,
            type_tag: "a".into(),
            deadline: 100.0,
            work_size: 1.0,
            request_rate: 1.0,
            max_instances: 1,
            availability: 0.99,
            demand: HashMap::from([("CPU".to_string(), Linear::new(2.0, 0.0))]),
        }];
        let nodes = vec![
            Node { id: 0, kind: NodeType::Bs, position: None, capacity: HashMap::from([("CPU".to_string(), bs_capacity)]), power: PowerModel { idle: 1.0, max: 2.0 }, cost: HashMap::new(), availability: 1.0 },
            Node { id: 1, kind: NodeType::Core, position: None, capacity: HashMap::from([("CPU".to_string(), 100.0)]), power: PowerModel { idle: 1.0, max: 2.0 }, cost: HashMap::new(), availability: 1.0 },
            Node { id: 2, kind: NodeType::Cloud, position: None, capacity: HashMap::from([("CPU".to_string(), f64::INFINITY)]), power: PowerModel { idle: 1.0, max: 2.0 }, cost: HashMap::new(), availability: 1.0 },
        ];
        let net_delay = vec![vec![vec![0.0, 1.0, 10.0], vec![1.0, 0.0, 5.0], vec![10.0, 5.0, 0.0]]];
        let users = vec![vec![1, 0, 0]];
        ProblemInstance::new(resources, apps, nodes, net_delay, users).unwrap()
    }

    #[test]
    fn net_delay_seed_keeps_a_well_served_request_at_its_own_base_station() {
        use crate::metrics::{self, Filter};
        use crate::seeds;

        let instance = three_tier_instance(50.0);
        let layout = GeneLayout::new(&instance);
        let chromosome = Chromosome::new(layout, seeds::net_delay(layout, &instance));
        let solution = decode(&instance, &chromosome);

        assert_eq!(solution.place[0], vec![true, false, false]);
        assert_eq!(solution.load[0][0], vec![1, 0, 0]);
        assert!(metrics::max_deadline_violation(&instance, &solution, &Filter::all()) <= 0.0);
    }

    #[test]
    fn net_delay_seed_falls_back_to_cloud_when_the_base_station_has_no_capacity() {
        use crate::seeds;

        let instance = three_tier_instance(0.0);
        let layout = GeneLayout::new(&instance);
        let chromosome = Chromosome::new(layout, seeds::net_delay(layout, &instance));
        let solution = decode(&instance, &chromosome);

        let cloud = instance.cloud_index();
        assert!(solution.place[0][cloud]);
        assert_eq!(solution.load[0][0][cloud], 1);
        assert!(!solution.place[0][0], "a zero-capacity BS must never host the instance");
    }

    #[test]
    fn local_search_repair_collapses_five_active_instances_to_the_instance_budget() {
        let resources = vec![Resource { name: "CPU".into(), unit: "cores".into(), kind: ResourceKind::Float, precision: 4 }];
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
        let mut nodes: Vec<Node> = (0..5)
            .map(|id| Node { id, kind: NodeType::Bs, position: None, capacity: HashMap::from([("CPU".to_string(), 100.0)]), power: PowerModel { idle: 1.0, max: 2.0 }, cost: HashMap::new(), availability: 1.0 })
            .collect();
        nodes.push(Node { id: 5, kind: NodeType::Core, position: None, capacity: HashMap::from([("CPU".to_string(), 100.0)]), power: PowerModel { idle: 1.0, max: 2.0 }, cost: HashMap::new(), availability: 1.0 });
        nodes.push(Node { id: 6, kind: NodeType::Cloud, position: None, capacity: HashMap::from([("CPU".to_string(), f64::INFINITY)]), power: PowerModel { idle: 1.0, max: 2.0 }, cost: HashMap::new(), availability: 1.0 });
        let nb_nodes = nodes.len();
        let net_delay = vec![vec![vec![1.0; nb_nodes]; nb_nodes]];
        let users = vec![vec![5, 5, 5, 5, 5, 0, 0]];
        let instance = ProblemInstance::new(resources, apps, nodes, net_delay, users).unwrap();

        let mut solution = Solution::empty(1, nb_nodes);
        for b in 0..5 {
            solution.place[0][b] = true;
            solution.load[0][b][b] = 5;
        }

        local_search_repair(&instance, &mut solution);

        assert_eq!(solution.active_instances(0).len(), 2, "place[a,:] must respect the instance budget, CLOUD included");
        for b in 0..5 {
            let total: u64 = (0..nb_nodes).map(|h| solution.load[0][b][h]).sum();
            assert_eq!(total, instance.requests(0, b), "repair must preserve request conservation for BS {b}");
        }
    }
}
