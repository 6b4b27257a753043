//! The metric vocabulary used as optimization objectives and as
//! post-hoc evaluation criteria (spec C4).
//!
//! Grounded in `algo/util/metric.py`: response time and deadline
//! violation come from the same per-`(app, node)` queueing estimate,
//! resource/power/cost metrics read the node side of a solution, and
//! every metric accepts an optional app/node filter so the orchestrator
//! can report per-app-type or per-tier breakdowns.

use crate::model::{ProblemInstance, Solution};

/// Restricts a metric computation to a subset of apps and/or nodes.
/// `None` means "no restriction".
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub apps: Option<Vec<usize>>,
    pub nodes: Option<Vec<usize>>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn apps(apps: Vec<usize>) -> Self {
        Self { apps: Some(apps), nodes: None }
    }

    pub fn nodes(nodes: Vec<usize>) -> Self {
        Self { apps: None, nodes: Some(nodes) }
    }

    fn includes_app(&self, a: usize) -> bool {
        self.apps.as_ref().map_or(true, |xs| xs.contains(&a))
    }

    fn includes_node(&self, h: usize) -> bool {
        self.nodes.as_ref().map_or(true, |xs| xs.contains(&h))
    }
}

/// Per-`(app, node)` response time estimate: network delay plus a
/// saturating processing-delay term.
///
/// `proc_delay = work_size / (node_load * (k1 - work_size) + k2)` when
/// the denominator is positive, `+inf` otherwise (the node is at or past
/// saturation for this app).
fn response_time(instance: &ProblemInstance, solution: &Solution, a: usize, b: usize, h: usize) -> f64 {
    let net_delay = instance.net_delay[a][b][h];
    let app = &instance.apps[a];
    let cpu = app.cpu_demand();
    let node_load = solution.node_load(a, h) as f64;
    let denom = node_load * (cpu.k1 - app.work_size) + cpu.k2;
    let proc_delay = if denom > 0.0 {
        app.work_size / denom
    } else {
        f64::INFINITY
    };
    net_delay + proc_delay
}

fn deadline_violation(instance: &ProblemInstance, solution: &Solution, a: usize, b: usize, h: usize) -> f64 {
    response_time(instance, solution, a, b, h) - instance.apps[a].deadline
}

/// Iterates over every served `(a, b, h)` triple with positive load,
/// i.e. every routed request group, restricted by `filter`.
fn served_triples<'a>(
    instance: &'a ProblemInstance,
    solution: &'a Solution,
    filter: &'a Filter,
) -> impl Iterator<Item = (usize, usize, usize, u64)> + 'a {
    let nb_nodes = instance.nb_nodes();
    (0..instance.nb_apps())
        .filter(move |&a| filter.includes_app(a))
        .flat_map(move |a| {
            (0..nb_nodes).flat_map(move |b| {
                (0..nb_nodes).filter_map(move |h| {
                    let load = solution.load[a][b][h];
                    (load > 0 && filter.includes_node(h)).then_some((a, b, h, load))
                })
            })
        })
}

/// The worst (largest) deadline violation among served requests, clamped
/// to `>= 0` (spec §4.4 — a request that comfortably beat its deadline
/// contributes nothing, not a negative "bonus"). `0.0` if no request
/// matches the filter.
pub fn max_deadline_violation(instance: &ProblemInstance, solution: &Solution, filter: &Filter) -> f64 {
    served_triples(instance, solution, filter)
        .map(|(a, b, h, _)| deadline_violation(instance, solution, a, b, h).max(0.0))
        .fold(0.0, f64::max)
}

/// Load-weighted mean of *positive* deadline violations (requests that
/// met their deadline contribute 0, not a negative number, to the mean).
pub fn avg_deadline_violation(instance: &ProblemInstance, solution: &Solution, filter: &Filter) -> f64 {
    let mut weighted = 0.0;
    let mut total_load = 0.0;
    for (a, b, h, load) in served_triples(instance, solution, filter) {
        let v = deadline_violation(instance, solution, a, b, h).max(0.0);
        weighted += v * load as f64;
        total_load += load as f64;
    }
    if total_load > 0.0 {
        weighted / total_load
    } else {
        0.0
    }
}

/// Fraction of served requests (by load) whose deadline was met.
pub fn deadline_satisfaction_rate(instance: &ProblemInstance, solution: &Solution, filter: &Filter) -> f64 {
    let mut satisfied = 0.0;
    let mut total_load = 0.0;
    for (a, b, h, load) in served_triples(instance, solution, filter) {
        if deadline_violation(instance, solution, a, b, h) <= 0.0 {
            satisfied += load as f64;
        }
        total_load += load as f64;
    }
    if total_load > 0.0 {
        satisfied / total_load
    } else {
        1.0
    }
}

/// Load-weighted mean response time.
pub fn avg_response_time(instance: &ProblemInstance, solution: &Solution, filter: &Filter) -> f64 {
    let mut weighted = 0.0;
    let mut total_load = 0.0;
    for (a, b, h, load) in served_triples(instance, solution, filter) {
        weighted += response_time(instance, solution, a, b, h) * load as f64;
        total_load += load as f64;
    }
    if total_load > 0.0 {
        weighted / total_load
    } else {
        0.0
    }
}

/// A node's resource usage fraction (demand / capacity), the max over
/// resources; `0.0` for a node with no capacity configured for any
/// resource, and ignored (`None`) for infinite-capacity nodes.
fn node_usage(instance: &ProblemInstance, solution: &Solution, h: usize) -> Option<f64> {
    let node = &instance.nodes[h];
    let mut max_usage: Option<f64> = None;
    for resource in &instance.resources {
        let capacity = node.capacity_of(&resource.name);
        if !capacity.is_finite() || capacity <= 0.0 {
            continue;
        }
        let mut demand = 0.0;
        for a in 0..instance.nb_apps() {
            if !solution.place[a][h] {
                continue;
            }
            let lin = instance.apps[a].demand_of(&resource.name);
            demand += lin.eval(solution.node_load(a, h) as f64);
        }
        let usage = demand / capacity;
        max_usage = Some(max_usage.map_or(usage, |m: f64| m.max(usage)));
    }
    max_usage
}

/// Mean resource usage over finite-capacity nodes matched by `filter`.
pub fn avg_resource_usage(instance: &ProblemInstance, solution: &Solution, filter: &Filter) -> f64 {
    let usages: Vec<f64> = (0..instance.nb_nodes())
        .filter(|&h| filter.includes_node(h))
        .filter_map(|h| node_usage(instance, solution, h))
        .collect();
    if usages.is_empty() {
        0.0
    } else {
        usages.iter().sum::<f64>() / usages.len() as f64
    }
}

/// Max resource usage over finite-capacity nodes matched by `filter`.
pub fn max_resource_usage(instance: &ProblemInstance, solution: &Solution, filter: &Filter) -> f64 {
    (0..instance.nb_nodes())
        .filter(|&h| filter.includes_node(h))
        .filter_map(|h| node_usage(instance, solution, h))
        .fold(0.0, f64::max)
}

/// Total power consumption: idle power for every active node, scaled up
/// toward `power.max` by its resource usage fraction.
pub fn power_consumption(instance: &ProblemInstance, solution: &Solution, filter: &Filter) -> f64 {
    (0..instance.nb_nodes())
        .filter(|&h| filter.includes_node(h))
        .filter(|&h| (0..instance.nb_apps()).any(|a| solution.place[a][h]))
        .map(|h| {
            let node = &instance.nodes[h];
            let usage = node_usage(instance, solution, h).unwrap_or(0.0).min(1.0);
            node.power.idle + usage * (node.power.max - node.power.idle)
        })
        .sum()
}

/// Total monetary cost: each placed app pays its per-resource linear
/// cost on every node it occupies.
pub fn cost(instance: &ProblemInstance, solution: &Solution, filter: &Filter) -> f64 {
    let mut total = 0.0;
    for a in 0..instance.nb_apps() {
        if !filter.includes_app(a) {
            continue;
        }
        for h in 0..instance.nb_nodes() {
            if !solution.place[a][h] || !filter.includes_node(h) {
                continue;
            }
            let node = &instance.nodes[h];
            let app = &instance.apps[a];
            let node_load = solution.node_load(a, h) as f64;
            for resource in &instance.resources {
                let demand = app.demand_of(&resource.name).eval(node_load);
                total += node.cost_of(&resource.name).eval(demand);
            }
        }
    }
    total
}

/// Mean, over apps, of `Π_{h: place[a,h]} (1 − availability_a·availability_h)`
/// (spec §4.4): each app's instances fail independently, so the whole
/// app is unavailable only if *every* one of its instances is; apps with
/// no active instance in `filter`'s node subset do not contribute.
pub fn avg_unavailability(instance: &ProblemInstance, solution: &Solution, filter: &Filter) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;
    for a in 0..instance.nb_apps() {
        if !filter.includes_app(a) {
            continue;
        }
        let app_availability = instance.apps[a].availability;
        let mut product = 1.0;
        let mut has_instance = false;
        for h in 0..instance.nb_nodes() {
            if !solution.place[a][h] || !filter.includes_node(h) {
                continue;
            }
            has_instance = true;
            product *= 1.0 - app_availability * instance.nodes[h].availability;
        }
        if has_instance {
            total += product;
            count += 1;
        }
    }
    if count > 0 {
        total / count as f64
    } else {
        0.0
    }
}

/// The complete scoring vocabulary, for the orchestrator's objective-name
/// validation (spec C8: "validates that objective names resolve within
/// the metric vocabulary").
pub const METRIC_NAMES: &[&str] = &[
    "max_deadline_violation",
    "avg_deadline_violation",
    "deadline_satisfaction_rate",
    "avg_response_time",
    "avg_resource_usage",
    "max_resource_usage",
    "power_consumption",
    "cost",
    "avg_unavailability",
];

/// Resolves an objective/metric by its spec-facing name, for the
/// orchestrator's `--objective` surface.
pub fn by_name(
    name: &str,
    instance: &ProblemInstance,
    solution: &Solution,
    filter: &Filter,
) -> crate::error::Result<f64> {
    let value = match name {
        "max_deadline_violation" => max_deadline_violation(instance, solution, filter),
        "avg_deadline_violation" => avg_deadline_violation(instance, solution, filter),
        "deadline_satisfaction_rate" => deadline_satisfaction_rate(instance, solution, filter),
        "avg_response_time" => avg_response_time(instance, solution, filter),
        "avg_resource_usage" => avg_resource_usage(instance, solution, filter),
        "max_resource_usage" => max_resource_usage(instance, solution, filter),
        "power_consumption" => power_consumption(instance, solution, filter),
        "cost" => cost(instance, solution, filter),
        "avg_unavailability" => avg_unavailability(instance, solution, filter),
        other => {
            return Err(crate::error::SolverError::UnknownObjective(other.to_string()));
        }
    };
    Ok(value)
}
