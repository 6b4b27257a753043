//! JSON input schema (spec §6) and instance generation.
//!
//! Mirrors `util/input.py::Input.gen_rand_data`: app-type templates are
//! expanded into concrete apps, base stations are laid out on a hex or
//! rectangle lattice, users are scattered per a chosen spatial
//! distribution, and net delay is the shortest path over BS-BS
//! (neighbor), BS-CORE, and CORE-CLOUD edges.

use super::app::App;
use super::node::{Node, NodeType, PowerModel, Position};
use super::point::{self, Distribution, MapFormat, Point2D};
use super::resource::{Linear, Resource, ResourceKind};
use crate::error::{Result, SolverError};
use crate::model::instance::ProblemInstance;
use rand::Rng;
use serde::Deserialize;
use std::collections::HashMap;

/// A scalar input field that may be a fixed value, a `[lo, hi]` range to
/// sample uniformly, or the string `"INF"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NumOrRange {
    Str(String),
    Range([f64; 2]),
    Num(f64),
}

impl NumOrRange {
    pub fn resolve<R: Rng>(&self, rng: &mut R) -> f64 {
        match self {
            NumOrRange::Str(s) if s.eq_ignore_ascii_case("inf") => f64::INFINITY,
            NumOrRange::Str(_) => f64::NAN,
            NumOrRange::Range([lo, hi]) => {
                if (hi - lo).abs() < f64::EPSILON {
                    *lo
                } else {
                    rng.random_range(*lo..*hi)
                }
            }
            NumOrRange::Num(v) => *v,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceTemplate {
    pub name: String,
    pub unit: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub precision: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinearTemplate {
    pub a: NumOrRange,
    pub b: NumOrRange,
}

impl LinearTemplate {
    fn resolve<R: Rng>(&self, rng: &mut R) -> Linear {
        Linear::new(self.a.resolve(rng), self.b.resolve(rng))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkDelayTemplate {
    pub bs_bs: NumOrRange,
    pub bs_core: NumOrRange,
    pub core_cloud: NumOrRange,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppTemplate {
    #[serde(rename = "type")]
    pub type_tag: String,
    /// Fraction of the total user population assigned to this app type.
    pub users: f64,
    pub deadline: NumOrRange,
    pub work_size: NumOrRange,
    pub request_rate: NumOrRange,
    pub availability: NumOrRange,
    pub max_instances: NumOrRange,
    pub demand: HashMap<String, LinearTemplate>,
    pub network_delay: NetworkDelayTemplate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PowerTemplate {
    pub min: NumOrRange,
    pub max: NumOrRange,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeTemplate {
    pub availability: NumOrRange,
    pub power: PowerTemplate,
    pub cost: HashMap<String, LinearTemplate>,
    pub capacity: HashMap<String, NumOrRange>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodesTemplate {
    pub bs: NodeTemplate,
    pub core: NodeTemplate,
    pub cloud: NodeTemplate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapTemplate {
    pub format: MapFormat,
    pub distribution: Vec<Distribution>,
}

/// Root JSON input document (spec §6).
#[derive(Debug, Clone, Deserialize)]
pub struct InputTemplate {
    pub resources: Vec<ResourceTemplate>,
    pub apps: Vec<AppTemplate>,
    pub nodes: NodesTemplate,
    pub map: MapTemplate,
}

impl InputTemplate {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| SolverError::InputValidation(format!("malformed JSON: {e}")))
    }

    /// Resolves this template into a concrete, immutable problem instance.
    ///
    /// `nb_nodes` includes CORE and CLOUD (so `nb_nodes - 2` base stations).
    pub fn generate<R: Rng>(
        &self,
        nb_nodes: usize,
        nb_apps: usize,
        nb_users: usize,
        rng: &mut R,
    ) -> Result<ProblemInstance> {
        if nb_nodes < 2 {
            return Err(SolverError::InputValidation(
                "nb_nodes must be at least 2 (CORE + CLOUD)".into(),
            ));
        }
        if self.apps.is_empty() {
            return Err(SolverError::InputValidation("apps template is empty".into()));
        }

        let nb_bs = nb_nodes - 2;
        let hex_size = 1.0;
        let bs_map = match self.map.format {
            MapFormat::Rectangle => {
                let rows = (nb_bs as f64).sqrt().floor() as usize;
                point::gen_rect_map(rows.max(1), rows.max(1), hex_size)
            }
            MapFormat::Hex => point::gen_hex_map(nb_bs, hex_size),
        };
        let nb_bs = bs_map.len();
        let nb_nodes = nb_bs + 2;
        let core_index = nb_bs;
        let cloud_index = nb_bs + 1;

        let resources: Vec<Resource> = self
            .resources
            .iter()
            .map(|r| Resource {
                name: r.name.clone(),
                unit: r.unit.clone(),
                kind: r.kind,
                precision: r.precision.unwrap_or(4),
            })
            .collect();
        let resource_names: Vec<String> = resources.iter().map(|r| r.name.clone()).collect();

        // ---- app-type expansion (ground truth: _gen_rand_apps) ----
        let nb_types = self.apps.len();
        let mut apps_per_type = vec![nb_apps / nb_types; nb_types];
        apps_per_type[0] += nb_apps % nb_types;

        let mut users_per_type: Vec<f64> = self.apps.iter().map(|t| nb_users as f64 * t.users).collect();
        let assigned: f64 = users_per_type.iter().sum();
        users_per_type[0] += nb_users as f64 - assigned;

        let mut apps: Vec<App> = Vec::with_capacity(nb_apps);
        let mut app_net_delay_templates: Vec<&NetworkDelayTemplate> = Vec::with_capacity(nb_apps);
        let mut app_user_counts: Vec<usize> = Vec::with_capacity(nb_apps);
        for t in 0..nb_types {
            let template = &self.apps[t];
            let count = apps_per_type[t];
            if count == 0 {
                continue;
            }
            let mut users_left = users_per_type[t] as i64;
            let base_users = (users_per_type[t] / count as f64).floor() as i64;
            for i in 0..count {
                let users_here = if i == count - 1 {
                    users_left
                } else {
                    base_users
                }
                .max(0);
                users_left -= users_here;

                let demand: HashMap<String, Linear> = template
                    .demand
                    .iter()
                    .map(|(res, lin)| (res.clone(), lin.resolve(rng)))
                    .collect();

                let mut max_instances = template.max_instances.resolve(rng);
                max_instances = if max_instances <= 1.0 {
                    (max_instances * nb_nodes as f64).round().max(1.0)
                } else {
                    max_instances.round()
                };
                let max_instances = (max_instances as usize).clamp(1, nb_nodes);

                apps.push(App {
                    id: apps.len(),
                    type_tag: template.type_tag.clone(),
                    deadline: template.deadline.resolve(rng).max(0.0),
                    work_size: template.work_size.resolve(rng).max(0.0),
                    request_rate: template.request_rate.resolve(rng).max(0.0),
                    max_instances,
                    availability: template.availability.resolve(rng).clamp(0.0, 1.0),
                    demand,
                });
                app_net_delay_templates.push(&template.network_delay);
                app_user_counts.push(users_here as usize);
            }
        }
        let nb_apps = apps.len();

        // ---- net delay: shortest path over BS-neighbor, BS-CORE, CORE-CLOUD edges ----
        let net_delay: Vec<Vec<Vec<f64>>> = (0..nb_apps)
            .map(|a| {
                build_net_delay(
                    &bs_map,
                    core_index,
                    cloud_index,
                    nb_nodes,
                    app_net_delay_templates[a],
                    rng,
                )
            })
            .collect();

        // ---- nodes ----
        let mut nodes: Vec<Node> = Vec::with_capacity(nb_nodes);
        for (b, hex) in bs_map.iter().enumerate() {
            let pixel: Point2D = hex.to_pixel();
            nodes.push(build_node(
                b,
                NodeType::Bs,
                Some(Position { x: pixel.x, y: pixel.y }),
                &self.nodes.bs,
                &resource_names,
                rng,
            ));
        }
        nodes.push(build_node(core_index, NodeType::Core, None, &self.nodes.core, &resource_names, rng));
        nodes.push(build_node(cloud_index, NodeType::Cloud, None, &self.nodes.cloud, &resource_names, rng));
        // CLOUD capacity is infinite regardless of template (spec §3).
        for r in &resource_names {
            nodes[cloud_index].capacity.insert(r.clone(), f64::INFINITY);
        }

        // ---- user scatter (ground truth: _gen_rand_users) ----
        let bound_box = match self.map.format {
            MapFormat::Rectangle => point::calc_rect_bound_box(nb_bs, hex_size),
            MapFormat::Hex => point::calc_hex_bound_box(nb_bs, hex_size),
        };
        let mut users = vec![vec![0u64; nb_nodes]; nb_apps];
        for a in 0..nb_apps {
            let distribution = self.map.distribution[rng.random_range(0..self.map.distribution.len())];
            let points = point::gen_points(rng, distribution, app_user_counts[a].max(1), &bound_box);
            for p in points {
                let hp = p.to_hex(hex_size);
                let mut best_b = 0usize;
                let mut best_d = f64::INFINITY;
                for (b, bs_hex) in bs_map.iter().enumerate() {
                    let d = hp.distance(bs_hex);
                    if d < best_d {
                        best_d = d;
                        best_b = b;
                    }
                }
                users[a][best_b] += 1;
            }
        }

        ProblemInstance::new(resources, apps, nodes, net_delay, users)
    }
}

fn build_net_delay<R: Rng>(
    bs_map: &[point::HexPoint],
    core_index: usize,
    cloud_index: usize,
    nb_nodes: usize,
    template: &NetworkDelayTemplate,
    rng: &mut R,
) -> Vec<Vec<f64>> {
    let mut delay = vec![vec![f64::INFINITY; nb_nodes]; nb_nodes];
    for i in 0..nb_nodes {
        delay[i][i] = 0.0;
    }

    let core_cloud = template.core_cloud.resolve(rng);
    delay[core_index][cloud_index] = core_cloud;
    delay[cloud_index][core_index] = core_cloud;

    for b in 0..bs_map.len() {
        let bs_core = template.bs_core.resolve(rng);
        delay[b][core_index] = bs_core;
        delay[core_index][b] = bs_core;
    }
    for i in 0..bs_map.len() {
        for j in (i + 1)..bs_map.len() {
            if bs_map[i].is_neighbor(&bs_map[j]) {
                let bs_bs = template.bs_bs.resolve(rng);
                delay[i][j] = bs_bs;
                delay[j][i] = bs_bs;
            }
        }
    }

    floyd_warshall(&mut delay);
    delay
}

fn floyd_warshall(delay: &mut [Vec<f64>]) {
    let n = delay.len();
    for k in 0..n {
        for i in 0..n {
            if delay[i][k].is_infinite() {
                continue;
            }
            for j in 0..n {
                let via = delay[i][k] + delay[k][j];
                if via < delay[i][j] {
                    delay[i][j] = via;
                }
            }
        }
    }
}

fn build_node<R: Rng>(
    id: usize,
    kind: NodeType,
    position: Option<Position>,
    template: &NodeTemplate,
    resource_names: &[String],
    rng: &mut R,
) -> Node {
    let capacity: HashMap<String, f64> = resource_names
        .iter()
        .map(|r| {
            let v = template
                .capacity
                .get(r)
                .map(|t| t.resolve(rng))
                .unwrap_or(f64::INFINITY);
            (r.clone(), v)
        })
        .collect();
    let cost: HashMap<String, Linear> = resource_names
        .iter()
        .map(|r| {
            let v = template.cost.get(r).map(|t| t.resolve(rng)).unwrap_or(Linear::new(0.0, 0.0));
            (r.clone(), v)
        })
        .collect();

    Node {
        id,
        kind,
        position,
        capacity,
        power: PowerModel {
            idle: template.power.min.resolve(rng),
            max: template.power.max.resolve(rng),
        },
        cost,
        availability: template.availability.resolve(rng).clamp(0.0, 1.0),
    }
}
