//! The immutable problem instance a solve() runs against.

use super::app::App;
use super::node::Node;
use super::resource::Resource;
use crate::error::{Result, SolverError};

/// A fully resolved, immutable placement problem.
///
/// Mirrors `util.model.Input` / `util.input.Input` of the original
/// system: apps and nodes are dense-indexed, `net_delay[a][i][j]` is the
/// shortest-path delay for app `a` between nodes `i` and `j`, and
/// `users[a][b]` is the integer user count served by base station `b`.
///
/// By convention (spec §3) the last two node indices are always CORE and
/// CLOUD respectively.
#[derive(Debug, Clone)]
pub struct ProblemInstance {
    pub resources: Vec<Resource>,
    pub apps: Vec<App>,
    pub nodes: Vec<Node>,
    /// `net_delay[a][i][j]`.
    pub net_delay: Vec<Vec<Vec<f64>>>,
    /// `users[a][b]`.
    pub users: Vec<Vec<u64>>,
}

impl ProblemInstance {
    pub fn new(
        resources: Vec<Resource>,
        apps: Vec<App>,
        nodes: Vec<Node>,
        net_delay: Vec<Vec<Vec<f64>>>,
        users: Vec<Vec<u64>>,
    ) -> Result<Self> {
        let instance = Self {
            resources,
            apps,
            nodes,
            net_delay,
            users,
        };
        instance.validate()?;
        Ok(instance)
    }

    fn validate(&self) -> Result<()> {
        let nb_nodes = self.nodes.len();
        let nb_apps = self.apps.len();

        if nb_nodes < 2 {
            return Err(SolverError::InputValidation(
                "instance must have at least CORE and CLOUD nodes".into(),
            ));
        }
        if self.nodes[self.core_index()].kind != super::node::NodeType::Core {
            return Err(SolverError::InputValidation(
                "second-to-last node must be CORE".into(),
            ));
        }
        if self.nodes[self.cloud_index()].kind != super::node::NodeType::Cloud {
            return Err(SolverError::InputValidation(
                "last node must be CLOUD".into(),
            ));
        }
        if self.net_delay.len() != nb_apps {
            return Err(SolverError::InputValidation(
                "net_delay must have one matrix per app".into(),
            ));
        }
        for (a, matrix) in self.net_delay.iter().enumerate() {
            if matrix.len() != nb_nodes || matrix.iter().any(|row| row.len() != nb_nodes) {
                return Err(SolverError::InputValidation(format!(
                    "net_delay[{a}] must be a {nb_nodes}x{nb_nodes} matrix"
                )));
            }
            if matrix.iter().flatten().any(|&d| d < 0.0) {
                return Err(SolverError::InputValidation(
                    "net_delay entries must be nonnegative".into(),
                ));
            }
        }
        if self.users.len() != nb_apps || self.users.iter().any(|row| row.len() != nb_nodes) {
            return Err(SolverError::InputValidation(
                "users must be an |apps| x |nodes| matrix".into(),
            ));
        }
        for app in &self.apps {
            if app.max_instances == 0 || app.max_instances > nb_nodes {
                return Err(SolverError::InputValidation(format!(
                    "app {} max_instances must be in 1..={nb_nodes}",
                    app.id
                )));
            }
        }
        Ok(())
    }

    pub fn nb_apps(&self) -> usize {
        self.apps.len()
    }

    pub fn nb_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn core_index(&self) -> usize {
        self.nodes.len() - 2
    }

    pub fn cloud_index(&self) -> usize {
        self.nodes.len() - 1
    }

    /// `Requests[a][b] = ceil(Users[a][b] * request_rate_a)`.
    pub fn requests(&self, a: usize, b: usize) -> u64 {
        self.apps[a].requests_from(self.users[a][b])
    }

    /// Total number of (app, request-unit) tuples, i.e. `|Requests|`
    /// as defined in spec §3 — the length of chromosome region 3.
    pub fn total_requests(&self) -> usize {
        let nb_nodes = self.nb_nodes();
        (0..self.nb_apps())
            .flat_map(|a| (0..nb_nodes).map(move |b| (a, b)))
            .map(|(a, b)| self.requests(a, b) as usize)
            .sum()
    }

    /// Canonical (app, source-BS) request list: each pair repeated
    /// `Requests[a][b]` times, in app-major, node-minor order. The
    /// decoder's region-3 gene indices are defined against this order.
    pub fn canonical_requests(&self) -> Vec<(usize, usize)> {
        let nb_nodes = self.nb_nodes();
        let mut out = Vec::with_capacity(self.total_requests());
        for a in 0..self.nb_apps() {
            for b in 0..nb_nodes {
                let n = self.requests(a, b);
                for _ in 0..n {
                    out.push((a, b));
                }
            }
        }
        out
    }

    pub fn resource_names(&self) -> impl Iterator<Item = &str> {
        self.resources.iter().map(|r| r.name.as_str())
    }
}
