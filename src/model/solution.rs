//! The mutable solve output: `place` and `load` (spec §3 "Solution").

use super::instance::ProblemInstance;

/// A decoded placement/routing solution.
///
/// `place[a][h]` is `true` iff app `a` has an instance on node `h`.
/// `load[a][b][h]` is the number of app-`a` requests originating at base
/// station `b` that are served at node `h`.
#[derive(Debug, Clone)]
pub struct Solution {
    pub place: Vec<Vec<bool>>,
    pub load: Vec<Vec<Vec<u64>>>,
}

impl Solution {
    pub fn empty(nb_apps: usize, nb_nodes: usize) -> Self {
        Self {
            place: vec![vec![false; nb_nodes]; nb_apps],
            load: vec![vec![vec![0u64; nb_nodes]; nb_nodes]; nb_apps],
        }
    }

    pub fn node_load(&self, a: usize, h: usize) -> u64 {
        self.load[a].iter().map(|row| row[h]).sum()
    }

    pub fn active_instances(&self, a: usize) -> Vec<usize> {
        self.place[a]
            .iter()
            .enumerate()
            .filter_map(|(h, &p)| p.then_some(h))
            .collect()
    }

    /// Checks the invariants of spec §3 / §8 (properties 1–3). Returns
    /// the first violation found, or `None` if the solution is valid.
    pub fn validate(&self, instance: &ProblemInstance) -> Option<String> {
        let nb_nodes = instance.nb_nodes();

        for a in 0..instance.nb_apps() {
            let nb_instances = self.place[a].iter().filter(|&&p| p).count();
            if nb_instances == 0 || nb_instances > instance.apps[a].max_instances {
                return Some(format!(
                    "app {a}: instance count {nb_instances} outside [1, {}]",
                    instance.apps[a].max_instances
                ));
            }

            for b in 0..nb_nodes {
                let total_load: u64 = (0..nb_nodes).map(|h| self.load[a][b][h]).sum();
                let requests = instance.requests(a, b);
                if total_load != requests {
                    return Some(format!(
                        "app {a}, bs {b}: load sums to {total_load}, expected {requests}"
                    ));
                }
                for h in 0..nb_nodes {
                    if self.load[a][b][h] > 0 && !self.place[a][h] {
                        return Some(format!(
                            "app {a}: load at node {h} without placement"
                        ));
                    }
                }
            }
        }

        for (h, node) in instance.nodes.iter().enumerate() {
            for resource in instance.resource_names() {
                let mut demand = 0.0f64;
                for a in 0..instance.nb_apps() {
                    if !self.place[a][h] {
                        continue;
                    }
                    let lin = instance.apps[a].demand_of(resource);
                    demand += lin.eval(self.node_load(a, h) as f64);
                }
                let capacity = node.capacity_of(resource);
                if capacity.is_finite() && demand > capacity + 1e-6 {
                    return Some(format!(
                        "node {h}, resource {resource}: demand {demand} exceeds capacity {capacity}"
                    ));
                }
            }
        }

        None
    }
}
