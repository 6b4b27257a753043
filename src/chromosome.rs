//! The BRKGA/NSGA-II gene vector and its three regions (spec §3, §4.1).
//!
//! A chromosome is a flat vector of random keys in `[0, 1]`, split into
//! three contiguous regions whose boundaries are fixed by the problem
//! size and computed once:
//!
//! - region 1 (`instance_fraction`): length `|Apps|`, one key per app
//!   controlling how many instances it is allowed to use.
//! - region 2 (`placement_priority`): length `|Apps| * |Nodes|`, one key
//!   per `(app, node)` pair, the node's placement priority for that app.
//! - region 3 (`request_priority`): length `|Requests|`, one key per
//!   canonical `(app, source-BS)` request unit (see
//!   `ProblemInstance::canonical_requests`), its scheduling priority.

use crate::model::ProblemInstance;

/// Region boundaries for a chromosome sized to a specific instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneLayout {
    nb_apps: usize,
    nb_nodes: usize,
    nb_requests: usize,
}

impl GeneLayout {
    pub fn new(instance: &ProblemInstance) -> Self {
        Self {
            nb_apps: instance.nb_apps(),
            nb_nodes: instance.nb_nodes(),
            nb_requests: instance.total_requests(),
        }
    }

    pub fn region1_len(&self) -> usize {
        self.nb_apps
    }

    pub fn region2_len(&self) -> usize {
        self.nb_apps * self.nb_nodes
    }

    pub fn region3_len(&self) -> usize {
        self.nb_requests
    }

    pub fn len(&self) -> usize {
        self.region1_len() + self.region2_len() + self.region3_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn instance_fraction_index(&self, a: usize) -> usize {
        a
    }

    pub fn placement_priority_index(&self, a: usize, h: usize) -> usize {
        self.region1_len() + a * self.nb_nodes + h
    }

    pub fn request_priority_index(&self, request_rank: usize) -> usize {
        self.region1_len() + self.region2_len() + request_rank
    }
}

/// A chromosome's gene vector, paired with the layout used to read it.
#[derive(Debug, Clone)]
pub struct Chromosome {
    pub layout: GeneLayout,
    pub keys: Vec<f64>,
}

impl Chromosome {
    pub fn new(layout: GeneLayout, keys: Vec<f64>) -> Self {
        debug_assert_eq!(keys.len(), layout.len());
        Self { layout, keys }
    }

    pub fn instance_fraction(&self, a: usize) -> f64 {
        self.keys[self.layout.instance_fraction_index(a)]
    }

    pub fn placement_priority(&self, a: usize, h: usize) -> f64 {
        self.keys[self.layout.placement_priority_index(a, h)]
    }

    pub fn request_priority(&self, request_rank: usize) -> f64 {
        self.keys[self.layout.request_priority_index(request_rank)]
    }

    pub fn region1(&self) -> &[f64] {
        &self.keys[..self.layout.region1_len()]
    }

    pub fn region2(&self) -> &[f64] {
        let start = self.layout.region1_len();
        &self.keys[start..start + self.layout.region2_len()]
    }

    pub fn region3(&self) -> &[f64] {
        let start = self.layout.region1_len() + self.layout.region2_len();
        &self.keys[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::app::App;
    use crate::model::node::{Node, NodeType, PowerModel};
    use crate::model::resource::{Linear, Resource, ResourceKind};
    use std::collections::HashMap;

    fn tiny_instance() -> ProblemInstance {
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
        let net_delay = vec![vec![vec![0.0; 3]; 3]];
        let users = vec![vec![2, 0, 0]];
        ProblemInstance::new(resources, apps, nodes, net_delay, users).unwrap()
    }

    #[test]
    fn layout_region_lengths_match_instance_sizes() {
        let instance = tiny_instance();
        let layout = GeneLayout::new(&instance);
        assert_eq!(layout.region1_len(), 1);
        assert_eq!(layout.region2_len(), 3);
        assert_eq!(layout.region3_len(), instance.total_requests());
        assert_eq!(layout.len(), 1 + 3 + instance.total_requests());
    }

    #[test]
    fn region_indices_are_disjoint_and_in_bounds() {
        let instance = tiny_instance();
        let layout = GeneLayout::new(&instance);
        let keys = vec![0.5; layout.len()];
        let chromo = Chromosome::new(layout, keys);

        assert_eq!(chromo.region1().len(), layout.region1_len());
        assert_eq!(chromo.region2().len(), layout.region2_len());
        assert_eq!(chromo.region3().len(), layout.region3_len());

        for h in 0..instance.nb_nodes() {
            let idx = layout.placement_priority_index(0, h);
            assert!(idx >= layout.region1_len());
            assert!(idx < layout.region1_len() + layout.region2_len());
        }
    }
}
