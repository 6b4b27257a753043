//! Node types (spec §3 "Node h").

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A node's place in the BS → CORE → CLOUD hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeType {
    Bs,
    Core,
    Cloud,
}

/// A 2-D position, present only for base stations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn distance(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// A power model `(p_idle, p_max)` used by the `power_consumption` metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerModel {
    pub idle: f64,
    pub max: f64,
}

/// A compute/storage node: base station, core, or cloud.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: usize,
    #[serde(rename = "type")]
    pub kind: NodeType,
    pub position: Option<Position>,
    /// Per-resource capacity; `f64::INFINITY` for CLOUD.
    pub capacity: HashMap<String, f64>,
    pub power: PowerModel,
    /// Per-resource linear cost `(c1, c2)`.
    pub cost: HashMap<String, super::resource::Linear>,
    pub availability: f64,
}

impl Node {
    pub fn is_base_station(&self) -> bool {
        self.kind == NodeType::Bs
    }

    pub fn capacity_of(&self, resource: &str) -> f64 {
        self.capacity.get(resource).copied().unwrap_or(0.0)
    }

    pub fn cost_of(&self, resource: &str) -> super::resource::Linear {
        self.cost
            .get(resource)
            .copied()
            .unwrap_or(super::resource::Linear::new(0.0, 0.0))
    }
}
