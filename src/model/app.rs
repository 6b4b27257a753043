//! Application types (spec §3 "Application a").

use super::resource::Linear;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A latency-sensitive application instantiated across the infrastructure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct App {
    pub id: usize,
    #[serde(rename = "type")]
    pub type_tag: String,
    /// Maximum tolerable end-to-end delay.
    pub deadline: f64,
    /// CPU cycles consumed per request.
    pub work_size: f64,
    /// Requests per second, per user.
    pub request_rate: f64,
    /// Upper bound on the number of simultaneous instances (`1..=|Nodes|`).
    pub max_instances: usize,
    pub availability: f64,
    /// Per-resource linear demand `(k1, k2)`: `demand = k1 * load + k2 * placed`.
    pub demand: HashMap<String, Linear>,
}

impl App {
    pub fn demand_of(&self, resource: &str) -> Linear {
        self.demand.get(resource).copied().unwrap_or(Linear::new(0.0, 0.0))
    }

    pub fn cpu_demand(&self) -> Linear {
        self.demand_of(super::resource::CPU)
    }

    /// `Requests[a][b] = ceil(Users[a][b] * request_rate_a)`.
    pub fn requests_from(&self, users: u64) -> u64 {
        (users as f64 * self.request_rate).ceil() as u64
    }
}
