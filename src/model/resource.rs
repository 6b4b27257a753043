//! Resource catalog (spec §3 "Resources").

use serde::{Deserialize, Serialize};

/// The resource kind the generator / JSON schema calls a "numeric type".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Int,
    Float,
}

/// A single named, typed resource (e.g. CPU, STORAGE).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub unit: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    #[serde(default = "default_precision")]
    pub precision: u32,
}

fn default_precision() -> u32 {
    4
}

/// The distinguished CPU resource name, matched case-sensitively as in
/// `util/model.py`.
pub const CPU: &str = "CPU";

/// A linear demand/cost model `(k1, k2)`: `value = k1 * x + k2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Linear {
    pub k1: f64,
    pub k2: f64,
}

impl Linear {
    pub fn new(k1: f64, k2: f64) -> Self {
        Self { k1, k2 }
    }

    pub fn eval(&self, x: f64) -> f64 {
        self.k1 * x + self.k2
    }
}
