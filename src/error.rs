//! Error taxonomy for the placement solver.
//!
//! Only conditions that must stop a solve *before* it starts are modeled
//! as errors. `InfeasibleInstance` and `WorkerFailure` (spec §7) are not
//! exceptions: they surface as `f64::INFINITY` sentinels inside the
//! decoder/metric/engine data path and never interrupt a run.

use thiserror::Error;

/// Errors raised while validating input or resolving names, prior to solving.
#[derive(Debug, Error)]
pub enum SolverError {
    /// Malformed JSON, unknown resource/app type, negative capacities,
    /// contradictory ranges.
    #[error("invalid input: {0}")]
    InputValidation(String),

    /// A solver or seed name did not resolve to a known implementation.
    #[error("unknown solver or seed: {0}")]
    UnknownSolverOrSeed(String),

    /// An objective name did not resolve within the metric vocabulary.
    #[error("unknown objective: {0}")]
    UnknownObjective(String),
}

pub type Result<T> = std::result::Result<T, SolverError>;
