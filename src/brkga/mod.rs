//! Single-objective BRKGA: the generic engine with `ScalarRanker` and a
//! fixed-window stagnation stopping criterion (spec C5).
//!
//! Grounded in `u-metaheur`'s `brkga::config`/`brkga::runner`, minus the
//! population mechanics (now in [`crate::engine`]) and the
//! `u-numflow`-backed RNG (replaced by a directly seeded
//! `rand_chacha::ChaCha8Rng`, since `u-numflow` is not a fetchable
//! crate — see DESIGN.md).

use crate::engine::{self, Decoder, EngineConfig, ScalarRanker};

#[derive(Debug, Clone)]
pub struct BrkgaConfig {
    pub engine: EngineConfig,
    /// Generations with no improvement before stopping (0 disables).
    pub stagnation_limit: usize,
}

impl BrkgaConfig {
    pub fn new(chromosome_length: usize) -> Self {
        Self { engine: EngineConfig::new(chromosome_length), stagnation_limit: 50 }
    }

    pub fn with_population_size(mut self, n: usize) -> Self {
        self.engine.population_size = n;
        self
    }

    pub fn with_elite_fraction(mut self, f: f64) -> Self {
        self.engine.elite_fraction = f.clamp(0.0, 1.0);
        self
    }

    pub fn with_mutant_fraction(mut self, f: f64) -> Self {
        self.engine.mutant_fraction = f.clamp(0.0, 1.0);
        self
    }

    pub fn with_elite_inheritance_prob(mut self, p: f64) -> Self {
        self.engine.elite_inheritance_prob = p.clamp(0.5, 1.0);
        self
    }

    pub fn with_max_generations(mut self, n: usize) -> Self {
        self.engine.max_generations = n;
        self
    }

    pub fn with_stagnation_limit(mut self, n: usize) -> Self {
        self.stagnation_limit = n;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.engine.parallel = parallel;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.engine.seed = Some(seed);
        self
    }
}

#[derive(Debug, Clone)]
pub struct BrkgaResult {
    pub best_keys: Vec<f64>,
    pub best_cost: f64,
    pub generations: usize,
    pub stagnated: bool,
    pub cost_history: Vec<f64>,
}

pub fn run<D: Decoder<Fitness = f64>>(decoder: &D, config: &BrkgaConfig) -> BrkgaResult {
    let mut best_cost = f64::INFINITY;
    let mut stagnation_counter = 0usize;
    let mut cost_history = Vec::with_capacity(config.engine.max_generations + 1);
    let stagnation_limit = config.stagnation_limit;

    let result = engine::run::<D, ScalarRanker, _>(decoder, &config.engine, |_gen, population, order| {
        let current_best = population[order[0]].fitness;
        if current_best < best_cost {
            best_cost = current_best;
            stagnation_counter = 0;
        } else {
            stagnation_counter += 1;
        }
        cost_history.push(best_cost);
        // spec §4.5: "best fitness reached 0" is the chromosome-specific
        // stop predicate for single-objective BRKGA, on top of stagnation.
        best_cost <= 0.0 || (stagnation_limit > 0 && stagnation_counter >= stagnation_limit)
    });

    let stagnated = stagnation_limit > 0 && stagnation_counter >= stagnation_limit;
    let best = &result.population[result.order[0]];

    BrkgaResult {
        best_keys: best.keys.clone(),
        best_cost: best.fitness,
        generations: result.generations,
        stagnated,
        cost_history,
    }
}
