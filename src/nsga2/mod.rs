//! Multi-objective NSGA-II: the generic engine with the epsilon-preferred
//! Pareto ranker and the MGBM (Mutual Generational Bitwise Metric) online
//! stopping criterion (spec C6).
//!
//! Grounded in `algo/util/nsgaii.py`'s `NSGAII(BRKGA)` composition (a
//! thin dominance-and-crowding layer over the same generational loop as
//! single-objective BRKGA) — here realized as [`crate::engine`] plus
//! [`crate::engine::ranker::rank_with_epsilon`] instead of subclassing.

use crate::engine::ranker::rank_with_epsilon;
use crate::engine::{self, Decoder, EngineConfig};

#[derive(Debug, Clone)]
pub struct Nsga2Config {
    pub engine: EngineConfig,
    /// Epsilon-preference band for dominance comparisons (0.0 = strict).
    pub epsilon: f64,
    /// MGBM stop threshold: halt once the online estimator `I_t` (spec
    /// §4.6) drops below this value. `0.0` disables the criterion.
    pub mgbm_threshold: f64,
}

impl Nsga2Config {
    pub fn new(chromosome_length: usize) -> Self {
        Self {
            engine: EngineConfig::new(chromosome_length),
            epsilon: 0.0,
            mgbm_threshold: 0.02,
        }
    }

    pub fn with_population_size(mut self, n: usize) -> Self {
        self.engine.population_size = n;
        self
    }

    pub fn with_max_generations(mut self, n: usize) -> Self {
        self.engine.max_generations = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.engine.seed = Some(seed);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.engine.parallel = parallel;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_mgbm_threshold(mut self, threshold: f64) -> Self {
        self.mgbm_threshold = threshold;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Nsga2Result {
    /// Final population's gene vectors, in rank order.
    pub population: Vec<Vec<f64>>,
    /// Objective vectors, aligned with `population`.
    pub objectives: Vec<Vec<f64>>,
    /// Indices of `population` that form the non-dominated front.
    pub front_0: Vec<usize>,
    pub generations: usize,
    pub converged: bool,
}

pub fn run<D: Decoder<Fitness = Vec<f64>>>(decoder: &D, config: &Nsga2Config) -> Nsga2Result {
    let epsilon = config.epsilon;
    let mgbm_threshold = config.mgbm_threshold;
    let mut previous_front: Option<Vec<Vec<f64>>> = None;
    let mut estimate = 1.0f64;
    let mut converged = false;

    let result = engine::run_with_ranker(
        decoder,
        &config.engine,
        |fitnesses: &[Vec<f64>]| rank_with_epsilon(fitnesses, epsilon),
        |generation, population, _order| {
            let objectives: Vec<Vec<f64>> = population.iter().map(|ind| ind.fitness.clone()).collect();
            let sorted = engine::ranker::non_dominated_sort(&objectives, epsilon);
            let current_front: Vec<Vec<f64>> =
                sorted.fronts[0].iter().map(|&i| objectives[i].clone()).collect();

            if mgbm_threshold <= 0.0 {
                previous_front = Some(current_front);
                return false;
            }

            // mdr_t compares ND_{t-1} and ND_t *by objective value*, not
            // population index: indices are not stable across
            // generations since the population is re-ranked and
            // re-sorted every cycle.
            if let Some(prev) = previous_front.take() {
                let mdr = mutual_domination_rate(&prev, &current_front, epsilon);
                let t = generation as f64;
                estimate = (t / (t + 1.0)) * estimate + (1.0 / (t + 1.0)) * mdr;
            }
            previous_front = Some(current_front);

            if generation > 0 && estimate < mgbm_threshold {
                converged = true;
                true
            } else {
                false
            }
        },
    );

    let population: Vec<Vec<f64>> = result.order.iter().map(|&i| result.population[i].keys.clone()).collect();
    let objectives: Vec<Vec<f64>> = result.order.iter().map(|&i| result.population[i].fitness.clone()).collect();
    let sorted = engine::ranker::non_dominated_sort(&objectives, epsilon);
    let front_0 = sorted.fronts[0].clone();

    Nsga2Result { population, objectives, front_0, generations: result.generations, converged }
}

/// `mdr_t` (spec §4.6): the fraction of the previous front newly
/// dominated by the current front, minus the fraction of the current
/// front dominated by the previous one. Positive when the search is
/// still improving the front; near zero once it stagnates.
fn mutual_domination_rate(previous: &[Vec<f64>], current: &[Vec<f64>], epsilon: f64) -> f64 {
    if previous.is_empty() || current.is_empty() {
        return 0.0;
    }
    let dominated_prev = previous
        .iter()
        .filter(|u| current.iter().any(|v| engine::ranker::dominates(v, u, epsilon)))
        .count();
    let dominated_curr = current
        .iter()
        .filter(|v| previous.iter().any(|u| engine::ranker::dominates(u, v, epsilon)))
        .count();
    dominated_prev as f64 / previous.len() as f64 - dominated_curr as f64 / current.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TwoObjective;
    impl Decoder for TwoObjective {
        type Fitness = Vec<f64>;
        fn decode(&self, keys: &[f64]) -> Vec<f64> {
            let x = keys[0];
            vec![x, 1.0 - x]
        }
    }

    #[test]
    fn front_0_is_non_dominated() {
        let config = Nsga2Config::new(1).with_population_size(40).with_max_generations(30).with_seed(7);
        let result = run(&TwoObjective, &config);
        assert!(!result.front_0.is_empty());
        for &i in &result.front_0 {
            for &j in &result.front_0 {
                if i == j {
                    continue;
                }
                let a = &result.objectives[i];
                let b = &result.objectives[j];
                let a_dominates = a[0] <= b[0] && a[1] <= b[1] && (a[0] < b[0] || a[1] < b[1]);
                assert!(!a_dominates, "front-0 member should not dominate another front-0 member");
            }
        }
    }

    #[test]
    fn mdr_is_zero_when_front_is_unchanged() {
        let front = vec![vec![1.0, 5.0], vec![3.0, 3.0], vec![5.0, 1.0]];
        let mdr = mutual_domination_rate(&front, &front, 0.0);
        assert_eq!(mdr, 0.0);
    }

    #[test]
    fn mdr_is_positive_when_current_front_dominates_previous() {
        let previous = vec![vec![5.0, 5.0], vec![6.0, 6.0]];
        let current = vec![vec![1.0, 1.0], vec![2.0, 2.0]];
        let mdr = mutual_domination_rate(&previous, &current, 0.0);
        assert!(mdr > 0.0, "expected positive mdr, got {mdr}");
    }

    #[test]
    fn mgbm_stops_within_harmonic_bound_on_a_stationary_population() {
        struct Constant;
        impl Decoder for Constant {
            type Fitness = Vec<f64>;
            fn decode(&self, _keys: &[f64]) -> Vec<f64> {
                vec![1.0, 1.0]
            }
        }
        let threshold = 0.2;
        let config = Nsga2Config::new(1)
            .with_population_size(10)
            .with_max_generations(1000)
            .with_mgbm_threshold(threshold)
            .with_seed(3);
        let result = run(&Constant, &config);
        assert!(result.converged);
        let bound = (1.0 / threshold).ceil() as usize + 1;
        assert!(result.generations <= bound, "stopped at {} generations, expected <= {bound}", result.generations);
    }
}
