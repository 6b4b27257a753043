//! The generation cycle shared by BRKGA and NSGA-II.
//!
//! Grounded in `u-metaheur`'s `brkga::runner` elite/mutant/crossover
//! loop, generalized from "sort by scalar cost" to "order by a
//! `Ranker`" so the same engine drives both a single-objective BRKGA
//! run (`ScalarRanker`) and a multi-objective NSGA-II run
//! (`ParetoRanker`, spec C6) without duplicating the population
//! machinery. `Decoder::Fitness` carries whatever the ranker needs:
//! `f64` for BRKGA, `Vec<f64>` for NSGA-II.

pub mod ranker;

pub use ranker::{ParetoRanker, Ranker, ScalarRanker};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// The only trait a problem must implement to be solved by the engine.
pub trait Decoder: Send + Sync {
    type Fitness: Clone + Send;

    fn decode(&self, keys: &[f64]) -> Self::Fitness;

    /// Domain-specific seed chromosomes to bias the initial population.
    /// `index` ranges over `0..population_size`; returning `None` falls
    /// back to uniform random keys for that slot.
    fn seed_chromosome(&self, _index: usize) -> Option<Vec<f64>> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct Individual<F> {
    pub keys: Vec<f64>,
    pub fitness: F,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub chromosome_length: usize,
    pub population_size: usize,
    pub elite_fraction: f64,
    pub mutant_fraction: f64,
    pub elite_inheritance_prob: f64,
    pub max_generations: usize,
    pub parallel: bool,
    pub seed: Option<u64>,
}

impl EngineConfig {
    pub fn new(chromosome_length: usize) -> Self {
        Self {
            chromosome_length,
            population_size: 100,
            elite_fraction: 0.20,
            mutant_fraction: 0.15,
            elite_inheritance_prob: 0.70,
            max_generations: 500,
            parallel: false,
            seed: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.chromosome_length == 0 {
            return Err("chromosome_length must be at least 1".into());
        }
        if self.population_size < 3 {
            return Err("population_size must be at least 3".into());
        }
        if self.elite_fraction + self.mutant_fraction >= 1.0 {
            return Err("elite_fraction + mutant_fraction must be < 1.0".into());
        }
        let elite_count = (self.population_size as f64 * self.elite_fraction) as usize;
        if elite_count == 0 {
            return Err("elite_fraction too small: no elite individuals".into());
        }
        if self.elite_inheritance_prob <= 0.5 {
            return Err("elite_inheritance_prob must be > 0.5".into());
        }
        if self.max_generations == 0 {
            return Err("max_generations must be at least 1".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct EngineResult<F> {
    pub population: Vec<Individual<F>>,
    /// Population indices in best-first rank order, per the `Ranker`.
    pub order: Vec<usize>,
    pub generations: usize,
    pub stopped_early: bool,
}

/// Runs the elite/mutant/crossover cycle until `max_generations` or
/// until `should_stop` returns `true` for the just-evaluated generation.
///
/// `should_stop(generation, population, order)` is consulted after every
/// generation (including generation 0, the initial population) and owns
/// any stagnation or convergence criterion (e.g. BRKGA's fixed
/// stagnation window, or NSGA-II's MGBM metric).
pub fn run<D, R, S>(decoder: &D, config: &EngineConfig, should_stop: S) -> EngineResult<D::Fitness>
where
    D: Decoder,
    R: Ranker<D::Fitness>,
    S: FnMut(usize, &[Individual<D::Fitness>], &[usize]) -> bool,
{
    run_with_ranker(decoder, config, R::order, should_stop)
}

/// As [`run`], but takes the ranking function directly instead of a
/// `Ranker` type parameter — for rankers parameterized by a runtime
/// value (e.g. NSGA-II's epsilon-preference band).
pub fn run_with_ranker<D, RankFn, S>(
    decoder: &D,
    config: &EngineConfig,
    mut rank: RankFn,
    mut should_stop: S,
) -> EngineResult<D::Fitness>
where
    D: Decoder,
    RankFn: FnMut(&[D::Fitness]) -> Vec<usize>,
    S: FnMut(usize, &[Individual<D::Fitness>], &[usize]) -> bool,
{
    config.validate().expect("invalid EngineConfig");

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed.unwrap_or_else(rand::random));

    let n = config.chromosome_length;
    let pop_size = config.population_size;
    let elite_count = ((pop_size as f64) * config.elite_fraction) as usize;
    let mutant_count = ((pop_size as f64) * config.mutant_fraction) as usize;
    let crossover_count = pop_size - elite_count - mutant_count;

    let mut population: Vec<Individual<D::Fitness>> = (0..pop_size)
        .map(|i| {
            let keys = match decoder.seed_chromosome(i) {
                Some(k) if k.len() == n => k,
                _ => (0..n).map(|_| rng.random_range(0.0..1.0)).collect(),
            };
            Individual { fitness: decoder.decode(&keys), keys }
        })
        .collect();

    let mut order = rank(&fitnesses(&population));
    let mut generations = 0;
    let mut stopped_early = should_stop(0, &population, &order);

    while !stopped_early && generations < config.max_generations {
        generations += 1;

        let mut next_gen: Vec<Individual<D::Fitness>> = Vec::with_capacity(pop_size);
        for &i in order.iter().take(elite_count) {
            next_gen.push(population[i].clone());
        }

        let mut fresh_keys: Vec<Vec<f64>> = Vec::with_capacity(mutant_count + crossover_count);
        for _ in 0..mutant_count {
            fresh_keys.push((0..n).map(|_| rng.random_range(0.0..1.0)).collect());
        }
        for _ in 0..crossover_count {
            let elite_idx = order[rng.random_range(0..elite_count)];
            let nonelite_idx = order[rng.random_range(elite_count..pop_size)];
            let keys = parameterized_uniform_crossover(
                &population[elite_idx].keys,
                &population[nonelite_idx].keys,
                config.elite_inheritance_prob,
                &mut rng,
            );
            fresh_keys.push(keys);
        }

        let fresh: Vec<Individual<D::Fitness>> = decode_many(decoder, fresh_keys, config.parallel);
        next_gen.extend(fresh);

        population = next_gen;
        order = rank(&fitnesses(&population));
        stopped_early = should_stop(generations, &population, &order);
    }

    EngineResult { population, order, generations, stopped_early }
}

/// Parameterized uniform crossover (spec §4.5 step 3): gene `j` of the
/// child is `elite[j]` with probability `q`, else `nonelite[j]`. Every
/// gene of the result is a verbatim copy of one parent's gene at that
/// index — no averaging, no new values.
pub fn parameterized_uniform_crossover(
    elite: &[f64],
    nonelite: &[f64],
    q: f64,
    rng: &mut impl Rng,
) -> Vec<f64> {
    debug_assert_eq!(elite.len(), nonelite.len());
    elite
        .iter()
        .zip(nonelite)
        .map(|(&e, &ne)| if rng.random_range(0.0..1.0) < q { e } else { ne })
        .collect()
}

fn fitnesses<F: Clone>(population: &[Individual<F>]) -> Vec<F> {
    population.iter().map(|ind| ind.fitness.clone()).collect()
}

#[cfg(feature = "parallel")]
fn decode_many<D: Decoder>(decoder: &D, keys: Vec<Vec<f64>>, parallel: bool) -> Vec<Individual<D::Fitness>> {
    if parallel {
        keys.into_par_iter()
            .map(|k| Individual { fitness: decoder.decode(&k), keys: k })
            .collect()
    } else {
        keys.into_iter()
            .map(|k| Individual { fitness: decoder.decode(&k), keys: k })
            .collect()
    }
}

#[cfg(not(feature = "parallel"))]
fn decode_many<D: Decoder>(decoder: &D, keys: Vec<Vec<f64>>, _parallel: bool) -> Vec<Individual<D::Fitness>> {
    keys.into_iter()
        .map(|k| Individual { fitness: decoder.decode(&k), keys: k })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OneMax;
    impl Decoder for OneMax {
        type Fitness = f64;
        fn decode(&self, keys: &[f64]) -> f64 {
            -(keys.iter().filter(|&&k| k > 0.5).count() as f64)
        }
    }

    #[test]
    fn scalar_engine_improves_onemax() {
        let config = EngineConfig {
            seed: Some(42),
            population_size: 60,
            max_generations: 80,
            ..EngineConfig::new(20)
        };
        let result = run::<_, ScalarRanker, _>(&OneMax, &config, |_, _, _| false);
        let best = &result.population[result.order[0]];
        assert!(best.fitness <= -15.0, "expected near-optimal, got {}", best.fitness);
    }

    #[test]
    fn should_stop_halts_before_max_generations() {
        let config = EngineConfig { seed: Some(1), max_generations: 1000, ..EngineConfig::new(10) };
        let result = run::<_, ScalarRanker, _>(&OneMax, &config, |gen, _, _| gen >= 3);
        assert_eq!(result.generations, 3);
        assert!(result.stopped_early);
    }

    proptest::proptest! {
        /// Crossover contract (spec §8 property 7): every gene of every
        /// child is a copy of one of the two parents at that index, for
        /// any parents and any inheritance probability.
        #[test]
        fn crossover_child_genes_are_always_copied_from_a_parent(
            elite in proptest::collection::vec(0.0f64..1.0, 1..30),
            nonelite_seed in proptest::collection::vec(0.0f64..1.0, 1..30),
            q in 0.0f64..1.0,
            seed in proptest::prelude::any::<u64>(),
        ) {
            let nonelite: Vec<f64> = nonelite_seed.iter().take(elite.len()).cloned().collect();
            let elite: Vec<f64> = elite.into_iter().take(nonelite.len()).collect();
            proptest::prop_assume!(!elite.is_empty());

            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let child = parameterized_uniform_crossover(&elite, &nonelite, q, &mut rng);

            for j in 0..child.len() {
                let from_elite = (child[j] - elite[j]).abs() < f64::EPSILON;
                let from_nonelite = (child[j] - nonelite[j]).abs() < f64::EPSILON;
                proptest::prop_assert!(from_elite || from_nonelite);
            }
        }
    }
}
