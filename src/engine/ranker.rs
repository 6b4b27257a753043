//! Orders a population best-first for the engine's elite/crossover split.
//!
//! `ScalarRanker` is a direct sort on a single cost (BRKGA). `ParetoRanker`
//! ports `ga::multi_objective::{non_dominated_sort, crowding_distance}`
//! from the teacher, adding an epsilon-preferred dominance mode (spec
//! C6): two solutions within `epsilon` of each other on every objective
//! are treated as mutually non-dominating, which keeps near-tied
//! solutions in the same front instead of letting floating-point noise
//! split them arbitrarily.

/// Orders `fitnesses` best-first; the returned vector is a permutation
/// of `0..fitnesses.len()`.
pub trait Ranker<F> {
    fn order(fitnesses: &[F]) -> Vec<usize>;
}

pub struct ScalarRanker;

impl Ranker<f64> for ScalarRanker {
    fn order(fitnesses: &[f64]) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..fitnesses.len()).collect();
        idx.sort_by(|&a, &b| fitnesses[a].partial_cmp(&fitnesses[b]).unwrap_or(std::cmp::Ordering::Equal));
        idx
    }
}

/// `epsilon`-preferred Pareto ranker: front, then descending crowding
/// distance within each front.
pub struct ParetoRanker;

impl Ranker<Vec<f64>> for ParetoRanker {
    fn order(fitnesses: &[Vec<f64>]) -> Vec<usize> {
        rank_with_epsilon(fitnesses, 0.0)
    }
}

pub fn rank_with_epsilon(objectives: &[Vec<f64>], epsilon: f64) -> Vec<usize> {
    if objectives.is_empty() {
        return Vec::new();
    }
    let sorted = non_dominated_sort(objectives, epsilon);
    let mut order = Vec::with_capacity(objectives.len());
    for front in &sorted.fronts {
        let front_objs: Vec<Vec<f64>> = front.iter().map(|&i| objectives[i].clone()).collect();
        let distances = crowding_distance(&front_objs);
        let mut ranked: Vec<(usize, f64)> = front.iter().copied().zip(distances).collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        order.extend(ranked.into_iter().map(|(i, _)| i));
    }
    order
}

#[derive(Debug, Clone)]
pub struct NondominatedSortResult {
    pub ranks: Vec<usize>,
    pub fronts: Vec<Vec<usize>>,
}

pub fn non_dominated_sort(objectives: &[Vec<f64>], epsilon: f64) -> NondominatedSortResult {
    let n = objectives.len();
    assert!(n > 0, "objectives must not be empty");

    if n == 1 {
        return NondominatedSortResult { ranks: vec![0], fronts: vec![vec![0]] };
    }

    let mut domination_count = vec![0usize; n];
    let mut dominated_by: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut ranks = vec![0usize; n];
    let mut front_0 = Vec::new();

    for i in 0..n {
        for j in (i + 1)..n {
            match dominance_cmp(&objectives[i], &objectives[j], epsilon) {
                Dominance::Left => {
                    dominated_by[i].push(j);
                    domination_count[j] += 1;
                }
                Dominance::Right => {
                    dominated_by[j].push(i);
                    domination_count[i] += 1;
                }
                Dominance::Neither => {}
            }
        }
        if domination_count[i] == 0 {
            ranks[i] = 0;
            front_0.push(i);
        }
    }

    let mut fronts = vec![front_0];
    loop {
        let current = fronts.last().expect("fronts always has at least one entry");
        let mut next_front = Vec::new();
        for &i in current {
            for &j in &dominated_by[i] {
                domination_count[j] -= 1;
                if domination_count[j] == 0 {
                    ranks[j] = fronts.len();
                    next_front.push(j);
                }
            }
        }
        if next_front.is_empty() {
            break;
        }
        fronts.push(next_front);
    }

    NondominatedSortResult { ranks, fronts }
}

#[derive(Debug, PartialEq)]
enum Dominance {
    Left,
    Right,
    Neither,
}

/// `true` iff `a` dominates `b` under minimization with an
/// epsilon-preference band (used by NSGA-II's MGBM stopping estimator to
/// compare fronts across generations, where population indices are not
/// stable).
pub fn dominates(a: &[f64], b: &[f64], epsilon: f64) -> bool {
    dominance_cmp(a, b, epsilon) == Dominance::Left
}

/// Minimization dominance (spec §4.6). With `epsilon <= 0.0`, this is
/// plain Pareto dominance over every coordinate. With `epsilon > 0.0`,
/// coordinate 0 is the designated *preferred* objective: if the gap on
/// coordinate 0 exceeds `epsilon`, the comparison is decided by
/// coordinate 0 alone (single-objective fall-through); otherwise
/// coordinate 0 is ignored and dominance is decided on the remaining
/// coordinates only.
fn dominance_cmp(a: &[f64], b: &[f64], epsilon: f64) -> Dominance {
    if epsilon > 0.0 && !a.is_empty() {
        if (a[0] - b[0]).abs() > epsilon {
            return if a[0] < b[0] { Dominance::Left } else { Dominance::Right };
        }
        return plain_dominance(&a[1..], &b[1..]);
    }
    plain_dominance(a, b)
}

fn plain_dominance(a: &[f64], b: &[f64]) -> Dominance {
    let mut a_better = false;
    let mut b_better = false;
    for (&va, &vb) in a.iter().zip(b.iter()) {
        if va < vb {
            a_better = true;
        } else if vb < va {
            b_better = true;
        }
    }
    match (a_better, b_better) {
        (true, false) => Dominance::Left,
        (false, true) => Dominance::Right,
        _ => Dominance::Neither,
    }
}

/// Finite sentinel for boundary/singleton crowding distance (spec §4.6,
/// §9 ambiguity (iii)): some sources use `+inf`, but this spec fixes a
/// finite ceiling so the MGBM stopping estimator's arithmetic never sees
/// an infinity.
pub const MAX_CRWD_DIST: f64 = 1.0;

pub fn crowding_distance(objectives: &[Vec<f64>]) -> Vec<f64> {
    let n = objectives.len();
    if n <= 2 {
        return vec![MAX_CRWD_DIST; n];
    }

    let m = objectives[0].len();
    let mut distances = vec![0.0f64; n];

    for obj_idx in 0..m {
        let mut indices: Vec<usize> = (0..n).collect();
        indices.sort_by(|&a, &b| {
            objectives[a][obj_idx]
                .partial_cmp(&objectives[b][obj_idx])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        distances[indices[0]] = MAX_CRWD_DIST;
        distances[indices[n - 1]] = MAX_CRWD_DIST;

        let min_val = objectives[indices[0]][obj_idx];
        let max_val = objectives[indices[n - 1]][obj_idx];
        let range = max_val - min_val;

        if range > 0.0 {
            for i in 1..(n - 1) {
                let prev = objectives[indices[i - 1]][obj_idx];
                let next = objectives[indices[i + 1]][obj_idx];
                distances[indices[i]] += (next - prev) / range;
            }
        }
    }

    distances
}
