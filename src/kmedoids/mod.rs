//! K-medoids clustering with silhouette-score model selection (spec C1).
//!
//! Grounded in `algo/util/kmedoids.py`: a deterministic priority-based
//! initial-medoid heuristic (not random restarts), an assign/update loop
//! capped at a fixed iteration budget, and a silhouette score used by
//! callers (the seed library, C7) to pick `k`.
//!
//! `fit` clusters a *feature set* `points` (a subset of node indices) but
//! reads distances from the *full* node-to-node matrix `D`, so medoid
//! candidates come only from `points` while distance-to-nearest-medoid
//! can still be evaluated for any node in the full set (used by the seed
//! library to score nodes outside the clustered feature set).

const MAX_ITERATIONS: usize = 300;

/// The result of fitting k-medoids: `k` node-sets (possibly empty) plus
/// their medoids, both expressed in full node-index space.
#[derive(Debug, Clone)]
pub struct Clustering {
    /// `clusters[c]` is the set of `points` assigned to cluster `c`.
    pub clusters: Vec<Vec<usize>>,
    /// `medoids[c]` is the node index acting as cluster `c`'s medoid, or
    /// `None` if cluster `c` has no medoid (only possible when `k`
    /// exceeds `points.len()`).
    pub medoids: Vec<Option<usize>>,
}

impl Clustering {
    fn empty(k: usize) -> Self {
        Self { clusters: vec![Vec::new(); k], medoids: vec![None; k] }
    }

    /// The distance from `node` to its nearest medoid under `distances`,
    /// or `+inf` if no cluster has a medoid.
    pub fn distance_to_nearest_medoid(&self, node: usize, distances: &[Vec<f64>]) -> f64 {
        self.medoids
            .iter()
            .filter_map(|m| m.map(|medoid| distances[node][medoid]))
            .fold(f64::INFINITY, f64::min)
    }
}

/// Stateful k-medoids fitter that remembers the medoids of its most
/// recent `fit` call, mirroring the original's `last_medoids()` accessor.
#[derive(Debug, Default)]
pub struct KMedoids {
    last_medoids: Vec<usize>,
}

impl KMedoids {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clusters `points` (node indices) into `k` groups using pairwise
    /// distances from the full `distances` matrix. Degenerate inputs
    /// (`k == 0` or `points` empty) yield `k` empty clusters, never an
    /// error (spec §4.1 error semantics).
    pub fn fit(&mut self, k: usize, points: &[usize], distances: &[Vec<f64>]) -> Clustering {
        if k == 0 || points.is_empty() {
            self.last_medoids = Vec::new();
            return Clustering::empty(k);
        }

        let mut medoids = initial_medoids(k, points, distances);
        let mut assignment = assign(&medoids, points, distances);

        for _ in 0..MAX_ITERATIONS {
            let new_medoids = update_medoids(&assignment, &medoids, points, distances);
            let new_assignment = assign(&new_medoids, points, distances);
            let changed = new_medoids != medoids;
            medoids = new_medoids;
            assignment = new_assignment;
            if !changed {
                break;
            }
        }

        self.last_medoids = medoids.iter().filter_map(|m| *m).collect();

        let mut clusters = vec![Vec::new(); k];
        for (&point, &cluster) in points.iter().zip(assignment.iter()) {
            clusters[cluster].push(point);
        }
        Clustering { clusters, medoids }
    }

    /// Medoids computed by the most recent call to `fit`.
    pub fn last_medoids(&self) -> &[usize] {
        &self.last_medoids
    }
}

/// Deterministic initial-medoid heuristic: each candidate's priority is
/// the sum, over all points, of its distance share of that point's total
/// distance to every candidate; the `k` lowest-priority (most central)
/// points become the initial medoids. Real-world inputs rarely have more
/// than a few hundred candidate nodes, so the O(k * |points|) selection
/// below is not a bottleneck.
fn initial_medoids(k: usize, points: &[usize], distances: &[Vec<f64>]) -> Vec<Option<usize>> {
    let row_sums: Vec<f64> = points.iter().map(|&i| points.iter().map(|&l| distances[i][l]).sum()).collect();

    let mut priority: Vec<(usize, f64)> = points
        .iter()
        .enumerate()
        .map(|(jidx, &j)| {
            let p: f64 = points
                .iter()
                .enumerate()
                .map(|(iidx, &i)| {
                    if row_sums[iidx] > 0.0 {
                        distances[i][j] / row_sums[iidx]
                    } else {
                        0.0
                    }
                })
                .sum();
            (jidx, p)
        })
        .collect();
    priority.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());

    let mut medoids: Vec<Option<usize>> = priority.into_iter().take(k).map(|(jidx, _)| Some(points[jidx])).collect();
    medoids.resize(k, None);
    medoids
}

fn assign(medoids: &[Option<usize>], points: &[usize], distances: &[Vec<f64>]) -> Vec<usize> {
    points
        .iter()
        .map(|&i| {
            medoids
                .iter()
                .enumerate()
                .filter_map(|(c, m)| m.map(|medoid| (c, distances[i][medoid])))
                .min_by(|(_, d1), (_, d2)| d1.partial_cmp(d2).unwrap())
                .map(|(c, _)| c)
                .unwrap_or(0)
        })
        .collect()
}

fn update_medoids(
    assignment: &[usize],
    previous: &[Option<usize>],
    points: &[usize],
    distances: &[Vec<f64>],
) -> Vec<Option<usize>> {
    (0..previous.len())
        .map(|c| {
            let members: Vec<usize> =
                points.iter().zip(assignment).filter_map(|(&p, &ci)| (ci == c).then_some(p)).collect();
            if members.is_empty() {
                return previous[c];
            }
            members
                .iter()
                .copied()
                .min_by(|&i, &j| {
                    let cost_i: f64 = members.iter().map(|&m| distances[i][m]).sum();
                    let cost_j: f64 = members.iter().map(|&m| distances[j][m]).sum();
                    cost_i.partial_cmp(&cost_j).unwrap()
                })
                .map(Some)
                .unwrap_or(previous[c])
        })
        .collect()
}

/// Mean silhouette coefficient of a clustering over `distances`
/// (restricted to `points`). Clusters of size <= 1 contribute 0 for
/// their member(s); `k <= 1` returns 0 (spec §4.1).
pub fn silhouette_score(clustering: &Clustering, distances: &[Vec<f64>]) -> f64 {
    let k = clustering.clusters.len();
    let n: usize = clustering.clusters.iter().map(|c| c.len()).sum();
    if n == 0 || k <= 1 {
        return 0.0;
    }
    let total: f64 = clustering
        .clusters
        .iter()
        .enumerate()
        .flat_map(|(c, members)| members.iter().map(move |&i| datum_silhouette(i, c, &clustering.clusters, distances)))
        .sum();
    total / n as f64
}

fn datum_silhouette(i: usize, own: usize, clusters: &[Vec<usize>], distances: &[Vec<f64>]) -> f64 {
    let own_members = &clusters[own];
    if own_members.len() <= 1 {
        return 0.0;
    }
    let a = own_members.iter().filter(|&&j| j != i).map(|&j| distances[i][j]).sum::<f64>()
        / (own_members.len() - 1) as f64;

    let b = clusters
        .iter()
        .enumerate()
        .filter(|&(c, members)| c != own && !members.is_empty())
        .map(|(_, members)| members.iter().map(|&j| distances[i][j]).sum::<f64>() / members.len() as f64)
        .fold(f64::INFINITY, f64::min);

    if b.is_infinite() {
        return 0.0;
    }
    let denom = a.max(b);
    if denom <= 0.0 {
        0.0
    } else {
        (b - a) / denom
    }
}

/// Picks the cluster count in `candidates` with the highest silhouette
/// score, breaking ties toward the smaller `k`. Falls back to `k = 1`
/// (a single, trivial cluster holding all of `points`) if `candidates`
/// is empty.
pub fn select_k(km: &mut KMedoids, candidates: &[usize], points: &[usize], distances: &[Vec<f64>]) -> (usize, Clustering) {
    let mut best: Option<(usize, Clustering, f64)> = None;
    for &k in candidates {
        let clustering = km.fit(k, points, distances);
        let score = silhouette_score(&clustering, distances);
        best = match best {
            Some((bk, bc, bs)) if bs >= score => Some((bk, bc, bs)),
            _ => Some((k, clustering, score)),
        };
    }
    best.map(|(k, c, _)| (k, c)).unwrap_or_else(|| (1, km.fit(1, points, distances)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_distances(points: &[f64]) -> Vec<Vec<f64>> {
        points.iter().map(|&p| points.iter().map(|&q| (p - q).abs()).collect()).collect()
    }

    #[test]
    fn fit_separates_two_obvious_clusters() {
        let points_pos = [0.0, 0.1, 0.2, 10.0, 10.1, 10.2];
        let d = line_distances(&points_pos);
        let points: Vec<usize> = (0..6).collect();
        let mut km = KMedoids::new();
        let clustering = km.fit(2, &points, &d);
        let find = |node: usize| clustering.clusters.iter().position(|c| c.contains(&node)).unwrap();
        assert_eq!(find(0), find(1));
        assert_eq!(find(1), find(2));
        assert_eq!(find(3), find(4));
        assert_eq!(find(4), find(5));
        assert_ne!(find(0), find(3));
    }

    #[test]
    fn silhouette_is_high_for_well_separated_clusters() {
        let points_pos = [0.0, 0.1, 0.2, 10.0, 10.1, 10.2];
        let d = line_distances(&points_pos);
        let points: Vec<usize> = (0..6).collect();
        let mut km = KMedoids::new();
        let clustering = km.fit(2, &points, &d);
        let score = silhouette_score(&clustering, &d);
        assert!(score > 0.8, "expected high silhouette, got {score}");
    }

    #[test]
    fn select_k_prefers_the_better_separated_split() {
        let points_pos = [0.0, 0.1, 0.2, 10.0, 10.1, 10.2];
        let d = line_distances(&points_pos);
        let points: Vec<usize> = (0..6).collect();
        let mut km = KMedoids::new();
        let (k, _) = select_k(&mut km, &[1, 2, 3], &points, &d);
        assert_eq!(k, 2);
    }

    #[test]
    fn fit_is_degenerate_safe_for_zero_k_or_empty_points() {
        let d = line_distances(&[0.0, 1.0]);
        let mut km = KMedoids::new();
        assert!(km.fit(0, &[0, 1], &d).clusters.is_empty());
        assert_eq!(km.fit(3, &[0, 1], &d).clusters.len(), 3);
    }

    #[test]
    fn nine_point_line_prefers_three_clusters_over_two_or_four() {
        // Three well-separated groups of three collinear points each.
        let points_pos: Vec<f64> =
            vec![0.0, 0.2, 0.4, 10.0, 10.2, 10.4, 20.0, 20.2, 20.4];
        let d = line_distances(&points_pos);
        let points: Vec<usize> = (0..9).collect();
        let mut km = KMedoids::new();
        let score_for = |k: usize, km: &mut KMedoids| {
            let clustering = km.fit(k, &points, &d);
            silhouette_score(&clustering, &d)
        };
        let s2 = score_for(2, &mut km);
        let s3 = score_for(3, &mut km);
        let s4 = score_for(4, &mut km);
        assert!(s3 > s2, "k=3 ({s3}) should beat k=2 ({s2})");
        assert!(s3 > s4, "k=3 ({s3}) should beat k=4 ({s4})");
    }
}
