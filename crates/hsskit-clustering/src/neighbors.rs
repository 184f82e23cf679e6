//! Approximate nearest neighbor search with randomized projection trees
//!
//! Each round builds one projection tree (split at a jittered median of the
//! projection on a random unit direction), brute-forces the neighbors inside
//! every leaf, merges them into the running best-k lists and then refines the
//! lists with neighbors of neighbors. Rounds stop once a sampled quality
//! estimate reaches the target or the iteration budget is spent.

use crate::binmatrix::{read_binmatrix, write_binmatrix};
use crate::error::{ClusteringError, Result};
use crate::metrics::{dot, euclidean_distance_squared};
use hsskit_dense::Matrix;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Options for [`find_approximate_neighbors`]
#[derive(Debug, Clone)]
pub struct AnnOptions {
    /// Neighbors per point (clamped to `n - 1`)
    pub k: usize,
    /// Maximum number of projection-tree rounds
    pub max_iterations: usize,
    /// Leaves hold at least `leaf_multiplier * k` points
    pub leaf_multiplier: usize,
    /// Points checked against exact neighbors after each round
    pub quality_samples: usize,
    /// Stop once the estimated quality reaches this value
    pub target_quality: f64,
    /// Seed of the random directions and quality samples
    pub seed: u64,
}

impl Default for AnnOptions {
    fn default() -> Self {
        Self {
            k: 64,
            max_iterations: 5,
            leaf_multiplier: 6,
            quality_samples: 100,
            target_quality: 0.99,
            seed: 0,
        }
    }
}

impl AnnOptions {
    /// Set the number of neighbors
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Set the iteration budget
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Outcome of a neighbor search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnReport {
    /// Estimated fraction of true neighbors found
    pub quality: f64,
    /// Rounds performed
    pub iterations: usize,
}

/// Neighbor ids and squared distances, one column per point
///
/// Column `i` lists the neighbors of point `i` by increasing distance; a
/// point is never its own neighbor.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborTable {
    neighbors: Matrix<u32>,
    scores: Matrix<f64>,
}

impl NeighborTable {
    /// Build from `k x n` id and distance matrices
    pub fn from_parts(neighbors: Matrix<u32>, scores: Matrix<f64>) -> Result<Self> {
        if neighbors.shape() != scores.shape() {
            return Err(ClusteringError::InvalidArgument {
                message: format!(
                    "neighbor ids {:?} and scores {:?} differ in shape",
                    neighbors.shape(),
                    scores.shape()
                ),
            });
        }
        Ok(Self { neighbors, scores })
    }

    /// Neighbors per point
    pub fn k(&self) -> usize {
        self.neighbors.nrows()
    }

    /// Number of points
    pub fn n(&self) -> usize {
        self.neighbors.ncols()
    }

    /// `j`-th closest neighbor of point `i`
    pub fn neighbor(&self, j: usize, i: usize) -> usize {
        self.neighbors[[j, i]] as usize
    }

    /// Squared distance from point `i` to its `j`-th closest neighbor
    pub fn score(&self, j: usize, i: usize) -> f64 {
        self.scores[[j, i]]
    }

    /// Neighbor ids (`k x n`)
    pub fn neighbors(&self) -> &Matrix<u32> {
        &self.neighbors
    }

    /// Squared distances (`k x n`)
    pub fn scores(&self) -> &Matrix<f64> {
        &self.scores
    }

    /// Cache file names for `(k, n)` inside `folder`
    pub fn cache_paths(folder: &Path, k: usize, n: usize) -> (PathBuf, PathBuf) {
        (
            folder.join(format!("ann_{k}_{n}.binmatrix")),
            folder.join(format!("scores_{k}_{n}.binmatrix")),
        )
    }

    /// Load a cached table, or `None` if the files are missing or corrupt
    pub fn load(folder: &Path, k: usize, n: usize) -> Option<Self> {
        let (ann_path, scores_path) = Self::cache_paths(folder, k, n);
        if !ann_path.is_file() || !scores_path.is_file() {
            log::debug!("no cached neighbors in {}", folder.display());
            return None;
        }
        let loaded = read_binmatrix::<u32>(&ann_path, k, n)
            .and_then(|nb| Ok((nb, read_binmatrix::<f64>(&scores_path, k, n)?)));
        match loaded {
            Ok((neighbors, scores)) if neighbors.as_slice().iter().all(|&j| (j as usize) < n) => {
                log::info!("read cached neighbors from {}", ann_path.display());
                Some(Self { neighbors, scores })
            }
            Ok(_) => {
                log::warn!("ignoring {}: neighbor id out of range", ann_path.display());
                None
            }
            Err(e) => {
                log::warn!("ignoring cached neighbors: {e}");
                None
            }
        }
    }

    /// Write the table to the cache files for its `(k, n)`
    pub fn save(&self, folder: &Path) -> Result<()> {
        std::fs::create_dir_all(folder)?;
        let (ann_path, scores_path) = Self::cache_paths(folder, self.k(), self.n());
        write_binmatrix(&ann_path, &self.neighbors)?;
        write_binmatrix(&scores_path, &self.scores)?;
        log::debug!("wrote neighbors to {}", ann_path.display());
        Ok(())
    }
}

type Candidates = Vec<(f64, u32)>;

fn by_distance(a: &(f64, u32), b: &(f64, u32)) -> std::cmp::Ordering {
    a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
}

/// Find `k` approximate nearest neighbors of every row of `points`
///
/// Returns exactly `min(k, n - 1)` neighbors per point.
pub fn find_approximate_neighbors(
    points: &Matrix<f64>,
    opts: &AnnOptions,
) -> Result<(NeighborTable, AnnReport)> {
    let n = points.nrows();
    if n > u32::MAX as usize {
        return Err(ClusteringError::InvalidArgument {
            message: format!("{n} points exceed the 32-bit neighbor id range"),
        });
    }
    let k = opts.k.min(n.saturating_sub(1));
    if k == 0 {
        let table = NeighborTable {
            neighbors: Matrix::zeros(0, n),
            scores: Matrix::zeros(0, n),
        };
        return Ok((
            table,
            AnnReport {
                quality: 1.0,
                iterations: 0,
            },
        ));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(opts.seed);
    let min_leaf = (opts.leaf_multiplier * k).max(k + 1);
    let mut best: Vec<Candidates> = vec![Vec::new(); n];
    let mut quality = 0.0;
    let mut iterations = 0;

    while iterations < opts.max_iterations.max(1) {
        iterations += 1;
        let mut idx: Vec<usize> = (0..n).collect();
        let mut leaves = Vec::new();
        projection_tree_leaves(points, &mut idx, min_leaf, &mut rng, &mut leaves);

        let found: Vec<Vec<(usize, Candidates)>> = leaves
            .par_iter()
            .map(|leaf| leaf_neighbors(points, leaf, k))
            .collect();
        for (i, cand) in found.into_iter().flatten() {
            merge_best(&mut best[i], &cand, k);
        }
        refine_with_neighbors_of_neighbors(points, &mut best, k);

        quality = estimate_quality(points, &best, k, opts.quality_samples, &mut rng);
        log::debug!(
            "ANN round {iterations}: {} leaves, quality {quality:.4}",
            leaves.len()
        );
        if quality >= opts.target_quality {
            break;
        }
    }
    log::info!("ANN search quality = {quality:.4} after {iterations} iterations (k = {k})");

    let neighbors = Matrix::from_fn(k, n, |j, i| best[i][j].1);
    let scores = Matrix::from_fn(k, n, |j, i| best[i][j].0);
    Ok((
        NeighborTable { neighbors, scores },
        AnnReport {
            quality,
            iterations,
        },
    ))
}

/// Split `idx` recursively until fewer than `2 * min_leaf` points remain
fn projection_tree_leaves(
    points: &Matrix<f64>,
    idx: &mut [usize],
    min_leaf: usize,
    rng: &mut ChaCha8Rng,
    leaves: &mut Vec<Vec<usize>>,
) {
    let len = idx.len();
    if len < 2 * min_leaf {
        leaves.push(idx.to_vec());
        return;
    }
    let d = points.ncols();
    let mut dir: Vec<f64> = (0..d).map(|_| StandardNormal.sample(rng)).collect();
    let norm = dir.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        dir.iter_mut().for_each(|x| *x /= norm);
    }

    // jitter the split point so consecutive trees differ even on
    // degenerate data
    let jitter = len / 8;
    let mut pos = len / 2;
    if jitter > 0 {
        pos = pos - jitter + rng.random_range(0..=2 * jitter);
    }
    let pos = pos.clamp(min_leaf, len - min_leaf);

    let mut proj: Vec<(f64, usize)> = idx.iter().map(|&i| (dot(points.row(i), &dir), i)).collect();
    proj.select_nth_unstable_by(pos, |a, b| a.0.total_cmp(&b.0));
    for (slot, (_, i)) in idx.iter_mut().zip(proj) {
        *slot = i;
    }
    let (left, right) = idx.split_at_mut(pos);
    projection_tree_leaves(points, left, min_leaf, rng, leaves);
    projection_tree_leaves(points, right, min_leaf, rng, leaves);
}

/// Exact `k` nearest neighbors of every leaf point among the leaf
fn leaf_neighbors(points: &Matrix<f64>, leaf: &[usize], k: usize) -> Vec<(usize, Candidates)> {
    leaf.iter()
        .map(|&i| {
            let xi = points.row(i);
            let mut cand: Candidates = leaf
                .iter()
                .filter(|&&j| j != i)
                .map(|&j| (euclidean_distance_squared(xi, points.row(j)), j as u32))
                .collect();
            if cand.len() > k {
                cand.select_nth_unstable_by(k - 1, by_distance);
                cand.truncate(k);
            }
            cand.sort_by(by_distance);
            (i, cand)
        })
        .collect()
}

/// Merge sorted `cand` into sorted `best`, keeping the `k` closest distinct ids
fn merge_best(best: &mut Candidates, cand: &[(f64, u32)], k: usize) {
    let mut out: Candidates = Vec::with_capacity(k);
    let (mut a, mut b) = (0, 0);
    while out.len() < k && (a < best.len() || b < cand.len()) {
        let take_a = b >= cand.len()
            || (a < best.len() && by_distance(&best[a], &cand[b]) != std::cmp::Ordering::Greater);
        let next = if take_a {
            a += 1;
            best[a - 1]
        } else {
            b += 1;
            cand[b - 1]
        };
        if !out.iter().any(|x| x.1 == next.1) {
            out.push(next);
        }
    }
    *best = out;
}

fn refine_with_neighbors_of_neighbors(points: &Matrix<f64>, best: &mut [Candidates], k: usize) {
    let snapshot: Vec<Vec<u32>> = best.iter().map(|b| b.iter().map(|x| x.1).collect()).collect();
    best.par_iter_mut().enumerate().for_each(|(i, list)| {
        let xi = points.row(i);
        let mut cand: Candidates = Vec::new();
        for &j in &snapshot[i] {
            for &l in &snapshot[j as usize] {
                if l as usize != i && !snapshot[i].contains(&l) {
                    cand.push((euclidean_distance_squared(xi, points.row(l as usize)), l));
                }
            }
        }
        cand.sort_by(by_distance);
        cand.dedup_by_key(|x| x.1);
        merge_best(list, &cand, k);
    });
}

/// Average fraction of approximate neighbors that are within the true
/// `k`-th neighbor distance, over a random sample of points
fn estimate_quality(
    points: &Matrix<f64>,
    best: &[Candidates],
    k: usize,
    samples: usize,
    rng: &mut ChaCha8Rng,
) -> f64 {
    let n = points.nrows();
    let m = samples.min(n).max(1);
    let picked: Vec<usize> = sample(rng, n, m).into_vec();
    let total: f64 = picked
        .par_iter()
        .map(|&i| {
            let xi = points.row(i);
            let mut d: Vec<f64> = (0..n)
                .filter(|&j| j != i)
                .map(|j| euclidean_distance_squared(xi, points.row(j)))
                .collect();
            let (_, kth, _) = d.select_nth_unstable_by(k - 1, |a, b| a.total_cmp(b));
            // ties at the k-th distance count as found
            let kth = *kth * (1.0 + 1e-12);
            let found = best[i].iter().filter(|x| x.0 <= kth).count();
            found as f64 / k as f64
        })
        .sum();
    total / m as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gaussian_points(n: usize, d: usize, seed: u64) -> Matrix<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Matrix::from_fn(n, d, |_, _| StandardNormal.sample(&mut rng))
    }

    #[test]
    fn test_merge_best_dedups_and_truncates() {
        let mut best = vec![(1.0, 3), (2.0, 5), (4.0, 7)];
        let cand = vec![(0.5, 9), (2.0, 5), (3.0, 1)];
        merge_best(&mut best, &cand, 4);
        assert_eq!(best, vec![(0.5, 9), (1.0, 3), (2.0, 5), (3.0, 1)]);
    }

    #[test]
    fn test_small_set_is_exact() {
        // k >= n: one leaf, exact answer with n - 1 neighbors
        let pts = gaussian_points(12, 3, 1);
        let (table, report) = find_approximate_neighbors(&pts, &AnnOptions::default().with_k(50)).unwrap();
        assert_eq!(table.k(), 11);
        assert_eq!(report.quality, 1.0);
        for i in 0..12 {
            let mut ids: Vec<usize> = (0..11).map(|j| table.neighbor(j, i)).collect();
            assert!(!ids.contains(&i));
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), 11);
        }
    }

    #[test]
    fn test_scores_are_sorted_squared_distances() {
        let pts = gaussian_points(200, 2, 3);
        let (table, _) = find_approximate_neighbors(&pts, &AnnOptions::default().with_k(5)).unwrap();
        for i in 0..200 {
            for j in 0..5 {
                let nb = table.neighbor(j, i);
                let d = euclidean_distance_squared(pts.row(i), pts.row(nb));
                assert_eq!(d, table.score(j, i));
                if j > 0 {
                    assert!(table.score(j - 1, i) <= table.score(j, i));
                }
            }
        }
    }

    #[test]
    fn test_single_point() {
        let pts = gaussian_points(1, 2, 0);
        let (table, _) = find_approximate_neighbors(&pts, &AnnOptions::default()).unwrap();
        assert_eq!(table.k(), 0);
        assert_eq!(table.n(), 1);
    }

    #[test]
    fn test_cache_round_trip_and_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let pts = gaussian_points(40, 2, 9);
        let (table, _) = find_approximate_neighbors(&pts, &AnnOptions::default().with_k(4)).unwrap();
        assert!(NeighborTable::load(dir.path(), 4, 40).is_none());

        table.save(dir.path()).unwrap();
        let loaded = NeighborTable::load(dir.path(), 4, 40).unwrap();
        assert_eq!(loaded, table);

        // truncated scores file falls back to recomputation
        let (_, scores_path) = NeighborTable::cache_paths(dir.path(), 4, 40);
        std::fs::write(&scores_path, [0u8; 10]).unwrap();
        assert!(NeighborTable::load(dir.path(), 4, 40).is_none());
    }
}
