//! Recursive bisection of point clouds
//!
//! Points are the rows of an `n x d` matrix. Clustering reorders them so that
//! every node of the returned [`PartitionTree`] covers a contiguous range of
//! geometrically close points.

use crate::error::{ClusteringError, Result};
use crate::metrics::{dot, euclidean_distance_squared};
use crate::tree::PartitionTree;
use hsskit_dense::Matrix;
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fmt;
use std::str::FromStr;

/// How a cluster is split in two
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClusteringAlgorithm {
    /// Keep the input order, bisect by index
    #[default]
    Natural,
    /// Two-means (Lloyd iterations from two random seeds)
    TwoMeans,
    /// Median split along the coordinate of largest variance
    KdTree,
    /// Median split along the principal direction
    Pca,
}

impl fmt::Display for ClusteringAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClusteringAlgorithm::Natural => "natural",
            ClusteringAlgorithm::TwoMeans => "2means",
            ClusteringAlgorithm::KdTree => "kd",
            ClusteringAlgorithm::Pca => "pca",
        };
        f.write_str(s)
    }
}

impl FromStr for ClusteringAlgorithm {
    type Err = ClusteringError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "natural" => Ok(ClusteringAlgorithm::Natural),
            "2means" => Ok(ClusteringAlgorithm::TwoMeans),
            "kd" => Ok(ClusteringAlgorithm::KdTree),
            "pca" => Ok(ClusteringAlgorithm::Pca),
            _ => Err(ClusteringError::UnknownAlgorithm {
                name: s.to_string(),
            }),
        }
    }
}

/// Tree and ordering produced by [`recursive_bisection`]
#[derive(Debug, Clone)]
pub struct Clustering {
    /// Partition of the reordered points
    pub tree: PartitionTree,
    /// `perm[new] = old`: row `new` of the reordered points was row `old`
    pub perm: Vec<usize>,
}

/// Reorder the rows of `points` by recursive bisection
///
/// Every leaf of the returned tree holds at most `leaf_size` points and no
/// split is ever empty. `seed` drives the two-means initialization.
pub fn recursive_bisection(
    points: &mut Matrix<f64>,
    leaf_size: usize,
    algorithm: ClusteringAlgorithm,
    seed: u64,
) -> Result<Clustering> {
    let n = points.nrows();
    let leaf_size = leaf_size.max(1);
    if algorithm == ClusteringAlgorithm::Natural {
        return Ok(Clustering {
            tree: PartitionTree::with_leaf_size(n, leaf_size),
            perm: (0..n).collect(),
        });
    }

    let mut perm: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let tree = bisect(points, &mut perm, leaf_size, algorithm, &mut rng);
    *points = points.select_rows(&perm);
    log::debug!(
        "clustering {algorithm}: {n} points, {} leaves, {} levels",
        tree.leaf_sizes().len(),
        tree.levels()
    );
    Ok(Clustering { tree, perm })
}

fn bisect(
    points: &Matrix<f64>,
    idx: &mut [usize],
    leaf_size: usize,
    algorithm: ClusteringAlgorithm,
    rng: &mut ChaCha8Rng,
) -> PartitionTree {
    let len = idx.len();
    if len <= leaf_size {
        return PartitionTree::new(len);
    }
    let split = match algorithm {
        ClusteringAlgorithm::TwoMeans => two_means_split(points, idx, rng),
        ClusteringAlgorithm::Pca => {
            let dir = principal_direction(points, idx);
            median_split(points, idx, &dir)
        }
        ClusteringAlgorithm::KdTree | ClusteringAlgorithm::Natural => {
            let dir = max_variance_axis(points, idx);
            median_split(points, idx, &dir)
        }
    };
    let (left, right) = idx.split_at_mut(split);
    let l = bisect(points, left, leaf_size, algorithm, rng);
    let r = bisect(points, right, leaf_size, algorithm, rng);
    PartitionTree::from_children(l, r)
}

fn centroid(points: &Matrix<f64>, idx: &[usize]) -> Vec<f64> {
    let d = points.ncols();
    let mut c = vec![0.0; d];
    for &i in idx {
        for (cj, &x) in c.iter_mut().zip(points.row(i)) {
            *cj += x;
        }
    }
    let inv = 1.0 / idx.len().max(1) as f64;
    c.iter_mut().for_each(|x| *x *= inv);
    c
}

/// Unit vector along the coordinate with the largest spread
fn max_variance_axis(points: &Matrix<f64>, idx: &[usize]) -> Vec<f64> {
    let d = points.ncols();
    let mean = centroid(points, idx);
    let mut var = vec![0.0; d];
    for &i in idx {
        for ((v, &x), &m) in var.iter_mut().zip(points.row(i)).zip(&mean) {
            *v += (x - m) * (x - m);
        }
    }
    let axis = var
        .iter()
        .enumerate()
        .fold((0, -1.0), |best, (j, &v)| if v > best.1 { (j, v) } else { best })
        .0;
    let mut dir = vec![0.0; d];
    if d > 0 {
        dir[axis] = 1.0;
    }
    dir
}

/// Dominant eigenvector of the covariance, by power iteration
fn principal_direction(points: &Matrix<f64>, idx: &[usize]) -> Vec<f64> {
    let d = points.ncols();
    let mean = centroid(points, idx);
    let mut v = max_variance_axis(points, idx);
    // perturb so that a start orthogonal to the principal direction is unlikely
    for (j, x) in v.iter_mut().enumerate() {
        *x += 1e-3 * (j + 1) as f64;
    }
    for _ in 0..30 {
        let mut w = vec![0.0; d];
        for &i in idx {
            let row = points.row(i);
            let proj: f64 = row.iter().zip(&mean).zip(&v).map(|((x, m), vj)| (x - m) * vj).sum();
            for ((wj, &x), &m) in w.iter_mut().zip(row).zip(&mean) {
                *wj += proj * (x - m);
            }
        }
        let norm = w.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm == 0.0 {
            break;
        }
        v = w.into_iter().map(|x| x / norm).collect();
    }
    v
}

/// Order `idx` by projection on `dir` and split at the median
fn median_split(points: &Matrix<f64>, idx: &mut [usize], dir: &[f64]) -> usize {
    let half = idx.len() / 2;
    let mut proj: Vec<(f64, usize)> = idx.iter().map(|&i| (dot(points.row(i), dir), i)).collect();
    proj.select_nth_unstable_by(half, |a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    for (slot, (_, i)) in idx.iter_mut().zip(proj) {
        *slot = i;
    }
    half
}

/// Lloyd iterations with two centers; falls back to a median split when
/// one of the clusters comes out empty
fn two_means_split(points: &Matrix<f64>, idx: &mut [usize], rng: &mut ChaCha8Rng) -> usize {
    let len = idx.len();
    let seeds = sample(rng, len, 2);
    let mut c0 = points.row(idx[seeds.index(0)]).to_vec();
    let mut c1 = points.row(idx[seeds.index(1)]).to_vec();
    let mut assign = vec![false; len];

    for _ in 0..10 {
        let mut changed = false;
        for (a, &i) in assign.iter_mut().zip(idx.iter()) {
            let x = points.row(i);
            let to_second = euclidean_distance_squared(x, &c1) < euclidean_distance_squared(x, &c0);
            changed |= *a != to_second;
            *a = to_second;
        }
        let (first, second) = partition(idx, &assign);
        if first.is_empty() || second.is_empty() {
            break;
        }
        c0 = centroid(points, &first);
        c1 = centroid(points, &second);
        if !changed {
            break;
        }
    }

    let (mut first, second) = partition(idx, &assign);
    if first.is_empty() || second.is_empty() {
        let dir = max_variance_axis(points, idx);
        return median_split(points, idx, &dir);
    }
    let split = first.len();
    first.extend(second);
    idx.copy_from_slice(&first);
    split
}

fn partition(idx: &[usize], to_second: &[bool]) -> (Vec<usize>, Vec<usize>) {
    let mut first = Vec::new();
    let mut second = Vec::new();
    for (&i, &s) in idx.iter().zip(to_second) {
        if s {
            second.push(i);
        } else {
            first.push(i);
        }
    }
    (first, second)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn random_points(n: usize, d: usize, seed: u64) -> Matrix<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Matrix::from_fn(n, d, |_, _| rng.random::<f64>())
    }

    #[test]
    fn test_algorithm_names_round_trip() {
        for alg in [
            ClusteringAlgorithm::Natural,
            ClusteringAlgorithm::TwoMeans,
            ClusteringAlgorithm::KdTree,
            ClusteringAlgorithm::Pca,
        ] {
            assert_eq!(alg.to_string().parse::<ClusteringAlgorithm>().unwrap(), alg);
        }
        assert!("cobble".parse::<ClusteringAlgorithm>().is_err());
    }

    #[test]
    fn test_all_algorithms_respect_leaf_size() {
        for alg in [
            ClusteringAlgorithm::Natural,
            ClusteringAlgorithm::TwoMeans,
            ClusteringAlgorithm::KdTree,
            ClusteringAlgorithm::Pca,
        ] {
            let original = random_points(300, 3, 11);
            let mut pts = original.clone();
            let c = recursive_bisection(&mut pts, 16, alg, 5).unwrap();
            let sizes = c.tree.leaf_sizes();
            assert_eq!(sizes.iter().sum::<usize>(), 300);
            assert!(sizes.iter().all(|&s| s >= 1 && s <= 16), "{alg}: {sizes:?}");
            assert!(c.tree.check());

            // perm is a permutation and the points moved accordingly
            let mut seen = c.perm.clone();
            seen.sort_unstable();
            assert_eq!(seen, (0..300).collect::<Vec<_>>());
            for (new, &old) in c.perm.iter().enumerate() {
                assert_eq!(pts.row(new), original.row(old));
            }
        }
    }

    #[test]
    fn test_kd_separates_two_blobs() {
        // 20 points near x = 0 and 20 near x = 10
        let mut pts = Matrix::from_fn(40, 2, |i, j| {
            if j == 0 {
                if i % 2 == 0 { 0.0 } else { 10.0 }
            } else {
                i as f64 * 0.01
            }
        });
        let c = recursive_bisection(&mut pts, 20, ClusteringAlgorithm::KdTree, 0).unwrap();
        assert_eq!(c.tree.leaf_sizes(), vec![20, 20]);
        let left: Vec<f64> = (0..20).map(|i| pts[[i, 0]]).collect();
        assert!(left.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_identical_points_still_split() {
        let mut pts = Matrix::from_elem(50, 2, 1.0);
        let c = recursive_bisection(&mut pts, 8, ClusteringAlgorithm::TwoMeans, 3).unwrap();
        assert!(c.tree.leaf_sizes().iter().all(|&s| s <= 8));
    }
}
