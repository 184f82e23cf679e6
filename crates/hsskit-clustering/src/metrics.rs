//! Distances between points stored as matrix rows

/// Squared Euclidean distance
pub fn euclidean_distance_squared(x: &[f64], y: &[f64]) -> f64 {
    debug_assert_eq!(x.len(), y.len());
    x.iter().zip(y).map(|(a, b)| (a - b) * (a - b)).sum()
}

/// Euclidean distance
pub fn euclidean_distance(x: &[f64], y: &[f64]) -> f64 {
    euclidean_distance_squared(x, y).sqrt()
}

/// 1-norm (Manhattan) distance
pub fn norm1_distance(x: &[f64], y: &[f64]) -> f64 {
    debug_assert_eq!(x.len(), y.len());
    x.iter().zip(y).map(|(a, b)| (a - b).abs()).sum()
}

/// Dot product
pub fn dot(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y).map(|(a, b)| a * b).sum()
}
