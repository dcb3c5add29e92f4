//! Vector distance functions.
//!
//! Pure Rust, accumulated in f64 so results do not depend on the caller's
//! float width.

/// Squared Euclidean distance between two vectors.
///
/// # Panics
/// Panics if vectors have different dimensions.
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f64 {
    assert_eq!(a.len(), b.len(), "Vectors must have same dimension");

    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = *x as f64 - *y as f64;
            d * d
        })
        .sum()
}

/// Squared Euclidean distance between a vector and an f64 centroid.
pub(crate) fn squared_distance_to(point: &[f32], centroid: &[f64]) -> f64 {
    debug_assert_eq!(point.len(), centroid.len());

    point
        .iter()
        .zip(centroid.iter())
        .map(|(x, c)| {
            let d = *x as f64 - c;
            d * d
        })
        .sum()
}

/// Arithmetic mean of the given members; empty input gives an empty vector.
pub fn mean(members: &[&[f32]]) -> Vec<f64> {
    if members.is_empty() {
        return Vec::new();
    }

    let dim = members[0].len();
    let n = members.len() as f64;
    let mut centroid = vec![0.0f64; dim];

    for member in members {
        assert_eq!(member.len(), dim, "All vectors must have same dimension");
        for (i, &val) in member.iter().enumerate() {
            centroid[i] += val as f64;
        }
    }

    for val in centroid.iter_mut() {
        *val /= n;
    }

    centroid
}

/// Full matrix of pairwise squared Euclidean distances.
pub fn pairwise_squared_distances(vectors: &[Vec<f32>]) -> Vec<Vec<f64>> {
    let n = vectors.len();
    let mut distances = vec![vec![0.0f64; n]; n];

    for i in 0..n {
        for j in (i + 1)..n {
            let dist = squared_euclidean(&vectors[i], &vectors[j]);
            distances[i][j] = dist;
            distances[j][i] = dist;
        }
    }

    distances
}
