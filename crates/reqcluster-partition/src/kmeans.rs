//! Seeded K-Means (Lloyd's algorithm with k-means++ initialization).
//!
//! Determinism: every restart draws its own seed from a ChaCha stream keyed
//! by the caller's seed, so `(vectors, k, seed)` always produces the same
//! assignment regardless of process state.

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use reqcluster_types::{PartitionSettings, Vector};

use crate::distance::{mean, squared_distance_to};
use crate::error::PartitionError;

/// K-Means tuning parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeansConfig {
    /// Number of restarts; the lowest inertia wins, first on ties
    pub n_init: usize,
    /// Iteration cap per restart
    pub max_iterations: usize,
    /// Convergence threshold on total squared centroid movement
    pub tolerance: f64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            n_init: 10,
            max_iterations: 300,
            tolerance: 1e-4,
        }
    }
}

impl From<&PartitionSettings> for KMeansConfig {
    fn from(settings: &PartitionSettings) -> Self {
        Self {
            n_init: settings.n_init.max(1),
            max_iterations: settings.max_iterations.max(1),
            tolerance: settings.tolerance,
        }
    }
}

/// Cluster id per item, in corpus order, each in `[0, k)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    labels: Vec<usize>,
    k: usize,
}

impl ClusterAssignment {
    /// Wrap precomputed labels. Every label must be below `k`.
    pub fn new(labels: Vec<usize>, k: usize) -> Result<Self, PartitionError> {
        if k == 0 || labels.iter().any(|&label| label >= k) {
            return Err(PartitionError::InvalidClusterCount { k, n: labels.len() });
        }
        Ok(Self { labels, k })
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of items per cluster id; empty clusters report zero.
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.k];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }
}

/// Outcome of a K-Means fit.
#[derive(Debug, Clone)]
pub struct KMeansResult {
    pub assignment: ClusterAssignment,
    pub centroids: Vec<Vec<f64>>,
    /// Sum of squared distances of items to their centroid
    pub inertia: f64,
    /// Iterations used by the winning restart
    pub iterations: usize,
    /// Index of the winning restart
    pub restart: usize,
}

/// Centroid-based partitioner.
#[derive(Debug, Clone, Default)]
pub struct KMeans {
    config: KMeansConfig,
}

struct RestartOutcome {
    labels: Vec<usize>,
    centroids: Vec<Vec<f64>>,
    inertia: f64,
    iterations: usize,
}

impl KMeans {
    pub fn new(config: KMeansConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &KMeansConfig {
        &self.config
    }

    /// Partition `vectors` into `k` clusters.
    pub fn fit(&self, vectors: &[Vector], k: usize, seed: u64) -> Result<KMeansResult, PartitionError> {
        let n = vectors.len();
        if k == 0 || k > n {
            return Err(PartitionError::InvalidClusterCount { k, n });
        }
        validate_dimensions(vectors)?;

        info!(items = n, k, seed, n_init = self.config.n_init, "Clustering");

        let mut seeds = ChaCha8Rng::seed_from_u64(seed);
        let mut best: Option<(usize, RestartOutcome)> = None;

        for restart in 0..self.config.n_init.max(1) {
            let mut rng = ChaCha8Rng::seed_from_u64(seeds.next_u64());
            let outcome = self.run_restart(vectors, k, &mut rng);
            debug!(
                restart,
                inertia = outcome.inertia,
                iterations = outcome.iterations,
                "K-Means restart finished"
            );

            let better = match &best {
                Some((_, current)) => outcome.inertia < current.inertia,
                None => true,
            };
            if better {
                best = Some((restart, outcome));
            }
        }

        let (restart, outcome) = best.ok_or(PartitionError::InvalidClusterCount { k, n })?;
        Ok(KMeansResult {
            assignment: ClusterAssignment {
                labels: outcome.labels,
                k,
            },
            centroids: outcome.centroids,
            inertia: outcome.inertia,
            iterations: outcome.iterations,
            restart,
        })
    }

    fn run_restart(&self, vectors: &[Vector], k: usize, rng: &mut ChaCha8Rng) -> RestartOutcome {
        let mut centroids = init_plus_plus(vectors, k, rng);
        let mut labels = vec![usize::MAX; vectors.len()];
        let mut iterations = 0;

        for iteration in 1..=self.config.max_iterations {
            iterations = iteration;
            let changed = assign(vectors, &centroids, &mut labels);
            let shift = update(vectors, &labels, &mut centroids);

            if (!changed && iteration > 1) || shift <= self.config.tolerance {
                break;
            }
        }

        // Final assignment against the final centroids.
        assign(vectors, &centroids, &mut labels);
        let inertia = vectors
            .iter()
            .zip(labels.iter())
            .map(|(v, &label)| squared_distance_to(v, &centroids[label]))
            .sum();

        RestartOutcome {
            labels,
            centroids,
            inertia,
            iterations,
        }
    }
}

/// Partition with the default tuning.
pub fn partition(vectors: &[Vector], k: usize, seed: u64) -> Result<ClusterAssignment, PartitionError> {
    KMeans::default()
        .fit(vectors, k, seed)
        .map(|result| result.assignment)
}

fn validate_dimensions(vectors: &[Vector]) -> Result<(), PartitionError> {
    let expected = vectors.first().map(Vec::len).unwrap_or(0);
    for (index, vector) in vectors.iter().enumerate() {
        if vector.len() != expected {
            return Err(PartitionError::DimensionMismatch {
                index,
                expected,
                actual: vector.len(),
            });
        }
    }
    Ok(())
}

/// k-means++ seeding: each new centroid is drawn with probability
/// proportional to its squared distance from the nearest chosen centroid.
fn init_plus_plus(vectors: &[Vector], k: usize, rng: &mut ChaCha8Rng) -> Vec<Vec<f64>> {
    let n = vectors.len();
    let mut chosen: Vec<usize> = Vec::with_capacity(k);
    chosen.push(rng.random_range(0..n));

    let to_f64 = |v: &Vector| v.iter().map(|&x| x as f64).collect::<Vec<f64>>();
    let first = to_f64(&vectors[chosen[0]]);
    let mut nearest: Vec<f64> = vectors
        .iter()
        .map(|v| squared_distance_to(v, &first))
        .collect();

    while chosen.len() < k {
        let total: f64 = nearest.iter().sum();

        let next = if total > 0.0 {
            let target = rng.random::<f64>() * total;
            let mut cumulative = 0.0;
            let mut pick = None;
            for (i, &weight) in nearest.iter().enumerate() {
                cumulative += weight;
                if weight > 0.0 && cumulative >= target {
                    pick = Some(i);
                    break;
                }
            }
            // Rounding can leave target just above the final sum.
            pick.or_else(|| nearest.iter().rposition(|&w| w > 0.0))
                .unwrap_or(0)
        } else {
            // All remaining points coincide with a centroid.
            let unchosen: Vec<usize> = (0..n).filter(|i| !chosen.contains(i)).collect();
            unchosen[rng.random_range(0..unchosen.len())]
        };

        chosen.push(next);
        let centre = to_f64(&vectors[next]);
        for (i, v) in vectors.iter().enumerate() {
            let d = squared_distance_to(v, &centre);
            if d < nearest[i] {
                nearest[i] = d;
            }
        }
    }

    chosen.iter().map(|&i| to_f64(&vectors[i])).collect()
}

/// Assign each vector to its nearest centroid (lowest id on ties).
/// Returns whether any label changed.
fn assign(vectors: &[Vector], centroids: &[Vec<f64>], labels: &mut [usize]) -> bool {
    let mut changed = false;
    for (vector, label) in vectors.iter().zip(labels.iter_mut()) {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (c, centroid) in centroids.iter().enumerate() {
            let d = squared_distance_to(vector, centroid);
            if d < best_dist {
                best = c;
                best_dist = d;
            }
        }
        if *label != best {
            *label = best;
            changed = true;
        }
    }
    changed
}

/// Move each centroid to the mean of its members. Empty clusters keep their
/// previous centroid. Returns the total squared centroid movement.
fn update(vectors: &[Vector], labels: &[usize], centroids: &mut [Vec<f64>]) -> f64 {
    let mut shift = 0.0;
    for (c, centroid) in centroids.iter_mut().enumerate() {
        let members: Vec<&[f32]> = vectors
            .iter()
            .zip(labels.iter())
            .filter(|&(_, &label)| label == c)
            .map(|(v, _)| v.as_slice())
            .collect();

        if members.is_empty() {
            continue;
        }

        let updated = mean(&members);
        shift += centroid
            .iter()
            .zip(updated.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>();
        *centroid = updated;
    }
    shift
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> Vec<Vector> {
        vec![
            vec![0.0, 0.1],
            vec![10.0, 10.2],
            vec![0.2, 0.0],
            vec![9.8, 10.0],
            vec![0.1, 0.2],
            vec![10.1, 9.9],
        ]
    }

    #[test]
    fn test_separates_two_blobs() {
        let assignment = partition(&two_blobs(), 2, 42).unwrap();
        let labels = assignment.labels();
        assert_eq!(labels.len(), 6);
        assert_eq!(labels[0], labels[2]);
        assert_eq!(labels[0], labels[4]);
        assert_eq!(labels[1], labels[3]);
        assert_eq!(labels[1], labels[5]);
        assert_ne!(labels[0], labels[1]);
    }

    #[test]
    fn test_deterministic_for_seed() {
        let vectors: Vec<Vector> = (0..30)
            .map(|i| {
                let x = i as f32;
                vec![(x * 0.37).sin(), (x * 0.11).cos(), x % 7.0]
            })
            .collect();

        let a = KMeans::default().fit(&vectors, 4, 7).unwrap();
        let b = KMeans::default().fit(&vectors, 4, 7).unwrap();
        assert_eq!(a.assignment, b.assignment);
        assert_eq!(a.inertia.to_bits(), b.inertia.to_bits());
        assert_eq!(a.restart, b.restart);
    }

    #[test]
    fn test_k_zero_rejected() {
        let err = partition(&two_blobs(), 0, 42).unwrap_err();
        assert!(matches!(err, PartitionError::InvalidClusterCount { k: 0, n: 6 }));
    }

    #[test]
    fn test_k_above_n_rejected() {
        let err = partition(&two_blobs(), 7, 42).unwrap_err();
        assert!(matches!(err, PartitionError::InvalidClusterCount { k: 7, n: 6 }));
    }

    #[test]
    fn test_empty_input_rejected() {
        let err = partition(&[], 1, 42).unwrap_err();
        assert!(matches!(err, PartitionError::InvalidClusterCount { k: 1, n: 0 }));
    }

    #[test]
    fn test_k_equals_n_gives_singletons() {
        let assignment = partition(&two_blobs(), 6, 42).unwrap();
        let sizes = assignment.sizes();
        assert_eq!(sizes.len(), 6);
        assert_eq!(sizes.iter().sum::<usize>(), 6);
        assert!(sizes.iter().all(|&s| s <= 1));
    }

    #[test]
    fn test_k_equals_n_with_duplicates_allows_empty() {
        let vectors = vec![vec![1.0, 1.0], vec![1.0, 1.0], vec![5.0, 5.0]];
        let assignment = partition(&vectors, 3, 1).unwrap();
        assert_eq!(assignment.sizes().iter().sum::<usize>(), 3);
        assert_eq!(assignment.labels()[0], assignment.labels()[1]);
        assert!(assignment.labels().iter().all(|&l| l < 3));
    }

    #[test]
    fn test_single_cluster() {
        let result = KMeans::default().fit(&two_blobs(), 1, 3).unwrap();
        assert!(result.assignment.labels().iter().all(|&l| l == 0));
        assert!(result.inertia > 0.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let vectors = vec![vec![1.0, 2.0], vec![1.0]];
        let err = partition(&vectors, 1, 0).unwrap_err();
        assert!(matches!(
            err,
            PartitionError::DimensionMismatch {
                index: 1,
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_best_restart_has_lowest_inertia() {
        let vectors = two_blobs();
        let multi = KMeans::new(KMeansConfig {
            n_init: 10,
            ..Default::default()
        })
        .fit(&vectors, 3, 11)
        .unwrap();
        let single = KMeans::new(KMeansConfig {
            n_init: 1,
            ..Default::default()
        })
        .fit(&vectors, 3, 11)
        .unwrap();
        assert!(multi.inertia <= single.inertia);
    }

    #[test]
    fn test_assignment_new_validates_labels() {
        assert!(ClusterAssignment::new(vec![0, 1, 1], 2).is_ok());
        assert!(ClusterAssignment::new(vec![0, 2], 2).is_err());
        assert!(ClusterAssignment::new(vec![], 0).is_err());
    }

    #[test]
    fn test_config_from_settings() {
        let settings = PartitionSettings {
            n_init: 0,
            max_iterations: 50,
            tolerance: 0.5,
        };
        let config = KMeansConfig::from(&settings);
        assert_eq!(config.n_init, 1);
        assert_eq!(config.max_iterations, 50);
    }
}
