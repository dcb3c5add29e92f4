//! Exact t-SNE projection to two dimensions.
//!
//! Affinities and gradients are computed over the full N x N matrix, which
//! is fine for corpora of a few hundred items. Output is deterministic for a
//! given `(vectors, seed)` and build.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use reqcluster_partition::pairwise_squared_distances;
use reqcluster_types::{ProjectionSettings, Vector};

use crate::error::VizError;

const PERPLEXITY_TOLERANCE: f64 = 1e-5;
const MAX_SEARCH_STEPS: usize = 100;
const MIN_GAIN: f64 = 0.01;
const MIN_PROBABILITY: f64 = 1e-12;
const INIT_STD: f64 = 1e-4;
const LOG_EVERY: usize = 250;

/// A projected coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub const ORIGIN: Point2D = Point2D { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// t-SNE tuning parameters.
#[derive(Debug, Clone)]
pub struct TsneConfig {
    /// Target perplexity; capped at N-1
    pub perplexity: f64,
    /// Gradient descent iterations
    pub iterations: usize,
    /// Multiplier on P during the early phase
    pub early_exaggeration: f64,
    /// Length of the early phase
    pub exaggeration_iterations: usize,
    /// Fixed learning rate; `None` derives it from N
    pub learning_rate: Option<f64>,
}

impl Default for TsneConfig {
    fn default() -> Self {
        Self {
            perplexity: 30.0,
            iterations: 1000,
            early_exaggeration: 12.0,
            exaggeration_iterations: 250,
            learning_rate: None,
        }
    }
}

impl From<&ProjectionSettings> for TsneConfig {
    fn from(settings: &ProjectionSettings) -> Self {
        Self {
            perplexity: settings.perplexity,
            iterations: settings.iterations,
            ..Default::default()
        }
    }
}

/// Neighborhood-preserving projector.
#[derive(Debug, Clone, Default)]
pub struct Tsne {
    config: TsneConfig,
}

impl Tsne {
    pub fn new(config: TsneConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TsneConfig {
        &self.config
    }

    /// Perplexity actually used for `n` items.
    pub fn effective_perplexity(&self, n: usize) -> f64 {
        self.config.perplexity.min(n.saturating_sub(1) as f64)
    }

    /// Learning rate actually used for `n` items.
    pub fn learning_rate(&self, n: usize) -> f64 {
        self.config
            .learning_rate
            .unwrap_or_else(|| (n as f64 / self.config.early_exaggeration / 4.0).max(50.0))
    }

    /// Project every vector to 2D, in input order.
    pub fn project(&self, vectors: &[Vector], seed: u64) -> Result<Vec<Point2D>, VizError> {
        validate_dimensions(vectors)?;
        if self.config.perplexity <= 0.0 {
            return Err(VizError::InvalidInput(format!(
                "perplexity must be positive, got {}",
                self.config.perplexity
            )));
        }

        let n = vectors.len();
        match n {
            0 => return Ok(Vec::new()),
            1 => return Ok(vec![Point2D::ORIGIN]),
            _ => {}
        }

        let perplexity = self.effective_perplexity(n);
        let learning_rate = self.learning_rate(n);
        info!(
            items = n,
            perplexity,
            learning_rate,
            iterations = self.config.iterations,
            seed,
            "Projecting to 2D"
        );

        let distances = pairwise_squared_distances(vectors);
        let p = joint_probabilities(&distances, perplexity);

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut y: Vec<[f64; 2]> = (0..n)
            .map(|_| {
                [
                    standard_normal(&mut rng) * INIT_STD,
                    standard_normal(&mut rng) * INIT_STD,
                ]
            })
            .collect();

        let mut update = vec![[0.0f64; 2]; n];
        let mut gains = vec![[1.0f64; 2]; n];
        let mut num = vec![0.0f64; n * n];
        let mut grad = vec![[0.0f64; 2]; n];

        for iteration in 0..self.config.iterations {
            let early = iteration < self.config.exaggeration_iterations;
            let exaggeration = if early {
                self.config.early_exaggeration
            } else {
                1.0
            };
            let momentum = if early { 0.5 } else { 0.8 };

            let sum_q = student_t(&y, &mut num);

            for i in 0..n {
                let mut g = [0.0f64; 2];
                for j in 0..n {
                    if i == j {
                        continue;
                    }
                    let q = num[i * n + j];
                    let mult = (exaggeration * p[i * n + j] - q / sum_q) * q;
                    g[0] += mult * (y[i][0] - y[j][0]);
                    g[1] += mult * (y[i][1] - y[j][1]);
                }
                grad[i] = [4.0 * g[0], 4.0 * g[1]];
            }

            for i in 0..n {
                for d in 0..2 {
                    let gain = if update[i][d] * grad[i][d] < 0.0 {
                        gains[i][d] + 0.2
                    } else {
                        gains[i][d] * 0.8
                    };
                    gains[i][d] = gain.max(MIN_GAIN);
                    update[i][d] = momentum * update[i][d] - learning_rate * gains[i][d] * grad[i][d];
                    y[i][d] += update[i][d];
                }
            }
            center(&mut y);

            if (iteration + 1) % LOG_EVERY == 0 {
                debug!(
                    iteration = iteration + 1,
                    kl = kl_divergence(&p, &num, sum_q),
                    "t-SNE progress"
                );
            }
        }

        Ok(y.into_iter().map(|[x, y]| Point2D { x, y }).collect())
    }
}

/// Project with the default tuning.
pub fn project(vectors: &[Vector], seed: u64) -> Result<Vec<Point2D>, VizError> {
    Tsne::default().project(vectors, seed)
}

fn validate_dimensions(vectors: &[Vector]) -> Result<(), VizError> {
    let expected = vectors.first().map(Vec::len).unwrap_or(0);
    for (index, vector) in vectors.iter().enumerate() {
        if vector.len() != expected {
            return Err(VizError::DimensionMismatch {
                index,
                expected,
                actual: vector.len(),
            });
        }
    }
    Ok(())
}

/// Symmetrized joint probabilities, row-major `n * n`, zero diagonal.
fn joint_probabilities(distances: &[Vec<f64>], perplexity: f64) -> Vec<f64> {
    let n = distances.len();
    let target_entropy = perplexity.ln();

    let mut conditional = vec![0.0f64; n * n];
    for (i, row) in distances.iter().enumerate() {
        let probabilities = conditional_row(row, i, target_entropy);
        conditional[i * n..(i + 1) * n].copy_from_slice(&probabilities);
    }

    let mut joint = vec![0.0f64; n * n];
    let denominator = 2.0 * n as f64;
    for i in 0..n {
        for j in 0..n {
            if i != j {
                let value = (conditional[i * n + j] + conditional[j * n + i]) / denominator;
                joint[i * n + j] = value.max(MIN_PROBABILITY);
            }
        }
    }
    joint
}

/// Gaussian conditional distribution for point `i`, with the precision found
/// by binary search so that the row entropy (nats) matches `target_entropy`.
fn conditional_row(distances: &[f64], i: usize, target_entropy: f64) -> Vec<f64> {
    let nearest = distances
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != i)
        .map(|(_, d)| *d)
        .fold(f64::INFINITY, f64::min);

    let mut row = vec![0.0f64; distances.len()];
    let mut beta = 1.0f64;
    let mut lo = 0.0f64;
    let mut hi = f64::INFINITY;
    let mut sum = 1.0f64;

    for _ in 0..MAX_SEARCH_STEPS {
        sum = 0.0;
        let mut weighted = 0.0;
        for (j, &d) in distances.iter().enumerate() {
            if j == i {
                row[j] = 0.0;
                continue;
            }
            // Shifting by the nearest distance keeps the largest weight at 1.
            let shifted = d - nearest;
            let w = (-shifted * beta).exp();
            row[j] = w;
            sum += w;
            weighted += shifted * w;
        }

        let entropy = sum.ln() + beta * weighted / sum;
        let diff = entropy - target_entropy;
        if diff.abs() < PERPLEXITY_TOLERANCE {
            break;
        }

        if diff > 0.0 {
            lo = beta;
            beta = if hi.is_finite() { (beta + hi) / 2.0 } else { beta * 2.0 };
        } else {
            hi = beta;
            beta = (beta + lo) / 2.0;
        }
    }

    for value in row.iter_mut() {
        *value /= sum;
    }
    row
}

/// Fill `num` with Student-t kernels `1 / (1 + |yi - yj|^2)` and return
/// their sum.
fn student_t(y: &[[f64; 2]], num: &mut [f64]) -> f64 {
    let n = y.len();
    let mut sum = 0.0;
    for i in 0..n {
        num[i * n + i] = 0.0;
        for j in (i + 1)..n {
            let dx = y[i][0] - y[j][0];
            let dy = y[i][1] - y[j][1];
            let q = 1.0 / (1.0 + dx * dx + dy * dy);
            num[i * n + j] = q;
            num[j * n + i] = q;
            sum += 2.0 * q;
        }
    }
    sum.max(f64::MIN_POSITIVE)
}

fn kl_divergence(p: &[f64], num: &[f64], sum_q: f64) -> f64 {
    p.iter()
        .zip(num.iter())
        .filter(|(p, _)| **p > 0.0)
        .map(|(p, q)| {
            let q = (q / sum_q).max(MIN_PROBABILITY);
            p * (p / q).ln()
        })
        .sum()
}

fn center(y: &mut [[f64; 2]]) {
    let n = y.len() as f64;
    let mean_x = y.iter().map(|p| p[0]).sum::<f64>() / n;
    let mean_y = y.iter().map(|p| p[1]).sum::<f64>() / n;
    for p in y.iter_mut() {
        p[0] -= mean_x;
        p[1] -= mean_y;
    }
}

/// Box-Muller transform.
fn standard_normal(rng: &mut ChaCha8Rng) -> f64 {
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}
