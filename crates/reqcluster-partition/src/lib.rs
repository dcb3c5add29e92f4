//! # reqcluster-partition
//!
//! Groups embedding vectors into a fixed number of clusters and exports the
//! grouping.
//!
//! ## Features
//! - K-Means with k-means++ seeding and multiple seeded restarts
//! - Deterministic for a given `(vectors, k, seed)`
//! - JSON export keyed `"Cluster {i}"` in numeric order

pub mod distance;
pub mod error;
pub mod export;
pub mod kmeans;

pub use distance::{mean, pairwise_squared_distances, squared_euclidean};
pub use error::PartitionError;
pub use export::Partition;
pub use kmeans::{partition, ClusterAssignment, KMeans, KMeansConfig, KMeansResult};
