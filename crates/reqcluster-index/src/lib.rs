//! # reqcluster-index
//!
//! Optional side channel that forwards `(id, vector)` pairs to an external
//! vector index for later similarity search. Clustering never depends on it.
//!
//! Without credentials the sink is a no-op and the run continues.

pub mod error;
pub mod pinecone;
pub mod sink;

use std::sync::Arc;

use tracing::warn;

use reqcluster_types::IndexSettings;

pub use error::IndexError;
pub use pinecone::{PineconeConfig, PineconeSink};
pub use sink::{sync_best_effort, sync_vectors, vector_id, DisabledSink, VectorSink};

/// Pick the sink once at start-up.
///
/// Never fails: a missing key or an unreachable index yields a
/// [`DisabledSink`] and a warning.
pub async fn build_sink(settings: &IndexSettings) -> Arc<dyn VectorSink> {
    if !settings.enabled {
        return Arc::new(DisabledSink::new("index sync disabled"));
    }

    let config = match PineconeConfig::from_settings(settings) {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Pinecone API key not found. Skipping index sync");
            return Arc::new(DisabledSink::new(e.to_string()));
        }
    };

    match PineconeSink::connect(config).await {
        Ok(sink) => Arc::new(sink),
        Err(e) => {
            warn!(error = %e, index = %settings.index_name, "Index unavailable. Skipping index sync");
            Arc::new(DisabledSink::new(e.to_string()))
        }
    }
}
