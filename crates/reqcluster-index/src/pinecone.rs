//! Pinecone vector index client.
//!
//! The control plane lists, creates and describes indexes; upserts go to the
//! index's own data-plane host.

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

use reqcluster_types::IndexSettings;

use crate::error::IndexError;
use crate::sink::VectorSink;

const API_VERSION: &str = "2024-07";

/// Configuration for the Pinecone client.
#[derive(Debug, Clone)]
pub struct PineconeConfig {
    /// Control plane URL
    pub control_url: String,

    /// API key
    pub api_key: SecretString,

    /// Index to use, created if missing
    pub index_name: String,

    /// Dimension used when creating the index
    pub dimension: usize,

    /// Metric used when creating the index
    pub metric: String,

    pub cloud: String,
    pub region: String,

    /// Request timeout
    pub timeout: Duration,

    /// Maximum attempts per upsert, including the first
    pub max_retries: u32,

    /// First retry delay; grows exponentially
    pub initial_backoff: Duration,
}

impl PineconeConfig {
    /// Build from settings. Fails when no API key is available.
    pub fn from_settings(settings: &IndexSettings) -> Result<Self, IndexError> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| IndexError::Config("Pinecone API key not found".to_string()))?;

        Ok(Self {
            control_url: settings.control_url.trim_end_matches('/').to_string(),
            api_key: SecretString::from(api_key),
            index_name: settings.index_name.clone(),
            dimension: settings.dimension,
            metric: settings.metric.clone(),
            cloud: settings.cloud.clone(),
            region: settings.region.clone(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
        })
    }

    pub fn with_control_url(mut self, url: impl Into<String>) -> Self {
        self.control_url = url.into();
        self
    }

    pub fn with_retries(mut self, max_retries: u32, initial_backoff: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.initial_backoff = initial_backoff;
        self
    }
}

#[derive(Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexDescription>,
}

#[derive(Deserialize)]
struct IndexDescription {
    name: String,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    dimension: Option<usize>,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: [UpsertVector<'a>; 1],
}

#[derive(Serialize)]
struct UpsertVector<'a> {
    id: &'a str,
    values: &'a [f32],
}

/// Live sink writing to a Pinecone serverless index.
pub struct PineconeSink {
    client: Client,
    config: PineconeConfig,
    host: String,
    dimension: Option<usize>,
}

impl PineconeSink {
    /// Connect to the configured index, creating it when it does not exist.
    pub async fn connect(config: PineconeConfig) -> Result<Self, IndexError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| IndexError::Config(e.to_string()))?;

        let mut sink = Self {
            client,
            config,
            host: String::new(),
            dimension: None,
        };

        let existing = sink.list_indexes().await?;
        let described = match existing
            .into_iter()
            .find(|index| index.name == sink.config.index_name)
        {
            Some(index) => index,
            None => {
                sink.create_index().await?;
                let mut created = sink.describe_index().await?;
                created.dimension = created.dimension.or(Some(sink.config.dimension));
                created
            }
        };
        sink.dimension = described.dimension;

        let host = described
            .host
            .filter(|h| !h.is_empty())
            .ok_or_else(|| IndexError::Parse(format!("Index {} has no host", described.name)))?;
        sink.host = normalize_host(&host);

        info!(index = %sink.config.index_name, host = %sink.host, "Connected to Pinecone");
        Ok(sink)
    }

    /// Data-plane base URL.
    pub fn host(&self) -> &str {
        &self.host
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Api-Key", self.config.api_key.expose_secret())
            .header("X-Pinecone-API-Version", API_VERSION)
    }

    async fn list_indexes(&self) -> Result<Vec<IndexDescription>, IndexError> {
        let url = format!("{}/indexes", self.config.control_url);
        let response = self.send(self.client.get(&url)).await?;
        let list: IndexList = response
            .json()
            .await
            .map_err(|e| IndexError::Parse(e.to_string()))?;
        Ok(list.indexes)
    }

    async fn create_index(&self) -> Result<(), IndexError> {
        info!(
            index = %self.config.index_name,
            dimension = self.config.dimension,
            metric = %self.config.metric,
            "Creating index"
        );
        let url = format!("{}/indexes", self.config.control_url);
        let body = json!({
            "name": self.config.index_name,
            "dimension": self.config.dimension,
            "metric": self.config.metric,
            "spec": {
                "serverless": {
                    "cloud": self.config.cloud,
                    "region": self.config.region,
                }
            }
        });
        self.send(self.client.post(&url).json(&body)).await?;
        Ok(())
    }

    async fn describe_index(&self) -> Result<IndexDescription, IndexError> {
        let url = format!("{}/indexes/{}", self.config.control_url, self.config.index_name);
        let response = self.send(self.client.get(&url)).await?;
        response
            .json()
            .await
            .map_err(|e| IndexError::Parse(e.to_string()))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, IndexError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| IndexError::Service(e.to_string()))?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(IndexError::RateLimitExceeded);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::Service(format!("HTTP {}: {}", status, body)));
        }

        Ok(response)
    }

    async fn upsert_once(&self, id: &str, vector: &[f32]) -> Result<(), IndexError> {
        let url = format!("{}/vectors/upsert", self.host);
        let request = UpsertRequest {
            vectors: [UpsertVector { id, values: vector }],
        };
        self.send(self.client.post(&url).json(&request)).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorSink for PineconeSink {
    fn name(&self) -> &str {
        "pinecone"
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    async fn upsert(&self, id: &str, vector: &[f32]) -> Result<(), IndexError> {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.config.initial_backoff,
            max_elapsed_time: Some(Duration::from_secs(60)),
            ..Default::default()
        };

        let mut attempts = 0;
        loop {
            attempts += 1;
            debug!(id, attempt = attempts, "Upserting vector");

            match self.upsert_once(id, vector).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    if attempts >= self.config.max_retries || !is_retryable(&e) {
                        return Err(e);
                    }
                    match backoff.next_backoff() {
                        Some(duration) => {
                            warn!(
                                error = %e,
                                retry_in_ms = duration.as_millis(),
                                "Upsert failed, retrying"
                            );
                            tokio::time::sleep(duration).await;
                        }
                        None => return Err(e),
                    }
                }
            }
        }
    }
}

fn is_retryable(error: &IndexError) -> bool {
    match error {
        IndexError::RateLimitExceeded => true,
        IndexError::Service(msg) => !msg.starts_with("HTTP 4"),
        _ => false,
    }
}

/// Hosts come back without a scheme.
fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}
