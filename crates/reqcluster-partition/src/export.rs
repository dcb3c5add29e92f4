//! Partition export.
//!
//! Serializes a cluster assignment as a JSON object keyed `"Cluster {i}"`,
//! keys in numeric order, item texts in corpus order within each cluster.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::ser::{Serialize, SerializeMap, Serializer};
use tempfile::NamedTempFile;
use tracing::info;

use reqcluster_types::Corpus;

use crate::error::PartitionError;
use crate::kmeans::ClusterAssignment;

/// Item texts grouped by cluster id. Groups may be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    groups: Vec<Vec<String>>,
}

impl Partition {
    /// Group corpus items by their assigned cluster.
    pub fn from_assignment(
        assignment: &ClusterAssignment,
        corpus: &Corpus,
    ) -> Result<Self, PartitionError> {
        if assignment.len() != corpus.len() {
            return Err(PartitionError::LengthMismatch {
                assignments: assignment.len(),
                items: corpus.len(),
            });
        }

        let mut groups = vec![Vec::new(); assignment.k()];
        for (text, &label) in corpus.iter().zip(assignment.labels()) {
            groups[label].push(text.to_string());
        }

        Ok(Self { groups })
    }

    /// Number of clusters, including empty ones.
    pub fn k(&self) -> usize {
        self.groups.len()
    }

    pub fn group(&self, cluster: usize) -> Option<&[String]> {
        self.groups.get(cluster).map(Vec::as_slice)
    }

    pub fn groups(&self) -> &[Vec<String>] {
        &self.groups
    }

    /// Items per cluster.
    pub fn sizes(&self) -> Vec<usize> {
        self.groups.iter().map(Vec::len).collect()
    }

    /// Total number of items across all clusters.
    pub fn total(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }

    /// Export key for a cluster id.
    pub fn key(cluster: usize) -> String {
        format!("Cluster {}", cluster)
    }

    /// Pretty-printed JSON export.
    pub fn to_json(&self) -> Result<String, PartitionError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the JSON export, creating parent directories. The file is
    /// replaced atomically.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), PartitionError> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => Path::new(".").to_path_buf(),
        };
        fs::create_dir_all(&dir)?;

        let json = self.to_json()?;
        let mut temp = NamedTempFile::new_in(&dir)?;
        temp.write_all(json.as_bytes())?;
        temp.write_all(b"\n")?;
        temp.persist(path).map_err(|e| PartitionError::Io(e.error))?;

        info!(path = ?path, clusters = self.k(), "Clusters saved");
        Ok(())
    }
}

impl Serialize for Partition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for (cluster, items) in self.groups.iter().enumerate() {
            map.serialize_entry(&Self::key(cluster), items)?;
        }
        map.end()
    }
}
