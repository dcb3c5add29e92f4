//! Positional vector cache.
//!
//! A text file holding one JSON array per line; line `i` is the embedding of
//! corpus item `i`. The cache is trusted verbatim when present. It is not
//! content addressed, so editing the corpus without deleting the cache goes
//! unnoticed unless the item count changes.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use reqcluster_types::Vector;

use crate::error::EmbeddingError;

/// Cache of embedding vectors, index-aligned with the corpus.
#[derive(Debug, Clone)]
pub struct VectorCache {
    path: PathBuf,
}

impl VectorCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load all cached vectors.
    ///
    /// Returns `None` when no cache file exists. A file that exists but
    /// does not parse is an error, never a silent miss.
    pub fn load(&self) -> Result<Option<Vec<Vector>>, EmbeddingError> {
        if !self.path.exists() {
            debug!(path = ?self.path, "No embedding cache");
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        let mut vectors: Vec<Vector> = Vec::new();

        for (i, line) in content.lines().enumerate() {
            let line_no = i + 1;
            let vector: Vector =
                serde_json::from_str(line.trim()).map_err(|e| EmbeddingError::CacheFormat {
                    line: line_no,
                    reason: e.to_string(),
                })?;

            if vector.is_empty() {
                return Err(EmbeddingError::CacheFormat {
                    line: line_no,
                    reason: "empty vector".to_string(),
                });
            }

            if let Some(first) = vectors.first() {
                if first.len() != vector.len() {
                    return Err(EmbeddingError::CacheFormat {
                        line: line_no,
                        reason: format!(
                            "dimension {} differs from first line's {}",
                            vector.len(),
                            first.len()
                        ),
                    });
                }
            }

            vectors.push(vector);
        }

        info!(path = ?self.path, count = vectors.len(), "Loaded embedding cache");
        Ok(Some(vectors))
    }

    /// Load the cache and require exactly `expected` vectors.
    pub fn load_aligned(&self, expected: usize) -> Result<Option<Vec<Vector>>, EmbeddingError> {
        match self.load()? {
            Some(vectors) if vectors.len() != expected => Err(EmbeddingError::CacheLength {
                expected,
                actual: vectors.len(),
            }),
            other => Ok(other),
        }
    }

    /// Write all vectors, one per line.
    ///
    /// The file is written to a temporary sibling and renamed into place, so
    /// a later `load` sees either the old cache or the complete new one.
    pub fn save(&self, vectors: &[Vector]) -> Result<(), EmbeddingError> {
        let dir = parent_dir(&self.path);
        fs::create_dir_all(&dir)?;

        let temp = NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            for vector in vectors {
                let line = serde_json::to_string(vector).map_err(|e| {
                    EmbeddingError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
                })?;
                writer.write_all(line.as_bytes())?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| EmbeddingError::Io(e.error))?;

        info!(path = ?self.path, count = vectors.len(), "Saved embedding cache");
        Ok(())
    }
}

/// Directory containing `path`; `.` for bare file names.
pub(crate) fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_vectors() -> Vec<Vector> {
        vec![
            vec![0.1, 0.2, 0.3],
            vec![-1.5, 0.0, 2.25],
            vec![1e-7, 3.4028235e38, -0.333_333_34],
        ]
    }

    #[test]
    fn test_load_missing_returns_none() {
        let temp = TempDir::new().unwrap();
        let cache = VectorCache::new(temp.path().join("embeddings.txt"));
        assert!(cache.load().unwrap().is_none());
        assert!(!cache.exists());
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let cache = VectorCache::new(temp.path().join("nested/dir/embeddings.txt"));
        let vectors = sample_vectors();

        cache.save(&vectors).unwrap();
        let loaded = cache.load().unwrap().unwrap();

        assert_eq!(loaded.len(), vectors.len());
        for (a, b) in loaded.iter().zip(vectors.iter()) {
            for (x, y) in a.iter().zip(b.iter()) {
                assert!((x - y).abs() <= f32::EPSILON * y.abs().max(1.0));
            }
        }
    }

    #[test]
    fn test_save_writes_one_array_per_line() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("embeddings.txt");
        VectorCache::new(&path)
            .save(&[vec![1.0, 2.0], vec![3.0, 4.5]])
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "[1.0,2.0]\n[3.0,4.5]\n");
    }

    #[test]
    fn test_save_overwrites_completely() {
        let temp = TempDir::new().unwrap();
        let cache = VectorCache::new(temp.path().join("embeddings.txt"));
        cache.save(&sample_vectors()).unwrap();
        cache.save(&[vec![9.0, 9.0]]).unwrap();

        let loaded = cache.load().unwrap().unwrap();
        assert_eq!(loaded, vec![vec![9.0, 9.0]]);
    }

    #[test]
    fn test_load_malformed_line() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("embeddings.txt");
        fs::write(&path, "[0.1, 0.2]\nnot json\n").unwrap();

        match VectorCache::new(&path).load() {
            Err(EmbeddingError::CacheFormat { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected cache format error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_ragged_dimensions() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("embeddings.txt");
        fs::write(&path, "[0.1, 0.2]\n[0.1, 0.2, 0.3]\n").unwrap();

        let err = VectorCache::new(&path).load().unwrap_err();
        assert!(err.is_cache_format());
    }

    #[test]
    fn test_empty_file_loads_as_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("embeddings.txt");
        fs::write(&path, "").unwrap();

        let loaded = VectorCache::new(&path).load().unwrap();
        assert_eq!(loaded, Some(Vec::new()));
    }

    #[test]
    fn test_load_aligned_length_mismatch() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("embeddings.txt");
        fs::write(&path, "").unwrap();

        match VectorCache::new(&path).load_aligned(6) {
            Err(EmbeddingError::CacheLength { expected, actual }) => {
                assert_eq!(expected, 6);
                assert_eq!(actual, 0);
            }
            other => panic!("expected length mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_load_aligned_missing_is_none() {
        let temp = TempDir::new().unwrap();
        let cache = VectorCache::new(temp.path().join("embeddings.txt"));
        assert!(cache.load_aligned(3).unwrap().is_none());
    }

    #[test]
    fn test_parent_dir_of_bare_name() {
        assert_eq!(parent_dir(Path::new("embeddings.txt")), PathBuf::from("."));
        assert_eq!(
            parent_dir(Path::new("output/embeddings.txt")),
            PathBuf::from("output")
        );
    }
}
