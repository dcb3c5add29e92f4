//! Corpus of text items to cluster.
//!
//! Position is the only identity: item `i` is always paired with cache line
//! `i`, assignment `i` and projection point `i`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// An embedding vector. Every vector in a run has the same dimension.
pub type Vector = Vec<f32>;

const SAMPLE_REQUIREMENTS: &str = include_str!("../data/sample_requirements.json");

/// Ordered, non-empty sequence of text items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Corpus {
    items: Vec<String>,
}

impl Corpus {
    /// Create a corpus from items. Fails on an empty list.
    pub fn new(items: Vec<String>) -> Result<Self, CoreError> {
        if items.is_empty() {
            return Err(CoreError::InvalidInput("corpus is empty".to_string()));
        }
        Ok(Self { items })
    }

    /// The built-in EarlyBird breakfast-delivery requirements.
    pub fn sample() -> Result<Self, CoreError> {
        let items: Vec<String> = serde_json::from_str(SAMPLE_REQUIREMENTS)?;
        Self::new(items)
    }

    /// Load a corpus from disk.
    ///
    /// `.json` files must contain an array of strings. Anything else is read
    /// as one item per non-blank line, with Markdown list markers stripped.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            let items: Vec<String> = serde_json::from_str(&content)?;
            Self::new(items)
        } else {
            Self::from_lines(&content)
        }
    }

    /// Parse one item per non-blank line.
    pub fn from_lines(content: &str) -> Result<Self, CoreError> {
        let items = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| strip_list_marker(line).to_string())
            .filter(|line| !line.is_empty())
            .collect();
        Self::new(items)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always false for a constructed corpus.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.items.get(index).map(String::as_str)
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }
}

impl TryFrom<Vec<String>> for Corpus {
    type Error = CoreError;

    fn try_from(items: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(items)
    }
}

impl From<Corpus> for Vec<String> {
    fn from(corpus: Corpus) -> Self {
        corpus.items
    }
}

/// Strip a leading `- `, `* ` or `12. ` list marker.
fn strip_list_marker(line: &str) -> &str {
    if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        return rest.trim_start();
    }

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix(". ") {
            return rest.trim_start();
        }
    }

    line
}
