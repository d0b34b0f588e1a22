//! Reference dataset: the ordered, read-only list of entries under review.
//!
//! On disk the dataset is a JSON array (`choise_rand.json`). Each element
//! carries the source file it was extracted from, the surrounding legal
//! text, and a `list` of proposed formal-name/abbreviation pairs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::key::CandidateKey;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read dataset {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse dataset: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A proposed (formal name, abbreviation) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub formal: String,
    #[serde(default)]
    pub abbr: String,
}

/// One unit of the reference dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawEntry", into = "RawEntry")]
pub struct ReferenceEntry {
    pub file: String,
    pub text: String,
    pub law_name: String,
    pub candidates: Vec<Candidate>,
}

impl ReferenceEntry {
    /// The candidate shown to reviewers. Only the first pair is reviewed.
    pub fn primary_candidate(&self) -> Option<&Candidate> {
        self.candidates.first()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ArticleIndex {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    law_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawEntry {
    #[serde(default)]
    file: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    list: Vec<Candidate>,
    #[serde(default)]
    article_index: Option<ArticleIndex>,
}

impl From<RawEntry> for ReferenceEntry {
    fn from(raw: RawEntry) -> Self {
        Self {
            file: raw.file,
            text: raw.text,
            law_name: raw.article_index.map(|a| a.law_name).unwrap_or_default(),
            candidates: raw.list,
        }
    }
}

impl From<ReferenceEntry> for RawEntry {
    fn from(entry: ReferenceEntry) -> Self {
        Self {
            file: entry.file,
            text: entry.text,
            list: entry.candidates,
            article_index: Some(ArticleIndex {
                law_name: entry.law_name,
            }),
        }
    }
}

/// A candidate projected for review, addressed by its current key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewItem {
    pub key: CandidateKey,
    pub top_index: usize,
    pub file: String,
    pub text: String,
    pub law_name: String,
    pub formal: String,
    pub abbr: String,
}

/// Ordered sequence of immutable reference entries.
///
/// `top_index` is an entry's position in this sequence. It is stable for a
/// dataset version as long as the dataset is only ever appended to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    entries: Vec<ReferenceEntry>,
}

impl Dataset {
    pub fn new(entries: Vec<ReferenceEntry>) -> Self {
        Self { entries }
    }

    /// Load the dataset from a JSON file.
    ///
    /// A missing file is `NotFound`, distinct from a present-but-empty array.
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        if !path.exists() {
            return Err(DatasetError::NotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let dataset = Self::from_json_str(&raw)?;
        info!(path = %path.display(), entries = dataset.len(), "loaded reference dataset");
        Ok(dataset)
    }

    /// Load the dataset, degrading to an empty one on any failure.
    ///
    /// The failure is logged so it stays distinguishable from a genuinely
    /// empty dataset.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(dataset) => dataset,
            Err(err) => {
                error!(path = %path.display(), error = %err, "dataset unavailable, using empty dataset");
                Self::default()
            }
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, DatasetError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, top_index: usize) -> Option<&ReferenceEntry> {
        self.entries.get(top_index)
    }

    /// Entries paired with their `top_index`.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &ReferenceEntry)> {
        self.entries.iter().enumerate()
    }

    /// Find the entry a current key points at, if any.
    pub fn resolve(&self, key: &CandidateKey) -> Option<(usize, &ReferenceEntry)> {
        self.iter()
            .find(|(i, entry)| CandidateKey::current(entry, *i) == *key)
    }

    /// One review item per entry, built from the entry's primary candidate.
    pub fn review_items(&self) -> Vec<ReviewItem> {
        self.iter()
            .map(|(top_index, entry)| {
                let candidate = entry.primary_candidate().cloned().unwrap_or_default();
                ReviewItem {
                    key: CandidateKey::current(entry, top_index),
                    top_index,
                    file: entry.file.clone(),
                    text: entry.text.clone(),
                    law_name: entry.law_name.clone(),
                    formal: candidate.formal,
                    abbr: candidate.abbr,
                }
            })
            .collect()
    }
}
