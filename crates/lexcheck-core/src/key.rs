//! Candidate keys and the two keying schemes they have been written under.
//!
//! - **Legacy**: `"{file}_{list_index}"`, where `list_index` counts entries
//!   sharing the same `file` in dataset order. Drifts whenever entries for a
//!   file are added, removed, or reordered.
//! - **Current**: `"{file}_{top_index}"`, where `top_index` is the absolute
//!   position in the dataset. Stable while the dataset is append-only.
//!
//! Both schemes produce strings of the same shape, so a key cannot be
//! classified by parsing it. Translation goes through a [`LegacyKeyIndex`]
//! rebuilt from the dataset, and stores record which scheme they were
//! written under.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dataset::{Dataset, ReferenceEntry};

/// Which keying scheme a store's keys were written under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyScheme {
    /// Per-file positional keys. Untagged stores are assumed to be legacy
    /// (possibly mixed with current keys).
    #[default]
    Legacy,
    Current,
}

impl fmt::Display for KeyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => f.pad("legacy"),
            Self::Current => f.pad("current"),
        }
    }
}

/// String identifying one candidate in an annotation store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateKey(String);

impl CandidateKey {
    /// Current-scheme key for the entry at `top_index`.
    pub fn current(entry: &ReferenceEntry, top_index: usize) -> Self {
        Self(format!("{}_{}", entry.file, top_index))
    }

    /// Legacy-scheme key for the `list_index`-th entry of `file`.
    pub fn legacy(file: &str, list_index: usize) -> Self {
        Self(format!("{file}_{list_index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CandidateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<String> for CandidateKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CandidateKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Borrow<str> for CandidateKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Reconstruction of the legacy numbering from the current dataset.
///
/// Assumes the relative order of entries sharing a `file` has not changed
/// between the dataset version that produced the legacy keys and this one.
/// Nothing checks that assumption.
#[derive(Debug, Clone, Default)]
pub struct LegacyKeyIndex {
    by_key: HashMap<String, (String, usize)>,
}

impl LegacyKeyIndex {
    /// Walk the dataset once, numbering entries per distinct `file` from 0.
    pub fn build(dataset: &Dataset) -> Self {
        let mut next_list_index: HashMap<&str, usize> = HashMap::new();
        let mut by_key = HashMap::with_capacity(dataset.len());

        for (top_index, entry) in dataset.iter() {
            if entry.file.is_empty() {
                warn!(top_index, "entry has no file; excluded from legacy keys");
                continue;
            }
            let counter = next_list_index.entry(entry.file.as_str()).or_insert(0);
            let legacy = CandidateKey::legacy(&entry.file, *counter);
            by_key.insert(legacy.into_string(), (entry.file.clone(), top_index));
            *counter += 1;
        }

        Self { by_key }
    }

    /// `top_index` of the entry a legacy key referred to.
    pub fn top_index(&self, legacy_key: &str) -> Option<usize> {
        self.by_key.get(legacy_key).map(|(_, i)| *i)
    }

    /// Current-scheme key for a legacy key, or `None` if the key is not in
    /// the legacy domain.
    pub fn translate(&self, legacy_key: &str) -> Option<CandidateKey> {
        self.by_key
            .get(legacy_key)
            .map(|(file, i)| CandidateKey(format!("{file}_{i}")))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
