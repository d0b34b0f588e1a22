//! Reviewer judgments and the partial patches that update them.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::key::CandidateKey;

/// A reviewer's full annotation set, keyed by candidate.
///
/// Iteration order is lexicographic key order.
pub type Annotations = BTreeMap<CandidateKey, JudgmentRecord>;

/// A set of partial updates, keyed by candidate.
pub type Patch = BTreeMap<CandidateKey, RecordPatch>;

/// OK/NG verdict. `Unset` is written as an empty string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Judgement {
    #[default]
    #[serde(rename = "")]
    Unset,
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "NG")]
    Ng,
}

impl Judgement {
    pub fn is_set(self) -> bool {
        self != Self::Unset
    }
}

fn nullable_judgement<'de, D>(deserializer: D) -> Result<Judgement, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Judgement>::deserialize(deserializer)?.unwrap_or_default())
}

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// One reviewer's judgment of one candidate.
///
/// Every field defaults when absent on disk, so records written before a
/// field existed (e.g. `memo`) load cleanly. Fields this version does not
/// know about are kept in `extra` and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JudgmentRecord {
    #[serde(deserialize_with = "nullable_judgement")]
    pub judgement: Judgement,
    #[serde(deserialize_with = "nullable_string")]
    pub correct_formal: String,
    #[serde(deserialize_with = "nullable_string")]
    pub correct_abbr: String,
    #[serde(deserialize_with = "nullable_string")]
    pub memo: String,
    /// ISO 8601 time of the last write to this record.
    #[serde(deserialize_with = "nullable_string")]
    pub timestamp: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl JudgmentRecord {
    /// Overlay the fields present in `patch`, then stamp the record.
    ///
    /// An OK verdict clears the corrections; they only carry meaning for NG.
    /// The memo is independent of the verdict.
    pub fn apply(&mut self, patch: &RecordPatch, timestamp: &str) {
        if let Some(judgement) = patch.judgement {
            self.judgement = judgement;
        }
        if let Some(formal) = &patch.correct_formal {
            self.correct_formal.clone_from(formal);
        }
        if let Some(abbr) = &patch.correct_abbr {
            self.correct_abbr.clone_from(abbr);
        }
        if let Some(memo) = &patch.memo {
            self.memo.clone_from(memo);
        }
        if self.judgement == Judgement::Ok {
            self.correct_formal.clear();
            self.correct_abbr.clear();
        }
        self.timestamp = timestamp.to_string();
    }

    pub fn has_memo(&self) -> bool {
        !self.memo.trim().is_empty()
    }
}

/// Partial record: `Some` fields replace, `None` fields are preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judgement: Option<Judgement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_formal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_abbr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl RecordPatch {
    pub fn ok() -> Self {
        Self {
            judgement: Some(Judgement::Ok),
            ..Self::default()
        }
    }

    pub fn ng(correct_formal: impl Into<String>, correct_abbr: impl Into<String>) -> Self {
        Self {
            judgement: Some(Judgement::Ng),
            correct_formal: Some(correct_formal.into()),
            correct_abbr: Some(correct_abbr.into()),
            memo: None,
        }
    }

    pub fn memo(memo: impl Into<String>) -> Self {
        Self {
            memo: Some(memo.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
