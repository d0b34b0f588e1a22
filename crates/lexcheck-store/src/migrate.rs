//! One-shot migration of stores from legacy keys to current keys.
//!
//! The translation itself ([`migrate_records`]) is pure. Stores tagged
//! `current` are returned untouched, which makes a second run a no-op even
//! when a current key happens to look like some other entry's legacy key.
//! Untagged stores are translated key by key: a key found in the
//! [`LegacyKeyIndex`] is renamed, anything else is kept as-is.
//!
//! Records move verbatim. When two source keys land on the same
//! destination, the later one in iteration order (lexicographic key order)
//! wins and the collision is reported.

use std::collections::HashMap;
use std::path::Path;

use lexcheck_core::{Dataset, DatasetError, JudgmentRecord, KeyScheme, LegacyKeyIndex};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::StoreError;
use crate::reviewer::ReviewerId;
use crate::store::{
    AnnotationStore, Commit, StoreMeta, acquire, now_timestamp, read_json, write_json_atomic,
};

/// A store's records as raw JSON, keyed by candidate key.
pub type RawRecords = Map<String, Value>;

/// Two source keys that translated to the same destination key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyConflict {
    pub key: String,
    /// Source key whose record was kept.
    pub kept: String,
    /// Source key whose record was overwritten.
    pub dropped: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MigrationOutcome {
    /// Scheme of `records`. Always `Current` after migration.
    pub scheme: KeyScheme,
    pub records: RawRecords,
    /// `(from, to)` for every key whose name changed.
    pub renamed: Vec<(String, String)>,
    pub conflicts: Vec<KeyConflict>,
    /// Keys whose value is not a judgment record; carried over unrenamed.
    pub malformed: Vec<String>,
}

impl MigrationOutcome {
    fn unchanged(records: RawRecords) -> Self {
        Self {
            scheme: KeyScheme::Current,
            records,
            renamed: Vec::new(),
            conflicts: Vec::new(),
            malformed: Vec::new(),
        }
    }

    /// Whether the records need writing back.
    pub fn changed(&self) -> bool {
        !self.renamed.is_empty() || !self.conflicts.is_empty()
    }
}

/// Translate a store's keys to the current scheme.
pub fn migrate_records(
    index: &LegacyKeyIndex,
    scheme: KeyScheme,
    records: RawRecords,
) -> MigrationOutcome {
    if scheme == KeyScheme::Current {
        debug!(records = records.len(), "store already uses current keys");
        return MigrationOutcome::unchanged(records);
    }

    let mut outcome = MigrationOutcome::unchanged(RawRecords::new());
    // destination key -> source key it currently holds
    let mut sources: HashMap<String, String> = HashMap::with_capacity(records.len());

    for (key, value) in records {
        let destination = if JudgmentRecord::deserialize(&value).is_err() {
            warn!(key = %key, "malformed record; kept under its original key");
            outcome.malformed.push(key.clone());
            key.clone()
        } else {
            match index.translate(&key) {
                Some(new_key) => new_key.into_string(),
                None => key.clone(),
            }
        };

        if destination != key {
            outcome.renamed.push((key.clone(), destination.clone()));
        }
        if let Some(previous) = sources.insert(destination.clone(), key.clone()) {
            warn!(
                key = %destination,
                kept = %key,
                dropped = %previous,
                "key collision during migration; later record wins"
            );
            outcome.conflicts.push(KeyConflict {
                key: destination.clone(),
                kept: key,
                dropped: previous,
            });
        }
        outcome.records.insert(destination, value);
    }

    outcome
}

/// Result of migrating one reviewer's store.
#[derive(Debug, Clone)]
pub struct MigrationReport {
    pub reviewer: ReviewerId,
    pub previous_scheme: KeyScheme,
    pub records: usize,
    pub renamed: usize,
    pub conflicts: Vec<KeyConflict>,
    pub malformed: Vec<String>,
    /// Whether the record file was rewritten.
    pub written: bool,
}

impl AnnotationStore {
    /// Migrate one reviewer's store in place.
    ///
    /// Holds the reviewer's lock for the whole read-translate-write cycle,
    /// so no merge-write can interleave.
    pub fn migrate(
        &self,
        reviewer: &ReviewerId,
        index: &LegacyKeyIndex,
    ) -> Result<MigrationReport, StoreError> {
        self.migrate_with(reviewer, index, write_json_atomic::<Value>)
    }

    pub(crate) fn migrate_with(
        &self,
        reviewer: &ReviewerId,
        index: &LegacyKeyIndex,
        write: impl FnMut(&Path, &Value) -> Result<(), StoreError>,
    ) -> Result<MigrationReport, StoreError> {
        let lock = self.lock_for(reviewer);
        let _guard = acquire(&*lock);

        let path = self.store_path(reviewer);
        let records: RawRecords =
            read_json(&path)?.ok_or_else(|| StoreError::NotFound(path.clone()))?;
        let previous_scheme = self.read_meta(reviewer)?.unwrap_or_default().key_scheme;

        let previous = Value::Object(records.clone());
        let outcome = migrate_records(index, previous_scheme, records);
        let written = outcome.changed();
        let meta_path = self.meta_path(reviewer);
        Commit {
            store_path: &path,
            meta_path: &meta_path,
            previous: Some(previous),
            records: written.then(|| Value::Object(outcome.records.clone())),
            meta: (previous_scheme != KeyScheme::Current).then(|| StoreMeta {
                key_scheme: KeyScheme::Current,
                migrated_at: Some(now_timestamp()),
            }),
        }
        .run_with(write)?;

        info!(
            reviewer = %reviewer,
            previous_scheme = %previous_scheme,
            renamed = outcome.renamed.len(),
            conflicts = outcome.conflicts.len(),
            malformed = outcome.malformed.len(),
            written,
            "migrated store"
        );

        Ok(MigrationReport {
            reviewer: reviewer.clone(),
            previous_scheme,
            records: outcome.records.len(),
            renamed: outcome.renamed.len(),
            conflicts: outcome.conflicts,
            malformed: outcome.malformed,
            written,
        })
    }

    /// Migrate every store in the directory against `dataset`.
    ///
    /// A store that fails (e.g. corrupt JSON) is recorded and the batch
    /// carries on.
    pub fn migrate_all(&self, dataset: &Dataset) -> Result<BatchReport, StoreError> {
        if !self.dir().is_dir() {
            return Err(StoreError::SetupFatal(format!(
                "store directory {} does not exist",
                self.dir().display()
            )));
        }
        let index = LegacyKeyIndex::build(dataset);
        let mut report = BatchReport {
            dataset_entries: dataset.len(),
            legacy_keys: index.len(),
            ..BatchReport::default()
        };

        for reviewer in self.reviewers()? {
            match self.migrate(&reviewer, &index) {
                Ok(r) => report.migrated.push(r),
                Err(e) => {
                    error!(reviewer = %reviewer, error = %e, "store migration failed");
                    report.failed.push((reviewer, e));
                }
            }
        }

        info!(
            stores = report.migrated.len() + report.failed.len(),
            written = report.written(),
            failed = report.failed.len(),
            "migration batch complete"
        );
        Ok(report)
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub dataset_entries: usize,
    pub legacy_keys: usize,
    pub migrated: Vec<MigrationReport>,
    pub failed: Vec<(ReviewerId, StoreError)>,
}

impl BatchReport {
    pub fn written(&self) -> usize {
        self.migrated.iter().filter(|r| r.written).count()
    }

    pub fn conflicts(&self) -> usize {
        self.migrated.iter().map(|r| r.conflicts.len()).sum()
    }
}

/// Migrate a store directory from a dataset file.
///
/// A missing dataset, an unreadable dataset, or a missing directory aborts
/// before any store is touched.
pub fn migrate_directory(dataset_path: &Path, store_dir: &Path) -> Result<BatchReport, StoreError> {
    let dataset = Dataset::load(dataset_path).map_err(|e| match e {
        DatasetError::NotFound(p) => {
            StoreError::SetupFatal(format!("dataset {} does not exist", p.display()))
        }
        other => StoreError::SetupFatal(other.to_string()),
    })?;
    AnnotationStore::open(store_dir).migrate_all(&dataset)
}
