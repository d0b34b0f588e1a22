//! Merging records fetched from another copy of a reviewer's store.
//!
//! Imported records may be keyed under either scheme. Legacy keys are
//! translated before they touch the local store, and a local store still
//! under legacy keys is migrated in the same locked cycle, so the result is
//! always a store tagged `current` whose keys all use the current scheme.

use lexcheck_core::{Annotations, KeyScheme, LegacyKeyIndex};
use serde_json::Value;
use tracing::{debug, info};

use crate::StoreError;
use crate::migrate::{KeyConflict, RawRecords, migrate_records};
use crate::reviewer::ReviewerId;
use crate::store::{AnnotationStore, Commit, StoreMeta, acquire, now_timestamp, read_json};

#[derive(Debug, Clone)]
pub struct ImportReport {
    pub reviewer: ReviewerId,
    /// Scheme of the local store before the import, `None` if it did not exist.
    pub local_scheme: Option<KeyScheme>,
    pub imported: usize,
    /// Imported keys renamed from legacy to current.
    pub renamed: usize,
    /// Local keys renamed while bringing the local store to current keys.
    pub local_renamed: usize,
    pub conflicts: Vec<KeyConflict>,
    /// Records in the store after the import.
    pub total: usize,
}

impl AnnotationStore {
    /// Merge `incoming`, keyed under `scheme`, into the reviewer's store.
    ///
    /// Each imported record replaces the local record with the same key
    /// whole, keeping its own timestamp. Fields of the local record that the
    /// imported one does not carry are kept.
    pub fn import(
        &self,
        reviewer: &str,
        incoming: &Annotations,
        scheme: KeyScheme,
        index: &LegacyKeyIndex,
    ) -> Result<ImportReport, StoreError> {
        let id = ReviewerId::parse(reviewer)?;
        let lock = self.lock_for(&id);
        let _guard = acquire(&*lock);

        let path = self.store_path(&id);
        let existing: Option<RawRecords> = read_json(&path)?;
        let local_scheme = match &existing {
            Some(_) => Some(self.read_meta(&id)?.unwrap_or_default().key_scheme),
            None => None,
        };

        if incoming.is_empty() {
            debug!(reviewer = %id, "nothing to import");
            return Ok(ImportReport {
                reviewer: id,
                local_scheme,
                imported: 0,
                renamed: 0,
                local_renamed: 0,
                conflicts: Vec::new(),
                total: existing.map_or(0, |records| records.len()),
            });
        }

        let previous = existing.clone().map(Value::Object);
        let local = migrate_records(
            index,
            local_scheme.unwrap_or(KeyScheme::Current),
            existing.unwrap_or_default(),
        );
        let remote = migrate_records(index, scheme, to_raw(incoming)?);

        let mut records = local.records;
        for (key, value) in remote.records {
            let merged = merge_record(records.remove(&key), value);
            records.insert(key, merged);
        }

        let meta = match local_scheme {
            Some(KeyScheme::Current) => None,
            Some(KeyScheme::Legacy) => Some(StoreMeta {
                key_scheme: KeyScheme::Current,
                migrated_at: Some(now_timestamp()),
            }),
            None => Some(StoreMeta::current()),
        };

        std::fs::create_dir_all(self.dir())?;
        let meta_path = self.meta_path(&id);
        let total = records.len();
        Commit {
            store_path: &path,
            meta_path: &meta_path,
            previous,
            records: Some(Value::Object(records)),
            meta,
        }
        .run()?;

        let mut conflicts = local.conflicts;
        conflicts.extend(remote.conflicts);
        info!(
            reviewer = %id,
            imported = incoming.len(),
            renamed = remote.renamed.len(),
            local_renamed = local.renamed.len(),
            conflicts = conflicts.len(),
            total,
            "imported records"
        );

        Ok(ImportReport {
            reviewer: id,
            local_scheme,
            imported: incoming.len(),
            renamed: remote.renamed.len(),
            local_renamed: local.renamed.len(),
            conflicts,
            total,
        })
    }
}

fn to_raw(records: &Annotations) -> Result<RawRecords, StoreError> {
    match serde_json::to_value(records).map_err(StoreError::Serialize)? {
        Value::Object(map) => Ok(map),
        _ => Ok(RawRecords::new()),
    }
}

/// The imported record, plus any field only the local record has.
fn merge_record(local: Option<Value>, imported: Value) -> Value {
    match (local, imported) {
        (Some(Value::Object(local)), Value::Object(mut imported)) => {
            for (field, value) in local {
                imported.entry(field).or_insert(value);
            }
            Value::Object(imported)
        }
        (_, imported) => imported,
    }
}
