//! Per-reviewer annotation store backed by one JSON file per reviewer.
//!
//! Layout of the store directory:
//!
//! - `<reviewer>.json`: the reviewer's records, a JSON object keyed by
//!   candidate key.
//! - `<reviewer>.meta.json`: optional sidecar recording which key scheme
//!   the records were written under. Stores without one are untagged and
//!   treated as legacy by migration.
//!
//! Every operation on a reviewer's store runs under that reviewer's lock, so
//! two concurrent merge-writes cannot lose each other's fields. Different
//! reviewers never contend. Files are replaced atomically (temp file in the
//! same directory, then rename); a failed write leaves the previous file
//! intact. Nothing here excludes other processes.
//!
//! The record file and its sidecar are two files, so a write touching both
//! is two renames. When the sidecar rename fails, the record file is put
//! back to what it was before. A process killed between the two
//! renames can still leave an untagged store holding current keys.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{SecondsFormat, Utc};
use lexcheck_core::{Annotations, CandidateKey, JudgmentRecord, KeyScheme, Patch};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use crate::StoreError;
use crate::reviewer::ReviewerId;

const STORE_EXT: &str = "json";
pub(crate) const META_STEM_SUFFIX: &str = ".meta";

/// Sidecar describing how a store's keys were written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMeta {
    pub key_scheme: KeyScheme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrated_at: Option<String>,
}

impl StoreMeta {
    pub fn current() -> Self {
        Self {
            key_scheme: KeyScheme::Current,
            migrated_at: None,
        }
    }
}

/// ISO 8601 UTC timestamp with millisecond precision.
pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub struct AnnotationStore {
    dir: PathBuf,
    locks: Mutex<HashMap<ReviewerId, Arc<Mutex<()>>>>,
}

impl AnnotationStore {
    /// Open a store rooted at `dir`. The directory is created on first write.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn store_path(&self, reviewer: &ReviewerId) -> PathBuf {
        self.dir.join(format!("{reviewer}.{STORE_EXT}"))
    }

    pub fn meta_path(&self, reviewer: &ReviewerId) -> PathBuf {
        self.dir
            .join(format!("{reviewer}{META_STEM_SUFFIX}.{STORE_EXT}"))
    }

    /// Load a reviewer's records.
    ///
    /// A reviewer without a store gets an empty mapping. A store that exists
    /// but does not parse is `CorruptStore`.
    pub fn load(&self, reviewer: &str) -> Result<Annotations, StoreError> {
        let id = ReviewerId::parse(reviewer)?;
        let lock = self.lock_for(&id);
        let _guard = acquire(&*lock);
        let records = read_json::<Annotations>(&self.store_path(&id))?.unwrap_or_default();
        debug!(reviewer = %id, records = records.len(), "loaded annotations");
        Ok(records)
    }

    /// Point lookup. An absent record is the default (unset) record.
    pub fn get(&self, reviewer: &str, key: &CandidateKey) -> Result<JudgmentRecord, StoreError> {
        Ok(self.load(reviewer)?.remove(key).unwrap_or_default())
    }

    /// Overlay `patch` onto the reviewer's records and persist the whole store.
    ///
    /// Each patched record is merged field by field into the existing record
    /// (or a default one) and stamped with the write time. Records not named
    /// in the patch are written back unchanged. Either the whole merged store
    /// is persisted or the previous file is left in place.
    pub fn merge_write(&self, reviewer: &str, patch: &Patch) -> Result<(), StoreError> {
        let id = ReviewerId::parse(reviewer)?;
        if patch.is_empty() {
            debug!(reviewer = %id, "empty patch, nothing to write");
            return Ok(());
        }

        let lock = self.lock_for(&id);
        let _guard = acquire(&*lock);

        let path = self.store_path(&id);
        let existing = read_json::<Annotations>(&path)?;
        let created = existing.is_none();
        let mut records = existing.unwrap_or_default();

        let timestamp = now_timestamp();
        for (key, fields) in patch {
            records.entry(key.clone()).or_default().apply(fields, &timestamp);
        }

        std::fs::create_dir_all(&self.dir)?;
        let meta_path = self.meta_path(&id);
        Commit {
            store_path: &path,
            meta_path: &meta_path,
            previous: None,
            records: Some(serde_json::to_value(&records).map_err(StoreError::Serialize)?),
            meta: created.then(StoreMeta::current),
        }
        .run()?;

        info!(
            reviewer = %id,
            patched = patch.len(),
            total = records.len(),
            created,
            "merged annotation patch"
        );
        Ok(())
    }

    /// Key scheme the reviewer's records are written under.
    pub fn key_scheme(&self, reviewer: &str) -> Result<KeyScheme, StoreError> {
        let id = ReviewerId::parse(reviewer)?;
        let lock = self.lock_for(&id);
        let _guard = acquire(&*lock);
        Ok(self.read_meta(&id)?.unwrap_or_default().key_scheme)
    }

    /// Every reviewer with a store file, sorted by name.
    pub fn reviewers(&self) -> Result<Vec<ReviewerId>, StoreError> {
        if !self.dir.is_dir() {
            return Err(StoreError::NotFound(self.dir.clone()));
        }
        let mut reviewers = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != STORE_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                warn!(path = %path.display(), "skipping store with non-UTF-8 name");
                continue;
            };
            if stem.ends_with(META_STEM_SUFFIX) {
                continue;
            }
            match ReviewerId::parse(stem) {
                Ok(id) if id.as_str() == stem => reviewers.push(id),
                _ => warn!(path = %path.display(), "skipping store with invalid reviewer name"),
            }
        }
        reviewers.sort();
        Ok(reviewers)
    }

    pub(crate) fn read_meta(&self, id: &ReviewerId) -> Result<Option<StoreMeta>, StoreError> {
        read_json(&self.meta_path(id))
    }

    /// Lock guarding one reviewer's files, shared by every caller.
    pub(crate) fn lock_for(&self, id: &ReviewerId) -> Arc<Mutex<()>> {
        let mut locks = acquire(&self.locks);
        Arc::clone(locks.entry(id.clone()).or_default())
    }
}

/// The guarded data is either `()` or the lock table itself, neither of
/// which a panicking holder can leave half-updated.
pub(crate) fn acquire<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Read and parse a JSON file, `None` if it does not exist.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| StoreError::CorruptStore {
            path: path.to_path_buf(),
            source,
        })
}

/// A record-file write and a sidecar write that succeed or fail together.
pub(crate) struct Commit<'a> {
    pub store_path: &'a Path,
    pub meta_path: &'a Path,
    /// Record file contents to restore if the sidecar cannot be written.
    /// `None` means the record file did not exist.
    pub previous: Option<Value>,
    pub records: Option<Value>,
    pub meta: Option<StoreMeta>,
}

impl Commit<'_> {
    pub fn run(self) -> Result<(), StoreError> {
        self.run_with(write_json_atomic::<Value>)
    }

    /// Records first, then the sidecar. A failed sidecar write rolls the
    /// record file back before the error is returned.
    pub fn run_with(
        self,
        mut write: impl FnMut(&Path, &Value) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        if let Some(records) = &self.records {
            write(self.store_path, records)?;
        }
        let Some(meta) = &self.meta else {
            return Ok(());
        };
        let meta = serde_json::to_value(meta).map_err(StoreError::Serialize)?;
        let Err(err) = write(self.meta_path, &meta) else {
            return Ok(());
        };
        if self.records.is_none() {
            return Err(err);
        }

        let rollback = match &self.previous {
            Some(previous) => write(self.store_path, previous),
            None => std::fs::remove_file(self.store_path).map_err(StoreError::from),
        };
        match rollback {
            Ok(()) => warn!(
                path = %self.store_path.display(),
                error = %err,
                "sidecar write failed; record file restored"
            ),
            Err(rollback_err) => error!(
                path = %self.store_path.display(),
                error = %err,
                rollback_error = %rollback_err,
                "sidecar write failed and the record file could not be restored; \
                 the store holds rewritten records without a matching sidecar"
            ),
        }
        Err(err)
    }
}

/// Replace `path` with the pretty-printed JSON of `value` in one rename.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    use std::io::Write;

    let parent = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut tmp = NamedTempFile::new_in(&parent)?;
    serde_json::to_writer_pretty(&mut tmp, value).map_err(StoreError::Serialize)?;
    tmp.write_all(b"\n")?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexcheck_core::{Judgement, RecordPatch};
    use std::collections::BTreeMap;

    fn patch(entries: &[(&str, RecordPatch)]) -> Patch {
        entries
            .iter()
            .map(|(k, p)| (CandidateKey::from(*k), p.clone()))
            .collect()
    }

    fn key(k: &str) -> CandidateKey {
        CandidateKey::from(k)
    }

    #[test]
    fn load_missing_store_is_empty() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = AnnotationStore::open(tmp.path().join("answer"));
        assert!(store.load("sato").unwrap().is_empty());
    }

    #[test]
    fn empty_reviewer_is_invalid_argument() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = AnnotationStore::open(tmp.path());
        assert!(matches!(store.load(""), Err(StoreError::InvalidArgument(_))));
        let result = store.merge_write("", &patch(&[("a_0", RecordPatch::ok())]));
        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
    }

    #[test]
    fn first_write_creates_directory_and_tags_current() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = AnnotationStore::open(tmp.path().join("answer"));
        store
            .merge_write("sato", &patch(&[("a_0", RecordPatch::ok())]))
            .unwrap();

        let id = ReviewerId::parse("sato").unwrap();
        assert!(store.store_path(&id).exists());
        assert_eq!(store.key_scheme("sato").unwrap(), KeyScheme::Current);
        assert_eq!(store.get("sato", &key("a_0")).unwrap().judgement, Judgement::Ok);
    }

    #[test]
    fn fields_merge_across_writes() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = AnnotationStore::open(tmp.path());
        store
            .merge_write("sato", &patch(&[("k_3", RecordPatch::memo("x"))]))
            .unwrap();
        store
            .merge_write("sato", &patch(&[("k_3", RecordPatch::ok())]))
            .unwrap();

        let record = store.get("sato", &key("k_3")).unwrap();
        assert_eq!(record.memo, "x");
        assert_eq!(record.judgement, Judgement::Ok);
        assert!(!record.timestamp.is_empty());
    }

    #[test]
    fn unpatched_keys_are_preserved() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = AnnotationStore::open(tmp.path());
        store
            .merge_write(
                "sato",
                &patch(&[
                    ("a_0", RecordPatch::ng("Foo Act", "FA")),
                    ("b_1", RecordPatch::memo("recheck")),
                ]),
            )
            .unwrap();
        let before = store.get("sato", &key("a_0")).unwrap();

        store
            .merge_write("sato", &patch(&[("b_1", RecordPatch::ok())]))
            .unwrap();

        let records = store.load("sato").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[&key("a_0")], before);
        assert_eq!(records[&key("b_1")].memo, "recheck");
        assert_eq!(records[&key("b_1")].judgement, Judgement::Ok);
    }

    #[test]
    fn reviewers_are_isolated() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = AnnotationStore::open(tmp.path());
        store
            .merge_write("sato", &patch(&[("a_0", RecordPatch::ok())]))
            .unwrap();
        assert!(store.load("tanaka").unwrap().is_empty());
    }

    #[test]
    fn record_without_memo_loads_with_empty_memo() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("sato.json"),
            r#"{"a_0": {"judgement": "OK", "correctFormal": "", "correctAbbr": "", "timestamp": "2024-11-02T01:02:03.000Z"}}"#,
        )
        .unwrap();
        let store = AnnotationStore::open(tmp.path());
        let record = store.get("sato", &key("a_0")).unwrap();
        assert_eq!(record.memo, "");
        assert_eq!(record.judgement, Judgement::Ok);
    }

    #[test]
    fn corrupt_store_is_surfaced_and_left_untouched() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("sato.json");
        std::fs::write(&path, "{ truncated").unwrap();
        let store = AnnotationStore::open(tmp.path());

        assert!(matches!(store.load("sato"), Err(StoreError::CorruptStore { .. })));
        let result = store.merge_write("sato", &patch(&[("a_0", RecordPatch::ok())]));
        assert!(matches!(result, Err(StoreError::CorruptStore { .. })));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ truncated");
    }

    #[test]
    fn existing_untagged_store_stays_untagged_after_write() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("sato.json"), r#"{"a_1": {"judgement": "NG"}}"#).unwrap();
        let store = AnnotationStore::open(tmp.path());
        store
            .merge_write("sato", &patch(&[("a_1", RecordPatch::memo("old key"))]))
            .unwrap();
        assert_eq!(store.key_scheme("sato").unwrap(), KeyScheme::Legacy);
        assert!(!store.meta_path(&ReviewerId::parse("sato").unwrap()).exists());
    }

    #[test]
    fn unknown_record_fields_survive_merge() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("sato.json"),
            r#"{"a_0": {"judgement": "NG", "reviewRound": 2}}"#,
        )
        .unwrap();
        let store = AnnotationStore::open(tmp.path());
        store
            .merge_write("sato", &patch(&[("a_0", RecordPatch::memo("x"))]))
            .unwrap();

        let raw: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(tmp.path().join("sato.json")).unwrap())
                .unwrap();
        assert_eq!(raw["a_0"]["reviewRound"], 2);
        assert_eq!(raw["a_0"]["memo"], "x");
    }

    #[test]
    fn empty_patch_does_not_create_store() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = AnnotationStore::open(tmp.path());
        store.merge_write("sato", &Patch::new()).unwrap();
        assert!(!tmp.path().join("sato.json").exists());
    }

    #[test]
    fn reviewers_lists_store_files_only() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = AnnotationStore::open(tmp.path());
        for name in ["tanaka", "sato"] {
            store
                .merge_write(name, &patch(&[("a_0", RecordPatch::ok())]))
                .unwrap();
        }
        std::fs::write(tmp.path().join("notes.txt"), "ignore me").unwrap();

        let names: Vec<String> = store
            .reviewers()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(names, ["sato", "tanaka"]);
    }

    #[test]
    fn reviewers_on_missing_dir_is_not_found() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = AnnotationStore::open(tmp.path().join("missing"));
        assert!(matches!(store.reviewers(), Err(StoreError::NotFound(_))));
    }

    fn failing_on<'a>(
        target: &'a Path,
    ) -> impl FnMut(&Path, &Value) -> Result<(), StoreError> + 'a {
        move |path: &Path, value: &Value| {
            if path == target {
                Err(StoreError::Io(std::io::Error::other("disk full")))
            } else {
                write_json_atomic(path, value)
            }
        }
    }

    #[test]
    fn failed_sidecar_write_restores_previous_records() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store_path = tmp.path().join("sato.json");
        let meta_path = tmp.path().join("sato.meta.json");
        std::fs::write(&store_path, r#"{"a_1": {"judgement": "OK"}}"#).unwrap();

        let result = Commit {
            store_path: &store_path,
            meta_path: &meta_path,
            previous: Some(serde_json::json!({"a_1": {"judgement": "OK"}})),
            records: Some(serde_json::json!({"a_2": {"judgement": "OK"}})),
            meta: Some(StoreMeta::current()),
        }
        .run_with(failing_on(&meta_path));

        assert!(matches!(result, Err(StoreError::Io(_))));
        let raw: Value =
            serde_json::from_str(&std::fs::read_to_string(&store_path).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({"a_1": {"judgement": "OK"}}));
        assert!(!meta_path.exists());
    }

    #[test]
    fn failed_sidecar_write_removes_new_record_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store_path = tmp.path().join("sato.json");
        let meta_path = tmp.path().join("sato.meta.json");

        let result = Commit {
            store_path: &store_path,
            meta_path: &meta_path,
            previous: None,
            records: Some(serde_json::json!({"a_2": {"judgement": "OK"}})),
            meta: Some(StoreMeta::current()),
        }
        .run_with(failing_on(&meta_path));

        assert!(result.is_err());
        assert!(!store_path.exists());
        assert!(!meta_path.exists());
    }

    #[test]
    fn concurrent_writes_for_one_reviewer_do_not_clobber() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = Arc::new(AnnotationStore::open(tmp.path()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for j in 0..5 {
                        let k = format!("f{i}_{j}");
                        store
                            .merge_write("sato", &patch(&[(k.as_str(), RecordPatch::ok())]))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.load("sato").unwrap().len(), 40);
    }
}
