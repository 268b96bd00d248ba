//! Per-file sync status, persisted as JSON.
//!
//! Records are kept in memory and written through to the state file
//! (default `.docdeck/status.json`) after every change. A store opened
//! without a path never touches the disk.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, warn};

use crate::anki::NoteId;

/// Errors reading or writing the state file.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("state file I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("state file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Sync state of one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileStatus {
    #[default]
    NotSynced,
    Synced,
    ModifiedAfterSync,
    Error,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::NotSynced => "not synced",
            FileStatus::Synced => "synced",
            FileStatus::ModifiedAfterSync => "modified after sync",
            FileStatus::Error => "error",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the store remembers about a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub status: FileStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_id: Option<NoteId>,
    /// Unix timestamp (milliseconds) of the last status change.
    pub updated_at: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    files: BTreeMap<String, FileRecord>,
}

#[derive(Serialize)]
struct StateFileRef<'a> {
    files: &'a BTreeMap<String, FileRecord>,
}

/// Status records keyed by file path.
pub struct StatusStore {
    records: RwLock<BTreeMap<String, FileRecord>>,
    path: Option<PathBuf>,
}

impl StatusStore {
    /// Open (or start) the store backed by `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let records = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str::<StateFile>(&content)?.files,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), files = records.len(), "opened status store");

        Ok(Self {
            records: RwLock::new(records),
            path: Some(path),
        })
    }

    /// A store that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            path: None,
        }
    }

    /// Status of `file`; unknown files are `NotSynced`.
    pub fn status(&self, file: &str) -> FileStatus {
        self.record(file).map(|r| r.status).unwrap_or_default()
    }

    pub fn record(&self, file: &str) -> Option<FileRecord> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.get(file).cloned()
    }

    /// Note id of a file synced at some point.
    pub fn note_id(&self, file: &str) -> Option<NoteId> {
        self.record(file).and_then(|r| r.note_id)
    }

    /// Set the status of `file`, keeping any known note id.
    pub fn set_status(&self, file: &str, status: FileStatus) -> Result<(), StoreError> {
        self.update(|records| {
            let note_id = records.get(file).and_then(|r| r.note_id);
            records.insert(
                file.to_string(),
                FileRecord {
                    status,
                    note_id,
                    updated_at: current_timestamp(),
                },
            );
            true
        })
    }

    pub fn mark_synced(&self, file: &str, note_id: NoteId) -> Result<(), StoreError> {
        self.update(|records| {
            records.insert(
                file.to_string(),
                FileRecord {
                    status: FileStatus::Synced,
                    note_id: Some(note_id),
                    updated_at: current_timestamp(),
                },
            );
            true
        })
    }

    /// Flag a synced file as edited. Returns whether the status changed.
    pub fn mark_modified(&self, file: &str) -> Result<bool, StoreError> {
        if self.status(file) != FileStatus::Synced {
            return Ok(false);
        }
        self.set_status(file, FileStatus::ModifiedAfterSync)?;
        Ok(true)
    }

    /// Flag a synced file whose modification time is newer than its sync.
    pub fn refresh_modified(&self, file: &str, modified: SystemTime) -> Result<bool, StoreError> {
        let Some(record) = self.record(file) else {
            return Ok(false);
        };
        if record.status != FileStatus::Synced || unix_millis(modified) <= record.updated_at {
            return Ok(false);
        }
        self.mark_modified(file)
    }

    /// Forget a file. Returns its record, if any.
    pub fn remove(&self, file: &str) -> Result<Option<FileRecord>, StoreError> {
        let mut removed = None;
        self.update(|records| {
            removed = records.remove(file);
            removed.is_some()
        })?;
        Ok(removed)
    }

    /// Move the record of `old` to `new`. Returns whether there was one.
    pub fn rename(&self, old: &str, new: &str) -> Result<bool, StoreError> {
        let mut moved = false;
        self.update(|records| {
            if let Some(record) = records.remove(old) {
                records.insert(new.to_string(), record);
                moved = true;
            }
            moved
        })?;
        Ok(moved)
    }

    /// All records, sorted by path.
    pub fn entries(&self) -> Vec<(String, FileRecord)> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Apply `change` to a copy of the records and, if it reports a
    /// modification, persist the copy. Memory only changes once the write
    /// succeeded.
    fn update<F>(&self, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, FileRecord>) -> bool,
    {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let mut next = records.clone();
        if change(&mut next) {
            self.persist(&next)?;
            *records = next;
        }
        Ok(())
    }

    fn persist(&self, records: &BTreeMap<String, FileRecord>) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = serde_json::to_string_pretty(&StateFileRef { files: records })?;

        // Write then rename so a crash never leaves a truncated file.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        if let Err(e) = fs::rename(&tmp, path) {
            warn!(path = %path.display(), error = %e, "could not replace status file");
            return Err(e.into());
        }
        Ok(())
    }
}

/// Get current Unix timestamp in milliseconds.
fn current_timestamp() -> u64 {
    unix_millis(SystemTime::now())
}

fn unix_millis(time: SystemTime) -> u64 {
    let millis = time
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis();
    u64::try_from(millis).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_unknown_file_is_not_synced() {
        let store = StatusStore::in_memory();
        assert_eq!(store.status("src/Foo.java"), FileStatus::NotSynced);
        assert_eq!(store.note_id("src/Foo.java"), None);
    }

    #[test]
    fn test_mark_synced_then_modified() {
        let store = StatusStore::in_memory();
        store.mark_synced("Foo.java", 17).unwrap();
        assert_eq!(store.status("Foo.java"), FileStatus::Synced);
        assert_eq!(store.note_id("Foo.java"), Some(17));

        assert!(store.mark_modified("Foo.java").unwrap());
        assert_eq!(store.status("Foo.java"), FileStatus::ModifiedAfterSync);
        // The note id survives the status change.
        assert_eq!(store.note_id("Foo.java"), Some(17));

        // Only synced files can become modified.
        assert!(!store.mark_modified("Foo.java").unwrap());
        assert!(!store.mark_modified("Other.java").unwrap());
        assert_eq!(store.status("Other.java"), FileStatus::NotSynced);
    }

    #[test]
    fn test_refresh_modified_compares_mtime() {
        let store = StatusStore::in_memory();
        store.mark_synced("Foo.java", 1).unwrap();

        let long_ago = UNIX_EPOCH + Duration::from_secs(10);
        assert!(!store.refresh_modified("Foo.java", long_ago).unwrap());
        assert_eq!(store.status("Foo.java"), FileStatus::Synced);

        let later = SystemTime::now() + Duration::from_secs(3600);
        assert!(store.refresh_modified("Foo.java", later).unwrap());
        assert_eq!(store.status("Foo.java"), FileStatus::ModifiedAfterSync);
    }

    #[test]
    fn test_edit_within_the_same_second_is_flagged() {
        let store = StatusStore::in_memory();
        store.mark_synced("Foo.java", 1).unwrap();
        let synced_at = store.record("Foo.java").unwrap().updated_at;

        let just_after = UNIX_EPOCH + Duration::from_millis(synced_at + 1);
        assert!(store.refresh_modified("Foo.java", just_after).unwrap());
        assert_eq!(store.status("Foo.java"), FileStatus::ModifiedAfterSync);
    }

    #[test]
    fn test_remove_and_rename() {
        let store = StatusStore::in_memory();
        store.mark_synced("a/Foo.java", 5).unwrap();

        assert!(store.rename("a/Foo.java", "b/Foo.java").unwrap());
        assert_eq!(store.status("a/Foo.java"), FileStatus::NotSynced);
        assert_eq!(store.note_id("b/Foo.java"), Some(5));
        assert!(!store.rename("a/Foo.java", "c/Foo.java").unwrap());

        let removed = store.remove("b/Foo.java").unwrap().unwrap();
        assert_eq!(removed.note_id, Some(5));
        assert!(store.entries().is_empty());
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".docdeck").join("status.json");

        {
            let store = StatusStore::open(&path).unwrap();
            store.mark_synced("src/Foo.java", 99).unwrap();
            store.set_status("src/Bar.java", FileStatus::Error).unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"SYNCED\""));

        let store = StatusStore::open(&path).unwrap();
        assert_eq!(store.status("src/Foo.java"), FileStatus::Synced);
        assert_eq!(store.note_id("src/Foo.java"), Some(99));
        assert_eq!(store.status("src/Bar.java"), FileStatus::Error);
        assert_eq!(store.entries().len(), 2);
    }

    #[test]
    fn test_failed_write_leaves_records_unchanged() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("state");
        std::fs::create_dir(&dir).unwrap();
        let store = StatusStore::open(dir.join("status.json")).unwrap();
        store.mark_synced("Foo.java", 7).unwrap();

        // A file where the state directory should be makes every write fail.
        std::fs::remove_dir_all(&dir).unwrap();
        std::fs::write(&dir, "").unwrap();

        assert!(matches!(
            store.set_status("Foo.java", FileStatus::Error),
            Err(StoreError::Io(_))
        ));
        assert!(store.mark_synced("Bar.java", 8).is_err());
        assert_eq!(store.status("Foo.java"), FileStatus::Synced);
        assert_eq!(store.note_id("Bar.java"), None);
        assert_eq!(store.entries().len(), 1);
    }

    #[test]
    fn test_corrupt_state_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("status.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(StatusStore::open(&path), Err(StoreError::Json(_))));
    }
}
