//! Sync workflow: source files in, Anki notes out.
//!
//! Each supported file becomes one note. The front is the file name, the
//! back is the extracted Markdown, the deck mirrors the file's directory
//! (`src/main/java` -> `src::main::java`) and the tags are the directory
//! names plus the file name. The [`StatusStore`] remembers which note
//! belongs to which file so later syncs update instead of duplicating.

use anyhow::Context;
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::anki::{AnkiError, Note, NoteBackend, NoteId};
use crate::config::Config;
use crate::extract::{extract_source, ExtractError};
use crate::status::{FileStatus, StatusStore};
use crate::syntax;

static PATH_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[/\\]+").expect("valid regex"));

/// What happened to one file during a sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    Created(NoteId),
    Updated(NoteId),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    /// File path relative to the project root.
    pub file: String,
    pub action: SyncAction,
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self.action, SyncAction::Failed(_))
    }
}

/// Result of syncing a batch of files.
#[derive(Debug, Default)]
pub struct SyncSummary {
    pub outcomes: Vec<FileOutcome>,
    /// Paths ignored because they are unsupported or excluded.
    pub skipped: usize,
}

impl SyncSummary {
    pub fn synced_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn error_count(&self) -> usize {
        self.outcomes.len() - self.synced_count()
    }
}

/// Drives extraction and note updates for one project.
pub struct Synchronizer<B: NoteBackend> {
    root: PathBuf,
    config: Config,
    backend: B,
    store: StatusStore,
}

impl<B: NoteBackend> Synchronizer<B> {
    pub fn new<P: AsRef<Path>>(root: P, config: Config, backend: B, store: StatusStore) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config,
            backend,
            store,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn store(&self) -> &StatusStore {
        &self.store
    }

    /// Key under which `file` is tracked: its path relative to the root.
    pub fn file_key(&self, file: &Path) -> String {
        relative(&self.root, file)
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// Whether `file` has a configured, parseable extension and is not excluded.
    pub fn is_supported(&self, file: &Path) -> bool {
        let Some(ext) = file.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.config.handles_extension(ext)
            && syntax::for_extension(&format!(".{}", ext.to_ascii_lowercase())).is_some()
            && !self.config.is_path_excluded(&relative(&self.root, file))
    }

    /// Whether `file` should be offered for syncing.
    pub fn needs_sync(&self, file: &Path) -> bool {
        self.is_supported(file) && self.store.status(&self.file_key(file)) != FileStatus::Synced
    }

    /// Build the note for `file` from its Markdown.
    pub fn note_for(&self, file: &Path, markdown: String) -> Note {
        Note {
            deck: deck_name(&self.root, file, &self.config.anki.default_deck),
            front: file
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default(),
            back: markdown,
            tags: tags(&self.root, file),
            source: file.to_string_lossy().to_string(),
        }
    }

    /// Sync a batch of files.
    ///
    /// Fails up front if the backend is unreachable. Per-file failures are
    /// recorded in the summary and mark the file as `Error`. `on_file` is
    /// called after each file is handled.
    pub async fn sync_files<F>(
        &self,
        paths: &[PathBuf],
        mut on_file: F,
    ) -> anyhow::Result<SyncSummary>
    where
        F: FnMut(&FileOutcome),
    {
        if !self.backend.is_available().await {
            anyhow::bail!(
                "AnkiConnect is not available; \
                 make sure Anki is running with the AnkiConnect add-on installed"
            );
        }

        let files: Vec<&PathBuf> = paths.iter().filter(|p| self.is_supported(p)).collect();
        let skipped = paths.len() - files.len();
        info!(files = files.len(), skipped, "syncing");

        // Parsing is CPU-bound; do it for all files at once before talking to Anki.
        let extracted: Vec<(&PathBuf, anyhow::Result<String>)> = files
            .par_iter()
            .map(|path| (*path, extract_file(path)))
            .collect();

        let mut summary = SyncSummary {
            skipped,
            ..Default::default()
        };
        for (path, markdown) in extracted {
            let outcome = self.sync_extracted(path, markdown).await;
            on_file(&outcome);
            summary.outcomes.push(outcome);
        }

        Ok(summary)
    }

    /// Sync one file. The caller is responsible for checking availability.
    pub async fn sync_file(&self, path: &Path) -> FileOutcome {
        self.sync_extracted(path, extract_file(path)).await
    }

    /// Push one extracted file and record the result. Failures, including
    /// failures to write the status file, end up in the outcome.
    async fn sync_extracted(&self, path: &Path, markdown: anyhow::Result<String>) -> FileOutcome {
        let key = self.file_key(path);

        let result = match markdown {
            Ok(markdown) if markdown.is_empty() => {
                Err(anyhow::anyhow!("no documentation comments found"))
            }
            Ok(markdown) => self.push(path, &key, markdown).await,
            Err(e) => Err(e),
        };

        let action = match result {
            Ok(action) => self.record_synced(&key, action),
            Err(e) => {
                let defect = e
                    .downcast_ref::<ExtractError>()
                    .is_some_and(ExtractError::is_defect);
                if defect {
                    error!(file = %key, error = %e, "internal error while extracting");
                } else {
                    warn!(file = %key, error = %e, "sync failed");
                }
                if let Err(store_err) = self.store.set_status(&key, FileStatus::Error) {
                    error!(file = %key, error = %store_err, "failed to record sync error");
                }
                SyncAction::Failed(format!("{:#}", e))
            }
        };

        FileOutcome { file: key, action }
    }

    /// Store the note id of a pushed file. The note already exists in Anki at
    /// this point, so a failed write is reported as a failure of this file.
    fn record_synced(&self, key: &str, action: SyncAction) -> SyncAction {
        let id = match action {
            SyncAction::Created(id) | SyncAction::Updated(id) => id,
            SyncAction::Failed(_) => return action,
        };
        match self.store.mark_synced(key, id) {
            Ok(()) => {
                info!(file = key, ?action, "synced");
                action
            }
            Err(e) => {
                error!(file = key, note_id = id, error = %e, "failed to record sync");
                SyncAction::Failed(format!("note {} was synced but not recorded: {}", id, e))
            }
        }
    }

    /// Update the file's existing note, or create a new one.
    async fn push(&self, path: &Path, key: &str, markdown: String) -> anyhow::Result<SyncAction> {
        let note = self.note_for(path, markdown);

        if let Some(id) = self.store.note_id(key) {
            if self.backend.note_exists(id).await? {
                self.backend.update_note(id, &note).await?;
                return Ok(SyncAction::Updated(id));
            }
            debug!(file = key, note_id = id, "stored note is gone, creating a new one");
        }

        self.backend.create_deck(&note.deck).await?;
        let id = self.backend.add_note(&note).await?;
        Ok(SyncAction::Created(id))
    }

    /// Record an edit to `file`. Returns whether it was flagged for re-sync.
    pub fn file_changed(&self, file: &Path) -> anyhow::Result<bool> {
        if !self.is_supported(file) {
            return Ok(false);
        }
        Ok(self.store.mark_modified(&self.file_key(file))?)
    }

    /// Forget a deleted file and remove its note. Returns whether a note was deleted.
    pub async fn file_deleted(&self, file: &Path) -> anyhow::Result<bool> {
        let key = self.file_key(file);
        let mut deleted = false;

        if let Some(id) = self.store.note_id(&key) {
            if self.backend.is_available().await {
                match self.backend.delete_note(id).await {
                    Ok(()) => {
                        info!(file = %key, note_id = id, "deleted note");
                        deleted = true;
                    }
                    Err(e) => warn!(file = %key, note_id = id, error = %e, "failed to delete note"),
                }
            } else {
                warn!(file = %key, note_id = id, "AnkiConnect unavailable, note left in place");
            }
        }

        self.store.remove(&key)?;
        Ok(deleted)
    }

    /// Follow a moved file: re-deck and re-tag its note, rename its front
    /// if the file name changed, and move its record. Returns whether the
    /// note was updated.
    pub async fn file_moved(&self, old: &Path, new: &Path) -> anyhow::Result<bool> {
        let old_key = self.file_key(old);
        let new_key = self.file_key(new);
        let mut moved = false;

        if let Some(id) = self.store.note_id(&old_key) {
            let deck = deck_name(&self.root, new, &self.config.anki.default_deck);
            let tags = tags(&self.root, new);
            if self.backend.is_available().await {
                match self.relocate_note(id, old, new, &deck, &tags).await {
                    Ok(()) => {
                        info!(from = %old_key, to = %new_key, note_id = id, "moved note");
                        moved = true;
                    }
                    Err(e) => {
                        warn!(file = %new_key, note_id = id, error = %e, "failed to move note")
                    }
                }
            } else {
                warn!(file = %new_key, note_id = id, "AnkiConnect unavailable, note not moved");
            }
        }

        self.store.rename(&old_key, &new_key)?;
        Ok(moved)
    }

    async fn relocate_note(
        &self,
        id: NoteId,
        old: &Path,
        new: &Path,
        deck: &str,
        tags: &[String],
    ) -> Result<(), AnkiError> {
        self.backend.move_note(id, deck, tags).await?;
        if old.file_stem() != new.file_stem() {
            let front = new
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            self.backend.rename_note(id, &front).await?;
        }
        Ok(())
    }

    /// Current status of each supported file, after flagging files edited
    /// since their last sync.
    pub fn refresh_statuses(&self, paths: &[PathBuf]) -> anyhow::Result<Vec<(String, FileStatus)>> {
        let mut statuses = Vec::new();
        for path in paths.iter().filter(|p| self.is_supported(p)) {
            let key = self.file_key(path);
            if let Ok(modified) = fs::metadata(path).and_then(|m| m.modified()) {
                if self.store.refresh_modified(&key, modified)? {
                    debug!(file = %key, "modified after sync");
                }
            }
            statuses.push((key.clone(), self.store.status(&key)));
        }
        statuses.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(statuses)
    }
}

/// Read, parse and extract one file.
pub fn extract_file(path: &Path) -> anyhow::Result<String> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parser = syntax::for_extension(&format!(".{}", ext.to_ascii_lowercase()))
        .ok_or_else(|| anyhow::anyhow!("no parser for {}", path.display()))?;
    let source = fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    let markdown = extract_source(parser.as_ref(), &source)?;
    Ok(markdown)
}

/// `file` relative to `root`; files outside `root` keep their path minus
/// any root or prefix component.
fn relative(root: &Path, file: &Path) -> PathBuf {
    match file.strip_prefix(root) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => file
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect(),
    }
}

/// Anki deck for `file`: its directory relative to `root`, with `::`
/// between levels. Files directly in `root` go to `default_deck`.
pub fn deck_name(root: &Path, file: &Path, default_deck: &str) -> String {
    let rel = relative(root, file);
    let parent = rel
        .parent()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default();
    let deck = PATH_SEPARATORS.replace_all(parent.trim_matches(['/', '\\']), "::");
    if deck.is_empty() {
        default_deck.to_string()
    } else {
        deck.into_owned()
    }
}

/// Tags for `file`: each directory below `root`, then the file stem.
/// Whitespace is replaced since Anki tags cannot contain spaces.
pub fn tags(root: &Path, file: &Path) -> Vec<String> {
    let rel = relative(root, file);
    let mut tags: Vec<String> = rel
        .parent()
        .into_iter()
        .flat_map(|p| p.components())
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();
    if let Some(stem) = file.file_stem() {
        tags.push(stem.to_string_lossy().to_string());
    }
    tags.into_iter()
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join("_"))
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deck_name_mirrors_directories() {
        let root = Path::new("/work/app");
        assert_eq!(
            deck_name(root, Path::new("/work/app/src/main/java/Foo.java"), "Default"),
            "src::main::java"
        );
        assert_eq!(
            deck_name(root, Path::new("/work/app/Foo.java"), "Default"),
            "Default"
        );
    }

    #[test]
    fn test_deck_name_normalizes_backslashes() {
        let root = Path::new("/work");
        assert_eq!(
            deck_name(root, Path::new("/work/a\\b/Foo.java"), "Default"),
            "a::b"
        );
    }

    #[test]
    fn test_tags_are_directories_then_stem() {
        let root = Path::new("/work/app");
        assert_eq!(
            tags(root, Path::new("/work/app/src/my utils/Foo.java")),
            vec!["src", "my_utils", "Foo"]
        );
        assert_eq!(tags(root, Path::new("/work/app/Foo.java")), vec!["Foo"]);
    }

    #[test]
    fn test_file_outside_root() {
        let root = Path::new("/work/app");
        assert_eq!(
            deck_name(root, Path::new("/other/lib/Bar.java"), "Default"),
            "other::lib"
        );
    }

    #[test]
    fn test_summary_counts() {
        let summary = SyncSummary {
            outcomes: vec![
                FileOutcome {
                    file: "A.java".to_string(),
                    action: SyncAction::Created(1),
                },
                FileOutcome {
                    file: "B.java".to_string(),
                    action: SyncAction::Updated(2),
                },
                FileOutcome {
                    file: "C.java".to_string(),
                    action: SyncAction::Failed("boom".to_string()),
                },
            ],
            skipped: 4,
        };
        assert_eq!(summary.synced_count(), 2);
        assert_eq!(summary.error_count(), 1);
    }
}
