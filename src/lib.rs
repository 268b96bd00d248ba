//! docdeck - source documentation as Anki flashcards.
//!
//! docdeck turns the documentation comments of a source file into a
//! Markdown outline (one heading per documented declaration) and keeps
//! one Anki note per file in sync with it.
//!
//! # Architecture
//!
//! - `syntax`: parser-neutral syntax tree and the tree-sitter Java front end
//! - `extract`: tree walker, orphan comment recovery and Markdown rendering
//! - `anki`: AnkiConnect client behind the `NoteBackend` trait
//! - `status`: per-file sync status, persisted as JSON
//! - `sync`: the workflow tying extraction, notes and status together
//! - `config`: YAML configuration
//! - `report`: output formatting (pretty, JSON)
//!
//! # Adding a New Language
//!
//! Implement `SourceParser` so that it produces a `SyntaxTree`, and
//! register a factory for the file extension in `syntax::init`.

pub mod anki;
pub mod cli;
pub mod config;
pub mod extract;
pub mod report;
pub mod status;
pub mod sync;
pub mod syntax;

pub use anki::{AnkiConnectClient, AnkiError, Note, NoteBackend, NoteId};
pub use config::Config;
pub use extract::{extract, extract_source, ExtractError};
pub use status::{FileStatus, StatusStore};
pub use sync::{SyncAction, SyncSummary, Synchronizer};
pub use syntax::{for_extension, SourceParser, SyntaxTree};

/// Initialize all subsystems.
///
/// Call this once at startup.
pub fn init() {
    syntax::init();
}
