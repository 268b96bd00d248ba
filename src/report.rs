//! Output formatting for docdeck results.
//!
//! Supports two output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: structured output for scripts and editors

use colored::*;
use serde::{Deserialize, Serialize};

use crate::anki::NoteId;
use crate::status::FileStatus;
use crate::sync::{FileOutcome, SyncAction, SyncSummary};

/// Output format selected with `--format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Pretty,
    Json,
}

impl Format {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pretty" => Some(Format::Pretty),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

// =============================================================================
// JSON Format
// =============================================================================

#[derive(Serialize, Deserialize)]
pub struct JsonSyncReport {
    pub version: String,
    pub path: String,
    pub synced: usize,
    pub errors: usize,
    pub skipped: usize,
    pub files: Vec<JsonFileOutcome>,
}

#[derive(Serialize, Deserialize)]
pub struct JsonFileOutcome {
    pub file: String,
    /// `created`, `updated` or `failed`.
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_id: Option<NoteId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct JsonStatusReport {
    pub version: String,
    pub path: String,
    pub files: Vec<JsonFileStatus>,
}

#[derive(Serialize, Deserialize)]
pub struct JsonFileStatus {
    pub file: String,
    pub status: FileStatus,
}

/// Build the JSON report of a sync run.
pub fn sync_report(path: &str, summary: &SyncSummary) -> JsonSyncReport {
    JsonSyncReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        path: path.to_string(),
        synced: summary.synced_count(),
        errors: summary.error_count(),
        skipped: summary.skipped,
        files: summary.outcomes.iter().map(outcome_to_json).collect(),
    }
}

fn outcome_to_json(outcome: &FileOutcome) -> JsonFileOutcome {
    let (action, note_id, error) = match &outcome.action {
        SyncAction::Created(id) => ("created", Some(*id), None),
        SyncAction::Updated(id) => ("updated", Some(*id), None),
        SyncAction::Failed(message) => ("failed", None, Some(message.clone())),
    };
    JsonFileOutcome {
        file: outcome.file.clone(),
        action: action.to_string(),
        note_id,
        error,
    }
}

/// Write a sync summary in JSON format.
pub fn write_sync_json(path: &str, summary: &SyncSummary) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&sync_report(path, summary))?;
    println!("{}", json);
    Ok(())
}

/// Write file statuses in JSON format.
pub fn write_status_json(path: &str, statuses: &[(String, FileStatus)]) -> anyhow::Result<()> {
    let report = JsonStatusReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        path: path.to_string(),
        files: statuses
            .iter()
            .map(|(file, status)| JsonFileStatus {
                file: file.clone(),
                status: *status,
            })
            .collect(),
    };
    let json = serde_json::to_string_pretty(&report)?;
    println!("{}", json);
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

fn write_header(label: &str, path: &str) {
    println!();
    print!("  ");
    print!("{}", "docdeck".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();
    print!("  {}", format!("{:<10}", label).dimmed());
    println!("{}", path);
    println!();
}

/// Write a sync summary in pretty (human-readable) format.
pub fn write_sync_pretty(path: &str, summary: &SyncSummary) {
    write_header("Syncing:", path);

    if !summary.outcomes.is_empty() {
        println!("  {} ({}):", "Files".bold(), summary.outcomes.len());
        println!();
        for outcome in &summary.outcomes {
            write_outcome(outcome);
        }
        println!();
    }

    print!("  {}", format!("{} synced", summary.synced_count()).green());
    let errors = summary.error_count();
    if errors > 0 {
        print!("  {}", format!("{} failed", errors).red());
    }
    if summary.skipped > 0 {
        print!(
            "  {}",
            format!("({} skipped)", summary.skipped).dimmed()
        );
    }
    println!();
    println!();
}

fn write_outcome(outcome: &FileOutcome) {
    match &outcome.action {
        SyncAction::Created(id) => {
            print!("    {} ", "NEW  ".green());
            print!("{}", outcome.file.blue());
            println!("{}", format!(" (note {})", id).dimmed());
        }
        SyncAction::Updated(id) => {
            print!("    {} ", "SYNC ".green());
            print!("{}", outcome.file.blue());
            println!("{}", format!(" (note {})", id).dimmed());
        }
        SyncAction::Failed(message) => {
            print!("    {} ", "ERROR".red());
            println!("{}", outcome.file.blue());
            println!("            {}", message);
        }
    }
}

/// Write file statuses in pretty (human-readable) format.
pub fn write_status_pretty(path: &str, statuses: &[(String, FileStatus)]) {
    write_header("Project:", path);

    if statuses.is_empty() {
        println!("  {}", "no supported files".dimmed());
        println!();
        return;
    }

    for (file, status) in statuses {
        write_status_tag(*status);
        println!("{}", file.blue());
    }
    println!();

    let pending = statuses
        .iter()
        .filter(|(_, s)| *s != FileStatus::Synced)
        .count();
    if pending == 0 {
        println!("  {}", "Everything is synced".green());
    } else {
        let plural = if pending != 1 { "s" } else { "" };
        println!(
            "  {}",
            format!("{} file{} need syncing", pending, plural).yellow()
        );
    }
    println!();
}

fn write_status_tag(status: FileStatus) {
    match status {
        FileStatus::Synced => print!("    {} ", "SYNCED  ".green()),
        FileStatus::ModifiedAfterSync => print!("    {} ", "MODIFIED".yellow()),
        FileStatus::NotSynced => print!("    {} ", "NEW     ".dimmed()),
        FileStatus::Error => print!("    {} ", "ERROR   ".red()),
    }
}
