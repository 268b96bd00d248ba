//! Command-line interface for docdeck.

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::anki::AnkiConnectClient;
use crate::config::{self, Config};
use crate::report::{self, Format};
use crate::status::StatusStore;
use crate::sync::{self, Synchronizer};
use crate::syntax;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Directories never walked when collecting files.
const SKIPPED_DIRS: &[&str] = &["target", "build", "out", "node_modules"];

/// Turn source documentation into Anki flashcards.
///
/// docdeck extracts the Javadoc and comments of each source file into a
/// Markdown outline and keeps one Anki note per file in sync with it,
/// through the AnkiConnect add-on.
#[derive(Parser)]
#[command(name = "docdeck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the Markdown extracted from a source file
    Extract(ExtractArgs),
    /// Sync a file or directory to Anki
    Sync(SyncArgs),
    /// Show the sync status of a file or directory
    Status(StatusArgs),
    /// Record that a file was edited
    Changed(EventArgs),
    /// Record that a file was deleted and remove its note
    Deleted(EventArgs),
    /// Record that a file was moved and move its note
    Moved(MovedArgs),
    /// Write a default docdeck.yaml
    Init(InitArgs),
}

/// Arguments for the extract command.
#[derive(Parser)]
pub struct ExtractArgs {
    /// Source file to extract
    pub file: PathBuf,

    /// Write the Markdown here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the sync command.
#[derive(Parser)]
pub struct SyncArgs {
    /// Path to sync (file or directory)
    pub path: PathBuf,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,
}

/// Arguments for the status command.
#[derive(Parser)]
pub struct StatusArgs {
    /// Path to inspect (file or directory)
    pub path: PathBuf,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,
}

/// Arguments for the changed and deleted commands.
#[derive(Parser)]
pub struct EventArgs {
    /// The affected file
    pub file: PathBuf,

    /// Project root the file belongs to
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,
}

/// Arguments for the moved command.
#[derive(Parser)]
pub struct MovedArgs {
    /// Previous path of the file
    pub old: PathBuf,
    /// New path of the file
    pub new: PathBuf,

    /// Project root the file belongs to
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "docdeck.yaml")]
    pub output: PathBuf,
}

/// Absolute form of `path`, without touching the filesystem.
fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Root directory of the project containing `path`.
fn project_root(path: &Path) -> anyhow::Result<PathBuf> {
    let path = absolute(path)?;
    if path.is_dir() {
        Ok(path)
    } else {
        Ok(path.parent().map(Path::to_path_buf).unwrap_or(path))
    }
}

/// Collect candidate source files under `root`.
pub fn collect_files(root: &Path, config: &Config) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 || !e.file_type().is_dir() {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            // Skip hidden directories and build output
            !name.starts_with('.') && !SKIPPED_DIRS.contains(&name.as_ref())
        })
    {
        let entry = entry?;
        if entry.file_type().is_file() {
            let path = entry.path();
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if config.handles_extension(ext) {
                files.push(path.to_path_buf());
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Files named by `path`: the file itself, or everything below a directory.
fn files_for(path: &Path, config: &Config) -> anyhow::Result<Vec<PathBuf>> {
    let path = absolute(path)?;
    let metadata =
        std::fs::metadata(&path).with_context(|| format!("cannot access {}", path.display()))?;
    if metadata.is_dir() {
        collect_files(&path, config)
    } else {
        Ok(vec![path])
    }
}

/// Load and validate the config for the project at `root`.
fn load_config(explicit: Option<&Path>, root: &Path) -> anyhow::Result<Config> {
    let (config, source) = Config::load(explicit, root)?;
    match &source {
        Some(path) => tracing::debug!(path = %path.display(), "loaded config"),
        None => tracing::debug!("no config file, using defaults"),
    }
    config::validate(&config).context("invalid config")?;
    Ok(config)
}

/// Set up everything needed to sync the project at `root`.
fn synchronizer(
    explicit_config: Option<&Path>,
    root: &Path,
) -> anyhow::Result<Synchronizer<AnkiConnectClient>> {
    syntax::init();

    let config = load_config(explicit_config, root)?;
    let client = AnkiConnectClient::new(&config.anki)?;
    let state_path = config.state_path(root);
    let store = StatusStore::open(&state_path)
        .with_context(|| format!("cannot open status file {}", state_path.display()))?;

    Ok(Synchronizer::new(root, config, client, store))
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Runtime::new()?)
}

fn parse_format(format: &str) -> Option<Format> {
    let parsed = Format::parse(format);
    if parsed.is_none() {
        eprintln!(
            "Error: invalid format {:?}, must be 'pretty' or 'json'",
            format
        );
    }
    parsed
}

/// Run the extract command.
pub fn run_extract(args: &ExtractArgs) -> anyhow::Result<i32> {
    syntax::init();

    let markdown = match sync::extract_file(&args.file) {
        Ok(markdown) => markdown,
        Err(e) => {
            eprintln!("Error: {}: {:#}", args.file.display(), e);
            return Ok(EXIT_FAILED);
        }
    };

    match &args.output {
        Some(output) => {
            std::fs::write(output, &markdown)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("Wrote {}", output.display());
        }
        None => print!("{}", markdown),
    }

    Ok(EXIT_SUCCESS)
}

/// Run the sync command.
pub fn run_sync(cli: &Cli, args: &SyncArgs) -> anyhow::Result<i32> {
    let Some(format) = parse_format(&args.format) else {
        return Ok(EXIT_ERROR);
    };

    let root = project_root(&args.path)?;
    let synchronizer = synchronizer(cli.config.as_deref(), &root)?;
    let files = files_for(&args.path, synchronizer.config())?;

    if files.is_empty() {
        eprintln!("Warning: no files to sync");
        return Ok(EXIT_SUCCESS);
    }

    let progress = if format == Format::Pretty {
        let bar = ProgressBar::new(files.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("  {spinner} [{bar:30}] {pos}/{len} {msg}")?
                .progress_chars("=> "),
        );
        bar
    } else {
        ProgressBar::hidden()
    };

    let summary = runtime()?.block_on(synchronizer.sync_files(&files, |outcome| {
        progress.set_message(outcome.file.clone());
        progress.inc(1);
    }));
    progress.finish_and_clear();
    let summary = summary?;

    let path_str = args.path.to_string_lossy().to_string();
    match format {
        Format::Json => report::write_sync_json(&path_str, &summary)?,
        Format::Pretty => report::write_sync_pretty(&path_str, &summary),
    }

    if summary.error_count() > 0 {
        Ok(EXIT_FAILED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

/// Run the status command.
pub fn run_status(cli: &Cli, args: &StatusArgs) -> anyhow::Result<i32> {
    let Some(format) = parse_format(&args.format) else {
        return Ok(EXIT_ERROR);
    };

    let root = project_root(&args.path)?;
    let synchronizer = synchronizer(cli.config.as_deref(), &root)?;
    let files = files_for(&args.path, synchronizer.config())?;
    let statuses = synchronizer.refresh_statuses(&files)?;

    let path_str = args.path.to_string_lossy().to_string();
    match format {
        Format::Json => report::write_status_json(&path_str, &statuses)?,
        Format::Pretty => report::write_status_pretty(&path_str, &statuses),
    }

    Ok(EXIT_SUCCESS)
}

/// Run the changed command.
pub fn run_changed(cli: &Cli, args: &EventArgs) -> anyhow::Result<i32> {
    let root = absolute(&args.root)?;
    let synchronizer = synchronizer(cli.config.as_deref(), &root)?;
    let file = absolute(&args.file)?;

    if synchronizer.file_changed(&file)? {
        println!("{} marked as modified", synchronizer.file_key(&file));
    }
    Ok(EXIT_SUCCESS)
}

/// Run the deleted command.
pub fn run_deleted(cli: &Cli, args: &EventArgs) -> anyhow::Result<i32> {
    let root = absolute(&args.root)?;
    let synchronizer = synchronizer(cli.config.as_deref(), &root)?;
    let file = absolute(&args.file)?;

    let deleted = runtime()?.block_on(synchronizer.file_deleted(&file))?;
    if deleted {
        println!("Deleted the note of {}", synchronizer.file_key(&file));
    }
    Ok(EXIT_SUCCESS)
}

/// Run the moved command.
pub fn run_moved(cli: &Cli, args: &MovedArgs) -> anyhow::Result<i32> {
    let root = absolute(&args.root)?;
    let synchronizer = synchronizer(cli.config.as_deref(), &root)?;
    let old = absolute(&args.old)?;
    let new = absolute(&args.new)?;

    let moved = runtime()?.block_on(synchronizer.file_moved(&old, &new))?;
    if moved {
        println!(
            "Moved the note of {} to deck {}",
            synchronizer.file_key(&new),
            sync::deck_name(&root, &new, &synchronizer.config().anki.default_deck)
        );
    }
    Ok(EXIT_SUCCESS)
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    // Check if output already exists
    if args.output.exists() {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Remove it or use --output to specify a different path");
        return Ok(EXIT_ERROR);
    }

    // Create output directory if needed
    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("Error: failed to create directory: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    }

    let content = Config::default().to_yaml()?;
    if let Err(e) = std::fs::write(&args.output, content) {
        eprintln!("Error: failed to write config: {}", e);
        return Ok(EXIT_ERROR);
    }

    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to point at your AnkiConnect instance", args.output.display());
    println!("  2. Run: docdeck sync . --config {}", args.output.display());

    Ok(EXIT_SUCCESS)
}

/// Dispatch the parsed command line.
pub fn run(cli: &Cli) -> anyhow::Result<i32> {
    match &cli.command {
        Commands::Extract(args) => run_extract(args),
        Commands::Sync(args) => run_sync(cli, args),
        Commands::Status(args) => run_status(cli, args),
        Commands::Changed(args) => run_changed(cli, args),
        Commands::Deleted(args) => run_deleted(cli, args),
        Commands::Moved(args) => run_moved(cli, args),
        Commands::Init(args) => run_init(args),
    }
}
