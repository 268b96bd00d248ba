//! Configuration for docdeck.
//!
//! Loaded from `docdeck.yaml`. Every key is optional:
//!
//! ```yaml
//! anki:
//!   url: http://localhost:8765
//!   model_name: Markdown Basic
//!   base_tag: Ideas2Brain
//!   default_deck: Default
//!   timeout_ms: 5000
//! extensions: [java]
//! excluded_paths: ["**/generated/**"]
//! state_file: .docdeck/status.json
//! ```

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Config file names looked up in the project root, in order.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["docdeck.yaml", ".docdeck.yaml"];

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub anki: AnkiConfig,
    /// File extensions (without dot) considered for sync.
    pub extensions: Vec<String>,
    /// Glob patterns for paths to leave alone (e.g., "**/generated/**").
    pub excluded_paths: Vec<String>,
    /// Status file, relative to the project root unless absolute.
    pub state_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            anki: AnkiConfig::default(),
            extensions: vec!["java".to_string()],
            excluded_paths: Vec::new(),
            state_file: PathBuf::from(".docdeck/status.json"),
        }
    }
}

/// AnkiConnect settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AnkiConfig {
    pub url: String,
    /// Note type used for new cards; needs `Front` and `Back` fields.
    pub model_name: String,
    /// Tag added to every note, so synced cards can be found together.
    pub base_tag: Option<String>,
    /// Deck for files at the project root.
    pub default_deck: String,
    pub timeout_ms: u64,
}

impl Default for AnkiConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8765".to_string(),
            model_name: "Markdown Basic".to_string(),
            base_tag: Some("Ideas2Brain".to_string()),
            default_deck: "Default".to_string(),
            timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Parse a config from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse_str(&content)
    }

    /// Parse a config from YAML text. An empty document yields the defaults.
    pub fn parse_str(content: &str) -> anyhow::Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Serialize to YAML, as written by `docdeck init`.
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Load the config for a project.
    ///
    /// Uses `explicit` if given, then a config file in `root`, then the
    /// user config directory, then the built-in defaults.
    pub fn load(explicit: Option<&Path>, root: &Path) -> anyhow::Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            let config = Self::parse_file(path)
                .map_err(|e| anyhow::anyhow!("cannot read config {}: {}", path.display(), e))?;
            return Ok((config, Some(path.to_path_buf())));
        }

        match discover(root) {
            Some(path) => {
                let config = Self::parse_file(&path)
                    .map_err(|e| anyhow::anyhow!("cannot read config {}: {}", path.display(), e))?;
                Ok((config, Some(path)))
            }
            None => Ok((Self::default(), None)),
        }
    }

    /// Absolute path of the status file for a project rooted at `root`.
    pub fn state_path(&self, root: &Path) -> PathBuf {
        if self.state_file.is_absolute() {
            self.state_file.clone()
        } else {
            root.join(&self.state_file)
        }
    }

    /// Whether files with extension `ext` (no dot) are synced.
    pub fn handles_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }

    /// Check if a path should be excluded based on excluded_paths patterns.
    /// Uses globset for matching, which supports `**` for recursive directory matching.
    pub fn is_path_excluded(&self, path: &Path) -> bool {
        if self.excluded_paths.is_empty() {
            return false;
        }

        let path_str = path.to_string_lossy();

        for pattern in &self.excluded_paths {
            if let Ok(glob) = globset::Glob::new(pattern) {
                if glob.compile_matcher().is_match(&*path_str) {
                    return true;
                }
            }
        }
        false
    }
}

/// Find a config file in `root`, falling back to the user config directory.
pub fn discover(root: &Path) -> Option<PathBuf> {
    for name in DEFAULT_CONFIG_NAMES {
        let path = root.join(name);
        if path.is_file() {
            return Some(path);
        }
    }

    ProjectDirs::from("", "", "docdeck")
        .map(|dirs| dirs.config_dir().join("docdeck.yaml"))
        .filter(|path| path.is_file())
}

/// Validate a config.
pub fn validate(config: &Config) -> anyhow::Result<()> {
    if config.anki.url.trim().is_empty() {
        anyhow::bail!("anki.url must not be empty");
    }
    if !config.anki.url.starts_with("http://") && !config.anki.url.starts_with("https://") {
        anyhow::bail!("anki.url must be an http(s) URL, got {:?}", config.anki.url);
    }
    if config.anki.timeout_ms == 0 {
        anyhow::bail!("anki.timeout_ms must be greater than zero");
    }
    if config.anki.model_name.trim().is_empty() {
        anyhow::bail!("anki.model_name must not be empty");
    }
    if config.extensions.is_empty() {
        anyhow::bail!("extensions must list at least one file extension");
    }
    for pattern in &config.excluded_paths {
        if let Err(e) = globset::Glob::new(pattern) {
            anyhow::bail!("invalid excluded_paths pattern {:?}: {}", pattern, e);
        }
    }
    Ok(())
}
