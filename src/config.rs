//! Settings file support.
//!
//! Defaults for a run (filters, rule file, logging) can be kept in a TOML
//! file so they don't have to be repeated on every invocation. Command-line
//! flags always win over the file.
//!
//! # Settings File Format
//!
//! ```toml
//! rules = "rules.json"
//!
//! [filters]
//! recursive = false
//! ignore_hidden = true
//! exclude = ["$recycle.bin", "lost+found"]
//! only = []
//!
//! [logging]
//! dir = "logs"
//! level = "info"
//! ```

use crate::logging::LogLevel;
use crate::rules::RuleTable;
use crate::scanner::FilterConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in the current directory.
pub const LOCAL_SETTINGS_FILE: &str = ".fileorgrc.toml";

/// OS trash and system folders that are excluded unless the settings say otherwise.
pub const SYSTEM_EXCLUDES: &[&str] = &[
    "$recycle.bin",
    "recycler",
    "system volume information",
    "msocache",
    "config.msi",
    ".trashes",
    ".trash",
    ".spotlight-v100",
    ".fseventsd",
    "lost+found",
    "pagefile.sys",
    "hiberfil.sys",
    "dumpstack.log.tmp",
];

/// Errors that can occur while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Settings file not found at the specified path.
    #[error("settings file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Invalid TOML syntax or structure.
    #[error("invalid settings: {0}")]
    Invalid(#[from] toml::de::Error),

    /// IO error while reading settings.
    #[error("IO error reading settings: {0}")]
    Io(#[from] std::io::Error),
}

/// Run defaults read from a settings file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Rule file; the built-in rules are used when unset.
    pub rules: Option<PathBuf>,
    pub filters: FilterSettings,
    pub logging: LoggingSettings,
}

/// Default filters for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub recursive: bool,
    pub ignore_hidden: bool,
    /// Folder or file names to leave alone.
    pub exclude: Vec<String>,
    /// If non-empty, only these extensions are organized.
    pub only: Vec<String>,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            recursive: false,
            ignore_hidden: false,
            exclude: SYSTEM_EXCLUDES.iter().map(|s| (*s).to_string()).collect(),
            only: Vec::new(),
        }
    }
}

/// Where and how much to log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log directory; next to the executable when unset.
    pub dir: Option<PathBuf>,
    pub level: LogLevel,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            dir: None,
            level: LogLevel::Info,
        }
    }
}

impl Settings {
    /// Load settings from a file, with fallback to defaults.
    ///
    /// Attempts to load settings in the following order:
    /// 1. If `settings_path` is provided, load from that file
    /// 2. Look for `.fileorgrc.toml` in the current directory
    /// 3. Look for `~/.config/fileorg/config.toml` in home directory
    /// 4. Fall back to default settings
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file is explicitly provided but cannot
    /// be read, or if any file found is invalid.
    pub fn load(settings_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = settings_path {
            return Self::load_from_file(path);
        }

        let local = PathBuf::from(LOCAL_SETTINGS_FILE);
        if local.exists() {
            return Self::load_from_file(&local);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_settings = PathBuf::from(home)
                .join(".config")
                .join("fileorg")
                .join("config.toml");
            if home_settings.exists() {
                return Self::load_from_file(&home_settings);
            }
        }

        Ok(Self::default())
    }

    /// Load settings from a specific file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if the file does not exist,
    /// `ConfigError::Invalid` if TOML parsing fails and `ConfigError::Io` if
    /// the file cannot be read.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings = toml::from_str(&content)?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }
}

impl FilterSettings {
    /// Builds the run filter, always excluding the category folders of `rules`.
    pub fn to_filter(&self, rules: &RuleTable) -> FilterConfig {
        FilterConfig::new(self.recursive, self.ignore_hidden)
            .exclude(&self.exclude)
            .only(&self.only)
            .excluding_categories(rules)
    }
}
