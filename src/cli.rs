//! Command-line interface module for fileorg.
//!
//! This module handles everything between the arguments and the engine:
//! - Argument parsing and merging with the settings file
//! - Rule loading
//! - Safety gates (working directory, project roots)
//! - Confirmation before touching the disk
//! - Batch and progress-bar front ends, both cancellable with Ctrl-C

use crate::config::{ConfigError, FilterSettings, Settings};
use crate::engine::{CancelToken, Engine, OutcomeEvent, RunMode};
use crate::logging::{self, LogGuard, LogLevel, default_log_dir};
use crate::output::{CategoryTally, OutputFormatter};
use crate::rules::{RuleTable, RulesError};
use crate::scanner::FilterConfig;
use crate::session::Session;
use crate::stats::{Stats, StatsSnapshot};
use chrono::Local;
use clap::{ArgAction, Parser};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Files whose presence marks a project root that must not be reorganized.
pub const PROJECT_MARKERS: &[&str] = &[
    "pyproject.toml",
    "pyvenv.cfg",
    "requirements.txt",
    ".gitignore",
    "setup.py",
    "Cargo.toml",
];

/// fileorg - sort a directory's files into category folders by extension
///
/// Runs as a simulation unless --apply is given.
#[derive(Parser, Debug, Clone)]
#[command(name = "fileorg")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory to organize
    pub path: PathBuf,

    /// Process files within subfolders
    #[arg(short = 'r', long = "recursive", action = ArgAction::SetTrue)]
    pub recursive: bool,

    /// JSON file with organization rules (built-in rules when omitted)
    #[arg(long = "rules", value_name = "FILE")]
    pub rules: Option<PathBuf>,

    /// TOML settings file
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Names of folders or files to exclude
    ///
    /// Can be specified multiple times.
    #[arg(short = 'e', long = "exclude", value_name = "NAME")]
    pub exclude: Vec<String>,

    /// Only move files with these extensions
    ///
    /// Can be specified multiple times. Example: --only jpg --only .png
    #[arg(short = 'o', long = "only", value_name = "EXT")]
    pub only: Vec<String>,

    /// Ignore hidden files and folders
    #[arg(long = "ignore-hidden", action = ArgAction::SetTrue)]
    pub ignore_hidden: bool,

    /// Directory where logs will be saved
    #[arg(long = "log-dir", value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Log detail level
    #[arg(long = "log-level", value_enum)]
    pub log_level: Option<LogLevel>,

    /// Execute changes to disk
    #[arg(long = "apply", action = ArgAction::SetTrue)]
    pub apply: bool,

    /// Skip the confirmation before applying
    #[arg(short = 'y', long = "yes", action = ArgAction::SetTrue)]
    pub yes: bool,

    /// Show a progress bar and run the engine in the background
    #[arg(short = 'p', long = "progress", action = ArgAction::SetTrue)]
    pub progress: bool,
}

/// Errors that stop a run before or while it starts.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Error loading settings: {0}")]
    Config(#[from] ConfigError),

    #[error("Error loading rules: {0}")]
    Rules(#[from] RulesError),

    #[error("Cannot organize {}: {source}", .path.display())]
    InvalidBasePath { path: PathBuf, source: io::Error },

    #[error(
        "The location '{}' contains critical configuration files. Operation aborted to protect the project.",
        .0.display()
    )]
    ProjectRoot(PathBuf),

    #[error("Could not start the background worker: {0}")]
    Worker(io::Error),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Rules(_) => 2,
            Self::ProjectRoot(_) => 3,
            Self::InvalidBasePath { .. } => 4,
            Self::Worker(_) => 1,
        }
    }
}

/// How a CLI run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliOutcome {
    /// The engine ran, to completion or until cancelled.
    Finished {
        mode: RunMode,
        stats: StatsSnapshot,
        /// Files moved, or that would be moved in a simulation.
        affected: u64,
        cancelled: bool,
    },
    /// The user declined a confirmation; nothing was touched.
    Declined,
}

/// Runs the CLI, asking for confirmations on stdin.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use fileorg::cli::{Args, run};
///
/// let args = Args::parse_from(["fileorg", "/home/me/Downloads", "--recursive"]);
/// match run(&args) {
///     Ok(outcome) => println!("{:?}", outcome),
///     Err(e) => eprintln!("{}", e),
/// }
/// ```
pub fn run(args: &Args) -> Result<CliOutcome, CliError> {
    run_with_prompt(args, prompt_confirm)
}

/// Runs the CLI with a custom confirmation callback.
///
/// `confirm` receives the question and returns the user's answer.
pub fn run_with_prompt(
    args: &Args,
    mut confirm: impl FnMut(&str) -> bool,
) -> Result<CliOutcome, CliError> {
    let started = Local::now();

    let settings = Settings::load(args.config.as_deref())?;
    let log_guard = init_logging(args, &settings);
    if let Some(guard) = &log_guard {
        tracing::debug!("Writing logs to {}", guard.dir().display());
    }
    tracing::info!("Starting fileorg {}", env!("CARGO_PKG_VERSION"));

    let rules = Arc::new(load_rules(args, &settings)?);
    let filter = build_filter(args, &settings.filters, &rules);
    let base = resolve_base(&args.path)?;

    if is_current_dir(&base) {
        OutputFormatter::warning("WARNING: Working directory detected.");
        if !confirm("Do you wish to continue at your own risk?") {
            tracing::info!("Run declined in working directory {}", base.display());
            return Ok(CliOutcome::Declined);
        }
    }

    if is_project_root(&base) {
        tracing::error!("Execution attempt blocked at project root: {}", base.display());
        return Err(CliError::ProjectRoot(base));
    }

    let mode = if args.apply {
        let question = format!("Confirm applying changes in {}?", base.display());
        if !args.yes && !confirm(&question) {
            OutputFormatter::info("Operation aborted.");
            return Ok(CliOutcome::Declined);
        }
        RunMode::Move
    } else {
        OutputFormatter::simulation_notice("No real changes will be made.");
        RunMode::Simulate
    };

    let stats = Arc::new(Stats::new());
    let engine = Engine::new(base, rules, filter, Arc::clone(&stats), mode);
    let cancel = interrupt_token();
    let mut tally = CategoryTally::new();

    let finished = if args.progress {
        run_with_progress(engine, cancel, &mut tally)?
    } else {
        run_batch(&engine, cancel, &mut tally)
    };

    let snapshot = stats.snapshot();
    let elapsed = (Local::now() - started).num_milliseconds() as f64 / 1000.0;

    if mode == RunMode::Simulate {
        OutputFormatter::info("\nTo apply these changes, use the flag: --apply");
    }
    OutputFormatter::category_table(tally.counts());
    OutputFormatter::stats_summary(&snapshot, elapsed);
    if mode == RunMode::Move && !finished.cancelled {
        OutputFormatter::success(&format!(
            "Organization complete: {} file(s) moved.",
            finished.affected
        ));
    }

    tracing::info!(
        "Session finished. Processed: {}, Skipped: {}, Excluded: {}, Errors: {}",
        snapshot.processed,
        snapshot.skipped,
        snapshot.excluded,
        snapshot.errored
    );

    Ok(CliOutcome::Finished {
        mode,
        stats: snapshot,
        affected: finished.affected,
        cancelled: finished.cancelled,
    })
}

fn init_logging(args: &Args, settings: &Settings) -> Option<LogGuard> {
    let dir = args
        .log_dir
        .clone()
        .or_else(|| settings.logging.dir.clone())
        .unwrap_or_else(default_log_dir);
    let level = args.log_level.unwrap_or(settings.logging.level);

    match logging::init(&dir, level) {
        Ok(guard) => Some(guard),
        Err(e) => {
            OutputFormatter::warning(&format!("Log files unavailable: {}", e));
            None
        }
    }
}

fn load_rules(args: &Args, settings: &Settings) -> Result<RuleTable, RulesError> {
    let Some(path) = args.rules.as_ref().or(settings.rules.as_ref()) else {
        tracing::debug!("Using built-in rules");
        return Ok(RuleTable::default());
    };

    RuleTable::load(path).inspect_err(|e| tracing::error!("Error reading rules: {}", e))
}

/// Merges flags over settings; the category folders are always excluded.
fn build_filter(args: &Args, settings: &FilterSettings, rules: &RuleTable) -> FilterConfig {
    let merged = FilterSettings {
        recursive: args.recursive || settings.recursive,
        ignore_hidden: args.ignore_hidden || settings.ignore_hidden,
        exclude: settings
            .exclude
            .iter()
            .chain(&args.exclude)
            .cloned()
            .collect(),
        only: if args.only.is_empty() {
            settings.only.clone()
        } else {
            args.only.clone()
        },
    };
    merged.to_filter(rules)
}

fn resolve_base(path: &Path) -> Result<PathBuf, CliError> {
    let base = fs::canonicalize(path).map_err(|source| CliError::InvalidBasePath {
        path: path.to_path_buf(),
        source,
    })?;

    if !base.is_dir() {
        return Err(CliError::InvalidBasePath {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
        });
    }
    Ok(base)
}

fn is_current_dir(base: &Path) -> bool {
    std::env::current_dir()
        .and_then(fs::canonicalize)
        .is_ok_and(|cwd| cwd == base)
}

/// True if `dir` holds any of the [`PROJECT_MARKERS`].
pub fn is_project_root(dir: &Path) -> bool {
    PROJECT_MARKERS
        .iter()
        .any(|marker| dir.join(marker).exists())
}

/// The process-wide Ctrl-C token, cleared for a new run.
fn interrupt_token() -> CancelToken {
    static TOKEN: OnceLock<CancelToken> = OnceLock::new();

    let token = TOKEN.get_or_init(|| {
        let token = CancelToken::new();
        let handler_token = token.clone();
        if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
            tracing::warn!("Could not install Ctrl-C handler: {}", e);
        }
        token
    });
    token.reset();
    token.clone()
}

/// What a front end saw of a run.
struct Finished {
    affected: u64,
    cancelled: bool,
}

fn run_batch(engine: &Engine, cancel: CancelToken, tally: &mut CategoryTally) -> Finished {
    let mut run = engine.run(None, Some(cancel));
    let mut cancelled = false;
    for event in run.by_ref() {
        OutputFormatter::event(&event);
        tally.record(&event);
        cancelled |= event == OutcomeEvent::Aborted;
    }
    Finished {
        affected: run.affected(),
        cancelled,
    }
}

fn run_with_progress(
    engine: Engine,
    cancel: CancelToken,
    tally: &mut CategoryTally,
) -> Result<Finished, CliError> {
    let mut handle = Session::spawn(engine, cancel).map_err(CliError::Worker)?;

    if handle.total() == 0 {
        OutputFormatter::info("No files to process.");
    }

    let pb = OutputFormatter::create_progress_bar(handle.total() as u64);
    let mut affected = 0;
    while let Some(event) = handle.next_event() {
        tally.record(&event);
        if event.destination().is_some() {
            affected += 1;
        }
        pb.println(OutputFormatter::styled_event(&event));
        if !event.is_terminal() {
            pb.inc(1);
            let errors = handle.stats().errored;
            if errors > 0 {
                pb.set_message(format!("{} errors", errors));
            }
        }
    }

    let report = handle.join();
    if report.cancelled {
        pb.abandon_with_message("Cancelled by user");
    } else {
        pb.finish_with_message("Done");
    }
    Ok(Finished {
        affected,
        cancelled: report.cancelled,
    })
}

fn prompt_confirm(question: &str) -> bool {
    print!("{} [y/N]: ", question);
    if io::stdout().flush().is_err() {
        return false;
    }

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["fileorg", "/tmp/somewhere"]).unwrap();

        assert_eq!(args.path, PathBuf::from("/tmp/somewhere"));
        assert!(!args.apply);
        assert!(!args.recursive);
        assert!(args.exclude.is_empty());
        assert!(args.log_level.is_none());
    }

    #[test]
    fn test_args_repeated_flags() {
        let args = Args::try_parse_from([
            "fileorg", "dir", "-e", "Backups", "--exclude", "tmp", "--only", "jpg", "-o", ".png",
            "--log-level", "warning", "--apply", "-y",
        ])
        .unwrap();

        assert_eq!(args.exclude, vec!["Backups", "tmp"]);
        assert_eq!(args.only, vec!["jpg", ".png"]);
        assert_eq!(args.log_level, Some(LogLevel::Warning));
        assert!(args.apply && args.yes);
    }

    #[test]
    fn test_path_is_required() {
        assert!(Args::try_parse_from(["fileorg"]).is_err());
    }

    #[test]
    fn test_build_filter_merges_flags_over_settings() {
        let args =
            Args::try_parse_from(["fileorg", "dir", "--exclude", "Drafts", "--only", "txt"])
                .unwrap();
        let settings = FilterSettings {
            recursive: true,
            ignore_hidden: false,
            exclude: vec!["Backups".to_string()],
            only: vec!["jpg".to_string()],
        };
        let rules = RuleTable::from_pairs([("Docs", vec![".txt"])]).unwrap();

        let filter = build_filter(&args, &settings, &rules);

        assert!(filter.recursive);
        assert!(filter.exclude_names.contains("backups"));
        assert!(filter.exclude_names.contains("drafts"));
        assert!(filter.exclude_names.contains("docs"));
        assert!(filter.only_extensions.contains(".txt"));
        assert!(!filter.only_extensions.contains(".jpg"));
    }

    #[test]
    fn test_project_root_detection() {
        let temp = TempDir::new().unwrap();
        assert!(!is_project_root(temp.path()));

        fs::write(temp.path().join("requirements.txt"), b"click\n").unwrap();
        assert!(is_project_root(temp.path()));
    }

    #[test]
    fn test_resolve_base_rejects_files_and_missing_paths() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.txt");
        fs::write(&file, b"x").unwrap();

        assert!(resolve_base(temp.path()).is_ok());
        assert!(matches!(
            resolve_base(&file),
            Err(CliError::InvalidBasePath { .. })
        ));
        assert!(matches!(
            resolve_base(&temp.path().join("missing")),
            Err(CliError::InvalidBasePath { .. })
        ));
    }

    #[test]
    fn test_exit_codes() {
        let rules_error = CliError::Rules(RulesError::InvalidRulesFormat("x".to_string()));
        assert_eq!(rules_error.exit_code(), 2);
        assert_eq!(CliError::ProjectRoot(PathBuf::from("/p")).exit_code(), 3);
    }
}
