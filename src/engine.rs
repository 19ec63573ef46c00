//! The move/simulate engine.
//!
//! An [`Engine`] turns candidates into [`OutcomeEvent`]s, one event per
//! candidate, strictly in order and one file at a time. [`Engine::run`]
//! returns a [`Run`], a pull-based iterator: nothing happens on disk until the
//! caller asks for the next event, and the caller may stop at any point.
//!
//! Per candidate the engine resolves the destination, skips files already in
//! their category folder, and otherwise creates the folder and renames the
//! file (or, in a simulation, only reports what it would do). Failures are
//! classified into [`MoveErrorKind`], counted, reported as an event, and the
//! run continues with the next file. A [`CancelToken`] is checked before each
//! candidate, never in the middle of a move.
//!
//! # Examples
//!
//! ```no_run
//! use fileorg::engine::{Engine, RunMode};
//! use fileorg::rules::RuleTable;
//! use fileorg::scanner::FilterConfig;
//! use fileorg::stats::Stats;
//! use std::sync::Arc;
//!
//! let rules = Arc::new(RuleTable::default());
//! let filter = FilterConfig::new(false, true).excluding_categories(&rules);
//! let stats = Arc::new(Stats::new());
//!
//! let engine = Engine::new("/home/me/Downloads", rules, filter, stats, RunMode::Simulate);
//! for event in engine.run(None, None) {
//!     println!("{}", event);
//! }
//! ```

use crate::resolver::{ResolvedDestination, Resolver};
use crate::rules::RuleTable;
use crate::scanner::{FilterConfig, Scanner, enumerate};
use crate::stats::Stats;
use std::fmt;
use std::fs;
use std::io;
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Whether a run touches the disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Create category folders and move files.
    Move,
    /// Report what would happen without changing anything.
    Simulate,
}

/// Why a single move failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveErrorKind {
    /// No write permission on the source or destination.
    PermissionDenied,
    /// The file is busy or locked by another process.
    FileLocked,
    /// Any other permission-class failure.
    SecurityOther,
    /// Every other I/O failure: disk full, vanished source, cross-device, ...
    MoveIo,
}

impl MoveErrorKind {
    /// Classifies a failed folder creation or rename.
    pub fn classify(error: &io::Error) -> Self {
        if is_locked(error) {
            MoveErrorKind::FileLocked
        } else if error.kind() == io::ErrorKind::PermissionDenied {
            if is_access_denied(error) {
                MoveErrorKind::PermissionDenied
            } else {
                MoveErrorKind::SecurityOther
            }
        } else {
            MoveErrorKind::MoveIo
        }
    }
}

#[cfg(unix)]
fn is_access_denied(error: &io::Error) -> bool {
    error.raw_os_error() == Some(libc::EACCES)
}

#[cfg(windows)]
fn is_access_denied(error: &io::Error) -> bool {
    // ERROR_ACCESS_DENIED
    error.raw_os_error() == Some(5)
}

#[cfg(not(any(unix, windows)))]
fn is_access_denied(_error: &io::Error) -> bool {
    true
}

fn is_locked(error: &io::Error) -> bool {
    if matches!(
        error.kind(),
        io::ErrorKind::ResourceBusy | io::ErrorKind::ExecutableFileBusy | io::ErrorKind::WouldBlock
    ) {
        return true;
    }
    is_locked_os_code(error.raw_os_error())
}

#[cfg(unix)]
fn is_locked_os_code(code: Option<i32>) -> bool {
    matches!(code, Some(c) if c == libc::EAGAIN || c == libc::EBUSY || c == libc::ETXTBSY)
}

#[cfg(windows)]
fn is_locked_os_code(code: Option<i32>) -> bool {
    // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
    matches!(code, Some(32) | Some(33))
}

#[cfg(not(any(unix, windows)))]
fn is_locked_os_code(_code: Option<i32>) -> bool {
    false
}

/// One unit of the engine's report stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeEvent {
    /// The file was moved under its own name.
    Moved { from: PathBuf, to: PathBuf },
    /// The file would be moved under its own name.
    SimulatedMove { from: PathBuf, to: PathBuf },
    /// The file was moved under a `_copyN` name.
    Renamed { from: PathBuf, to: PathBuf },
    /// The file would be moved under a `_copyN` name.
    SimulatedRename { from: PathBuf, to: PathBuf },
    /// The file already sits in its category folder.
    SkippedSameLocation { file: PathBuf },
    /// The move failed; the run goes on.
    Error {
        kind: MoveErrorKind,
        file: PathBuf,
        detail: String,
    },
    /// Cancellation was observed; no further events follow.
    Aborted,
    /// The run finished; `total_affected` counts moved (or would-be-moved) files.
    Summary { total_affected: u64, simulated: bool },
}

impl OutcomeEvent {
    /// The destination of a moved, simulated or renamed file.
    pub fn destination(&self) -> Option<&Path> {
        match self {
            OutcomeEvent::Moved { to, .. }
            | OutcomeEvent::SimulatedMove { to, .. }
            | OutcomeEvent::Renamed { to, .. }
            | OutcomeEvent::SimulatedRename { to, .. } => Some(to),
            _ => None,
        }
    }

    /// True for the last event of a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OutcomeEvent::Aborted | OutcomeEvent::Summary { .. })
    }

    /// True for a per-file failure.
    pub fn is_error(&self) -> bool {
        matches!(self, OutcomeEvent::Error { .. })
    }
}

fn name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl fmt::Display for OutcomeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeEvent::Moved { from, to } => {
                write!(f, "Moved: {} → {}", name(from), to.display())
            }
            OutcomeEvent::SimulatedMove { from, to } => {
                write!(f, "[SIMULATION] {} → {}", name(from), to.display())
            }
            OutcomeEvent::Renamed { from, to } => write!(
                f,
                "File renamed due to collision: {} → {}",
                name(from),
                name(to)
            ),
            OutcomeEvent::SimulatedRename { from, to } => write!(
                f,
                "[SIMULATION] File renamed due to collision: {} → {}",
                name(from),
                name(to)
            ),
            OutcomeEvent::SkippedSameLocation { file } => {
                write!(f, "Skipped (already in place): {}", name(file))
            }
            OutcomeEvent::Error { kind, file, detail } => match kind {
                MoveErrorKind::PermissionDenied => write!(f, "ERROR {} access denied", name(file)),
                MoveErrorKind::FileLocked => write!(
                    f,
                    "ERROR File {} is being used by another program",
                    name(file)
                ),
                MoveErrorKind::SecurityOther => write!(f, "Security ERROR: {}", detail),
                MoveErrorKind::MoveIo => write!(f, "ERROR Moving {}: {}", name(file), detail),
            },
            OutcomeEvent::Aborted => write!(f, "[!] Aborting internal operation..."),
            OutcomeEvent::Summary {
                total_affected,
                simulated,
            } => {
                if *simulated {
                    write!(f, "[SIMULATION] ")?;
                }
                write!(f, "Total files moved: {}", total_affected)
            }
        }
    }
}

/// Cooperative cancellation flag, shared between a run and its controller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the run to stop before its next candidate.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once [`CancelToken::cancel`] was called and not reset since.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clears the flag so the token can drive another run.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Everything a run needs: where, by which rules, with which filters.
#[derive(Debug, Clone)]
pub struct Engine {
    base: PathBuf,
    rules: Arc<RuleTable>,
    filter: FilterConfig,
    stats: Arc<Stats>,
    mode: RunMode,
}

impl Engine {
    /// Creates an engine for `base`.
    ///
    /// `filter.exclude_names` is expected to already contain the category
    /// folder names (see [`FilterConfig::excluding_categories`]).
    pub fn new(
        base: impl Into<PathBuf>,
        rules: Arc<RuleTable>,
        filter: FilterConfig,
        stats: Arc<Stats>,
        mode: RunMode,
    ) -> Self {
        Self {
            base: base.into(),
            rules,
            filter,
            stats,
            mode,
        }
    }

    /// The counters shared by every run of this engine.
    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    /// A fresh scan of the base with this engine's filters and stats.
    pub fn candidates(&self) -> Scanner {
        enumerate(
            self.base.clone(),
            self.filter.clone(),
            Arc::clone(&self.stats),
        )
    }

    /// Starts a run over `candidates`, or over a fresh scan when `None`.
    pub fn run(&self, candidates: Option<Vec<PathBuf>>, cancel: Option<CancelToken>) -> Run {
        let source = match candidates {
            Some(list) => Source::Listed(list.into_iter()),
            None => Source::Scan(self.candidates()),
        };

        Run {
            resolver: Resolver::new(self.base.clone(), Arc::clone(&self.rules)),
            stats: Arc::clone(&self.stats),
            mode: self.mode,
            source,
            cancel: cancel.unwrap_or_default(),
            affected: 0,
            finished: false,
        }
    }
}

/// Moves the files of `base` into their category folders.
pub fn run_move(
    base: impl Into<PathBuf>,
    rules: Arc<RuleTable>,
    filter: FilterConfig,
    stats: Arc<Stats>,
    candidates: Option<Vec<PathBuf>>,
    cancel: Option<CancelToken>,
) -> Run {
    Engine::new(base, rules, filter, stats, RunMode::Move).run(candidates, cancel)
}

/// Reports where the files of `base` would go, without touching the disk.
pub fn run_simulate(
    base: impl Into<PathBuf>,
    rules: Arc<RuleTable>,
    filter: FilterConfig,
    stats: Arc<Stats>,
    candidates: Option<Vec<PathBuf>>,
    cancel: Option<CancelToken>,
) -> Run {
    Engine::new(base, rules, filter, stats, RunMode::Simulate).run(candidates, cancel)
}

enum Source {
    Scan(Scanner),
    Listed(std::vec::IntoIter<PathBuf>),
}

impl Iterator for Source {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        match self {
            Source::Scan(scanner) => scanner.next(),
            Source::Listed(list) => list.next(),
        }
    }
}

/// An in-progress run. Yields one event per candidate, then a terminal
/// [`OutcomeEvent::Summary`] or [`OutcomeEvent::Aborted`].
pub struct Run {
    resolver: Resolver,
    stats: Arc<Stats>,
    mode: RunMode,
    source: Source,
    cancel: CancelToken,
    affected: u64,
    finished: bool,
}

impl Run {
    /// Files moved (or would-be-moved) so far by this run.
    pub fn affected(&self) -> u64 {
        self.affected
    }

    /// The counters this run updates.
    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    fn simulated(&self) -> bool {
        self.mode == RunMode::Simulate
    }

    fn process(&mut self, file: PathBuf) -> OutcomeEvent {
        let Some(dest) = self.resolver.resolve(&file) else {
            return self.failed(
                file,
                io::Error::new(io::ErrorKind::InvalidInput, "file has no name component"),
            );
        };

        if file.parent() == Some(dest.destination_dir()) {
            tracing::debug!("{} is already in {}", file.display(), dest.category);
            self.stats.record_skipped();
            return OutcomeEvent::SkippedSameLocation { file };
        }

        if self.mode == RunMode::Move
            && let Err(e) = relocate(&file, &dest)
        {
            return self.failed(file, e);
        }

        self.stats.record_processed();
        self.affected += 1;
        self.completed(file, dest)
    }

    fn completed(&self, from: PathBuf, dest: ResolvedDestination) -> OutcomeEvent {
        let event = match (dest.was_renamed_for_collision, self.simulated()) {
            (true, false) => OutcomeEvent::Renamed {
                from,
                to: dest.final_path,
            },
            (true, true) => OutcomeEvent::SimulatedRename {
                from,
                to: dest.final_path,
            },
            (false, true) => OutcomeEvent::SimulatedMove {
                from,
                to: dest.final_path,
            },
            (false, false) => OutcomeEvent::Moved {
                from,
                to: dest.final_path,
            },
        };

        if matches!(
            event,
            OutcomeEvent::Renamed { .. } | OutcomeEvent::SimulatedRename { .. }
        ) {
            tracing::warn!("{}", event);
        } else {
            tracing::info!("{}", event);
        }
        event
    }

    fn failed(&self, file: PathBuf, error: io::Error) -> OutcomeEvent {
        self.stats.record_error();
        let event = OutcomeEvent::Error {
            kind: MoveErrorKind::classify(&error),
            file,
            detail: error.to_string(),
        };
        tracing::error!("{}", event);
        event
    }
}

/// Creates the category folder if needed and moves the file into it.
///
/// Never replaces an existing file: if the destination was taken after it
/// was resolved, the move fails with [`io::ErrorKind::AlreadyExists`].
fn relocate(file: &Path, dest: &ResolvedDestination) -> io::Result<()> {
    let dir = dest.destination_dir();
    if !dir.is_dir() {
        fs::create_dir_all(dir)?;
        tracing::info!("Folder {} created", dir.display());
    }
    move_no_clobber(file, &dest.final_path)
}

/// Links `to` to the file, then drops `from`. Creating the link fails
/// atomically when `to` exists. Symlinks, and filesystems without hard
/// links, fall back to a rename guarded by an existence check.
fn move_no_clobber(from: &Path, to: &Path) -> io::Result<()> {
    if fs::symlink_metadata(from)?.file_type().is_symlink() {
        return checked_rename(from, to);
    }

    match fs::hard_link(from, to) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(e),
        Err(e) => {
            tracing::debug!(
                "Hard link into {} failed ({}), renaming instead",
                to.display(),
                e
            );
            return checked_rename(from, to);
        }
    }

    if let Err(e) = fs::remove_file(from) {
        if let Err(undo) = fs::remove_file(to) {
            tracing::error!("Could not remove link {}: {}", to.display(), undo);
        }
        return Err(e);
    }
    Ok(())
}

fn checked_rename(from: &Path, to: &Path) -> io::Result<()> {
    if fs::symlink_metadata(to).is_ok() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", to.display()),
        ));
    }
    fs::rename(from, to)
}

impl Iterator for Run {
    type Item = OutcomeEvent;

    fn next(&mut self) -> Option<OutcomeEvent> {
        if self.finished {
            return None;
        }

        if self.cancel.is_cancelled() {
            self.finished = true;
            tracing::warn!("Run cancelled after {} files", self.affected);
            return Some(OutcomeEvent::Aborted);
        }

        match self.source.next() {
            Some(file) => Some(self.process(file)),
            None => {
                self.finished = true;
                let summary = OutcomeEvent::Summary {
                    total_affected: self.affected,
                    simulated: self.simulated(),
                };
                tracing::info!("{}", summary);
                Some(summary)
            }
        }
    }
}

impl FusedIterator for Run {}
