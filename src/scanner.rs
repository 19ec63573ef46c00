//! Candidate discovery.
//!
//! [`enumerate`] walks a base directory and lazily yields the files that are
//! eligible for organization. Each entry goes through the same pipeline, in
//! this order, cheapest checks first:
//!
//! 1. anything that is not a regular file is dropped
//! 2. anything that does not sit under the base is dropped
//! 3. the safety blacklist (environment and VCS folders, critical project
//!    files) drops the entry, whatever the caller configured
//! 4. hidden entries are dropped when `ignore_hidden` is set
//! 5. entries with a path component in `exclude` are dropped and counted as
//!    excluded
//! 6. when `only` is non-empty, entries with any other extension are dropped
//!
//! The walk never follows symlinked directories, so no physical entry is seen
//! twice and any finite tree terminates.

use crate::resolver::FALLBACK_CATEGORY;
use crate::rules::{RuleTable, extension_of, normalize_extension};
use crate::stats::Stats;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Component, PathBuf};
use std::sync::Arc;
use walkdir::{DirEntry, FilterEntry, WalkDir};

/// Directory names that are never descended into or reorganized.
pub const PROTECTED_DIRS: &[&str] = &[
    "venv",
    ".venv",
    "lib",
    "scripts",
    "include",
    ".git",
    ".hg",
    ".svn",
    "__pycache__",
];

/// File names that are never moved.
pub const PROTECTED_FILES: &[&str] = &["pyproject.toml", "pyvenv.cfg"];

/// Which entries of the base directory are eligible for organization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterConfig {
    /// Descend into subdirectories.
    pub recursive: bool,
    /// Lower-cased names; any matching path component excludes the entry.
    pub exclude_names: HashSet<String>,
    /// Normalized extensions; when non-empty, only these are eligible.
    pub only_extensions: HashSet<String>,
    /// Skip entries with a path component starting with `.`.
    pub ignore_hidden: bool,
}

impl FilterConfig {
    /// Creates a filter with no exclusions and no extension whitelist.
    pub fn new(recursive: bool, ignore_hidden: bool) -> Self {
        Self {
            recursive,
            ignore_hidden,
            ..Self::default()
        }
    }

    /// Adds names to the exclusion set (lower-cased).
    pub fn exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.exclude_names
            .extend(names.into_iter().map(|name| name.as_ref().to_lowercase()));
        self
    }

    /// Restricts candidates to the given extensions (normalized).
    pub fn only<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.only_extensions.extend(
            extensions
                .into_iter()
                .map(|ext| normalize_extension(ext.as_ref())),
        );
        self
    }

    /// Excludes every category folder of `rules`, plus the fallback folder.
    ///
    /// Callers must do this before a run; otherwise folders organized by a
    /// previous run are scanned and shuffled again.
    pub fn excluding_categories(mut self, rules: &RuleTable) -> Self {
        self.exclude_names.extend(rules.category_folder_names());
        self.exclude_names.insert(FALLBACK_CATEGORY.to_lowercase());
        self
    }
}

type Walker = FilterEntry<walkdir::IntoIter, fn(&DirEntry) -> bool>;

/// Lazy, single-pass sequence of candidate files. Created by [`enumerate`].
pub struct Scanner {
    base: PathBuf,
    filter: FilterConfig,
    stats: Arc<Stats>,
    walker: Walker,
}

/// Starts a scan of `base`.
///
/// Nothing touches the disk until the returned iterator is advanced. Entries
/// rejected by the exclusion filter increment `stats.excluded`.
pub fn enumerate(base: impl Into<PathBuf>, filter: FilterConfig, stats: Arc<Stats>) -> Scanner {
    let base = base.into();
    let max_depth = if filter.recursive { usize::MAX } else { 1 };

    let walker = WalkDir::new(&base)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(false)
        .into_iter()
        .filter_entry(keep_descending as fn(&DirEntry) -> bool);

    Scanner {
        base,
        filter,
        stats,
        walker,
    }
}

impl Scanner {
    /// Runs the filter pipeline on one walked entry.
    fn accept(&self, entry: &DirEntry) -> Option<PathBuf> {
        let path = entry.path();

        // 1. regular files only; a symlink counts when its target is a file
        let is_file = entry.file_type().is_file() || (entry.path_is_symlink() && path.is_file());
        if !is_file {
            return None;
        }

        // 2. must sit under the base
        let relative = path.strip_prefix(&self.base).ok()?;
        let parts: Vec<&OsStr> = relative
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part),
                _ => None,
            })
            .collect();
        let (file_name, ancestors) = parts.split_last()?;

        // 3. safety blacklist
        if ancestors.iter().any(|part| is_protected_dir(part)) || is_protected_file(file_name) {
            tracing::debug!("Skipping protected entry {}", path.display());
            return None;
        }

        // 4. hidden entries
        if self.filter.ignore_hidden
            && parts
                .iter()
                .any(|part| part.to_string_lossy().starts_with('.'))
        {
            return None;
        }

        // 5. exclusion by name
        if parts
            .iter()
            .any(|part| self.filter.exclude_names.contains(&lower(part)))
        {
            tracing::debug!("Excluding {}", path.display());
            self.stats.record_excluded();
            return None;
        }

        // 6. extension whitelist
        if !self.filter.only_extensions.is_empty()
            && !self.filter.only_extensions.contains(&extension_of(path))
        {
            return None;
        }

        Some(path.to_path_buf())
    }
}

impl Iterator for Scanner {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if let Some(candidate) = self.accept(&entry) {
                return Some(candidate);
            }
        }
    }
}

/// Prunes protected directories from the walk. Their contents would be
/// rejected by the blacklist anyway.
fn keep_descending(entry: &DirEntry) -> bool {
    !(entry.depth() > 0 && entry.file_type().is_dir() && is_protected_dir(entry.file_name()))
}

fn lower(part: &OsStr) -> String {
    part.to_string_lossy().to_lowercase()
}

fn is_protected_dir(name: &OsStr) -> bool {
    let name = lower(name);
    PROTECTED_DIRS.contains(&name.as_str())
}

fn is_protected_file(name: &OsStr) -> bool {
    let name = lower(name);
    PROTECTED_FILES.contains(&name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn touch(base: &Path, rel: &str) {
        let path = base.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
    }

    fn names(base: &Path, filter: FilterConfig) -> (Vec<String>, Arc<Stats>) {
        let stats = Arc::new(Stats::new());
        let mut found: Vec<String> = enumerate(base, filter, Arc::clone(&stats))
            .map(|p| {
                p.strip_prefix(base)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        found.sort();
        (found, stats)
    }

    #[test]
    fn test_non_recursive_ignores_subdirectories() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "top.txt");
        touch(temp.path(), "nested/deep.txt");

        let (found, _) = names(temp.path(), FilterConfig::new(false, false));
        assert_eq!(found, vec!["top.txt"]);
    }

    #[test]
    fn test_recursive_finds_nested_files() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "top.txt");
        touch(temp.path(), "nested/deep.txt");

        let (found, _) = names(temp.path(), FilterConfig::new(true, false));
        assert_eq!(found, vec!["nested/deep.txt", "top.txt"]);
    }

    #[test]
    fn test_protected_dirs_are_never_yielded() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "venv/bin/activate.sh");
        touch(temp.path(), "project/.git/config.txt");
        touch(temp.path(), "Lib/site.py");
        touch(temp.path(), "keep.txt");

        let filter = FilterConfig::new(true, false).only([".sh", ".txt", ".py"]);
        let (found, stats) = names(temp.path(), filter);

        assert_eq!(found, vec!["keep.txt"]);
        assert_eq!(stats.excluded(), 0);
    }

    #[test]
    fn test_protected_files_are_never_yielded() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "pyproject.toml");
        touch(temp.path(), "PYVENV.CFG");
        touch(temp.path(), "notes.toml");

        let (found, _) = names(temp.path(), FilterConfig::new(false, false));
        assert_eq!(found, vec!["notes.toml"]);
    }

    #[test]
    fn test_hidden_entries_skipped_when_requested() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), ".env");
        touch(temp.path(), ".cache/blob.bin");
        touch(temp.path(), "visible.txt");

        let (found, _) = names(temp.path(), FilterConfig::new(true, true));
        assert_eq!(found, vec!["visible.txt"]);

        let (found, _) = names(temp.path(), FilterConfig::new(true, false));
        assert_eq!(found, vec![".cache/blob.bin", ".env", "visible.txt"]);
    }

    #[test]
    fn test_excluded_names_are_counted() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "Images/old.jpg");
        touch(temp.path(), "Images/older.jpg");
        touch(temp.path(), "drafts/a.txt");
        touch(temp.path(), "new.jpg");

        let filter = FilterConfig::new(true, false).exclude(["images", "DRAFTS"]);
        let (found, stats) = names(temp.path(), filter);

        assert_eq!(found, vec!["new.jpg"]);
        assert_eq!(stats.excluded(), 3);
    }

    #[test]
    fn test_category_folders_are_excluded() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "Docs/done.txt");
        touch(temp.path(), "todo.txt");

        let rules = RuleTable::from_pairs([("Docs", vec![".txt"])]).unwrap();
        let filter = FilterConfig::new(true, false).excluding_categories(&rules);
        let (found, stats) = names(temp.path(), filter);

        assert_eq!(found, vec!["todo.txt"]);
        assert_eq!(stats.excluded(), 1);
    }

    #[test]
    fn test_only_filter_is_silent() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "a.JPG");
        touch(temp.path(), "b.png");
        touch(temp.path(), "c");

        let filter = FilterConfig::new(false, false).only(["jpg"]);
        let (found, stats) = names(temp.path(), filter);

        assert_eq!(found, vec!["a.JPG"]);
        assert_eq!(stats.snapshot(), crate::stats::StatsSnapshot::default());
    }

    #[test]
    fn test_exclusion_applies_before_only() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "archive/photo.jpg");
        touch(temp.path(), "archive/notes.txt");

        let filter = FilterConfig::new(true, false)
            .exclude(["archive"])
            .only([".jpg"]);
        let (found, stats) = names(temp.path(), filter);

        assert!(found.is_empty());
        assert_eq!(stats.excluded(), 2);
    }

    #[test]
    fn test_hidden_filter_runs_before_exclusion() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), ".trash/old.txt");

        let filter = FilterConfig::new(true, true).exclude([".trash"]);
        let (found, stats) = names(temp.path(), filter);

        assert!(found.is_empty());
        assert_eq!(stats.excluded(), 0);
    }

    #[test]
    fn test_missing_base_yields_nothing() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("gone");

        let (found, _) = names(&missing, FilterConfig::new(true, false));
        assert!(found.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directories_are_not_followed() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "real/file.txt");
        std::os::unix::fs::symlink(temp.path(), temp.path().join("real/loop")).unwrap();

        let (found, _) = names(temp.path(), FilterConfig::new(true, false));
        assert_eq!(found, vec!["real/file.txt"]);
    }
}
