//! Destination resolution: which folder a file belongs in, and under what name.

use crate::rules::{RuleTable, extension_of};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Category for files no rule claims.
pub const FALLBACK_CATEGORY: &str = "Others";

/// Where a file should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDestination {
    /// The category name, which is also the folder name under the base.
    pub category: String,
    /// The full destination path, free at the moment it was resolved.
    pub final_path: PathBuf,
    /// True if the plain file name was taken and a `_copyN` name was chosen.
    pub was_renamed_for_collision: bool,
}

impl ResolvedDestination {
    /// The folder the file would land in.
    pub fn destination_dir(&self) -> &Path {
        self.final_path.parent().unwrap_or(&self.final_path)
    }
}

/// Maps files under one base directory to their category folders.
#[derive(Debug, Clone)]
pub struct Resolver {
    base: PathBuf,
    rules: Arc<RuleTable>,
}

impl Resolver {
    /// Creates a resolver placing category folders directly under `base`.
    pub fn new(base: impl Into<PathBuf>, rules: Arc<RuleTable>) -> Self {
        Self {
            base: base.into(),
            rules,
        }
    }

    /// The category of `file`, by its lower-cased extension.
    pub fn category_of(&self, file: &Path) -> &str {
        self.rules
            .category_for(&extension_of(file))
            .unwrap_or(FALLBACK_CATEGORY)
    }

    /// Computes the category folder and a free destination name for `file`.
    ///
    /// If `<base>/<category>/<name>` already exists, `<stem>_copy1<ext>`,
    /// `<stem>_copy2<ext>`, ... are probed until one is free. The probe is not
    /// atomic with the later move. Returns `None` if `file` has no file name.
    pub fn resolve(&self, file: &Path) -> Option<ResolvedDestination> {
        let file_name = file.file_name()?;
        let category = self.category_of(file).to_string();
        let destination_dir = self.base.join(&category);

        let mut final_path = destination_dir.join(file_name);
        let was_renamed_for_collision = final_path.exists();

        if was_renamed_for_collision {
            let stem = file.file_stem().unwrap_or(file_name);
            let extension = extension_of(file);

            final_path = (1u64..)
                .map(|n| {
                    let mut name = OsString::from(stem);
                    name.push(format!("_copy{}{}", n, extension));
                    destination_dir.join(name)
                })
                .find(|candidate| !candidate.exists())?;
        }

        Some(ResolvedDestination {
            category,
            final_path,
            was_renamed_for_collision,
        })
    }
}
