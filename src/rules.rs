//! Category rules: which extensions belong in which folder.
//!
//! A [`RuleTable`] is an ordered list of categories, each owning a set of
//! normalized extensions (lower-case, dot-prefixed: `.jpg`, never `jpg` or
//! `.JPG`). Lookups walk the categories in declaration order and the first
//! category containing the extension wins, so a malformed table that lists an
//! extension twice still resolves deterministically.
//!
//! # Rule File Format
//!
//! Rules are stored as a UTF-8 JSON object mapping category names to arrays of
//! extensions. The key order of the file is the lookup order:
//!
//! ```json
//! {
//!     "Images": [".jpg", "png"],
//!     "Docs": ["TXT", ".md"]
//! }
//! ```
//!
//! # Examples
//!
//! ```
//! use fileorg::rules::RuleTable;
//!
//! let rules = RuleTable::from_json_str(r#"{"Images": ["JPG"], "Docs": [".txt"]}"#).unwrap();
//! assert_eq!(rules.category_for(".jpg"), Some("Images"));
//! assert_eq!(rules.category_for(".zip"), None);
//! ```

use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors produced while turning raw rule data into a [`RuleTable`].
#[derive(Debug, Error)]
pub enum RulesError {
    /// The rule file does not exist.
    #[error("rules file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The rule file exists but could not be read.
    #[error("could not read rules file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The rule file is not valid JSON.
    #[error("invalid JSON in rules: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The JSON is well-formed but not a flat object of string arrays.
    #[error("invalid rules format: {0}")]
    InvalidRulesFormat(String),
}

/// A named bucket of extensions; its name is also its folder name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    name: String,
    extensions: HashSet<String>,
}

impl Category {
    /// The category name, exactly as declared.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if `extension` (already normalized) belongs here.
    pub fn contains(&self, extension: &str) -> bool {
        self.extensions.contains(extension)
    }
}

/// Immutable, ordered mapping from category name to extension set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTable {
    categories: Vec<Category>,
}

impl RuleTable {
    /// Builds a table from `(category, extensions)` pairs.
    ///
    /// Extensions are normalized. A category declared twice keeps its first
    /// position and absorbs the extensions of the later declaration.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::InvalidRulesFormat`] if a category name cannot be
    /// used as a single folder name.
    pub fn from_pairs<I, N, E, S>(pairs: I) -> Result<Self, RulesError>
    where
        I: IntoIterator<Item = (N, E)>,
        N: Into<String>,
        E: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut categories: Vec<Category> = Vec::new();

        for (name, extensions) in pairs {
            let name = name.into();
            validate_category_name(&name)?;
            let normalized = extensions
                .into_iter()
                .map(|ext| normalize_extension(ext.as_ref()));

            match categories.iter_mut().find(|c| c.name == name) {
                Some(existing) => existing.extensions.extend(normalized),
                None => categories.push(Category {
                    name,
                    extensions: normalized.collect(),
                }),
            }
        }

        Ok(Self { categories })
    }

    /// Parses a table from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::InvalidJson`] for malformed JSON and
    /// [`RulesError::InvalidRulesFormat`] if the top level is not an object of
    /// string arrays.
    pub fn from_json_str(json: &str) -> Result<Self, RulesError> {
        let value: Value = serde_json::from_str(json)?;

        let Value::Object(map) = value else {
            return Err(RulesError::InvalidRulesFormat(
                "the top level must be a JSON object of category names".to_string(),
            ));
        };

        let mut pairs = Vec::with_capacity(map.len());
        for (name, extensions) in map {
            let Value::Array(items) = extensions else {
                return Err(RulesError::InvalidRulesFormat(format!(
                    "category '{}' must map to an array of extensions",
                    name
                )));
            };

            let extensions = items
                .into_iter()
                .map(|item| match item {
                    Value::String(ext) => Ok(ext),
                    other => Err(RulesError::InvalidRulesFormat(format!(
                        "category '{}' contains a non-string extension: {}",
                        name, other
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?;

            pairs.push((name, extensions));
        }

        Self::from_pairs(pairs)
    }

    /// Loads a table from a rule file on disk.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::NotFound`] if `path` is not a file, otherwise the
    /// errors of [`RuleTable::from_json_str`].
    pub fn load(path: &Path) -> Result<Self, RulesError> {
        if !path.is_file() {
            return Err(RulesError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| RulesError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let table = Self::from_json_str(&content)?;
        tracing::debug!(
            "Loaded {} categories from {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }

    /// Returns the first declared category containing `extension`.
    ///
    /// `extension` must already be normalized (see [`normalize_extension`]).
    pub fn category_for(&self, extension: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|category| category.contains(extension))
            .map(Category::name)
    }

    /// Categories in declaration order.
    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }

    /// Lower-cased category names, used to keep organized folders out of a scan.
    pub fn category_folder_names(&self) -> HashSet<String> {
        self.categories
            .iter()
            .map(|category| category.name.to_lowercase())
            .collect()
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// True if the table has no categories.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl Default for RuleTable {
    /// The built-in rules used when no rule file is configured.
    fn default() -> Self {
        let categories = DEFAULT_RULES
            .iter()
            .map(|(name, extensions)| Category {
                name: (*name).to_string(),
                extensions: extensions.iter().map(|ext| (*ext).to_string()).collect(),
            })
            .collect();
        Self { categories }
    }
}

const DEFAULT_RULES: &[(&str, &[&str])] = &[
    (
        "Images",
        &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".webp", ".svg", ".ico"],
    ),
    ("Videos", &[".mp4", ".mkv", ".avi", ".mov", ".wmv", ".webm"]),
    ("Audio", &[".mp3", ".wav", ".aac", ".flac", ".ogg", ".m4a"]),
    ("Documents", &[".txt", ".doc", ".docx", ".odt", ".rtf", ".md"]),
    ("Spreadsheets", &[".xls", ".xlsx", ".ods", ".csv"]),
    ("Presentations", &[".ppt", ".pptx", ".odp"]),
    ("Pdf", &[".pdf"]),
    ("Archives", &[".zip", ".rar", ".7z", ".tar", ".gz", ".bz2"]),
    ("Executables", &[".exe", ".msi", ".bat", ".cmd", ".sh"]),
    (
        "Code",
        &[".py", ".js", ".java", ".html", ".css", ".json", ".xml", ".yaml"],
    ),
    ("Databases", &[".db", ".sqlite", ".mdb", ".accdb"]),
    ("Fonts", &[".ttf", ".otf", ".woff", ".woff2"]),
];

/// Lower-cases an extension and prefixes it with a dot if it lacks one.
///
/// ```
/// use fileorg::rules::normalize_extension;
///
/// assert_eq!(normalize_extension("JPG"), ".jpg");
/// assert_eq!(normalize_extension(".Tar"), ".tar");
/// ```
pub fn normalize_extension(extension: &str) -> String {
    let lower = extension.to_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{}", lower)
    }
}

/// The normalized extension of `path`, or an empty string if it has none.
///
/// Only the last suffix counts: `backup.tar.gz` is `.gz`, and a dotfile such
/// as `.bashrc` has no extension.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

fn validate_category_name(name: &str) -> Result<(), RulesError> {
    let unusable = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\');

    if unusable {
        return Err(RulesError::InvalidRulesFormat(format!(
            "category '{}' is not a valid folder name",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_extensions_are_normalized() {
        let rules = RuleTable::from_pairs([("Images", vec!["JPG", ".Png", "gif"])]).unwrap();
        let images = rules.categories().next().unwrap();

        assert!(images.contains(".jpg"));
        assert!(images.contains(".png"));
        assert!(images.contains(".gif"));
        assert!(!images.contains("jpg"));
    }

    #[test]
    fn test_first_declared_category_wins() {
        let rules =
            RuleTable::from_json_str(r#"{"Photos": [".jpg"], "Images": [".jpg", ".png"]}"#)
                .unwrap();

        assert_eq!(rules.category_for(".jpg"), Some("Photos"));
        assert_eq!(rules.category_for(".png"), Some("Images"));
    }

    #[test]
    fn test_json_key_order_is_preserved() {
        let rules = RuleTable::from_json_str(r#"{"Zeta": [".z"], "Alpha": [".a"], "Mid": []}"#)
            .unwrap();
        let names: Vec<_> = rules.categories().map(Category::name).collect();

        assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn test_top_level_array_is_rejected() {
        let result = RuleTable::from_json_str(r#"[".jpg", ".png"]"#);
        assert!(matches!(result, Err(RulesError::InvalidRulesFormat(_))));
    }

    #[test]
    fn test_non_array_category_is_rejected() {
        let result = RuleTable::from_json_str(r#"{"Images": ".jpg"}"#);
        assert!(matches!(result, Err(RulesError::InvalidRulesFormat(_))));
    }

    #[test]
    fn test_non_string_extension_is_rejected() {
        let result = RuleTable::from_json_str(r#"{"Images": [".jpg", 7]}"#);
        assert!(matches!(result, Err(RulesError::InvalidRulesFormat(_))));
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        let result = RuleTable::from_json_str(r#"{"Images": [".jpg""#);
        assert!(matches!(result, Err(RulesError::InvalidJson(_))));
    }

    #[test]
    fn test_category_names_must_be_folder_names() {
        for bad in ["", "  ", ".", "..", "a/b", r"a\b"] {
            let result = RuleTable::from_pairs([(bad, vec![".x"])]);
            assert!(result.is_err(), "'{}' should be rejected", bad);
        }
    }

    #[test]
    fn test_duplicate_category_merges_into_first_slot() {
        let rules = RuleTable::from_pairs([
            ("Docs", vec![".txt"]),
            ("Images", vec![".jpg"]),
            ("Docs", vec![".md"]),
        ])
        .unwrap();

        assert_eq!(rules.len(), 2);
        assert_eq!(rules.category_for(".md"), Some("Docs"));
        assert_eq!(rules.categories().next().unwrap().name(), "Docs");
    }

    #[test]
    fn test_category_folder_names_are_lowercase() {
        let rules = RuleTable::from_pairs([("Images", vec![".jpg"]), ("PDF", vec![".pdf"])])
            .unwrap();
        let names = rules.category_folder_names();

        assert!(names.contains("images"));
        assert!(names.contains("pdf"));
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_default_rules_cover_common_types() {
        let rules = RuleTable::default();

        assert_eq!(rules.category_for(".jpg"), Some("Images"));
        assert_eq!(rules.category_for(".pdf"), Some("Pdf"));
        assert_eq!(rules.category_for(".zip"), Some("Archives"));
        assert_eq!(rules.category_for(".woff2"), Some("Fonts"));
        assert_eq!(rules.category_for(".unknown"), None);
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(Path::new("photo.JPG")), ".jpg");
        assert_eq!(extension_of(Path::new("backup.tar.gz")), ".gz");
        assert_eq!(extension_of(Path::new("Makefile")), "");
        assert_eq!(extension_of(Path::new(".bashrc")), "");
    }

    #[test]
    fn test_load_missing_file() {
        let result = RuleTable::load(Path::new("/definitely/not/here/rules.json"));
        assert!(matches!(result, Err(RulesError::NotFound(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"Images": ["jpg"], "Docs": ["TXT"]}}"#).unwrap();

        let rules = RuleTable::load(file.path()).unwrap();
        assert_eq!(rules.category_for(".txt"), Some("Docs"));
    }
}
