//! Include/exclude pattern matching over directory trees.
//!
//! Patterns use Ant conventions: `*` stays within a path segment, `**` spans
//! segments, and a pattern ending in `/` matches everything below that
//! directory. Paths are always relative with forward slashes.

use crate::error::{Error, Result};
use crate::utils::{to_webapp_path, utf8_path};
use camino::{Utf8Path, Utf8PathBuf};
use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

/// Version control and editor files never copied into a webapp.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "**/*~",
    "**/#*#",
    "**/.#*",
    "**/%*%",
    "**/._*",
    "**/CVS",
    "**/CVS/**",
    "**/.cvsignore",
    "**/SCCS",
    "**/SCCS/**",
    "**/vssver.scc",
    "**/.svn",
    "**/.svn/**",
    "**/.git",
    "**/.git/**",
    "**/.gitignore",
    "**/.gitattributes",
    "**/.hg",
    "**/.hg/**",
    "**/.hgignore",
    "**/.bzr",
    "**/.bzr/**",
    "**/.DS_Store",
];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Compiled include and exclude patterns.
#[derive(Debug, Clone)]
pub struct PatternSet {
    includes: Vec<Pattern>,
    excludes: Vec<Pattern>,
}

impl PatternSet {
    /// Compile `includes` and `excludes`. No includes means everything.
    pub fn new<S: AsRef<str>>(includes: &[S], excludes: &[S]) -> Result<Self> {
        let mut includes = compile(includes)?;
        if includes.is_empty() {
            includes.push(Pattern::new("**")?);
        }
        Ok(Self {
            includes,
            excludes: compile(excludes)?,
        })
    }

    /// Add [`DEFAULT_EXCLUDES`].
    pub fn with_default_excludes(mut self) -> Result<Self> {
        self.excludes.extend(compile(DEFAULT_EXCLUDES)?);
        Ok(self)
    }

    pub fn is_included(&self, path: &str) -> bool {
        self.includes.iter().any(|p| p.matches_with(path, MATCH_OPTIONS))
            && !self.is_excluded(path)
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.excludes.iter().any(|p| p.matches_with(path, MATCH_OPTIONS))
    }
}

fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| normalize_pattern(p.as_ref()))
        .filter(|p| !p.is_empty())
        .map(|p| Pattern::new(&p).map_err(Error::from))
        .collect()
}

/// `\` becomes `/`, a leading `/` is dropped and `dir/` becomes `dir/**`.
fn normalize_pattern(pattern: &str) -> String {
    let pattern = pattern.trim().replace('\\', "/");
    let pattern = pattern.trim_start_matches('/');
    if pattern.ends_with('/') {
        format!("{}**", pattern)
    } else {
        pattern.to_string()
    }
}

/// Files and directories selected by a scan, as sorted relative paths.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub files: Vec<String>,
    pub directories: Vec<String>,
}

/// Walks a directory and selects entries through a [`PatternSet`].
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    base: Utf8PathBuf,
    patterns: PatternSet,
}

impl DirectoryScanner {
    pub fn new(base: impl Into<Utf8PathBuf>, patterns: PatternSet) -> Self {
        Self {
            base: base.into(),
            patterns,
        }
    }

    pub fn base(&self) -> &Utf8Path {
        &self.base
    }

    /// Scan the base directory. A missing base yields an empty result.
    pub fn scan(&self) -> Result<ScanResult> {
        let mut result = ScanResult::default();
        if !self.base.as_std_path().is_dir() {
            return Ok(result);
        }

        let walker = WalkDir::new(self.base.as_std_path())
            .min_depth(1)
            .sort_by_file_name();
        for entry in walker {
            let entry = entry?;
            let path = utf8_path(entry.path())?;
            let Ok(relative) = path.strip_prefix(&self.base) else {
                continue;
            };
            let relative = to_webapp_path(relative);

            if entry.file_type().is_dir() {
                if self.patterns.is_included(&relative) {
                    result.directories.push(relative);
                }
            } else if self.patterns.is_included(&relative) {
                result.files.push(relative);
            }
        }

        Ok(result)
    }
}
