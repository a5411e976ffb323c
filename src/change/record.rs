//! Analyzed file changes: the read-only input to planning.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// How a file changed in the working tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Added => write!(f, "Added"),
            ChangeKind::Modified => write!(f, "Modified"),
            ChangeKind::Deleted => write!(f, "Deleted"),
            ChangeKind::Renamed => write!(f, "Renamed"),
        }
    }
}

/// Category assigned to a change by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Feature,
    Test,
    Docs,
    Config,
    Style,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Feature,
        Category::Test,
        Category::Docs,
        Category::Config,
        Category::Style,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Feature => "feature",
            Category::Test => "test",
            Category::Docs => "docs",
            Category::Config => "config",
            Category::Style => "style",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One analyzed file change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub path: String,
    /// Previous path for renames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
    pub kind: ChangeKind,
    #[serde(default)]
    pub additions: usize,
    #[serde(default)]
    pub deletions: usize,
    pub category: Category,
    /// Feature labels, most specific first.
    #[serde(default)]
    pub features: Vec<String>,
    /// Other changed paths this file references.
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
    /// Raw import specifiers as written in the source.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    /// Added source lines, used to recover identifiers for naming.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub added_lines: Vec<String>,
}

impl ChangeRecord {
    pub fn new(path: impl Into<String>, kind: ChangeKind, category: Category) -> Self {
        Self {
            path: path.into(),
            old_path: None,
            kind,
            additions: 0,
            deletions: 0,
            category,
            features: Vec::new(),
            dependencies: BTreeSet::new(),
            imports: Vec::new(),
            added_lines: Vec::new(),
        }
    }

    pub fn with_lines(mut self, additions: usize, deletions: usize) -> Self {
        self.additions = additions;
        self.deletions = deletions;
        self
    }

    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features = features.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_imports<I, S>(mut self, imports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.imports = imports.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_added_lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.added_lines = lines.into_iter().map(Into::into).collect();
        self
    }

    /// Containing directory, `""` for files at the repository root.
    pub fn directory(&self) -> &str {
        match self.path.rfind('/') {
            Some(idx) => &self.path[..idx],
            None => "",
        }
    }

    /// File name without directory.
    pub fn file_name(&self) -> &str {
        match self.path.rfind('/') {
            Some(idx) => &self.path[idx + 1..],
            None => &self.path,
        }
    }

    /// File name up to the first `.`, e.g. `login` for `login.test.ts`.
    pub fn stem(&self) -> &str {
        let name = self.file_name();
        match name.find('.') {
            Some(0) | None => name,
            Some(idx) => &name[..idx],
        }
    }

    pub fn changed_lines(&self) -> usize {
        self.additions + self.deletions
    }

    /// Paths that must be handed to `git add` for this change.
    ///
    /// Renames stage both sides so the old path's removal lands in the same
    /// commit.
    pub fn staged_paths(&self) -> Vec<String> {
        match (&self.kind, &self.old_path) {
            (ChangeKind::Renamed, Some(old)) if old != &self.path => {
                vec![old.clone(), self.path.clone()]
            }
            _ => vec![self.path.clone()],
        }
    }
}
