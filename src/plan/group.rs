//! Commit groups: sets of change records slated to become one commit.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::change::{ChangeKind, ChangeRecord};

/// Conventional commit types a group can be committed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitKind {
    Feat,
    Fix,
    Docs,
    Style,
    Refactor,
    Test,
    Chore,
}

impl CommitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitKind::Feat => "feat",
            CommitKind::Fix => "fix",
            CommitKind::Docs => "docs",
            CommitKind::Style => "style",
            CommitKind::Refactor => "refactor",
            CommitKind::Test => "test",
            CommitKind::Chore => "chore",
        }
    }

    /// Ordering rank: chore > fix > feat > refactor > test > docs > style.
    pub fn rank(&self) -> u8 {
        match self {
            CommitKind::Chore => 7,
            CommitKind::Fix => 6,
            CommitKind::Feat => 5,
            CommitKind::Refactor => 4,
            CommitKind::Test => 3,
            CommitKind::Docs => 2,
            CommitKind::Style => 1,
        }
    }
}

impl fmt::Display for CommitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CommitKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "feat" => Ok(Self::Feat),
            "fix" => Ok(Self::Fix),
            "docs" => Ok(Self::Docs),
            "style" => Ok(Self::Style),
            "refactor" => Ok(Self::Refactor),
            "test" => Ok(Self::Test),
            "chore" => Ok(Self::Chore),
            _ => Err(format!("Unknown commit kind: {}", s)),
        }
    }
}

/// A set of change records that will become one commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitGroup {
    pub id: String,
    pub kind: CommitKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub description: String,
    /// Filled in by an external message generator. Empty means the
    /// conventional header is used as the commit message.
    #[serde(default)]
    pub message: String,
    /// Higher commits earlier.
    #[serde(default)]
    pub priority: i64,
    pub files: Vec<ChangeRecord>,
}

impl CommitGroup {
    pub fn new(
        id: impl Into<String>,
        kind: CommitKind,
        scope: Option<String>,
        description: impl Into<String>,
        files: Vec<ChangeRecord>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            scope,
            description: description.into(),
            message: String::new(),
            priority: 0,
            files,
        }
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.path.as_str())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.iter().any(|f| f.path == path)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn changed_lines(&self) -> usize {
        self.files.iter().map(ChangeRecord::changed_lines).sum()
    }

    /// Average number of declared dependencies per file.
    pub fn average_dependencies(&self) -> f64 {
        if self.files.is_empty() {
            return 0.0;
        }
        let total: usize = self.files.iter().map(|f| f.dependencies.len()).sum();
        total as f64 / self.files.len() as f64
    }

    pub fn has_kind(&self, kind: ChangeKind) -> bool {
        self.files.iter().any(|f| f.kind == kind)
    }

    /// `type(scope): description`
    pub fn header(&self) -> String {
        match &self.scope {
            Some(scope) if !scope.is_empty() => {
                format!("{}({}): {}", self.kind, scope, self.description)
            }
            _ => format!("{}: {}", self.kind, self.description),
        }
    }

    /// The message to commit with.
    pub fn commit_message(&self) -> String {
        if self.message.trim().is_empty() {
            self.header()
        } else {
            self.message.clone()
        }
    }

    /// Every path `git add` needs for this group, in member order.
    pub fn staged_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        for file in &self.files {
            for path in file.staged_paths() {
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }
        paths
    }
}
