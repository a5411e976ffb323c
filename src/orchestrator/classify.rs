//! Classification of git failures into retry and recovery categories.

use std::fmt;

use serde::Serialize;

use crate::error::GitError;
use crate::resolve::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    NothingToCommit,
    PathspecMismatch,
    PermissionDenied,
    NotARepository,
    DiskFull,
    MergeConflict,
    Lock,
    Timeout,
    Network,
    Busy,
    Unknown,
}

/// Checked in order; the first category with a matching fragment wins.
const PATTERNS: &[(ErrorCategory, &[&str])] = &[
    (
        ErrorCategory::NothingToCommit,
        &[
            "nothing to commit",
            "nothing added to commit",
            "no changes added to commit",
            "no changes staged",
        ],
    ),
    (
        ErrorCategory::PathspecMismatch,
        &["pathspec", "did not match any file", "does not exist", "no such file"],
    ),
    (
        ErrorCategory::PermissionDenied,
        &[
            "permission denied",
            "insufficient permission",
            "operation not permitted",
            "read-only file system",
        ],
    ),
    (ErrorCategory::NotARepository, &["not a git repository"]),
    (
        ErrorCategory::DiskFull,
        &["no space left", "disk full", "quota exceeded"],
    ),
    (
        ErrorCategory::MergeConflict,
        &["merge conflict", "unmerged", "conflict"],
    ),
    (
        ErrorCategory::Lock,
        &["index.lock", "unable to create", "another git process"],
    ),
    (ErrorCategory::Timeout, &["timed out", "timeout"]),
    (
        ErrorCategory::Network,
        &["could not resolve host", "connection", "network"],
    ),
    (
        ErrorCategory::Busy,
        &["resource temporarily unavailable", "resource busy", "try again"],
    ),
];

impl ErrorCategory {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::Lock | ErrorCategory::Timeout | ErrorCategory::Network | ErrorCategory::Busy
        )
    }

    /// Failures the orchestrator can work around without stopping.
    pub fn is_auto_recoverable(&self) -> bool {
        matches!(self, ErrorCategory::NothingToCommit | ErrorCategory::PathspecMismatch)
    }

    pub fn severity(&self) -> Severity {
        match self {
            ErrorCategory::NothingToCommit => Severity::Low,
            ErrorCategory::PathspecMismatch
            | ErrorCategory::Lock
            | ErrorCategory::Timeout
            | ErrorCategory::Network
            | ErrorCategory::Busy => Severity::Medium,
            ErrorCategory::PermissionDenied | ErrorCategory::MergeConflict | ErrorCategory::Unknown => {
                Severity::High
            }
            ErrorCategory::NotARepository | ErrorCategory::DiskFull => Severity::Critical,
        }
    }

    pub fn suggested_action(&self) -> &'static str {
        match self {
            ErrorCategory::NothingToCommit => "No action needed; the group had nothing left to commit",
            ErrorCategory::PathspecMismatch => {
                "Check that the listed files still exist and re-run the analysis"
            }
            ErrorCategory::PermissionDenied => {
                "Check file and .git directory permissions, then retry"
            }
            ErrorCategory::NotARepository => "Run gitsplit from inside a git repository",
            ErrorCategory::DiskFull => "Free disk space, then retry",
            ErrorCategory::MergeConflict => "Resolve the merge conflict and re-run",
            ErrorCategory::Lock => {
                "Wait for other git processes to finish or remove a stale .git/index.lock"
            }
            ErrorCategory::Timeout => "Retry later or raise GITSPLIT_GIT_TIMEOUT",
            ErrorCategory::Network => "Check network connectivity and retry",
            ErrorCategory::Busy => "Retry once the repository is no longer busy",
            ErrorCategory::Unknown => "Inspect the git error output and retry manually",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::NothingToCommit => "nothing to commit",
            ErrorCategory::PathspecMismatch => "pathspec mismatch",
            ErrorCategory::PermissionDenied => "permission denied",
            ErrorCategory::NotARepository => "not a repository",
            ErrorCategory::DiskFull => "disk full",
            ErrorCategory::MergeConflict => "merge conflict",
            ErrorCategory::Lock => "lock",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Network => "network",
            ErrorCategory::Busy => "busy",
            ErrorCategory::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

pub fn classify(error: &GitError) -> ErrorCategory {
    match error {
        GitError::NothingStaged => ErrorCategory::NothingToCommit,
        GitError::Timeout { .. } => ErrorCategory::Timeout,
        GitError::RetriesExhausted { last, .. } => classify(last),
        GitError::OpenRepository(_) => ErrorCategory::NotARepository,
        GitError::SpawnFailed { source, .. } => match source.kind() {
            std::io::ErrorKind::PermissionDenied => ErrorCategory::PermissionDenied,
            _ => ErrorCategory::Unknown,
        },
        other => classify_message(&other.to_string()),
    }
}

/// Category for a raw git error message.
pub fn classify_message(message: &str) -> ErrorCategory {
    let lower = message.to_lowercase();
    PATTERNS
        .iter()
        .find(|(_, fragments)| fragments.iter().any(|f| lower.contains(f)))
        .map(|(category, _)| *category)
        .unwrap_or(ErrorCategory::Unknown)
}
