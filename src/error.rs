//! Error types for gitsplit modules using thiserror.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from git operations (both the `git` binary and git2 reads).
#[derive(Error, Debug)]
pub enum GitError {
    #[error("git {operation} failed: {stderr}")]
    CommandFailed { operation: String, stderr: String },

    #[error("Failed to run git {operation}: {source}")]
    SpawnFailed {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("git {operation} timed out after {secs} seconds")]
    Timeout { operation: String, secs: u64 },

    #[error("Failed to open repository: {0}")]
    OpenRepository(#[source] git2::Error),

    #[error("Failed to read repository state: {0}")]
    ReadFailed(#[source] git2::Error),

    #[error("No changes staged for commit")]
    NothingStaged,

    #[error("All {attempts} attempts failed: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<GitError>,
    },
}

/// Errors from loading change records.
#[derive(Error, Debug)]
pub enum ChangeError {
    #[error("Failed to read change records from {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse change records: {0}")]
    ParseFailed(#[source] serde_json::Error),

    #[error("Change record list is empty")]
    Empty,
}

/// Errors from reading or writing serialized commit plans.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Failed to read plan from {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write plan to {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse plan: {0}")]
    ParseFailed(#[source] serde_json::Error),

    #[error("Failed to serialize plan: {0}")]
    SerializeFailed(#[source] serde_json::Error),
}

/// Errors from configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in {path}: {reason}")]
    InvalidToml { path: PathBuf, reason: String },

    #[error("Invalid value for '{key}': {value}")]
    InvalidValue { key: String, value: String },
}

/// Errors from relating a single change record during grouping.
///
/// These never abort a grouping run; the affected record becomes a
/// singleton group.
#[derive(Error, Debug)]
pub enum GroupingError {
    #[error("Invalid change record '{path}': {reason}")]
    InvalidRecord { path: String, reason: String },

    #[error("Embedding failed for '{path}': {reason}")]
    EmbeddingFailed { path: String, reason: String },
}

/// Errors that prevent a plan from being executed at all.
///
/// Failures during execution are reported through
/// [`ExecutionReport`](crate::orchestrator::ExecutionReport), not this type.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Plan has no commit groups")]
    EmptyPlan,

    #[error("Commit group '{0}' has no files")]
    EmptyGroup(String),

    #[error("File '{path}' appears in more than one group ({first} and {second})")]
    DuplicatePath {
        path: String,
        first: String,
        second: String,
    },

    #[error("Could not prepare repository: {0}")]
    Preflight(#[from] GitError),
}
