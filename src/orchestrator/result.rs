//! Per-group execution results.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::GitError;
use crate::resolve::Severity;

use super::classify::{ErrorCategory, classify};

/// What the orchestrator did instead of failing a group outright.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Nothing was left to commit; the group was skipped.
    Skipped,
    /// Only the paths git still saw as changed were committed.
    PartialCommit { dropped: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitFailure {
    pub category: ErrorCategory,
    pub severity: Severity,
    pub reason: String,
    pub suggested_action: String,
    pub retryable: bool,
}

impl CommitFailure {
    pub fn from_error(error: &GitError) -> Self {
        let category = classify(error);
        Self {
            category,
            severity: category.severity(),
            reason: error.to_string(),
            suggested_action: category.suggested_action().to_string(),
            retryable: category.is_retryable(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitResult {
    pub group_id: String,
    pub success: bool,
    /// `None` unless a commit was created.
    pub commit_id: Option<String>,
    pub message: String,
    /// Paths included in the commit; empty when nothing was committed.
    pub files: Vec<String>,
    pub attempts: u32,
    /// The error that was hit, including ones recovered from.
    pub failure: Option<CommitFailure>,
    pub recovery: Option<RecoveryAction>,
    pub executed_at: DateTime<Utc>,
}

impl CommitResult {
    pub fn committed(group_id: &str, commit_id: String, message: &str, files: Vec<String>, attempts: u32) -> Self {
        Self {
            group_id: group_id.to_string(),
            success: true,
            commit_id: Some(commit_id),
            message: message.to_string(),
            files,
            attempts,
            failure: None,
            recovery: None,
            executed_at: Utc::now(),
        }
    }

    pub fn skipped(group_id: &str, message: &str, error: &GitError, attempts: u32) -> Self {
        Self {
            group_id: group_id.to_string(),
            success: true,
            commit_id: None,
            message: message.to_string(),
            files: Vec::new(),
            attempts,
            failure: Some(CommitFailure::from_error(error)),
            recovery: Some(RecoveryAction::Skipped),
            executed_at: Utc::now(),
        }
    }

    pub fn failed(group_id: &str, message: &str, error: &GitError, attempts: u32) -> Self {
        Self {
            group_id: group_id.to_string(),
            success: false,
            commit_id: None,
            message: message.to_string(),
            files: Vec::new(),
            attempts,
            failure: Some(CommitFailure::from_error(error)),
            recovery: None,
            executed_at: Utc::now(),
        }
    }

    /// Whether this result left a commit in history.
    pub fn made_commit(&self) -> bool {
        self.commit_id.is_some()
    }
}
