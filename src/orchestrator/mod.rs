//! Orchestrator: executes a commit plan against git.
//!
//! Groups run strictly in plan order. Each group is staged in batches and
//! committed with retries on transient failures. Failed groups are
//! unstaged, classified and either recovered (skip, or commit the subset
//! git still sees as changed) or reported. When a run stops on an
//! unrecovered failure the commits it made can be rolled back.

pub mod backend;
pub mod classify;
pub mod result;
pub mod retry;
pub mod rollback;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{ExecutionError, GitError};
use crate::plan::{CommitGroup, CommitPlan};

pub use backend::{GitBackend, GitCli, LogEntry, ResetMode};
pub use classify::{ErrorCategory, classify};
pub use result::{CommitFailure, CommitResult, RecoveryAction};
pub use retry::{Attempted, RetryPolicy};
pub use rollback::{ManualRollbackPlan, RollbackRecord, RollbackStrategy};

/// Default number of paths per `git add` invocation.
pub const DEFAULT_STAGE_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Undo the run's commits when it stops on an unrecovered failure.
    pub rollback_on_failure: bool,
    /// Keep going after a failed group instead of stopping.
    pub continue_on_error: bool,
    pub rollback_strategy: RollbackStrategy,
    /// Keep rolled-back changes in the working tree. Turning this off makes
    /// a reset rollback hard, discarding uncommitted edits as well.
    pub preserve_working_tree: bool,
    pub retry: RetryPolicy,
    pub stage_batch_size: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            rollback_on_failure: true,
            continue_on_error: false,
            rollback_strategy: RollbackStrategy::Reset,
            preserve_working_tree: true,
            retry: RetryPolicy::default(),
            stage_batch_size: DEFAULT_STAGE_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionState {
    Idle,
    Staging(String),
    Committing(String),
    Recovering(String),
    RollingBack,
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionState::Idle => write!(f, "idle"),
            ExecutionState::Staging(id) => write!(f, "staging {}", id),
            ExecutionState::Committing(id) => write!(f, "committing {}", id),
            ExecutionState::Recovering(id) => write!(f, "recovering {}", id),
            ExecutionState::RollingBack => write!(f, "rolling back"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub results: Vec<CommitResult>,
    pub rollback: Option<RollbackRecord>,
    /// Every group succeeded (possibly through recovery), the run was not
    /// cancelled and the staging area was left clean.
    pub success: bool,
    pub cancelled: bool,
    /// Why the index could not be cleared after the run, if it could not.
    pub cleanup_error: Option<String>,
    /// HEAD before the run.
    pub base_head: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionReport {
    pub fn commits_made(&self) -> usize {
        self.results.iter().filter(|r| r.made_commit()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &CommitResult> {
        self.results.iter().filter(|r| !r.success)
    }

    pub fn summary(&self) -> String {
        let mut out = String::new();

        for result in &self.results {
            let status = match (&result.recovery, result.success) {
                (Some(RecoveryAction::Skipped), _) => "skipped".to_string(),
                (Some(RecoveryAction::PartialCommit { dropped }), _) => {
                    format!("partial, {} dropped", dropped.len())
                }
                (None, true) => "ok".to_string(),
                (None, false) => "FAILED".to_string(),
            };
            let commit = result.commit_id.as_deref().map(short).unwrap_or("-------");
            out.push_str(&format!(
                "  {} {:<4} {} [{}]\n",
                commit, result.group_id, result.message, status
            ));

            if let Some(failure) = result.failure.as_ref().filter(|_| !result.success) {
                out.push_str(&format!(
                    "       {} ({}, {} attempts): {}\n       hint: {}\n",
                    failure.category,
                    failure.severity,
                    result.attempts,
                    failure.reason,
                    failure.suggested_action
                ));
            }
        }

        out.push_str(&format!(
            "\n{} of {} groups committed",
            self.commits_made(),
            self.results.len()
        ));
        if self.cancelled {
            out.push_str(" (cancelled)");
        }
        out.push('\n');

        if let Some(rollback) = &self.rollback {
            out.push_str(&format!(
                "Rollback ({}{}): {} commits undone, {}\n",
                rollback.strategy,
                if rollback.used_fallback { ", fallback used" } else { "" },
                rollback.commits_rolled_back,
                if rollback.success { "complete" } else { "INCOMPLETE" }
            ));
            if let Some(plan) = &rollback.manual_plan {
                out.push_str("Finish the rollback manually:\n");
                for command in &plan.commands {
                    out.push_str(&format!("  {}\n", command));
                }
            }
        }

        if let Some(error) = &self.cleanup_error {
            out.push_str(&format!(
                "Staging area not cleared: {}\n  run `git reset -q` before committing by hand\n",
                error
            ));
        }

        out
    }
}

pub struct Orchestrator {
    git: Arc<dyn GitBackend>,
    options: ExecutionOptions,
    cancel: Arc<AtomicBool>,
    state: ExecutionState,
}

impl Orchestrator {
    pub fn new(git: Arc<dyn GitBackend>, options: ExecutionOptions) -> Self {
        Self {
            git,
            options,
            cancel: Arc::new(AtomicBool::new(false)),
            state: ExecutionState::Idle,
        }
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    /// Flag checked between groups; setting it stops the run after the
    /// current group.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn transition(&mut self, state: ExecutionState) {
        debug!("{} -> {}", self.state, state);
        self.state = state;
    }

    /// Execute `plan` group by group.
    ///
    /// Returns `Err` only when the plan is malformed or the repository
    /// cannot be prepared; everything after the first mutation is reported
    /// through the [`ExecutionReport`].
    pub async fn execute_plan(&mut self, plan: &CommitPlan) -> Result<ExecutionReport, ExecutionError> {
        plan.validate()?;

        let started_at = Utc::now();
        let base_head = self.git.head().await?;
        self.git.unstage_all().await?;

        let mut results: Vec<CommitResult> = Vec::with_capacity(plan.len());
        let mut cancelled = false;
        let mut stopped = false;

        for group in &plan.groups {
            if self.cancel.load(Ordering::SeqCst) {
                info!("Execution cancelled before group {}", group.id);
                cancelled = true;
                break;
            }

            let result = self.commit_group(group).await;
            let failed = !result.success;
            results.push(result);

            if failed {
                if self.options.continue_on_error {
                    warn!("Group {} failed; continuing", group.id);
                    continue;
                }
                stopped = true;
                break;
            }
        }

        let committed: Vec<&CommitResult> = results.iter().filter(|r| r.made_commit()).collect();
        let rollback = if stopped && self.options.rollback_on_failure && !committed.is_empty() {
            self.transition(ExecutionState::RollingBack);
            Some(
                rollback::roll_back(
                    self.git.as_ref(),
                    &committed,
                    base_head.clone(),
                    self.options.rollback_strategy,
                    self.options.preserve_working_tree,
                )
                .await,
            )
        } else {
            None
        };

        let cleanup_error = match self.git.unstage_all().await {
            Ok(()) => None,
            Err(e) => {
                warn!("Could not clear the staging area: {}", e);
                Some(e.to_string())
            }
        };
        self.transition(ExecutionState::Idle);

        let success = !cancelled && cleanup_error.is_none() && results.iter().all(|r| r.success);
        Ok(ExecutionReport {
            results,
            rollback,
            success,
            cancelled,
            cleanup_error,
            base_head,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn commit_group(&mut self, group: &CommitGroup) -> CommitResult {
        let message = group.commit_message();
        let paths = group.staged_paths();

        let attempted = self.stage_and_commit(group, &paths, &message).await;
        let error = match attempted.result {
            Ok(commit_id) => {
                info!("Committed {} as {}: {}", group.id, short(&commit_id), message);
                return CommitResult::committed(&group.id, commit_id, &message, paths, attempted.attempts);
            }
            Err(e) => e,
        };

        self.transition(ExecutionState::Recovering(group.id.clone()));
        self.unstage_quietly(&paths).await;

        let category = classify(&error);
        warn!("Group {} failed ({}): {}", group.id, category, error);

        match category {
            ErrorCategory::NothingToCommit => {
                info!("Nothing to commit for {}; skipping", group.id);
                CommitResult::skipped(&group.id, &message, &error, attempted.attempts)
            }
            ErrorCategory::PathspecMismatch => {
                self.commit_remaining(group, &paths, &message, &error, attempted.attempts)
                    .await
            }
            _ => CommitResult::failed(&group.id, &message, &error, attempted.attempts),
        }
    }

    /// Commit the paths of `group` git still sees as changed.
    async fn commit_remaining(
        &mut self,
        group: &CommitGroup,
        paths: &[String],
        message: &str,
        error: &GitError,
        attempts: u32,
    ) -> CommitResult {
        let valid = match self.git.changed_paths(paths).await {
            Ok(valid) => valid,
            Err(e) => {
                warn!("Could not check which paths of {} remain: {}", group.id, e);
                return CommitResult::failed(&group.id, message, error, attempts);
            }
        };

        if valid.is_empty() {
            info!("No paths of {} remain; skipping", group.id);
            return CommitResult::skipped(&group.id, message, error, attempts);
        }

        let dropped: Vec<String> = paths.iter().filter(|p| !valid.contains(*p)).cloned().collect();
        debug!("Retrying {} without {:?}", group.id, dropped);

        let retried = self.stage_and_commit(group, &valid, message).await;
        let attempts = attempts + retried.attempts;
        match retried.result {
            Ok(commit_id) => {
                info!(
                    "Committed {} of {} files of {} as {}",
                    valid.len(),
                    paths.len(),
                    group.id,
                    short(&commit_id)
                );
                let mut result = CommitResult::committed(&group.id, commit_id, message, valid, attempts);
                result.failure = Some(CommitFailure::from_error(error));
                result.recovery = Some(RecoveryAction::PartialCommit { dropped });
                result
            }
            Err(e) => {
                self.unstage_quietly(&valid).await;
                warn!("Partial commit of {} failed: {}", group.id, e);
                CommitResult::failed(&group.id, message, &e, attempts)
            }
        }
    }

    async fn stage_and_commit(&mut self, group: &CommitGroup, paths: &[String], message: &str) -> Attempted<String> {
        self.transition(ExecutionState::Staging(group.id.clone()));

        let batch_size = self.options.stage_batch_size.max(1);
        for batch in paths.chunks(batch_size) {
            let git = Arc::clone(&self.git);
            let staged = retry::retry_transient(&self.options.retry, || {
                let git = Arc::clone(&git);
                async move { git.stage(batch).await }
            })
            .await;

            if let Err(e) = staged.result {
                return Attempted {
                    result: Err(e),
                    attempts: staged.attempts,
                };
            }
        }

        self.transition(ExecutionState::Committing(group.id.clone()));
        self.create_commit(message).await
    }

    /// Commit whatever is staged, retrying transient failures.
    pub async fn create_commit(&self, message: &str) -> Attempted<String> {
        match self.git.has_staged_changes().await {
            Ok(true) => {}
            Ok(false) => {
                return Attempted {
                    result: Err(GitError::NothingStaged),
                    attempts: 1,
                };
            }
            Err(e) => {
                return Attempted {
                    result: Err(e),
                    attempts: 1,
                };
            }
        }

        let git = Arc::clone(&self.git);
        retry::retry_transient(&self.options.retry, || {
            let git = Arc::clone(&git);
            async move { git.commit(message).await }
        })
        .await
    }

    async fn unstage_quietly(&self, paths: &[String]) {
        if let Err(e) = self.git.unstage(paths).await {
            warn!("Could not unstage {} paths: {}", paths.len(), e);
        }
    }
}

fn short(commit_id: &str) -> &str {
    &commit_id[..commit_id.len().min(7)]
}
