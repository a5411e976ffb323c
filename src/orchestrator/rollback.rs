//! Compensating rollback of commits made during a failed run.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::GitError;

use super::backend::{GitBackend, ResetMode};
use super::result::CommitResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RollbackStrategy {
    /// Move HEAD back past the run's commits.
    #[default]
    Reset,
    /// Add a revert commit for each of the run's commits, newest first.
    Revert,
}

impl RollbackStrategy {
    fn other(self) -> Self {
        match self {
            RollbackStrategy::Reset => RollbackStrategy::Revert,
            RollbackStrategy::Revert => RollbackStrategy::Reset,
        }
    }
}

impl fmt::Display for RollbackStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackStrategy::Reset => write!(f, "reset"),
            RollbackStrategy::Revert => write!(f, "revert"),
        }
    }
}

impl FromStr for RollbackStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reset" => Ok(Self::Reset),
            "revert" => Ok(Self::Revert),
            _ => Err(format!("Unknown rollback strategy '{}' (expected reset or revert)", s)),
        }
    }
}

/// Outcome for one commit being undone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitUndo {
    pub commit_id: String,
    pub undone: bool,
    pub error: Option<String>,
}

/// A commit the operator still has to undo by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManualCommit {
    pub commit_id: String,
    pub message: String,
    pub files: Vec<String>,
}

/// Everything needed to finish a rollback by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManualRollbackPlan {
    pub reason: String,
    /// Newest first.
    pub commits: Vec<ManualCommit>,
    /// Commands to run in order.
    pub commands: Vec<String>,
}

impl ManualRollbackPlan {
    fn new(reason: String, pending: &[&CommitResult], base_head: Option<&str>) -> Self {
        let commits = pending
            .iter()
            .map(|r| ManualCommit {
                commit_id: r.commit_id.clone().unwrap_or_default(),
                message: r.message.clone(),
                files: r.files.clone(),
            })
            .collect::<Vec<_>>();

        let mut commands = vec![format!("git log --oneline -n {}", commits.len().max(1))];
        commands.extend(commits.iter().map(|c| format!("git revert --no-edit {}", c.commit_id)));
        if let Some(base) = base_head {
            commands.push(format!("# or, to drop the commits and keep their changes on disk: git reset {}", base));
        }

        Self {
            reason,
            commits,
            commands,
        }
    }

    /// Shell script rendering of the plan.
    pub fn script(&self) -> String {
        let mut out = String::from("#!/bin/sh\n");
        out.push_str(&format!("# gitsplit rollback incomplete: {}\n", self.reason));
        for commit in &self.commits {
            out.push_str(&format!("# {} {}\n", commit.commit_id, commit.message));
            for file in &commit.files {
                out.push_str(&format!("#   {}\n", file));
            }
        }
        out.push_str("set -e\n");
        for command in &self.commands {
            out.push_str(command);
            out.push('\n');
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackRecord {
    /// HEAD when the rollback started.
    pub pre_rollback_head: Option<String>,
    /// HEAD before the run made any commit.
    pub base_head: Option<String>,
    pub strategy: RollbackStrategy,
    pub used_fallback: bool,
    pub commits_rolled_back: usize,
    pub undone: Vec<CommitUndo>,
    pub success: bool,
    pub manual_plan: Option<ManualRollbackPlan>,
}

/// Undo `committed` (oldest first) so HEAD returns to `base_head`.
///
/// The chosen strategy is tried first, then the other one once. If both
/// fail, commits are undone one at a time, newest first, until the first
/// failure; whatever is left goes into a manual rollback plan.
pub(crate) async fn roll_back(
    git: &dyn GitBackend,
    committed: &[&CommitResult],
    base_head: Option<String>,
    strategy: RollbackStrategy,
    preserve_working_tree: bool,
) -> RollbackRecord {
    let pre_rollback_head = git.head().await.ok().flatten();
    let mode = if preserve_working_tree {
        ResetMode::Mixed
    } else {
        ResetMode::Hard
    };
    info!(
        "Rolling back {} commits with {} ({:?})",
        committed.len(),
        strategy,
        mode
    );

    let mut rollback = Rollback {
        git,
        committed,
        base_head: base_head.as_deref(),
        mode,
        reverted: Vec::new(),
    };

    let mut used_fallback = false;
    let mut outcome = rollback.run(strategy).await;
    if let Err(e) = &outcome {
        warn!("Rollback with {} failed: {}; trying {}", strategy, e, strategy.other());
        used_fallback = true;
        outcome = rollback.run(strategy.other()).await;
    }

    let (undone, manual_plan) = match outcome {
        Ok(undone) => (undone, None),
        Err(e) => {
            warn!("Rollback with {} failed: {}; undoing commits one at a time", strategy.other(), e);
            let undone = rollback.one_at_a_time().await;
            let pending: Vec<&CommitResult> = committed
                .iter()
                .rev()
                .filter(|r| {
                    !undone
                        .iter()
                        .any(|u| u.undone && Some(&u.commit_id) == r.commit_id.as_ref())
                })
                .copied()
                .collect();
            let plan = (!pending.is_empty())
                .then(|| ManualRollbackPlan::new(e.to_string(), &pending, base_head.as_deref()));
            (undone, plan)
        }
    };

    let commits_rolled_back = undone.iter().filter(|u| u.undone).count();
    let success = commits_rolled_back == committed.len();
    if success {
        info!("Rolled back {} commits", commits_rolled_back);
    } else {
        warn!(
            "Rolled back {} of {} commits; manual steps required",
            commits_rolled_back,
            committed.len()
        );
    }

    RollbackRecord {
        pre_rollback_head,
        base_head,
        strategy,
        used_fallback,
        commits_rolled_back,
        undone,
        success,
        manual_plan,
    }
}

struct Rollback<'a> {
    git: &'a dyn GitBackend,
    committed: &'a [&'a CommitResult],
    base_head: Option<&'a str>,
    mode: ResetMode,
    /// Commits already undone by revert commits in this rollback.
    reverted: Vec<String>,
}

impl Rollback<'_> {
    fn commit_ids(&self) -> Vec<String> {
        self.committed
            .iter()
            .rev()
            .filter_map(|r| r.commit_id.clone())
            .collect()
    }

    async fn run(&mut self, strategy: RollbackStrategy) -> Result<Vec<CommitUndo>, GitError> {
        match strategy {
            RollbackStrategy::Reset => self.reset().await,
            RollbackStrategy::Revert => self.revert().await,
        }
    }

    /// Reset past every commit of the run, plus any revert commits this
    /// rollback added, then check HEAD landed on the pre-run commit.
    async fn reset(&mut self) -> Result<Vec<CommitUndo>, GitError> {
        let ids = self.commit_ids();
        let depth = ids.len() + self.reverted.len();

        let log = self.git.log(depth).await?;
        let on_top: Vec<&str> = log.iter().skip(self.reverted.len()).map(|e| e.hash.as_str()).collect();
        if on_top != ids.iter().map(String::as_str).collect::<Vec<_>>() {
            return Err(GitError::CommandFailed {
                operation: "reset".to_string(),
                stderr: "HEAD no longer points at the commits being rolled back".to_string(),
            });
        }

        let target = format!("HEAD~{}", depth);
        self.git.reset(&target, self.mode).await?;

        let head = self.git.head().await?;
        if head.as_deref() != self.base_head {
            return Err(GitError::CommandFailed {
                operation: "reset".to_string(),
                stderr: format!(
                    "HEAD is {} after reset, expected {}",
                    head.as_deref().unwrap_or("unborn"),
                    self.base_head.unwrap_or("unborn")
                ),
            });
        }

        debug!("Reset to {}", target);
        self.reverted.clear();
        Ok(ids
            .into_iter()
            .map(|commit_id| CommitUndo {
                commit_id,
                undone: true,
                error: None,
            })
            .collect())
    }

    /// Revert each commit newest first, skipping ones already reverted.
    async fn revert(&mut self) -> Result<Vec<CommitUndo>, GitError> {
        for id in self.commit_ids() {
            if self.reverted.contains(&id) {
                continue;
            }
            self.git.revert(&id).await?;
            debug!("Reverted {}", id);
            self.reverted.push(id);
        }

        Ok(self
            .commit_ids()
            .into_iter()
            .map(|commit_id| CommitUndo {
                commit_id,
                undone: true,
                error: None,
            })
            .collect())
    }

    /// Undo commits newest first until one fails. The commit on top is
    /// reset away; anything else is reverted.
    async fn one_at_a_time(&mut self) -> Vec<CommitUndo> {
        let mut undone = Vec::new();
        let mut failed = false;

        for id in self.commit_ids() {
            if failed {
                undone.push(CommitUndo {
                    commit_id: id,
                    undone: false,
                    error: Some("not attempted".to_string()),
                });
                continue;
            }
            if self.reverted.contains(&id) {
                undone.push(CommitUndo {
                    commit_id: id,
                    undone: true,
                    error: None,
                });
                continue;
            }

            let on_top = matches!(self.git.head().await, Ok(Some(ref head)) if *head == id);
            let result = if on_top {
                self.git.reset("HEAD~1", self.mode).await
            } else {
                self.git.revert(&id).await
            };

            match result {
                Ok(()) => {
                    if !on_top {
                        self.reverted.push(id.clone());
                    }
                    undone.push(CommitUndo {
                        commit_id: id,
                        undone: true,
                        error: None,
                    });
                }
                Err(e) => {
                    warn!("Could not undo {}: {}", id, e);
                    failed = true;
                    undone.push(CommitUndo {
                        commit_id: id,
                        undone: false,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        undone
    }
}
