//! The git seam used by the orchestrator.
//!
//! Mutations shell out to the `git` binary so user config and hooks apply.
//! Reads go through git2.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use git2::{ErrorCode, Repository, Status, StatusOptions};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::error::GitError;

/// Default timeout for a single git invocation.
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    Hard,
    /// Moves HEAD and clears the index, leaving the working tree alone.
    Mixed,
}

impl ResetMode {
    fn flag(&self) -> &'static str {
        match self {
            ResetMode::Hard => "--hard",
            ResetMode::Mixed => "--mixed",
        }
    }
}

/// One entry of `git log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub hash: String,
    pub summary: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GitBackend: Send + Sync {
    /// Current HEAD commit, `None` on an unborn branch.
    async fn head(&self) -> Result<Option<String>, GitError>;

    /// Newest-first history from HEAD, at most `limit` entries.
    async fn log(&self, limit: usize) -> Result<Vec<LogEntry>, GitError>;

    async fn unstage_all(&self) -> Result<(), GitError>;

    /// Stage additions, modifications and deletions of `paths`.
    async fn stage(&self, paths: &[String]) -> Result<(), GitError>;

    async fn unstage(&self, paths: &[String]) -> Result<(), GitError>;

    async fn has_staged_changes(&self) -> Result<bool, GitError>;

    /// Commit the index and return the new commit id.
    async fn commit(&self, message: &str) -> Result<String, GitError>;

    async fn reset(&self, target: &str, mode: ResetMode) -> Result<(), GitError>;

    /// Revert `commit` with a new commit.
    async fn revert(&self, commit: &str) -> Result<(), GitError>;

    /// The subset of `paths` git still sees as changed, in input order.
    async fn changed_paths(&self, paths: &[String]) -> Result<Vec<String>, GitError>;
}

/// [`GitBackend`] over a working tree on disk.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_dir: PathBuf,
    timeout: Duration,
}

impl GitCli {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            timeout: DEFAULT_GIT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    fn open(&self) -> Result<Repository, GitError> {
        Repository::open(&self.repo_dir).map_err(GitError::OpenRepository)
    }

    /// Run git with `args` in the repository, returning trimmed stdout.
    async fn run_git(&self, args: &[&str], operation: &str) -> Result<String, GitError> {
        debug!("git {}", args.join(" "));

        let output = timeout(
            self.timeout,
            Command::new("git")
                .args(args)
                .current_dir(&self.repo_dir)
                .env("GIT_LITERAL_PATHSPECS", "1")
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| GitError::Timeout {
            operation: operation.to_string(),
            secs: self.timeout.as_secs(),
        })?
        .map_err(|e| GitError::SpawnFailed {
            operation: operation.to_string(),
            source: e,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            // `git commit` reports "nothing to commit" on stdout
            let detail = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(GitError::CommandFailed {
                operation: operation.to_string(),
                stderr: detail.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn run_with_paths(
        &self,
        base: &[&str],
        paths: &[String],
        operation: &str,
    ) -> Result<(), GitError> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args: Vec<&str> = base.to_vec();
        args.push("--");
        args.extend(paths.iter().map(String::as_str));
        self.run_git(&args, operation).await.map(|_| ())
    }
}

#[async_trait]
impl GitBackend for GitCli {
    async fn head(&self) -> Result<Option<String>, GitError> {
        let repo = self.open()?;
        match repo.head() {
            Ok(head) => Ok(head.target().map(|oid| oid.to_string())),
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
                Ok(None)
            }
            Err(e) => Err(GitError::ReadFailed(e)),
        }
    }

    async fn log(&self, limit: usize) -> Result<Vec<LogEntry>, GitError> {
        if self.head().await?.is_none() {
            return Ok(Vec::new());
        }
        let repo = self.open()?;

        let mut revwalk = repo.revwalk().map_err(GitError::ReadFailed)?;
        revwalk.push_head().map_err(GitError::ReadFailed)?;

        let mut entries = Vec::new();
        for oid in revwalk.take(limit) {
            let oid = oid.map_err(GitError::ReadFailed)?;
            let commit = repo.find_commit(oid).map_err(GitError::ReadFailed)?;
            entries.push(LogEntry {
                hash: oid.to_string(),
                summary: commit.summary().unwrap_or("").to_string(),
            });
        }
        Ok(entries)
    }

    async fn unstage_all(&self) -> Result<(), GitError> {
        if self.head().await?.is_some() {
            self.run_git(&["reset", "-q"], "reset").await.map(|_| ())
        } else {
            self.run_git(&["rm", "-r", "-q", "--cached", "--ignore-unmatch", "--", "."], "rm")
                .await
                .map(|_| ())
        }
    }

    async fn stage(&self, paths: &[String]) -> Result<(), GitError> {
        self.run_with_paths(&["add", "-A"], paths, "add").await
    }

    async fn unstage(&self, paths: &[String]) -> Result<(), GitError> {
        if self.head().await?.is_some() {
            self.run_with_paths(&["reset", "-q"], paths, "reset").await
        } else {
            self.run_with_paths(&["rm", "-r", "-q", "--cached", "--ignore-unmatch"], paths, "rm")
                .await
        }
    }

    async fn has_staged_changes(&self) -> Result<bool, GitError> {
        let repo = self.open()?;
        let mut options = StatusOptions::new();
        options.include_untracked(false).include_ignored(false);

        let statuses = repo.statuses(Some(&mut options)).map_err(GitError::ReadFailed)?;
        let staged = Status::INDEX_NEW
            | Status::INDEX_MODIFIED
            | Status::INDEX_DELETED
            | Status::INDEX_RENAMED
            | Status::INDEX_TYPECHANGE;
        Ok(statuses.iter().any(|entry| entry.status().intersects(staged)))
    }

    async fn commit(&self, message: &str) -> Result<String, GitError> {
        self.run_git(&["commit", "-q", "-m", message], "commit").await?;
        self.run_git(&["rev-parse", "HEAD"], "rev-parse").await
    }

    async fn reset(&self, target: &str, mode: ResetMode) -> Result<(), GitError> {
        self.run_git(&["reset", "-q", mode.flag(), target], "reset")
            .await
            .map(|_| ())
    }

    async fn revert(&self, commit: &str) -> Result<(), GitError> {
        self.run_git(&["revert", "--no-edit", commit], "revert")
            .await
            .map(|_| ())
    }

    async fn changed_paths(&self, paths: &[String]) -> Result<Vec<String>, GitError> {
        let repo = self.open()?;
        let mut changed = Vec::new();

        for path in paths {
            match repo.status_file(Path::new(path)) {
                Ok(status) if status.is_empty() || status.contains(Status::IGNORED) => {}
                Ok(_) => changed.push(path.clone()),
                Err(e) if e.code() == ErrorCode::NotFound => {}
                Err(e) => return Err(GitError::ReadFailed(e)),
            }
        }
        Ok(changed)
    }
}
