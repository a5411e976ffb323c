//! Shared test utilities for integration tests.
//!
//! Not all functions are used by every test file, but they're shared across tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use git2::{Oid, Repository, Signature};

use gitsplit::{Category, ChangeKind, ChangeRecord, CommitGroup, CommitKind};

/// Get the path to test fixtures directory.
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Get the path to a change-record fixture.
pub fn changes_fixture(name: &str) -> PathBuf {
    fixtures_dir().join("changes").join(name)
}

/// Whether the `git` binary is available for tests that shell out.
pub fn git_available() -> bool {
    which::which("git").is_ok()
}

/// Build a one-file-per-path commit group.
pub fn group(id: &str, description: &str, paths: &[&str]) -> CommitGroup {
    let files = paths
        .iter()
        .map(|p| ChangeRecord::new(*p, ChangeKind::Added, Category::Feature))
        .collect();
    CommitGroup::new(id, CommitKind::Feat, None, description, files)
}

/// A test git repository builder for integration tests.
pub struct TestRepo {
    pub dir: tempfile::TempDir,
    pub repo: Repository,
}

impl TestRepo {
    /// Create a new empty git repository in a temp directory.
    ///
    /// Identity, signing and hooks are pinned in the local config so the
    /// `git` binary ignores the developer's global settings.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp directory");
        let repo = Repository::init(dir.path()).expect("Failed to init git repo");

        let hooks = dir.path().join(".git/hooks");
        {
            let mut config = repo.config().expect("Failed to open repo config");
            config.set_str("user.name", "Test User").expect("Failed to set user.name");
            config
                .set_str("user.email", "test@example.com")
                .expect("Failed to set user.email");
            config.set_bool("commit.gpgsign", false).expect("Failed to set commit.gpgsign");
            config
                .set_str("core.hooksPath", &hooks.to_string_lossy())
                .expect("Failed to set core.hooksPath");
        }

        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Get the test signature for commits.
    fn signature(&self) -> Signature<'_> {
        Signature::now("Test User", "test@example.com").expect("Failed to create signature")
    }

    /// Write a file relative to the repository root, creating directories.
    pub fn write(&self, rel: &str, content: &str) {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create directories");
        }
        std::fs::write(&path, content).expect("Failed to write file");
    }

    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(rel)).expect("Failed to read file")
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.dir.path().join(rel).exists()
    }

    /// Commit the given files with git2. Returns the commit OID.
    pub fn commit_files(&self, message: &str, files: &[(&str, &str)]) -> Oid {
        for (rel, content) in files {
            self.write(rel, content);
        }

        let mut index = self.repo.index().expect("Failed to get index");
        for (rel, _) in files {
            index.add_path(Path::new(rel)).expect("Failed to add file");
        }
        index.write().expect("Failed to write index");
        let tree_id = index.write_tree().expect("Failed to write tree");
        let tree = self.repo.find_tree(tree_id).expect("Failed to find tree");

        let sig = self.signature();
        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .expect("Failed to create commit")
    }

    /// Current HEAD as a hex string, `None` when unborn.
    pub fn head(&self) -> Option<String> {
        self.repo
            .head()
            .ok()
            .and_then(|h| h.target())
            .map(|oid| oid.to_string())
    }

    /// Summaries of the commits reachable from HEAD, newest first.
    pub fn summaries(&self) -> Vec<String> {
        let mut revwalk = self.repo.revwalk().expect("Failed to create revwalk");
        if revwalk.push_head().is_err() {
            return Vec::new();
        }
        revwalk
            .map(|oid| {
                let oid = oid.expect("Failed to walk history");
                let commit = self.repo.find_commit(oid).expect("Failed to find commit");
                commit.summary().unwrap_or("").to_string()
            })
            .collect()
    }

    /// Install an executable `commit-msg` hook that rejects messages
    /// containing `needle`.
    #[cfg(unix)]
    pub fn reject_messages_containing(&self, needle: &str) {
        use std::os::unix::fs::PermissionsExt;

        let script = format!(
            "#!/bin/sh\nif grep -q '{}' \"$1\"; then\n  echo 'commit rejected by policy hook' >&2\n  exit 1\nfi\nexit 0\n",
            needle
        );
        let path = self.dir.path().join(".git/hooks/commit-msg");
        std::fs::create_dir_all(path.parent().expect("hook path has a parent"))
            .expect("Failed to create hooks directory");
        std::fs::write(&path, script).expect("Failed to write hook");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("Failed to make hook executable");
    }
}
