//! Commit plans: ordered commit groups plus advisories.

pub mod group;
pub mod io;

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;

pub use group::{CommitGroup, CommitKind};
pub use io::{read_plan, write_plan};

/// Changed lines above which a single commit is flagged as large.
pub const LARGE_COMMIT_LINES: usize = 1_000;

/// Commit count above which a plan is flagged as excessive.
pub const EXCESSIVE_COMMIT_COUNT: usize = 15;

/// Average dependencies per file above which a group is flagged as complex.
pub const COMPLEX_DEPENDENCY_AVERAGE: f64 = 5.0;

const SECONDS_PER_COMMIT: u64 = 2;
const MILLIS_PER_FILE: u64 = 50;

/// An ordered sequence of commit groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitPlan {
    pub groups: Vec<CommitGroup>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl CommitPlan {
    pub fn new(groups: Vec<CommitGroup>) -> Self {
        Self {
            groups,
            warnings: Vec::new(),
        }
    }

    pub fn total_files(&self) -> usize {
        self.groups.iter().map(CommitGroup::file_count).sum()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group(&self, id: &str) -> Option<&CommitGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// Rough wall-clock estimate for executing the plan.
    pub fn estimated_duration(&self) -> Duration {
        let secs = self.groups.len() as u64 * SECONDS_PER_COMMIT;
        let millis = self.total_files() as u64 * MILLIS_PER_FILE;
        Duration::from_secs(secs) + Duration::from_millis(millis)
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }

    /// Recompute large-commit, commit-count and dependency advisories.
    pub fn refresh_advisories(&mut self) {
        let mut advisories = Vec::new();

        if self.groups.len() > EXCESSIVE_COMMIT_COUNT {
            advisories.push(format!(
                "Plan creates {} commits; consider raising max_files_per_commit",
                self.groups.len()
            ));
        }

        for group in &self.groups {
            let lines = group.changed_lines();
            if lines > LARGE_COMMIT_LINES {
                advisories.push(format!(
                    "Large commit '{}': {} changed lines across {} files",
                    group.id,
                    lines,
                    group.file_count()
                ));
            }

            let average = group.average_dependencies();
            if average > COMPLEX_DEPENDENCY_AVERAGE {
                advisories.push(format!(
                    "Complex dependencies in '{}': {:.1} dependencies per file",
                    group.id, average
                ));
            }
        }

        for advisory in advisories {
            self.add_warning(advisory);
        }
    }

    /// Check the structural invariants execution relies on.
    pub fn validate(&self) -> Result<(), ExecutionError> {
        if self.groups.is_empty() {
            return Err(ExecutionError::EmptyPlan);
        }

        let mut owners: HashMap<&str, &str> = HashMap::new();
        for group in &self.groups {
            if group.is_empty() {
                return Err(ExecutionError::EmptyGroup(group.id.clone()));
            }
            for path in group.paths() {
                if let Some(first) = owners.insert(path, group.id.as_str()) {
                    return Err(ExecutionError::DuplicatePath {
                        path: path.to_string(),
                        first: first.to_string(),
                        second: group.id.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Human-readable listing of the plan.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{} commits, {} files (estimated {}s)\n",
            self.groups.len(),
            self.total_files(),
            self.estimated_duration().as_secs()
        ));

        for (idx, group) in self.groups.iter().enumerate() {
            out.push_str(&format!(
                "\n{:>3}. {}  [{}, priority {}]\n",
                idx + 1,
                group.header(),
                group.id,
                group.priority
            ));
            for file in &group.files {
                out.push_str(&format!(
                    "       {:<9} {} (+{} -{})\n",
                    file.kind, file.path, file.additions, file.deletions
                ));
            }
        }

        if !self.warnings.is_empty() {
            out.push_str("\nWarnings:\n");
            for warning in &self.warnings {
                out.push_str(&format!("  - {}\n", warning));
            }
        }

        out
    }
}
