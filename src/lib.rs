//! gitsplit - split a working tree's changes into a sequence of focused commits.
//!
//! # Overview
//!
//! gitsplit takes analyzed change records, groups them into commit groups,
//! repairs conflicts between those groups (dependency cycles, files claimed
//! twice, bad ordering) and then executes the plan against a git repository,
//! retrying transient failures and rolling back when a run stops part way.

pub mod change;
pub mod config;
pub mod error;
pub mod grouping;
pub mod orchestrator;
pub mod plan;
pub mod resolve;

// Re-export commonly used types
pub use change::{Category, ChangeKind, ChangeRecord};
pub use config::Config;
pub use error::{ChangeError, ConfigError, ExecutionError, GitError, GroupingError, PlanError};
pub use grouping::{FeatureCache, GroupingEngine, GroupingOptions, GroupingStrategy};
pub use orchestrator::{ExecutionOptions, ExecutionReport, GitBackend, GitCli, Orchestrator};
pub use plan::{CommitGroup, CommitKind, CommitPlan};
pub use resolve::{ConflictResolver, ResolutionOutcome, ResolutionStrategy};
