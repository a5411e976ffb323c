//! Configuration: defaults, then `.gitsplit.toml`, then environment.
//!
//! CLI flags are applied on top by the binary.

use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use toml_edit::{DocumentMut, Item};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::grouping::{DEFAULT_SIMILARITY_THRESHOLD, GroupingOptions, GroupingStrategy};
use crate::orchestrator::{ExecutionOptions, RetryPolicy, RollbackStrategy};
use crate::resolve::ResolutionStrategy;

/// Config file looked up in the repository root.
pub const CONFIG_FILE: &str = ".gitsplit.toml";

pub const MAX_FILES_ENV_VAR: &str = "GITSPLIT_MAX_FILES";
pub const MAX_RETRIES_ENV_VAR: &str = "GITSPLIT_MAX_RETRIES";
pub const RETRY_DELAY_ENV_VAR: &str = "GITSPLIT_RETRY_DELAY_MS";
pub const BATCH_SIZE_ENV_VAR: &str = "GITSPLIT_BATCH_SIZE";
pub const GIT_TIMEOUT_ENV_VAR: &str = "GITSPLIT_GIT_TIMEOUT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    #[default]
    Heuristic,
    Embedding,
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "heuristic" => Ok(Self::Heuristic),
            "embedding" => Ok(Self::Embedding),
            _ => Err(format!("Unknown grouping strategy '{}' (expected heuristic or embedding)", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub max_files_per_commit: usize,
    pub separate_tests: bool,
    pub separate_docs: bool,
    pub strategy: StrategyKind,
    pub similarity_threshold: f32,
    pub resolution: ResolutionStrategy,
    /// Total attempts per git operation.
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub stage_batch_size: usize,
    pub git_timeout_secs: u64,
    pub rollback_strategy: RollbackStrategy,
    /// Keep rolled-back changes on disk. When false a reset rollback is
    /// hard and also discards uncommitted edits.
    pub preserve_working_tree: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_files_per_commit: 10,
            separate_tests: true,
            separate_docs: true,
            strategy: StrategyKind::Heuristic,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            resolution: ResolutionStrategy::Conservative,
            max_retries: 3,
            retry_delay_ms: 1000,
            stage_batch_size: 50,
            git_timeout_secs: 60,
            rollback_strategy: RollbackStrategy::Reset,
            preserve_working_tree: true,
        }
    }
}

impl Config {
    /// Load config for the repository at `repo_dir`.
    ///
    /// A missing config file is not an error.
    pub fn load(repo_dir: &Path) -> Result<Self, ConfigError> {
        let path = repo_dir.join(CONFIG_FILE);
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadFailed {
                path: path.clone(),
                source: e,
            })?;
            debug!("Loading config from {}", path.display());
            Self::from_toml(&path, &content)?
        } else {
            Self::default()
        };

        config.apply_env();
        Ok(config)
    }

    /// Parse config file content; unset keys keep their defaults.
    pub fn from_toml(path: &Path, content: &str) -> Result<Self, ConfigError> {
        let doc = content
            .parse::<DocumentMut>()
            .map_err(|e| ConfigError::InvalidToml {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let mut config = Self::default();
        for (key, item) in doc.iter() {
            match key {
                "max_files_per_commit" => config.max_files_per_commit = positive(key, item)?,
                "separate_tests" => config.separate_tests = boolean(key, item)?,
                "separate_docs" => config.separate_docs = boolean(key, item)?,
                "strategy" => config.strategy = parsed(key, item)?,
                "similarity_threshold" => config.similarity_threshold = threshold(key, item)?,
                "resolution" => config.resolution = parsed(key, item)?,
                "max_retries" => config.max_retries = positive(key, item)?,
                "retry_delay_ms" => config.retry_delay_ms = non_negative(key, item)?,
                "stage_batch_size" => config.stage_batch_size = positive(key, item)?,
                "git_timeout_secs" => config.git_timeout_secs = positive(key, item)?,
                "rollback_strategy" => config.rollback_strategy = parsed(key, item)?,
                "preserve_working_tree" => config.preserve_working_tree = boolean(key, item)?,
                other => warn!("Ignoring unknown config key '{}' in {}", other, path.display()),
            }
        }

        Ok(config)
    }

    /// Apply `GITSPLIT_*` overrides. Invalid values are logged and ignored.
    pub fn apply_env(&mut self) {
        if let Some(v) = env_positive(MAX_FILES_ENV_VAR) {
            self.max_files_per_commit = v as usize;
        }
        if let Some(v) = env_positive(MAX_RETRIES_ENV_VAR) {
            self.max_retries = v as u32;
        }
        if let Some(v) = env_number(RETRY_DELAY_ENV_VAR) {
            self.retry_delay_ms = v;
        }
        if let Some(v) = env_positive(BATCH_SIZE_ENV_VAR) {
            self.stage_batch_size = v as usize;
        }
        if let Some(v) = env_positive(GIT_TIMEOUT_ENV_VAR) {
            self.git_timeout_secs = v;
        }
    }

    pub fn grouping_options(&self) -> GroupingOptions {
        GroupingOptions {
            max_files_per_commit: self.max_files_per_commit,
            separate_tests: self.separate_tests,
            separate_docs: self.separate_docs,
        }
    }

    pub fn grouping_strategy(&self) -> GroupingStrategy {
        match self.strategy {
            StrategyKind::Heuristic => GroupingStrategy::Heuristic,
            StrategyKind::Embedding => GroupingStrategy::token_embedding(self.similarity_threshold),
        }
    }

    pub fn execution_options(&self) -> ExecutionOptions {
        ExecutionOptions {
            rollback_strategy: self.rollback_strategy,
            preserve_working_tree: self.preserve_working_tree,
            retry: RetryPolicy {
                max_attempts: self.max_retries,
                delay: Duration::from_millis(self.retry_delay_ms),
            },
            stage_batch_size: self.stage_batch_size,
            ..ExecutionOptions::default()
        }
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }
}

fn invalid(key: &str, item: &Item) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: item.to_string().trim().to_string(),
    }
}

fn boolean(key: &str, item: &Item) -> Result<bool, ConfigError> {
    item.as_bool().ok_or_else(|| invalid(key, item))
}

fn non_negative<T: TryFrom<i64>>(key: &str, item: &Item) -> Result<T, ConfigError> {
    item.as_integer()
        .filter(|v| *v >= 0)
        .and_then(|v| T::try_from(v).ok())
        .ok_or_else(|| invalid(key, item))
}

fn positive<T: TryFrom<i64>>(key: &str, item: &Item) -> Result<T, ConfigError> {
    item.as_integer()
        .filter(|v| *v > 0)
        .and_then(|v| T::try_from(v).ok())
        .ok_or_else(|| invalid(key, item))
}

fn threshold(key: &str, item: &Item) -> Result<f32, ConfigError> {
    item.as_float()
        .or_else(|| item.as_integer().map(|v| v as f64))
        .filter(|v| (0.0..=1.0).contains(v))
        .map(|v| v as f32)
        .ok_or_else(|| invalid(key, item))
}

fn parsed<T: FromStr>(key: &str, item: &Item) -> Result<T, ConfigError> {
    item.as_str()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| invalid(key, item))
}

fn env_number(var: &str) -> Option<u64> {
    match env::var(var) {
        Ok(v) if !v.is_empty() => match v.trim().parse::<u64>() {
            Ok(n) => Some(n),
            Err(_) => {
                warn!("Invalid {} value '{}', ignoring", var, v);
                None
            }
        },
        _ => None,
    }
}

fn env_positive(var: &str) -> Option<u64> {
    match env_number(var) {
        Some(0) => {
            warn!("{} must be greater than zero, ignoring", var);
            None
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_VARS: [&str; 5] = [
        MAX_FILES_ENV_VAR,
        MAX_RETRIES_ENV_VAR,
        RETRY_DELAY_ENV_VAR,
        BATCH_SIZE_ENV_VAR,
        GIT_TIMEOUT_ENV_VAR,
    ];

    fn parse(content: &str) -> Result<Config, ConfigError> {
        Config::from_toml(Path::new(".gitsplit.toml"), content)
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.max_files_per_commit, 10);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.resolution, ResolutionStrategy::Conservative);
        assert_eq!(config.rollback_strategy, RollbackStrategy::Reset);
        assert!(config.preserve_working_tree);
        assert!(config.execution_options().preserve_working_tree);
    }

    #[test]
    fn test_parse_all_keys() {
        let config = parse(
            r#"
max_files_per_commit = 4
separate_tests = false
separate_docs = false
strategy = "embedding"
similarity_threshold = 0.75
resolution = "balanced"
max_retries = 5
retry_delay_ms = 0
stage_batch_size = 20
git_timeout_secs = 30
rollback_strategy = "revert"
preserve_working_tree = false
"#,
        )
        .unwrap();

        assert_eq!(config.max_files_per_commit, 4);
        assert!(!config.separate_tests);
        assert_eq!(config.strategy, StrategyKind::Embedding);
        assert!((config.similarity_threshold - 0.75).abs() < f32::EPSILON);
        assert_eq!(config.resolution, ResolutionStrategy::Balanced);
        assert_eq!(config.retry_delay_ms, 0);
        assert_eq!(config.rollback_strategy, RollbackStrategy::Revert);
        assert!(!config.preserve_working_tree);

        let execution = config.execution_options();
        assert_eq!(execution.retry.max_attempts, 5);
        assert_eq!(execution.stage_batch_size, 20);
        assert!(execution.rollback_on_failure);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let config = parse("colour = \"blue\"\nmax_files_per_commit = 2\n").unwrap();
        assert_eq!(config.max_files_per_commit, 2);
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(matches!(
            parse("max_files_per_commit = 0"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            parse("resolution = \"yolo\""),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            parse("similarity_threshold = 1.5"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            parse("separate_docs = \"yes\""),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(parse("max_retries = ["), Err(ConfigError::InvalidToml { .. })));
    }

    #[test]
    fn test_env_overrides() {
        temp_env::with_vars(
            [
                (MAX_FILES_ENV_VAR, Some("7")),
                (MAX_RETRIES_ENV_VAR, Some("2")),
                (RETRY_DELAY_ENV_VAR, Some("0")),
                (BATCH_SIZE_ENV_VAR, Some("5")),
                (GIT_TIMEOUT_ENV_VAR, Some("90")),
            ],
            || {
                let mut config = Config::default();
                config.apply_env();
                assert_eq!(config.max_files_per_commit, 7);
                assert_eq!(config.max_retries, 2);
                assert_eq!(config.retry_delay_ms, 0);
                assert_eq!(config.stage_batch_size, 5);
                assert_eq!(config.git_timeout(), Duration::from_secs(90));
            },
        );
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        temp_env::with_vars(
            [
                (MAX_FILES_ENV_VAR, Some("lots")),
                (MAX_RETRIES_ENV_VAR, Some("0")),
                (GIT_TIMEOUT_ENV_VAR, Some("-5")),
            ],
            || {
                let mut config = Config::default();
                config.apply_env();
                assert_eq!(config, Config::default());
            },
        );
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        temp_env::with_vars_unset(ALL_VARS, || {
            let dir = tempfile::tempdir().unwrap();
            assert_eq!(Config::load(dir.path()).unwrap(), Config::default());
        });
    }

    #[test]
    fn test_env_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "max_files_per_commit = 3\n").unwrap();

        temp_env::with_var(MAX_FILES_ENV_VAR, Some("8"), || {
            let config = Config::load(dir.path()).unwrap();
            assert_eq!(config.max_files_per_commit, 8);
        });
        temp_env::with_vars_unset(ALL_VARS, || {
            let config = Config::load(dir.path()).unwrap();
            assert_eq!(config.max_files_per_commit, 3);
        });
    }
}
