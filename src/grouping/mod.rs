//! Grouping engine: partitions change records into an ordered commit plan.
//!
//! Records are related by explicit dependency, shared feature label, shared
//! directory and reverse dependency (or, with the embedding strategy, by
//! vector similarity), named, split per category, chunked, scored and
//! finally put into an advisory dependency order.

pub mod cluster;
pub mod deps;
pub mod feature;
pub mod index;
pub mod score;
pub mod split;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::change::ChangeRecord;
use crate::error::GroupingError;
use crate::plan::{CommitGroup, CommitPlan};

pub use cluster::{Embedder, TokenEmbedder};
pub use feature::FeatureCache;
use index::ChangeIndex;

/// Default cosine similarity for the embedding strategy.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.6;

/// Size and separation knobs for grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupingOptions {
    pub max_files_per_commit: usize,
    pub separate_tests: bool,
    pub separate_docs: bool,
}

impl Default for GroupingOptions {
    fn default() -> Self {
        Self {
            max_files_per_commit: 10,
            separate_tests: true,
            separate_docs: true,
        }
    }
}

/// How records are related before the per-category split.
#[derive(Clone, Default)]
pub enum GroupingStrategy {
    /// Dependency, label, directory and reverse-dependency affinity.
    #[default]
    Heuristic,
    /// Greedy cosine-similarity clustering over embedder vectors.
    EmbeddingCluster {
        embedder: Arc<dyn Embedder>,
        threshold: f32,
    },
}

impl GroupingStrategy {
    /// Embedding clustering with the built-in [`TokenEmbedder`].
    pub fn token_embedding(threshold: f32) -> Self {
        GroupingStrategy::EmbeddingCluster {
            embedder: Arc::new(TokenEmbedder),
            threshold,
        }
    }
}

impl fmt::Debug for GroupingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupingStrategy::Heuristic => f.write_str("Heuristic"),
            GroupingStrategy::EmbeddingCluster { threshold, .. } => f
                .debug_struct("EmbeddingCluster")
                .field("threshold", threshold)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GroupingEngine {
    options: GroupingOptions,
    strategy: GroupingStrategy,
}

impl GroupingEngine {
    pub fn new(options: GroupingOptions, strategy: GroupingStrategy) -> Self {
        Self { options, strategy }
    }

    pub fn options(&self) -> &GroupingOptions {
        &self.options
    }

    pub fn strategy(&self) -> &GroupingStrategy {
        &self.strategy
    }

    /// Group `records` into a commit plan.
    ///
    /// Every input path ends up in exactly one group. The plan is not yet
    /// checked for conflicts.
    pub fn group(&self, records: &[ChangeRecord], cache: &mut FeatureCache) -> CommitPlan {
        let mut warnings = Vec::new();
        let mut seen = HashSet::new();
        let mut valid = Vec::new();
        let mut invalid = Vec::new();

        for record in records {
            if !seen.insert(record.path.as_str()) {
                warn!("Duplicate change record for '{}', keeping the first", record.path);
                warnings.push(format!("Duplicate change record '{}' ignored", record.path));
                continue;
            }

            match validate_record(record) {
                Ok(()) => valid.push(record.clone()),
                Err(e) => {
                    warn!("{}; committing it on its own", e);
                    invalid.push(record.clone());
                }
            }
        }

        let clusters = match &self.strategy {
            GroupingStrategy::Heuristic => relate(&valid),
            GroupingStrategy::EmbeddingCluster {
                embedder,
                threshold,
            } => cluster::cluster(&valid, embedder.as_ref(), *threshold),
        };

        let mut members: Vec<Vec<ChangeRecord>> = clusters
            .into_iter()
            .map(|cluster| cluster.into_iter().map(|idx| valid[idx].clone()).collect())
            .collect();
        members.extend(invalid.into_iter().map(|record| vec![record]));

        let mut groups = Vec::new();
        for files in members {
            let refs: Vec<&ChangeRecord> = files.iter().collect();
            let feature = cache.name_for(&refs);

            for sub in split::split_by_category(&feature, files, &self.options) {
                for part in split::chunk(sub, self.options.max_files_per_commit) {
                    let scope = part.scope();
                    let mut group =
                        CommitGroup::new("", part.kind, scope, part.description, part.files);
                    group.priority = score::priority(&group);
                    groups.push(group);
                }
            }
        }

        score::sort_groups(&mut groups);
        let mut groups = deps::topological_reorder(groups);
        for (idx, group) in groups.iter_mut().enumerate() {
            group.id = format!("g{}", idx + 1);
        }

        debug!(
            "Grouped {} records into {} commits ({} cached feature names)",
            seen.len(),
            groups.len(),
            cache.len()
        );

        let mut plan = CommitPlan::new(groups);
        for warning in warnings {
            plan.add_warning(warning);
        }
        plan.refresh_advisories();
        plan
    }
}

fn validate_record(record: &ChangeRecord) -> Result<(), GroupingError> {
    let reason = if record.path.trim().is_empty() {
        "empty path"
    } else if record.path.ends_with('/') {
        "path names a directory"
    } else {
        return Ok(());
    };

    Err(GroupingError::InvalidRecord {
        path: record.path.clone(),
        reason: reason.to_string(),
    })
}

/// One-level related sets over unvisited records, primary record first.
fn relate(records: &[ChangeRecord]) -> Vec<Vec<usize>> {
    let index = ChangeIndex::build(records);
    let mut visited = vec![false; records.len()];
    let mut clusters = Vec::new();

    for idx in 0..records.len() {
        if visited[idx] {
            continue;
        }
        visited[idx] = true;

        let mut members = vec![idx];
        for other in index.related(idx) {
            if !visited[other] {
                visited[other] = true;
                members.push(other);
            }
        }
        clusters.push(members);
    }

    clusters
}
