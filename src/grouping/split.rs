//! Splitting a feature's files into per-category commits.

use crate::change::{Category, ChangeKind, ChangeRecord};
use crate::plan::CommitKind;

use super::GroupingOptions;
use super::feature::FALLBACK_FEATURE;

/// A commit-sized slice of one feature, before ids and priorities exist.
#[derive(Debug, Clone)]
pub struct SubGroup {
    pub feature: String,
    pub kind: CommitKind,
    pub description: String,
    pub files: Vec<ChangeRecord>,
}

impl SubGroup {
    pub fn scope(&self) -> Option<String> {
        if self.feature == FALLBACK_FEATURE {
            None
        } else {
            Some(self.feature.clone())
        }
    }
}

/// Split a feature's members into at most five category buckets.
///
/// Tests and docs join the feature bucket unless the options give them
/// their own commit. Bucket order is feature, test, docs, config, style.
pub fn split_by_category(
    feature: &str,
    members: Vec<ChangeRecord>,
    options: &GroupingOptions,
) -> Vec<SubGroup> {
    let mut buckets: [Vec<ChangeRecord>; 5] = Default::default();

    for record in members {
        let slot = match record.category {
            Category::Feature => 0,
            Category::Test if options.separate_tests => 1,
            Category::Docs if options.separate_docs => 2,
            Category::Test | Category::Docs => 0,
            Category::Config => 3,
            Category::Style => 4,
        };
        buckets[slot].push(record);
    }

    buckets
        .into_iter()
        .filter(|files| !files.is_empty())
        .map(|files| {
            let kind = infer_kind(&files);
            let description = describe(kind, feature, &files);
            SubGroup {
                feature: feature.to_string(),
                kind,
                description,
                files,
            }
        })
        .collect()
}

/// Deterministically split `group` into chunks of at most `max_files`,
/// preserving member order.
pub fn chunk(group: SubGroup, max_files: usize) -> Vec<SubGroup> {
    let max_files = max_files.max(1);
    if group.files.len() <= max_files {
        return vec![group];
    }

    let total = group.files.len().div_ceil(max_files);
    group
        .files
        .chunks(max_files)
        .enumerate()
        .map(|(idx, files)| SubGroup {
            feature: group.feature.clone(),
            kind: group.kind,
            description: format!("{} (part {}/{})", group.description, idx + 1, total),
            files: files.to_vec(),
        })
        .collect()
}

/// Commit kind for a bucket of files.
pub fn infer_kind(files: &[ChangeRecord]) -> CommitKind {
    let all = |category: Category| files.iter().all(|f| f.category == category);

    if all(Category::Test) {
        return CommitKind::Test;
    }
    if all(Category::Docs) {
        return CommitKind::Docs;
    }
    if all(Category::Config) {
        return CommitKind::Chore;
    }
    if all(Category::Style) {
        return CommitKind::Style;
    }

    let labelled_fix = files.iter().any(|f| {
        f.features.iter().any(|label| {
            let label = label.to_lowercase();
            label.starts_with("fix") || label.contains("bug") || label.contains("hotfix")
        })
    });
    if labelled_fix {
        return CommitKind::Fix;
    }

    if files.iter().any(|f| f.kind == ChangeKind::Added) {
        return CommitKind::Feat;
    }

    let only_moves = files
        .iter()
        .all(|f| matches!(f.kind, ChangeKind::Deleted | ChangeKind::Renamed));
    let additions: usize = files.iter().map(|f| f.additions).sum();
    let deletions: usize = files.iter().map(|f| f.deletions).sum();

    if only_moves || deletions > additions {
        CommitKind::Refactor
    } else {
        CommitKind::Feat
    }
}

fn describe(kind: CommitKind, feature: &str, files: &[ChangeRecord]) -> String {
    let any_added = files.iter().any(|f| f.kind == ChangeKind::Added);
    let all_deleted = files.iter().all(|f| f.kind == ChangeKind::Deleted);

    match kind {
        CommitKind::Feat if any_added => format!("add {}", feature),
        CommitKind::Feat => format!("update {}", feature),
        CommitKind::Fix => format!("fix {}", feature),
        CommitKind::Refactor if all_deleted => format!("remove {}", feature),
        CommitKind::Refactor => format!("refactor {}", feature),
        CommitKind::Test if any_added => format!("add tests for {}", feature),
        CommitKind::Test => format!("update tests for {}", feature),
        CommitKind::Docs => format!("update {} documentation", feature),
        CommitKind::Chore => format!("update {} configuration", feature),
        CommitKind::Style => format!("format {}", feature),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(path: &str, kind: ChangeKind, category: Category) -> ChangeRecord {
        ChangeRecord::new(path, kind, category).with_lines(10, 1)
    }

    fn options(separate_tests: bool, separate_docs: bool) -> GroupingOptions {
        GroupingOptions {
            max_files_per_commit: 10,
            separate_tests,
            separate_docs,
        }
    }

    fn mixed() -> Vec<ChangeRecord> {
        vec![
            rec("src/auth/login.ts", ChangeKind::Added, Category::Feature),
            rec("src/auth/login.test.ts", ChangeKind::Added, Category::Test),
            rec("docs/auth.md", ChangeKind::Modified, Category::Docs),
            rec("auth.config.json", ChangeKind::Modified, Category::Config),
            rec("src/auth/login.css", ChangeKind::Modified, Category::Style),
        ]
    }

    #[test]
    fn test_split_into_five_buckets() {
        let groups = split_by_category("auth", mixed(), &options(true, true));
        let kinds: Vec<CommitKind> = groups.iter().map(|g| g.kind).collect();
        assert_eq!(
            kinds,
            vec![
                CommitKind::Feat,
                CommitKind::Test,
                CommitKind::Docs,
                CommitKind::Chore,
                CommitKind::Style,
            ]
        );
        assert_eq!(groups[0].description, "add auth");
        assert_eq!(groups[1].description, "add tests for auth");
        assert_eq!(groups[0].scope(), Some("auth".to_string()));
    }

    #[test]
    fn test_tests_and_docs_join_feature_when_not_separated() {
        let groups = split_by_category("auth", mixed(), &options(false, false));
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].files.len(), 3);
        assert_eq!(groups[0].kind, CommitKind::Feat);
    }

    #[test]
    fn test_only_tests_without_separation_is_test_commit() {
        let files = vec![rec("tests/a.rs", ChangeKind::Modified, Category::Test)];
        let groups = split_by_category("parser", files, &options(false, true));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].kind, CommitKind::Test);
        assert_eq!(groups[0].description, "update tests for parser");
    }

    #[test]
    fn test_misc_feature_has_no_scope() {
        let files = vec![rec("a.rs", ChangeKind::Modified, Category::Feature)];
        let groups = split_by_category(FALLBACK_FEATURE, files, &options(true, true));
        assert_eq!(groups[0].scope(), None);
    }

    #[test]
    fn test_chunk_preserves_order() {
        let files: Vec<ChangeRecord> = (0..7)
            .map(|i| rec(&format!("src/f{}.rs", i), ChangeKind::Modified, Category::Feature))
            .collect();
        let group = SubGroup {
            feature: "core".to_string(),
            kind: CommitKind::Feat,
            description: "update core".to_string(),
            files,
        };

        let chunks = chunk(group, 3);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].files[0].path, "src/f0.rs");
        assert_eq!(chunks[1].files[0].path, "src/f3.rs");
        assert_eq!(chunks[2].files.len(), 1);
        assert_eq!(chunks[2].description, "update core (part 3/3)");
    }

    #[test]
    fn test_chunk_below_threshold_is_untouched() {
        let group = SubGroup {
            feature: "x".to_string(),
            kind: CommitKind::Feat,
            description: "add x".to_string(),
            files: vec![rec("a.rs", ChangeKind::Added, Category::Feature)],
        };
        let chunks = chunk(group, 3);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].description, "add x");
    }

    #[test]
    fn test_infer_kind_fix_label() {
        let files = vec![
            rec("src/api.rs", ChangeKind::Modified, Category::Feature).with_features(["bugfix"]),
        ];
        assert_eq!(infer_kind(&files), CommitKind::Fix);
    }

    #[test]
    fn test_infer_kind_refactor_for_deletions() {
        let files = vec![
            ChangeRecord::new("src/old.rs", ChangeKind::Deleted, Category::Feature).with_lines(0, 80),
        ];
        assert_eq!(infer_kind(&files), CommitKind::Refactor);
        assert_eq!(describe(CommitKind::Refactor, "legacy", &files), "remove legacy");
    }

    #[test]
    fn test_infer_kind_modification_defaults_to_feat() {
        let files = vec![rec("src/a.rs", ChangeKind::Modified, Category::Feature)];
        assert_eq!(infer_kind(&files), CommitKind::Feat);
        assert_eq!(describe(CommitKind::Feat, "a", &files), "update a");
    }
}
