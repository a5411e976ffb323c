//! Group priority scoring and advisory ordering.

use std::cmp::Ordering;

use crate::plan::CommitGroup;

/// Points per kind rank step; bonuses stay below one step.
const KIND_WEIGHT: i64 = 10;
const MAX_DEPENDENCY_BONUS: i64 = 4;
const MAX_SIZE_BONUS: i64 = 5;

/// Priority = kind base score + capped, log-scaled bonuses for average
/// dependency count and total changed lines.
pub fn priority(group: &CommitGroup) -> i64 {
    let base = i64::from(group.kind.rank()) * KIND_WEIGHT;

    let dependency_bonus =
        ((group.average_dependencies().ln_1p() * 3.0).round() as i64).min(MAX_DEPENDENCY_BONUS);
    let size_bonus =
        ((group.changed_lines() as f64).ln_1p().round() as i64).min(MAX_SIZE_BONUS);

    base + dependency_bonus + size_bonus
}

/// Priority descending, then kind rank descending, then fewer files first.
pub fn compare(a: &CommitGroup, b: &CommitGroup) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| b.kind.rank().cmp(&a.kind.rank()))
        .then_with(|| a.file_count().cmp(&b.file_count()))
}

/// Stable sort by [`compare`].
pub fn sort_groups(groups: &mut [CommitGroup]) {
    groups.sort_by(compare);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{Category, ChangeKind, ChangeRecord};
    use crate::plan::CommitKind;

    fn group(id: &str, kind: CommitKind, files: usize, lines: usize) -> CommitGroup {
        let records = (0..files)
            .map(|i| {
                ChangeRecord::new(format!("{}/{}.rs", id, i), ChangeKind::Modified, Category::Feature)
                    .with_lines(lines, 0)
            })
            .collect();
        CommitGroup::new(id, kind, None, "x", records)
    }

    #[test]
    fn test_priority_base_follows_kind_rank() {
        let chore = group("a", CommitKind::Chore, 1, 0);
        let style = group("b", CommitKind::Style, 1, 0);
        assert_eq!(priority(&chore), 70);
        assert_eq!(priority(&style), 10);
    }

    #[test]
    fn test_bonuses_are_capped_below_one_kind_step() {
        let mut huge = group("a", CommitKind::Feat, 3, 100_000);
        for file in &mut huge.files {
            file.dependencies = (0..50).map(|i| format!("dep{}", i)).collect();
        }
        let score = priority(&huge);
        assert_eq!(score, 50 + MAX_DEPENDENCY_BONUS + MAX_SIZE_BONUS);
        assert!(score < priority(&group("b", CommitKind::Fix, 1, 0)) + KIND_WEIGHT);
    }

    #[test]
    fn test_size_bonus_has_diminishing_returns() {
        let small = priority(&group("a", CommitKind::Feat, 1, 10));
        let bigger = priority(&group("b", CommitKind::Feat, 1, 100));
        assert_eq!(small, 52);
        assert_eq!(bigger, 55);
    }

    #[test]
    fn test_sort_ties_break_on_kind_then_file_count() {
        let mut groups = vec![
            group("many", CommitKind::Feat, 3, 0),
            group("test", CommitKind::Test, 1, 0),
            group("few", CommitKind::Feat, 1, 0),
        ];
        for g in &mut groups {
            g.priority = 10;
        }
        sort_groups(&mut groups);
        let ids: Vec<&str> = groups.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["few", "many", "test"]);
    }
}
