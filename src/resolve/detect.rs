//! Conflict detection passes.

use std::collections::HashMap;

use crate::change::{Category, ChangeKind};
use crate::plan::CommitGroup;

use super::conflict::{Conflict, Severity};
use super::graph::GroupGraph;

/// Run every detection pass over `groups`.
///
/// Passes are independent; results are in pass order: cycles, ownership,
/// inconsistencies, ordering.
pub fn detect(groups: &[CommitGroup]) -> Vec<Conflict> {
    let graph = GroupGraph::build(groups);
    let mut conflicts = circular_dependencies(&graph);
    conflicts.extend(file_ownership(groups));
    conflicts.extend(logical_inconsistencies(groups));
    conflicts.extend(ordering_violations(&graph));
    conflicts
}

pub fn circular_dependencies(graph: &GroupGraph) -> Vec<Conflict> {
    graph
        .cycles()
        .into_iter()
        .map(|cycle| Conflict::circular(cycle.iter().map(|&n| graph.id(n).to_string()).collect()))
        .collect()
}

/// Paths claimed by more than one group, in first-seen order.
pub fn file_ownership(groups: &[CommitGroup]) -> Vec<Conflict> {
    let mut order: Vec<&str> = Vec::new();
    let mut owners: HashMap<&str, Vec<String>> = HashMap::new();

    for group in groups {
        for path in group.paths() {
            let entry = owners.entry(path).or_default();
            if entry.is_empty() {
                order.push(path);
            }
            if !entry.contains(&group.id) {
                entry.push(group.id.clone());
            }
        }
    }

    order
        .into_iter()
        .filter_map(|path| {
            let ids = owners.remove(path)?;
            (ids.len() > 1).then(|| Conflict::ownership(path, ids))
        })
        .collect()
}

pub fn logical_inconsistencies(groups: &[CommitGroup]) -> Vec<Conflict> {
    let mut conflicts = Vec::new();

    for group in groups {
        let deletes = group.has_kind(ChangeKind::Deleted);
        let edits = group.has_kind(ChangeKind::Added) || group.has_kind(ChangeKind::Modified);
        if deletes && edits {
            conflicts.push(Conflict::inconsistency(
                &group.id,
                Severity::Medium,
                "mixes deletions with additions or modifications",
            ));
        }

        let has = |category: Category| group.files.iter().any(|f| f.category == category);
        let only_tests_and_docs = group
            .files
            .iter()
            .all(|f| matches!(f.category, Category::Test | Category::Docs));
        if only_tests_and_docs && has(Category::Test) && has(Category::Docs) {
            conflicts.push(Conflict::inconsistency(
                &group.id,
                Severity::Low,
                "contains only tests and documentation",
            ));
        }
    }

    conflicts
}

/// Pairs where a group comes before one it depends on.
pub fn ordering_violations(graph: &GroupGraph) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    for node in 0..graph.len() {
        for &dependency in graph.dependencies(node) {
            if dependency > node {
                conflicts.push(Conflict::ordering(graph.id(node), graph.id(dependency)));
            }
        }
    }
    conflicts
}
