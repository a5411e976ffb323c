//! File-level dependency heuristic and advisory topological ordering.

use std::collections::BTreeSet;

use crate::change::ChangeRecord;
use crate::plan::CommitGroup;

const INDEX_STEMS: &[&str] = &["index", "mod", "__init__", "lib", "main"];
const CORE_MARKERS: &[&str] = &["core", "types", "constants", "interfaces", "models"];
const UTILITY_MARKERS: &[&str] = &["util", "utils", "helper", "helpers"];

pub fn is_index_file(record: &ChangeRecord) -> bool {
    INDEX_STEMS.contains(&record.stem().to_lowercase().as_str())
}

pub fn is_core_file(record: &ChangeRecord) -> bool {
    let stem = record.stem().to_lowercase();
    CORE_MARKERS.contains(&stem.as_str())
        || record
            .directory()
            .split('/')
            .any(|c| CORE_MARKERS.contains(&c.to_lowercase().as_str()))
}

pub fn is_utility_file(record: &ChangeRecord) -> bool {
    let stem = record.stem().to_lowercase();
    UTILITY_MARKERS.iter().any(|m| stem.contains(m))
        || record
            .directory()
            .split('/')
            .any(|c| UTILITY_MARKERS.contains(&c.to_lowercase().as_str()))
}

/// Whether `file` should be committed after `other`.
///
/// True for an explicit dependency, for the index/module file of the same
/// directory, for core/type files, and for utility files.
///
/// NOTE: the core and utility rules do not look at actual references, so
/// any non-utility file is treated as depending on any utility file. This
/// can over-order unrelated groups and needs review before being relied on
/// for anything beyond advisory ordering.
pub fn file_depends_on(file: &ChangeRecord, other: &ChangeRecord) -> bool {
    if file.path == other.path {
        return false;
    }

    if file.dependencies.contains(&other.path) {
        return true;
    }

    if is_index_file(other) && !is_index_file(file) && other.directory() == file.directory() {
        return true;
    }

    if is_core_file(other) && !is_core_file(file) {
        return true;
    }

    is_utility_file(other) && !is_utility_file(file)
}

/// Whether any file of `group` depends on any file of `other`.
pub fn group_depends_on(group: &CommitGroup, other: &CommitGroup) -> bool {
    group
        .files
        .iter()
        .any(|f| other.files.iter().any(|o| file_depends_on(f, o)))
}

/// Stable topological reorder: repeatedly take the earliest group whose
/// dependencies are all placed. Cycles are broken by taking the earliest
/// remaining group.
pub fn topological_reorder(groups: Vec<CommitGroup>) -> Vec<CommitGroup> {
    let n = groups.len();
    let deps: Vec<BTreeSet<usize>> = (0..n)
        .map(|i| {
            (0..n)
                .filter(|&j| j != i && group_depends_on(&groups[i], &groups[j]))
                .collect()
        })
        .collect();

    let mut placed = vec![false; n];
    let mut order = Vec::with_capacity(n);

    while order.len() < n {
        let next = (0..n)
            .find(|&i| !placed[i] && deps[i].iter().all(|&d| placed[d]))
            .or_else(|| (0..n).find(|&i| !placed[i]));

        match next {
            Some(i) => {
                placed[i] = true;
                order.push(i);
            }
            None => break,
        }
    }

    let mut slots: Vec<Option<CommitGroup>> = groups.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect()
}
