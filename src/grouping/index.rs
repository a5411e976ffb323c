//! Lookup indices over a change-record set.

use std::collections::{BTreeSet, HashMap};

use crate::change::{Category, ChangeRecord};

/// Positional indices over a deduplicated record slice.
///
/// Every related-file query goes through these maps so relating `n` records
/// does not rescan the whole input for each one.
pub struct ChangeIndex<'a> {
    records: &'a [ChangeRecord],
    by_path: HashMap<&'a str, usize>,
    by_category: HashMap<Category, Vec<usize>>,
    by_feature: HashMap<&'a str, Vec<usize>>,
    by_directory: HashMap<&'a str, Vec<usize>>,
    /// path → records declaring a dependency on it
    dependents: HashMap<&'a str, Vec<usize>>,
}

impl<'a> ChangeIndex<'a> {
    pub fn build(records: &'a [ChangeRecord]) -> Self {
        let mut by_path = HashMap::new();
        let mut by_category: HashMap<Category, Vec<usize>> = HashMap::new();
        let mut by_feature: HashMap<&str, Vec<usize>> = HashMap::new();
        let mut by_directory: HashMap<&str, Vec<usize>> = HashMap::new();
        let mut dependents: HashMap<&str, Vec<usize>> = HashMap::new();

        for (idx, record) in records.iter().enumerate() {
            by_path.entry(record.path.as_str()).or_insert(idx);
            by_category.entry(record.category).or_default().push(idx);
            by_directory.entry(record.directory()).or_default().push(idx);

            for feature in &record.features {
                let entry = by_feature.entry(feature.as_str()).or_default();
                if entry.last() != Some(&idx) {
                    entry.push(idx);
                }
            }

            for dep in &record.dependencies {
                if dep != &record.path {
                    dependents.entry(dep.as_str()).or_default().push(idx);
                }
            }
        }

        Self {
            records,
            by_path,
            by_category,
            by_feature,
            by_directory,
            dependents,
        }
    }

    pub fn records(&self) -> &'a [ChangeRecord] {
        self.records
    }

    pub fn position(&self, path: &str) -> Option<usize> {
        self.by_path.get(path).copied()
    }

    pub fn in_category(&self, category: Category) -> &[usize] {
        self.by_category
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn with_feature(&self, feature: &str) -> &[usize] {
        self.by_feature
            .get(feature)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn in_directory(&self, directory: &str) -> &[usize] {
        self.by_directory
            .get(directory)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Records whose paths appear in `idx`'s dependency set.
    pub fn dependencies_of(&self, idx: usize) -> Vec<usize> {
        self.records[idx]
            .dependencies
            .iter()
            .filter_map(|dep| self.position(dep))
            .filter(|&pos| pos != idx)
            .collect()
    }

    /// Records that declare a dependency on `idx`.
    pub fn dependents_of(&self, idx: usize) -> &[usize] {
        self.dependents
            .get(self.records[idx].path.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Explicit dependencies, shared feature labels, same directory, and
    /// reverse dependencies of `idx`, excluding `idx` itself.
    pub fn related(&self, idx: usize) -> BTreeSet<usize> {
        let record = &self.records[idx];
        let mut related = BTreeSet::new();

        related.extend(self.dependencies_of(idx));
        for feature in &record.features {
            related.extend(self.with_feature(feature).iter().copied());
        }
        related.extend(self.in_directory(record.directory()).iter().copied());
        related.extend(self.dependents_of(idx).iter().copied());

        related.remove(&idx);
        related
    }
}
