//! Planning pipeline: load change records, group, resolve.

mod common;

use std::collections::HashMap;

use gitsplit::change::load_changes;
use gitsplit::{
    Category, CommitPlan, ConflictResolver, FeatureCache, GroupingEngine, GroupingOptions,
    GroupingStrategy, ResolutionStrategy,
};

use common::changes_fixture;

fn grouped(options: GroupingOptions, strategy: GroupingStrategy) -> (usize, CommitPlan) {
    let records = load_changes(&changes_fixture("webapp.json")).expect("fixture loads");
    let engine = GroupingEngine::new(options, strategy);
    let mut cache = FeatureCache::new();
    (records.len(), engine.group(&records, &mut cache))
}

fn assert_every_path_once(plan: &CommitPlan, expected: usize) {
    let mut owners: HashMap<&str, &str> = HashMap::new();
    for group in &plan.groups {
        for path in group.paths() {
            assert!(
                owners.insert(path, group.id.as_str()).is_none(),
                "{} appears in more than one group",
                path
            );
        }
    }
    assert_eq!(owners.len(), expected);
}

fn assert_dependencies_first(plan: &CommitPlan) {
    let position: HashMap<&str, usize> = plan
        .groups
        .iter()
        .enumerate()
        .flat_map(|(idx, g)| g.paths().map(move |p| (p, idx)))
        .collect();

    for (idx, group) in plan.groups.iter().enumerate() {
        for file in &group.files {
            for dep in &file.dependencies {
                if let Some(&dep_idx) = position.get(dep.as_str()) {
                    assert!(
                        dep_idx <= idx,
                        "{} in {} depends on {} committed later",
                        file.path,
                        group.id,
                        dep
                    );
                }
            }
        }
    }
}

#[test]
fn test_heuristic_grouping_covers_every_change() {
    let (count, plan) = grouped(GroupingOptions::default(), GroupingStrategy::Heuristic);
    assert_every_path_once(&plan, count);
    assert!(plan.validate().is_ok());
}

#[test]
fn test_tests_and_docs_are_kept_out_of_feature_groups() {
    let (_, plan) = grouped(GroupingOptions::default(), GroupingStrategy::Heuristic);

    for group in &plan.groups {
        let categories: Vec<Category> = group.files.iter().map(|f| f.category).collect();
        if categories.contains(&Category::Feature) {
            assert!(!categories.contains(&Category::Test), "{} mixes tests in", group.id);
            assert!(!categories.contains(&Category::Docs), "{} mixes docs in", group.id);
        }
    }
}

#[test]
fn test_max_files_per_commit_is_respected() {
    let options = GroupingOptions {
        max_files_per_commit: 2,
        ..GroupingOptions::default()
    };
    let (count, plan) = grouped(options, GroupingStrategy::Heuristic);

    assert_every_path_once(&plan, count);
    assert!(plan.groups.iter().all(|g| g.file_count() <= 2));
}

#[test]
fn test_embedding_grouping_covers_every_change() {
    let (count, plan) = grouped(GroupingOptions::default(), GroupingStrategy::token_embedding(0.6));
    assert_every_path_once(&plan, count);
}

#[test]
fn test_resolved_plans_commit_dependencies_first() {
    for strategy in [ResolutionStrategy::Aggressive, ResolutionStrategy::Balanced] {
        let (count, plan) = grouped(GroupingOptions::default(), GroupingStrategy::Heuristic);
        let outcome = ConflictResolver::new(strategy).resolve(plan);

        assert!(outcome.success, "{} left {:?}", strategy, outcome.remaining);
        assert_every_path_once(&outcome.plan, count);
        assert_dependencies_first(&outcome.plan);
    }
}

#[test]
fn test_conservative_resolution_keeps_files_and_orders_dependencies() {
    let (count, plan) = grouped(GroupingOptions::default(), GroupingStrategy::Heuristic);
    let outcome = ConflictResolver::new(ResolutionStrategy::Conservative).resolve(plan);

    assert!(outcome.success, "conservative left {:?}", outcome.remaining);
    assert_every_path_once(&outcome.plan, count);
    assert_dependencies_first(&outcome.plan);
}
