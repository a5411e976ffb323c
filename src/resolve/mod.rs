//! Conflict resolver: repairs structural defects in a grouped plan.
//!
//! Detection runs every pass each time. Resolutions are applied in at most
//! two rounds; anything still blocking after that is reported back with
//! `success = false`.

pub mod conflict;
pub mod detect;
pub mod graph;

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::plan::{CommitGroup, CommitPlan};

pub use conflict::{Conflict, ConflictKind, ResolutionAction, Severity};
use graph::GroupGraph;

const MAX_ROUNDS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionStrategy {
    /// Merge cycles, reassign contested files, swap misordered pairs.
    #[default]
    Conservative,
    /// Merge every strongly connected component, reassign contested files,
    /// then reorder the whole plan topologically.
    Aggressive,
    /// Conservative first, one aggressive round if blocking conflicts remain.
    Balanced,
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionStrategy::Conservative => write!(f, "conservative"),
            ResolutionStrategy::Aggressive => write!(f, "aggressive"),
            ResolutionStrategy::Balanced => write!(f, "balanced"),
        }
    }
}

impl FromStr for ResolutionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "conservative" => Ok(Self::Conservative),
            "aggressive" => Ok(Self::Aggressive),
            "balanced" => Ok(Self::Balanced),
            _ => Err(format!(
                "Unknown resolution strategy '{}' (expected conservative, aggressive or balanced)",
                s
            )),
        }
    }
}

/// Result of a resolution run.
#[derive(Debug, Clone)]
pub struct ResolutionOutcome {
    pub plan: CommitPlan,
    /// No blocking conflicts remain.
    pub success: bool,
    /// Conflicts found before any change, advisory ones included.
    pub conflicts_found: usize,
    /// Blocking conflicts that are no longer present.
    pub resolved: usize,
    /// Blocking conflicts still present.
    pub remaining: Vec<Conflict>,
    /// Advisory conflicts and notes on what was changed.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ConflictResolver {
    strategy: ResolutionStrategy,
}

impl ConflictResolver {
    pub fn new(strategy: ResolutionStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> ResolutionStrategy {
        self.strategy
    }

    /// Detect and resolve conflicts in `plan`.
    pub fn resolve(&self, plan: CommitPlan) -> ResolutionOutcome {
        let CommitPlan {
            mut groups,
            warnings: plan_warnings,
        } = plan;
        let mut warnings = Vec::new();

        let initial = detect::detect(&groups);
        let conflicts_found = initial.len();
        let initially_blocking = initial.iter().filter(|c| c.is_blocking()).count();

        for conflict in initial.iter().filter(|c| !c.is_blocking()) {
            warn!("{}", conflict);
            warnings.push(conflict.description.clone());
        }

        let mut current = initial;
        let mut round = 0;
        while round < MAX_ROUNDS && current.iter().any(Conflict::is_blocking) {
            let aggressive = match self.strategy {
                ResolutionStrategy::Conservative => false,
                ResolutionStrategy::Aggressive => true,
                ResolutionStrategy::Balanced => round > 0,
            };
            debug!(
                "Resolution round {} ({}), {} conflicts",
                round + 1,
                if aggressive { "aggressive" } else { "conservative" },
                current.len()
            );

            if aggressive {
                apply_aggressive(&mut groups, &mut warnings);
            } else {
                apply_conservative(&mut groups, &current, &mut warnings);
            }
            drop_empty_groups(&mut groups, &mut warnings);

            current = detect::detect(&groups);
            round += 1;
        }

        let remaining: Vec<Conflict> = current.into_iter().filter(Conflict::is_blocking).collect();
        let success = remaining.is_empty();
        let resolved = initially_blocking.saturating_sub(remaining.len());

        if success {
            if resolved > 0 {
                info!("Resolved {} plan conflicts", resolved);
            }
        } else {
            for conflict in &remaining {
                warn!("Unresolved: {}", conflict);
            }
        }

        let mut plan = CommitPlan::new(groups);
        for warning in plan_warnings.into_iter().chain(warnings.iter().cloned()) {
            plan.add_warning(warning);
        }
        plan.refresh_advisories();

        ResolutionOutcome {
            plan,
            success,
            conflicts_found,
            resolved,
            remaining,
            warnings,
        }
    }
}

fn position(groups: &[CommitGroup], id: &str) -> Option<usize> {
    groups.iter().position(|g| g.id == id)
}

/// Move the files of `others` into `target`, skipping paths it already owns.
/// Returns how many groups were merged.
fn merge_into(groups: &mut Vec<CommitGroup>, target: &str, others: &[String]) -> usize {
    let mut moved = Vec::new();
    let mut merged = 0;
    for id in others {
        if id == target {
            continue;
        }
        if let Some(pos) = position(groups, id) {
            moved.extend(groups.remove(pos).files);
            merged += 1;
        }
    }

    if let Some(pos) = position(groups, target) {
        let group = &mut groups[pos];
        for file in moved {
            if !group.contains(&file.path) {
                group.files.push(file);
            }
        }
    }
    merged
}

/// Give `path` to the largest of its current owners (ties: earliest in
/// plan order) and remove it from the rest.
fn reassign(groups: &mut [CommitGroup], path: &str) -> Option<String> {
    let owners: Vec<usize> = groups
        .iter()
        .enumerate()
        .filter(|(_, g)| g.contains(path))
        .map(|(idx, _)| idx)
        .collect();
    if owners.len() < 2 {
        return None;
    }

    let mut winner = owners[0];
    for &idx in &owners[1..] {
        if groups[idx].file_count() > groups[winner].file_count() {
            winner = idx;
        }
    }

    for &idx in &owners {
        if idx != winner {
            groups[idx].files.retain(|f| f.path != path);
        }
    }
    Some(groups[winner].id.clone())
}

fn apply_conservative(groups: &mut Vec<CommitGroup>, conflicts: &[Conflict], warnings: &mut Vec<String>) {
    for conflict in conflicts {
        match conflict.kind {
            ConflictKind::CircularDependency => {
                let Some(target) = conflict
                    .groups
                    .iter()
                    .find(|id| groups.iter().any(|g| &g.id == *id))
                    .cloned()
                else {
                    continue;
                };
                let merged = merge_into(groups, &target, &conflict.groups);
                if merged > 0 {
                    debug!("Merged {} groups into '{}' to break a cycle", merged, target);
                    warnings.push(format!("Merged {} into '{}'", conflict.groups.join(", "), target));
                }
            }
            ConflictKind::FileOwnership => {
                if let Some(path) = &conflict.path {
                    if let Some(owner) = reassign(groups, path) {
                        debug!("Assigned '{}' to '{}'", path, owner);
                    }
                }
            }
            ConflictKind::LogicalInconsistency => {}
            ConflictKind::DependencyOrdering => {
                let [dependent, dependency] = conflict.groups.as_slice() else {
                    continue;
                };
                let (Some(i), Some(j)) = (position(groups, dependent), position(groups, dependency))
                else {
                    continue;
                };
                let graph = GroupGraph::build(groups);
                if i < j && graph.depends_on(i, j) {
                    groups.swap(i, j);
                    debug!("Swapped '{}' and '{}'", dependent, dependency);
                }
            }
        }
    }

    // Pairwise swaps can leave a longer chain misordered.
    let graph = GroupGraph::build(groups);
    let misordered = (0..graph.len()).any(|node| graph.dependencies(node).iter().any(|&dep| dep > node));
    if misordered && graph.cycles().is_empty() {
        debug!("Swaps left groups out of order; sorting topologically");
        warnings.push("Reordered groups so dependencies commit first".to_string());
        reorder_topologically(groups);
    }
}

fn apply_aggressive(groups: &mut Vec<CommitGroup>, warnings: &mut Vec<String>) {
    let graph = GroupGraph::build(groups);
    let components: Vec<Vec<String>> = graph
        .strongly_connected_components()
        .into_iter()
        .map(|c| c.into_iter().map(|n| graph.id(n).to_string()).collect())
        .collect();

    for component in components {
        let target = component[0].clone();
        if merge_into(groups, &target, &component) > 0 {
            warnings.push(format!("Merged {} into '{}'", component.join(", "), target));
        }
    }

    let mut contested = Vec::new();
    let mut seen = HashSet::new();
    for group in groups.iter() {
        for path in group.paths() {
            if !seen.insert(path.to_string()) && !contested.iter().any(|p| p == path) {
                contested.push(path.to_string());
            }
        }
    }
    for path in contested {
        reassign(groups, &path);
    }

    drop_empty_groups(groups, warnings);
    reorder_topologically(groups);
}

fn reorder_topologically(groups: &mut Vec<CommitGroup>) {
    let order = GroupGraph::build(groups).topological_order();
    let mut slots: Vec<Option<CommitGroup>> = groups.drain(..).map(Some).collect();
    groups.extend(order.into_iter().filter_map(|idx| slots[idx].take()));
}

fn drop_empty_groups(groups: &mut Vec<CommitGroup>, warnings: &mut Vec<String>) {
    let empty: BTreeSet<String> = groups
        .iter()
        .filter(|g| g.is_empty())
        .map(|g| g.id.clone())
        .collect();
    if empty.is_empty() {
        return;
    }

    groups.retain(|g| !g.is_empty());
    for id in empty {
        debug!("Dropped empty group '{}'", id);
        warnings.push(format!("Dropped group '{}' (no files left)", id));
    }
}
