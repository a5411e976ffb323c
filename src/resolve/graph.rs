//! Dependency graph between commit groups.
//!
//! Nodes are positions in the group slice the graph was built from. An edge
//! `a → b` means some file in `a` declares a dependency on a file owned by
//! `b`, so `b` must be committed first.

use std::collections::{BTreeSet, HashMap};

use crate::plan::CommitGroup;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unvisited,
    OnStack,
    Done,
}

#[derive(Debug, Clone)]
pub struct GroupGraph {
    ids: Vec<String>,
    /// node → nodes it depends on, ascending
    edges: Vec<Vec<usize>>,
}

impl GroupGraph {
    /// Build edges from explicit file dependencies.
    ///
    /// A path owned by several groups links to every owner.
    pub fn build(groups: &[CommitGroup]) -> Self {
        let mut owners: HashMap<&str, Vec<usize>> = HashMap::new();
        for (idx, group) in groups.iter().enumerate() {
            for path in group.paths() {
                owners.entry(path).or_default().push(idx);
            }
        }

        let edges = groups
            .iter()
            .enumerate()
            .map(|(idx, group)| {
                let targets: BTreeSet<usize> = group
                    .files
                    .iter()
                    .flat_map(|f| f.dependencies.iter())
                    .filter_map(|dep| owners.get(dep.as_str()))
                    .flatten()
                    .copied()
                    .filter(|&target| target != idx)
                    .collect();
                targets.into_iter().collect()
            })
            .collect();

        Self {
            ids: groups.iter().map(|g| g.id.clone()).collect(),
            edges,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn id(&self, node: usize) -> &str {
        &self.ids[node]
    }

    pub fn dependencies(&self, node: usize) -> &[usize] {
        &self.edges[node]
    }

    pub fn depends_on(&self, node: usize, other: usize) -> bool {
        self.edges[node].binary_search(&other).is_ok()
    }

    /// Cycles found by depth-first search, each in traversal order.
    ///
    /// Every strongly connected component containing a cycle yields at least
    /// one entry. Cycles with the same member set are reported once.
    pub fn cycles(&self) -> Vec<Vec<usize>> {
        let n = self.len();
        let mut state = vec![Visit::Unvisited; n];
        let mut seen: BTreeSet<Vec<usize>> = BTreeSet::new();
        let mut cycles = Vec::new();

        for start in 0..n {
            if state[start] != Visit::Unvisited {
                continue;
            }

            state[start] = Visit::OnStack;
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];

            while let Some(top) = stack.last_mut() {
                let node = top.0;
                let Some(&target) = self.edges[node].get(top.1) else {
                    state[node] = Visit::Done;
                    stack.pop();
                    continue;
                };
                top.1 += 1;

                match state[target] {
                    Visit::Unvisited => {
                        state[target] = Visit::OnStack;
                        stack.push((target, 0));
                    }
                    Visit::OnStack => {
                        if let Some(pos) = stack.iter().position(|(n, _)| *n == target) {
                            let cycle: Vec<usize> = stack[pos..].iter().map(|(n, _)| *n).collect();
                            let mut key = cycle.clone();
                            key.sort_unstable();
                            if seen.insert(key) {
                                cycles.push(cycle);
                            }
                        }
                    }
                    Visit::Done => {}
                }
            }
        }

        cycles
    }

    /// Strongly connected components with more than one node, members
    /// ascending, ordered by their first member.
    pub fn strongly_connected_components(&self) -> Vec<Vec<usize>> {
        let n = self.len();
        let mut next_index = 0;
        let mut index: Vec<Option<usize>> = vec![None; n];
        let mut lowlink = vec![0; n];
        let mut on_stack = vec![false; n];
        let mut scc_stack: Vec<usize> = Vec::new();
        let mut components = Vec::new();

        for root in 0..n {
            if index[root].is_some() {
                continue;
            }

            index[root] = Some(next_index);
            lowlink[root] = next_index;
            next_index += 1;
            scc_stack.push(root);
            on_stack[root] = true;
            let mut calls: Vec<(usize, usize)> = vec![(root, 0)];

            while let Some(top) = calls.last_mut() {
                let node = top.0;
                if let Some(&target) = self.edges[node].get(top.1) {
                    top.1 += 1;
                    match index[target] {
                        None => {
                            index[target] = Some(next_index);
                            lowlink[target] = next_index;
                            next_index += 1;
                            scc_stack.push(target);
                            on_stack[target] = true;
                            calls.push((target, 0));
                        }
                        Some(target_index) if on_stack[target] => {
                            lowlink[node] = lowlink[node].min(target_index);
                        }
                        Some(_) => {}
                    }
                    continue;
                }

                calls.pop();
                if let Some(&(parent, _)) = calls.last() {
                    lowlink[parent] = lowlink[parent].min(lowlink[node]);
                }

                if Some(lowlink[node]) == index[node] {
                    let mut component = Vec::new();
                    while let Some(member) = scc_stack.pop() {
                        on_stack[member] = false;
                        component.push(member);
                        if member == node {
                            break;
                        }
                    }
                    if component.len() > 1 {
                        component.sort_unstable();
                        components.push(component);
                    }
                }
            }
        }

        components.sort_by_key(|c| c[0]);
        components
    }

    /// Stable topological order: the earliest node whose dependencies are
    /// all placed goes next; if none is ready, the earliest remaining node.
    pub fn topological_order(&self) -> Vec<usize> {
        let n = self.len();
        let mut placed = vec![false; n];
        let mut order = Vec::with_capacity(n);

        while order.len() < n {
            let ready = (0..n).find(|&i| !placed[i] && self.edges[i].iter().all(|&d| placed[d]));
            let Some(next) = ready.or_else(|| (0..n).find(|&i| !placed[i])) else {
                break;
            };
            placed[next] = true;
            order.push(next);
        }

        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{Category, ChangeKind, ChangeRecord};
    use crate::plan::CommitKind;

    fn group(id: &str, path: &str, deps: &[&str]) -> CommitGroup {
        let file = ChangeRecord::new(path, ChangeKind::Modified, Category::Feature)
            .with_dependencies(deps.iter().copied());
        CommitGroup::new(id, CommitKind::Feat, None, id, vec![file])
    }

    fn ids(graph: &GroupGraph, nodes: &[usize]) -> Vec<String> {
        nodes.iter().map(|&n| graph.id(n).to_string()).collect()
    }

    #[test]
    fn test_edges_follow_file_dependencies() {
        let groups = vec![
            group("g1", "a.ts", &["b.ts", "missing.ts"]),
            group("g2", "b.ts", &[]),
        ];
        let graph = GroupGraph::build(&groups);
        assert!(graph.depends_on(0, 1));
        assert!(!graph.depends_on(1, 0));
        assert_eq!(graph.dependencies(0), &[1]);
    }

    #[test]
    fn test_three_cycle_is_reported_in_traversal_order() {
        let groups = vec![
            group("g1", "a.ts", &["b.ts"]),
            group("g2", "b.ts", &["c.ts"]),
            group("g3", "c.ts", &["a.ts"]),
        ];
        let graph = GroupGraph::build(&groups);
        let cycles = graph.cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(ids(&graph, &cycles[0]), vec!["g1", "g2", "g3"]);
    }

    #[test]
    fn test_acyclic_graph_has_no_cycles_or_components() {
        let groups = vec![
            group("g1", "a.ts", &["b.ts", "c.ts"]),
            group("g2", "b.ts", &["c.ts"]),
            group("g3", "c.ts", &[]),
        ];
        let graph = GroupGraph::build(&groups);
        assert!(graph.cycles().is_empty());
        assert!(graph.strongly_connected_components().is_empty());
        assert_eq!(graph.topological_order(), vec![2, 1, 0]);
    }

    #[test]
    fn test_components_merge_overlapping_cycles() {
        let groups = vec![
            group("g1", "a.ts", &["b.ts"]),
            group("g2", "b.ts", &["a.ts", "c.ts"]),
            group("g3", "c.ts", &["b.ts"]),
            group("g4", "d.ts", &["a.ts"]),
        ];
        let graph = GroupGraph::build(&groups);
        assert_eq!(graph.strongly_connected_components(), vec![vec![0, 1, 2]]);
        assert_eq!(graph.cycles().len(), 2);
    }

    #[test]
    fn test_topological_order_is_stable_without_edges() {
        let groups = vec![group("g1", "a", &[]), group("g2", "b", &[]), group("g3", "c", &[])];
        let graph = GroupGraph::build(&groups);
        assert_eq!(graph.topological_order(), vec![0, 1, 2]);
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        let groups: Vec<CommitGroup> = (0..5_000)
            .map(|i| {
                let dep = format!("f{}", i + 1);
                let deps: Vec<&str> = if i + 1 < 5_000 { vec![dep.as_str()] } else { vec![] };
                group(&format!("g{}", i), &format!("f{}", i), &deps)
            })
            .collect();
        let graph = GroupGraph::build(&groups);
        assert!(graph.cycles().is_empty());
        assert!(graph.strongly_connected_components().is_empty());
    }
}
