//! Structural defects found in a commit plan.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConflictKind {
    /// Groups depend on each other in a loop.
    CircularDependency,
    /// A path is owned by more than one group.
    FileOwnership,
    /// A group mixes changes that rarely belong in one commit.
    LogicalInconsistency,
    /// A group is ordered before a group it depends on.
    DependencyOrdering,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConflictKind::CircularDependency => "circular dependency",
            ConflictKind::FileOwnership => "file ownership",
            ConflictKind::LogicalInconsistency => "logical inconsistency",
            ConflictKind::DependencyOrdering => "dependency ordering",
        };
        f.write_str(name)
    }
}

/// How bad a conflict or failure is, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// Suggested fix for a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResolutionAction {
    MergeGroups,
    ReassignFile,
    ReorderGroups,
    /// Reported only; nothing is changed.
    Advise,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub severity: Severity,
    /// Involved group ids. Cycle order for cycles, `[dependent, dependency]`
    /// for ordering conflicts.
    pub groups: Vec<String>,
    /// Contested path for ownership conflicts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub description: String,
    pub suggested: ResolutionAction,
}

impl Conflict {
    pub fn circular(groups: Vec<String>) -> Self {
        let mut chain = groups.join(" -> ");
        if let Some(first) = groups.first() {
            chain.push_str(" -> ");
            chain.push_str(first);
        }
        Self {
            kind: ConflictKind::CircularDependency,
            severity: Severity::High,
            description: format!("Circular dependency: {}", chain),
            groups,
            path: None,
            suggested: ResolutionAction::MergeGroups,
        }
    }

    pub fn ownership(path: &str, owners: Vec<String>) -> Self {
        Self {
            kind: ConflictKind::FileOwnership,
            severity: Severity::High,
            description: format!("'{}' is claimed by {}", path, owners.join(", ")),
            groups: owners,
            path: Some(path.to_string()),
            suggested: ResolutionAction::ReassignFile,
        }
    }

    pub fn inconsistency(group: &str, severity: Severity, reason: &str) -> Self {
        Self {
            kind: ConflictKind::LogicalInconsistency,
            severity,
            description: format!("Group '{}' {}", group, reason),
            groups: vec![group.to_string()],
            path: None,
            suggested: ResolutionAction::Advise,
        }
    }

    pub fn ordering(dependent: &str, dependency: &str) -> Self {
        Self {
            kind: ConflictKind::DependencyOrdering,
            severity: Severity::Medium,
            description: format!(
                "Group '{}' is committed before '{}', which it depends on",
                dependent, dependency
            ),
            groups: vec![dependent.to_string(), dependency.to_string()],
            path: None,
            suggested: ResolutionAction::ReorderGroups,
        }
    }

    /// Whether the conflict must be gone before the plan can run.
    pub fn is_blocking(&self) -> bool {
        self.kind != ConflictKind::LogicalInconsistency
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_description_closes_the_loop() {
        let conflict = Conflict::circular(vec!["g1".into(), "g2".into(), "g3".into()]);
        assert_eq!(conflict.description, "Circular dependency: g1 -> g2 -> g3 -> g1");
        assert!(conflict.is_blocking());
    }

    #[test]
    fn test_inconsistency_is_advisory() {
        let conflict = Conflict::inconsistency("g4", Severity::Low, "only touches tests and docs");
        assert!(!conflict.is_blocking());
        assert_eq!(conflict.to_string(), "[low] Group 'g4' only touches tests and docs");
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::High < Severity::Critical);
    }
}
