//! Feature naming for related-file sets.
//!
//! Candidates are tried in priority order: shared non-relative import,
//! most frequent label, meaningful common directory, an identifier from the
//! added lines, then the primary file's own name. Generic names never win.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex_lite::Regex;

use crate::change::ChangeRecord;

/// Name used when nothing meaningful can be derived.
pub const FALLBACK_FEATURE: &str = "misc";

/// Names too common to describe a feature.
pub const GENERIC_NAMES: &[&str] = &[
    "src", "lib", "libs", "utils", "util", "index", "test", "tests", "spec", "specs",
    "__tests__", "main", "app", "common", "shared", "helpers", "helper", "components",
    "misc", "mod", "__init__", "pkg", "internal", "scripts", "docs", "config", "std",
];

static IDENTIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:fn|function|class|struct|interface|enum|trait|def|type)\s+([A-Za-z_][A-Za-z0-9_]*)",
    )
    .expect("identifier pattern is valid")
});

/// Whether `name` is too generic to use as a feature name.
pub fn is_generic(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.len() < 2
        || lower.chars().all(|c| c.is_ascii_digit())
        || GENERIC_NAMES.contains(&lower.as_str())
}

/// Memoized feature names, scoped to a single planning run.
///
/// Keyed by the sorted member paths of a related set.
#[derive(Debug, Default)]
pub struct FeatureCache {
    names: HashMap<Vec<String>, String>,
    hits: usize,
}

impl FeatureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feature name for `members` (primary file first), computing it once.
    pub fn name_for(&mut self, members: &[&ChangeRecord]) -> String {
        let mut key: Vec<String> = members.iter().map(|r| r.path.clone()).collect();
        key.sort();

        if let Some(name) = self.names.get(&key) {
            self.hits += 1;
            return name.clone();
        }

        let name = detect_feature_name(members);
        self.names.insert(key, name.clone());
        name
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }
}

/// Pick a feature name for a related set. `members[0]` is the primary file.
pub fn detect_feature_name(members: &[&ChangeRecord]) -> String {
    let Some(primary) = members.first() else {
        return FALLBACK_FEATURE.to_string();
    };

    shared_import(members)
        .or_else(|| frequent_label(members))
        .or_else(|| common_directory_name(members))
        .or_else(|| extracted_identifier(members))
        .unwrap_or_else(|| base_name(primary))
}

/// A non-relative import target used by at least two members.
fn shared_import(members: &[&ChangeRecord]) -> Option<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();

    for record in members {
        let mut seen: Vec<String> = Vec::new();
        for spec in &record.imports {
            let Some(target) = import_target(spec) else {
                continue;
            };
            if seen.contains(&target) {
                continue;
            }
            match counts.iter_mut().find(|(t, _)| *t == target) {
                Some((_, count)) => *count += 1,
                None => counts.push((target.clone(), 1)),
            }
            seen.push(target);
        }
    }

    most_frequent(counts, 2)
}

/// The most frequent non-generic feature label.
fn frequent_label(members: &[&ChangeRecord]) -> Option<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();

    for record in members {
        for label in &record.features {
            let label = label.trim();
            if label.is_empty() || is_generic(label) {
                continue;
            }
            match counts.iter_mut().find(|(l, _)| l == label) {
                Some((_, count)) => *count += 1,
                None => counts.push((label.to_string(), 1)),
            }
        }
    }

    most_frequent(counts, 1)
}

/// Deepest non-generic component of the members' common directory.
fn common_directory_name(members: &[&ChangeRecord]) -> Option<String> {
    let mut common: Vec<&str> = members
        .first()?
        .directory()
        .split('/')
        .filter(|c| !c.is_empty())
        .collect();

    for record in &members[1..] {
        let components: Vec<&str> = record
            .directory()
            .split('/')
            .filter(|c| !c.is_empty())
            .collect();
        let shared = common
            .iter()
            .zip(components.iter())
            .take_while(|(a, b)| a == b)
            .count();
        common.truncate(shared);
    }

    common
        .iter()
        .rev()
        .find(|c| !is_generic(c))
        .map(|c| c.to_lowercase())
}

/// First non-generic function/class/type name declared in added lines.
fn extracted_identifier(members: &[&ChangeRecord]) -> Option<String> {
    members
        .iter()
        .flat_map(|r| r.added_lines.iter())
        .flat_map(|line| IDENTIFIER_RE.captures_iter(line))
        .filter_map(|caps| caps.get(1).map(|m| to_kebab_case(m.as_str())))
        .find(|name| !name.is_empty() && !is_generic(name))
}

/// The primary file's stem, or its nearest non-generic path component.
fn base_name(primary: &ChangeRecord) -> String {
    let stem = primary.stem();
    if !is_generic(stem) {
        return stem.to_lowercase();
    }

    primary
        .directory()
        .split('/')
        .rev()
        .find(|c| !c.is_empty() && !is_generic(c))
        .map(str::to_lowercase)
        .unwrap_or_else(|| FALLBACK_FEATURE.to_string())
}

/// Package name of a non-relative import specifier.
///
/// `@scope/pkg/sub` → `pkg`, `lodash/fp` → `lodash`, `serde::Deserialize`
/// → `serde`. Relative and crate-local imports yield `None`.
pub fn import_target(spec: &str) -> Option<String> {
    let spec = spec.trim().trim_matches(|c| c == '"' || c == '\'' || c == ';');
    if spec.is_empty() || spec.starts_with('.') || spec.starts_with('/') {
        return None;
    }

    let mut parts = spec.split(['/', ':']).filter(|p| !p.is_empty());
    let first = parts.next()?;
    if matches!(first, "crate" | "super" | "self") {
        return None;
    }

    let name = if first.starts_with('@') {
        parts.next()?
    } else {
        first
    };

    let name = name.to_lowercase();
    if is_generic(&name) { None } else { Some(name) }
}

/// `LoginForm` / `login_form` → `login-form`.
pub fn to_kebab_case(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len() + 4);
    let mut prev_lower = false;

    for ch in ident.chars() {
        if ch == '_' || ch == '-' {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            prev_lower = false;
        } else if ch.is_ascii_uppercase() {
            if prev_lower && !out.ends_with('-') {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        }
    }

    out.trim_matches('-').to_string()
}

fn most_frequent(counts: Vec<(String, usize)>, min_count: usize) -> Option<String> {
    let mut best: Option<(String, usize)> = None;
    for (name, count) in counts {
        if count < min_count {
            continue;
        }
        match &best {
            Some((_, best_count)) if *best_count >= count => {}
            _ => best = Some((name, count)),
        }
    }
    best.map(|(name, _)| name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{Category, ChangeKind};

    fn rec(path: &str) -> ChangeRecord {
        ChangeRecord::new(path, ChangeKind::Modified, Category::Feature)
    }

    #[test]
    fn test_generic_names() {
        assert!(is_generic("src"));
        assert!(is_generic("Utils"));
        assert!(is_generic("index"));
        assert!(is_generic("42"));
        assert!(is_generic("x"));
        assert!(!is_generic("auth"));
    }

    #[test]
    fn test_shared_import_wins_over_labels() {
        let a = rec("src/a.ts").with_imports(["@tanstack/query", "./local"]).with_features(["cache"]);
        let b = rec("src/b.ts").with_imports(["@tanstack/query/core"]);
        assert_eq!(detect_feature_name(&[&a, &b]), "query");
    }

    #[test]
    fn test_single_import_is_not_shared() {
        let a = rec("src/a.ts").with_imports(["react"]).with_features(["dashboard"]);
        let b = rec("src/b.ts");
        assert_eq!(detect_feature_name(&[&a, &b]), "dashboard");
    }

    #[test]
    fn test_most_frequent_label_skips_generic() {
        let a = rec("x/a.rs").with_features(["utils", "billing"]);
        let b = rec("x/b.rs").with_features(["billing", "invoice"]);
        let c = rec("x/c.rs").with_features(["invoice", "billing", "utils", "utils"]);
        assert_eq!(detect_feature_name(&[&a, &b, &c]), "billing");
    }

    #[test]
    fn test_label_tie_goes_to_first_seen() {
        let a = rec("a.rs").with_features(["payments"]);
        let b = rec("b.rs").with_features(["refunds"]);
        assert_eq!(detect_feature_name(&[&a, &b]), "payments");
    }

    #[test]
    fn test_common_directory_skips_generic_components() {
        let a = rec("src/auth/utils/hash.ts");
        let b = rec("src/auth/utils/salt.ts");
        assert_eq!(detect_feature_name(&[&a, &b]), "auth");
    }

    #[test]
    fn test_identifier_extraction_from_added_lines() {
        let a = rec("src/a.ts").with_added_lines(["export class SessionStore {", "  get() {}"]);
        let b = rec("lib/b.ts");
        assert_eq!(detect_feature_name(&[&a, &b]), "session-store");
    }

    #[test]
    fn test_fallback_to_primary_base_name() {
        let a = rec("login.ts");
        assert_eq!(detect_feature_name(&[&a]), "login");

        let index = rec("src/index.ts");
        assert_eq!(detect_feature_name(&[&index]), FALLBACK_FEATURE);
    }

    #[test]
    fn test_import_target_normalization() {
        assert_eq!(import_target("lodash/fp"), Some("lodash".to_string()));
        assert_eq!(import_target("serde::Deserialize"), Some("serde".to_string()));
        assert_eq!(import_target("'@org/auth-kit'"), Some("auth-kit".to_string()));
        assert_eq!(import_target("./sibling"), None);
        assert_eq!(import_target("crate::plan"), None);
        assert_eq!(import_target("std::collections"), None);
    }

    #[test]
    fn test_to_kebab_case() {
        assert_eq!(to_kebab_case("LoginForm"), "login-form");
        assert_eq!(to_kebab_case("parse_config"), "parse-config");
        assert_eq!(to_kebab_case("HTTPClient"), "httpclient");
        assert_eq!(to_kebab_case("_private"), "private");
    }

    #[test]
    fn test_feature_cache_memoizes_by_member_set() {
        let a = rec("src/auth/a.ts");
        let b = rec("src/auth/b.ts");
        let mut cache = FeatureCache::new();

        assert_eq!(cache.name_for(&[&a, &b]), "auth");
        assert_eq!(cache.name_for(&[&b, &a]), "auth");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.hits(), 1);
    }
}
