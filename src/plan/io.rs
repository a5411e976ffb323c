//! Reading and writing serialized commit plans.
//!
//! Plans round-trip through JSON so an external message generator can fill
//! in `message` between `gitsplit plan` and `gitsplit apply`.

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PlanError;

use super::{CommitGroup, CommitPlan};

/// On-disk shape: the plan plus derived fields for downstream readers.
#[derive(Serialize, Deserialize)]
struct PlanDocument {
    groups: Vec<CommitGroup>,
    #[serde(default)]
    warnings: Vec<String>,
    #[serde(default, skip_deserializing)]
    total_files: usize,
    #[serde(default, skip_deserializing)]
    estimated_duration_secs: u64,
}

/// Serialize a plan to pretty JSON, including derived totals.
pub fn plan_to_json(plan: &CommitPlan) -> Result<String, PlanError> {
    let document = PlanDocument {
        groups: plan.groups.clone(),
        warnings: plan.warnings.clone(),
        total_files: plan.total_files(),
        estimated_duration_secs: plan.estimated_duration().as_secs(),
    };
    serde_json::to_string_pretty(&document).map_err(PlanError::SerializeFailed)
}

pub fn plan_from_json(json: &str) -> Result<CommitPlan, PlanError> {
    let document: PlanDocument = serde_json::from_str(json).map_err(PlanError::ParseFailed)?;
    Ok(CommitPlan {
        groups: document.groups,
        warnings: document.warnings,
    })
}

pub fn read_plan(path: &Path) -> Result<CommitPlan, PlanError> {
    let content = std::fs::read_to_string(path).map_err(|source| PlanError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    plan_from_json(&content)
}

/// Write a plan atomically: temp file in the target directory, then rename.
pub fn write_plan(path: &Path, plan: &CommitPlan) -> Result<(), PlanError> {
    let json = plan_to_json(plan)?;
    let write_err = |source| PlanError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    temp.write_all(json.as_bytes()).map_err(write_err)?;
    temp.write_all(b"\n").map_err(write_err)?;
    temp.persist(path).map_err(|e| write_err(e.error))?;

    Ok(())
}
