//! Loading change records produced by the external analyzer.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::error::ChangeError;

use super::record::ChangeRecord;

/// Accepted document shapes: a bare array or `{"changes": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ChangeDocument {
    List(Vec<ChangeRecord>),
    Wrapped { changes: Vec<ChangeRecord> },
}

/// Parse change records from a JSON string.
pub fn parse_changes(json: &str) -> Result<Vec<ChangeRecord>, ChangeError> {
    let document: ChangeDocument = serde_json::from_str(json).map_err(ChangeError::ParseFailed)?;
    let records = match document {
        ChangeDocument::List(records) => records,
        ChangeDocument::Wrapped { changes } => changes,
    };

    if records.is_empty() {
        return Err(ChangeError::Empty);
    }

    Ok(records)
}

/// Load change records from a file, or from stdin when `path` is `-`.
pub fn load_changes(path: &Path) -> Result<Vec<ChangeRecord>, ChangeError> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|source| ChangeError::ReadFailed {
                path: path.to_path_buf(),
                source,
            })?;
        buf
    } else {
        std::fs::read_to_string(path).map_err(|source| ChangeError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?
    };

    parse_changes(&content)
}
