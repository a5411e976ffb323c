//! Change records: analyzed file changes consumed by planning.

pub mod load;
pub mod record;

pub use load::{load_changes, parse_changes};
pub use record::{Category, ChangeKind, ChangeRecord};
