//! Per-table migration steps.
//!
//! - [`RenameStrategy`]: how the legacy columns get their new names
//! - [`BackupCoordinator`]: point-in-time copy taken before any rename
//! - [`DefinitionGenerator`]: snapshot definition text for a table
//! - [`TableStage`]: forward-only progress of one table through the run
//!
//! # Design Patterns
//!
//! - **Strategy**: `RenameStrategy` is a closed enum picked once per run from
//!   the backend capability table
//! - **Template Method**: each step only talks to the `Session` trait, so the
//!   same code runs against a live warehouse and the in-memory session

mod backup;
mod definition;
mod strategy;

pub use backup::{BackupCoordinator, BACKUP_SUFFIX};
pub use definition::DefinitionGenerator;
pub use strategy::RenameStrategy;

use std::fmt;

use serde::Serialize;

/// Where a table is in its migration.
///
/// Stages only move forward; optional stages may be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStage {
    Planned,
    BackedUp,
    Renamed,
    Defined,
    Done,
}

impl TableStage {
    /// Whether moving from `self` to `next` goes forward.
    pub fn can_advance_to(self, next: TableStage) -> bool {
        next > self
    }
}

impl fmt::Display for TableStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TableStage::Planned => "planned",
            TableStage::BackedUp => "backed_up",
            TableStage::Renamed => "renamed",
            TableStage::Defined => "defined",
            TableStage::Done => "done",
        };
        f.write_str(s)
    }
}
