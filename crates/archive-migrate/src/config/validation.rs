//! Configuration validation.

use super::{OutputConfig, ProjectConfig};
use crate::error::{MigrateError, Result};

/// Validate the project file. Archive groups are checked by the planner so
/// that errors surface in table order.
pub fn validate_project(config: &ProjectConfig) -> Result<()> {
    match config.snapshot_paths.first() {
        None => {
            return Err(MigrateError::Config(
                "snapshot-paths must list at least one directory".into(),
            ))
        }
        Some(path) if path.trim().is_empty() => {
            return Err(MigrateError::Config(
                "snapshot-paths entries must not be empty".into(),
            ))
        }
        Some(_) => {}
    }
    Ok(())
}

/// Validate a profile output.
pub fn validate_output(output: &OutputConfig) -> Result<()> {
    output.backend()?;
    output.default_database()?;
    if let Some(0) = output.port {
        return Err(MigrateError::Config("output port must not be 0".into()));
    }
    Ok(())
}
