//! Backup copies of archive tables.

use tracing::info;

use crate::core::capability::Capability;
use crate::core::relation::TableReference;
use crate::core::traits::Session;
use crate::error::{MigrateError, Result};

/// Appended to a table's identifier to name its backup.
pub const BACKUP_SUFFIX: &str = "_migration_backup";

/// Copies a table next to itself before it is migrated.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackupCoordinator {
    max_identifier_bytes: Option<usize>,
}

impl BackupCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse backup names longer than the backend keeps.
    pub fn for_capability(capability: Capability) -> Self {
        Self {
            max_identifier_bytes: Some(capability.max_identifier_bytes),
        }
    }

    /// `<identifier>_migration_backup` in the same database and schema.
    pub fn backup_name(&self, table: &TableReference) -> TableReference {
        table.with_identifier(format!("{}{}", table.identifier(), BACKUP_SUFFIX))
    }

    /// Copy `table` to its backup name.
    ///
    /// # Errors
    ///
    /// [`MigrateError::BackupConflict`] when the backup name is taken (no
    /// statement is issued). [`MigrateError::Backup`] when the name is too
    /// long for the backend, or the existence check or the copy fails.
    pub async fn backup<S>(&self, session: &mut S, table: &TableReference) -> Result<TableReference>
    where
        S: Session + ?Sized,
    {
        let backup = self.backup_name(table);

        if let Some(max) = self.max_identifier_bytes {
            let len = backup.identifier().len();
            if len > max {
                return Err(MigrateError::backup(
                    table.full_name(),
                    format!(
                        "backup name '{}' is {} bytes, over the {}-byte identifier limit",
                        backup.identifier(),
                        len,
                        max
                    ),
                ));
            }
        }

        let exists = session
            .table_exists(&backup)
            .await
            .map_err(|e| MigrateError::backup(table.full_name(), e.to_string()))?;
        if exists {
            return Err(MigrateError::backup_conflict(
                table.full_name(),
                backup.full_name(),
            ));
        }

        session
            .copy_table(table, &backup)
            .await
            .map_err(|e| MigrateError::backup(table.full_name(), e.to_string()))?;

        info!("Backed up {} to {}", table.full_name(), backup.full_name());
        Ok(backup)
    }
}
