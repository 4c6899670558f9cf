//! Error types for archive migration.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (missing field, invalid value, unknown backend).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A table with the computed backup name already exists.
    #[error("Backup table {backup} already exists; refusing to overwrite a previous backup of {table}")]
    BackupConflict { table: String, backup: String },

    /// The backup statement itself failed.
    #[error("Backup of {table} failed: {message}")]
    Backup { table: String, message: String },

    /// A rename or projection statement failed part way through a table.
    #[error("Rename failed for table {table}: {message} (already applied: {applied})")]
    RenameExecution {
        table: String,
        message: String,
        applied: String,
    },

    /// Writing a generated definition file failed.
    #[error("Could not write {}: {source}", .path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Database connection or statement error outside of a migration step.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// A statement was rejected by a non-PostgreSQL session.
    #[error("Statement failed: {0}")]
    Execution(String),

    /// IO error (config files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Run was cancelled between tables (SIGINT, SIGTERM).
    #[error("Migration cancelled")]
    Cancelled,
}

impl MigrateError {
    /// Create a BackupConflict error.
    pub fn backup_conflict(table: impl Into<String>, backup: impl Into<String>) -> Self {
        MigrateError::BackupConflict {
            table: table.into(),
            backup: backup.into(),
        }
    }

    /// Create a Backup error.
    pub fn backup(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Backup {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a RenameExecution error. `applied` lists the renames that
    /// went through before the failure.
    pub fn rename(table: impl Into<String>, message: impl Into<String>, applied: &[String]) -> Self {
        let applied = if applied.is_empty() {
            "none".to_string()
        } else {
            applied.join(", ")
        };
        MigrateError::RenameExecution {
            table: table.into(),
            message: message.into(),
            applied,
        }
    }

    /// Create a FileWrite error.
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MigrateError::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Whether this error only affects the table it occurred on.
    ///
    /// Table-scoped errors are logged and the run continues with the next
    /// table; everything else aborts the run.
    pub fn is_table_scoped(&self) -> bool {
        matches!(
            self,
            MigrateError::BackupConflict { .. }
                | MigrateError::Backup { .. }
                | MigrateError::FileWrite { .. }
        )
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => 2,
            MigrateError::RenameExecution { .. } => 3,
            MigrateError::Database(_) | MigrateError::Execution(_) => 4,
            MigrateError::Cancelled => 130,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
