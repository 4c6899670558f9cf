//! Per-run report: what was backed up, renamed and written.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::capability::Backend;
use crate::core::relation::TableReference;
use crate::error::Result;
use crate::pipeline::{RenameStrategy, TableStage};
use crate::plan::MigrationSpec;

/// Final state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    /// Finished, but a table-scoped step failed on at least one table.
    CompletedWithErrors,
    Failed,
    Cancelled,
}

/// Outcome for one table.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationResult {
    /// Target table, unquoted.
    pub table: String,
    pub strategy: RenameStrategy,
    pub stage: TableStage,
    /// Present only if a backup was made.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<TableReference>,
    /// Present only if a definition file was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl MigrationResult {
    pub fn new(spec: &MigrationSpec, strategy: RenameStrategy) -> Self {
        Self {
            table: spec.target.full_name(),
            strategy,
            stage: TableStage::Planned,
            backup: None,
            definition: None,
            errors: Vec::new(),
        }
    }

    /// Move to `next` if it is ahead of the current stage.
    pub fn advance(&mut self, next: TableStage) {
        if self.stage.can_advance_to(next) {
            debug!("{}: {} -> {}", self.table, self.stage, next);
            self.stage = next;
        } else {
            warn!(
                "{}: ignoring backwards transition {} -> {}",
                self.table, self.stage, next
            );
        }
    }
}

/// Everything one run did, in table order.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub run_id: String,
    pub backend: Backend,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub results: Vec<MigrationResult>,
}

impl MigrationReport {
    pub fn new(backend: Backend) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            backend,
            status: RunStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            results: Vec::new(),
        }
    }

    pub fn push(&mut self, result: MigrationResult) {
        self.results.push(result);
    }

    /// Stamp the end time and final status.
    pub fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
    }

    pub fn backups(&self) -> impl Iterator<Item = &TableReference> {
        self.results.iter().filter_map(|r| r.backup.as_ref())
    }

    /// `(target table, definition path)` for every file written.
    pub fn definitions(&self) -> impl Iterator<Item = (&str, &PathBuf)> {
        self.results
            .iter()
            .filter_map(|r| r.definition.as_ref().map(|p| (r.table.as_str(), p)))
    }

    pub fn has_errors(&self) -> bool {
        self.results.iter().any(|r| !r.errors.is_empty())
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Log the backups to drop and the files written.
    pub fn log_summary(&self) {
        let duration = self
            .completed_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
            .unwrap_or_default();
        info!(
            "Migration {:?}: {} tables in {:.1}s (run {})",
            self.status,
            self.results.len(),
            duration,
            self.run_id
        );

        let backups: Vec<String> = self.backups().map(|b| b.full_name()).collect();
        if !backups.is_empty() {
            info!(
                "Backup tables you may wish to drop:\n\t{}",
                backups.join("\n\t")
            );
        }

        let files: Vec<String> = self
            .definitions()
            .map(|(table, path)| format!("{} -> {}", table, path.display()))
            .collect();
        if !files.is_empty() {
            info!(
                "Snapshot files written for the following tables, you should remove their archive entries from dbt_project.yml:\n\t{}",
                files.join("\n\t")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UniqueKey;
    use crate::core::mapping::RenameMapping;

    fn spec() -> MigrationSpec {
        MigrationSpec {
            source: TableReference::new("db", "raw", "orders"),
            target: TableReference::new("db", "archived", "orders"),
            unique_key: UniqueKey::Single("id".into()),
            updated_at: "updated_at".into(),
            mapping: RenameMapping::legacy(),
        }
    }

    #[test]
    fn test_advance_ignores_backwards() {
        let mut result = MigrationResult::new(&spec(), RenameStrategy::AlterRename);
        result.advance(TableStage::Renamed);
        result.advance(TableStage::BackedUp);
        assert_eq!(result.stage, TableStage::Renamed);
    }

    #[test]
    fn test_report_json_omits_absent_fields() {
        let mut report = MigrationReport::new(Backend::Postgres);
        let mut result = MigrationResult::new(&spec(), RenameStrategy::AlterRename);
        result.definition = Some(PathBuf::from("snapshots/orders.sql"));
        report.push(result);
        report.finish(RunStatus::Completed);

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["backend"], "postgres");
        assert_eq!(json["results"][0]["table"], "db.archived.orders");
        assert_eq!(json["results"][0]["definition"], "snapshots/orders.sql");
        assert!(json["results"][0].get("backup").is_none());
        assert_eq!(report.definitions().count(), 1);
        assert_eq!(report.backups().count(), 0);
    }
}
