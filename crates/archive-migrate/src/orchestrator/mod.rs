//! Migration orchestrator - main workflow coordinator.
//!
//! Tables are migrated one at a time, in plan order, over a single borrowed
//! session. For each table: optional `begin`, optional backup, rename,
//! `commit` (or `rollback` after a failed backup), then the definition file.
//! A failed rename is still committed before the run stops, so the backup
//! and any renames already applied are kept.

mod report;

pub use report::{MigrationReport, MigrationResult, RunStatus};

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::core::capability::{Backend, Capability};
use crate::core::traits::Session;
use crate::error::{MigrateError, Result};
use crate::files::FileSink;
use crate::pipeline::{BackupCoordinator, DefinitionGenerator, RenameStrategy, TableStage};
use crate::plan::{MigrationPlanBuilder, MigrationSpec};

/// Which steps run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunFlags {
    /// Back up and rename in the warehouse.
    pub migrate_database: bool,
    /// Write snapshot definition files.
    pub write_files: bool,
    /// Take a backup before renaming (only with `migrate_database`).
    pub backup: bool,
}

impl Default for RunFlags {
    fn default() -> Self {
        Self {
            migrate_database: true,
            write_files: true,
            backup: true,
        }
    }
}

/// Collaborators and accumulated state for one run.
///
/// The session is optional: a run that only writes definitions never
/// touches the warehouse.
pub struct RunContext<'a> {
    pub session: Option<&'a mut dyn Session>,
    pub files: &'a mut dyn FileSink,
    pub flags: RunFlags,
    pub report: MigrationReport,
}

impl<'a> RunContext<'a> {
    pub fn new(backend: Backend, files: &'a mut dyn FileSink, flags: RunFlags) -> Self {
        Self {
            session: None,
            files,
            flags,
            report: MigrationReport::new(backend),
        }
    }

    /// Borrow `session` for the whole run.
    pub fn with_session(mut self, session: &'a mut dyn Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn into_report(self) -> MigrationReport {
        self.report
    }
}

/// Migration orchestrator.
pub struct Orchestrator {
    capability: Capability,
    snapshot_dir: PathBuf,
    cancel: CancellationToken,
    backups: BackupCoordinator,
    definitions: DefinitionGenerator,
}

impl Orchestrator {
    /// Create a new orchestrator writing definitions under `snapshot_dir`.
    pub fn new(capability: Capability, snapshot_dir: impl Into<PathBuf>) -> Self {
        Self {
            capability,
            snapshot_dir: snapshot_dir.into(),
            cancel: CancellationToken::new(),
            backups: BackupCoordinator::for_capability(capability),
            definitions: DefinitionGenerator::new(),
        }
    }

    /// Stop before the next table once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn strategy(&self) -> RenameStrategy {
        self.capability.strategy()
    }

    /// Resolve the whole plan, then migrate it.
    ///
    /// A configuration error anywhere in the plan aborts before any table is
    /// touched.
    pub async fn run_plan(
        &self,
        ctx: &mut RunContext<'_>,
        plan: &MigrationPlanBuilder<'_>,
    ) -> Result<()> {
        let specs = match plan.build() {
            Ok(specs) => specs,
            Err(e) => {
                ctx.report.finish(RunStatus::Failed);
                return Err(e);
            }
        };
        self.run(ctx, &specs).await
    }

    /// Migrate `specs` in order.
    ///
    /// Backup and file failures are recorded on the table and the run goes
    /// on; anything else stops the run. The summary is logged either way.
    pub async fn run(&self, ctx: &mut RunContext<'_>, specs: &[MigrationSpec]) -> Result<()> {
        info!(
            "Starting migration run {} of {} tables ({}, strategy {})",
            ctx.report.run_id,
            specs.len(),
            self.capability.backend,
            self.strategy()
        );

        if ctx.flags.write_files {
            if let Err(e) = ctx.files.make_directory(&self.snapshot_dir) {
                warn!("{}", e);
            }
        }

        for spec in specs {
            if self.cancel.is_cancelled() {
                warn!(
                    "Cancellation requested, not starting {}",
                    spec.target.full_name()
                );
                ctx.report.finish(RunStatus::Cancelled);
                ctx.report.log_summary();
                return Err(MigrateError::Cancelled);
            }

            let mut result = MigrationResult::new(spec, self.strategy());
            let outcome = self.migrate_table(ctx, spec, &mut result).await;
            ctx.report.push(result);

            if let Err(e) = outcome {
                error!("{}: {}", spec.target.full_name(), e);
                ctx.report.finish(RunStatus::Failed);
                ctx.report.log_summary();
                return Err(e);
            }
        }

        let status = if ctx.report.has_errors() {
            RunStatus::CompletedWithErrors
        } else {
            RunStatus::Completed
        };
        ctx.report.finish(status);
        ctx.report.log_summary();
        Ok(())
    }

    async fn migrate_table(
        &self,
        ctx: &mut RunContext<'_>,
        spec: &MigrationSpec,
        result: &mut MigrationResult,
    ) -> Result<()> {
        let table = spec.target.full_name();

        if ctx.flags.migrate_database {
            info!("Migrating database for {}", table);
            self.migrate_database(ctx, spec, result).await?;
        } else {
            info!("Not migrating database for {}", table);
        }

        if ctx.flags.write_files {
            info!("Writing snapshot definition for {}", table);
            info!("Do not forget to remove or comment out the existing entry!");
            self.write_definition(ctx, spec, result);
        } else {
            info!("Not writing snapshot definition for {}", table);
        }

        result.advance(TableStage::Done);
        Ok(())
    }

    async fn migrate_database(
        &self,
        ctx: &mut RunContext<'_>,
        spec: &MigrationSpec,
        result: &mut MigrationResult,
    ) -> Result<()> {
        let session = ctx.session.as_deref_mut().ok_or_else(|| {
            MigrateError::Config("database operations are enabled but no session is open".into())
        })?;
        let transactional = self.capability.explicit_transactions;
        if transactional {
            session.begin().await?;
        }

        if ctx.flags.backup {
            match self.backups.backup(&mut *session, &spec.target).await {
                Ok(backup) => {
                    result.backup = Some(backup);
                    result.advance(TableStage::BackedUp);
                }
                Err(e) if e.is_table_scoped() => {
                    error!("{}: {}; skipping rename", spec.target.full_name(), e);
                    result.errors.push(e.to_string());
                    if transactional {
                        session.rollback().await?;
                    }
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }

        if let Err(e) = self
            .strategy()
            .apply(&mut *session, &spec.target, &spec.mapping)
            .await
        {
            if transactional {
                Self::keep_partial_rename(session, spec, result).await;
            }
            return Err(e);
        }
        result.advance(TableStage::Renamed);

        if transactional {
            session.commit().await?;
        }
        Ok(())
    }

    /// Commit whatever the failed rename left behind, then drop the backup
    /// from the report if the server discarded it (PostgreSQL turns the
    /// commit of a failed transaction into a rollback).
    async fn keep_partial_rename(
        session: &mut dyn Session,
        spec: &MigrationSpec,
        result: &mut MigrationResult,
    ) {
        let table = spec.target.full_name();
        if let Err(e) = session.commit().await {
            error!("{}: commit after failed rename: {}", table, e);
        }
        let Some(backup) = result.backup.clone() else {
            return;
        };
        match session.table_exists(&backup).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    "{}: backup {} was discarded with the failed transaction",
                    table,
                    backup.full_name()
                );
                result.backup = None;
            }
            Err(e) => warn!("{}: could not confirm backup {}: {}", table, backup.full_name(), e),
        }
    }

    fn write_definition(
        &self,
        ctx: &mut RunContext<'_>,
        spec: &MigrationSpec,
        result: &mut MigrationResult,
    ) {
        let path = self.snapshot_dir.join(self.definitions.file_name(spec));
        let contents = self.definitions.render(spec);
        let table = spec.target.full_name();

        match ctx.files.make_file(&path, &contents) {
            Ok(true) => {
                info!("Migrated archive {} -> file at {}", table, path.display());
                result.definition = Some(path);
                result.advance(TableStage::Defined);
            }
            Ok(false) => {
                warn!(
                    "Could not write archive {} to file {}: file already exists",
                    table,
                    path.display()
                );
            }
            Err(e) => {
                error!("{}: {}", table, e);
                result.errors.push(e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UniqueKey;
    use crate::core::capability::Backend;
    use crate::core::mapping::RenameMapping;
    use crate::core::relation::TableReference;
    use crate::drivers::{MemorySession, MemoryTable};
    use std::collections::BTreeMap;
    use std::path::Path;

    /// Records files in memory.
    #[derive(Default)]
    struct RecordingFiles {
        files: BTreeMap<PathBuf, String>,
        dirs: Vec<PathBuf>,
    }

    impl FileSink for RecordingFiles {
        fn make_file(&mut self, path: &Path, contents: &str) -> Result<bool> {
            if self.files.contains_key(path) {
                return Ok(false);
            }
            self.files.insert(path.to_path_buf(), contents.to_string());
            Ok(true)
        }

        fn make_directory(&mut self, path: &Path) -> Result<()> {
            self.dirs.push(path.to_path_buf());
            Ok(())
        }
    }

    fn spec(name: &str) -> MigrationSpec {
        MigrationSpec {
            source: TableReference::new("db", "raw", name),
            target: TableReference::new("db", "archived", name),
            unique_key: UniqueKey::Single("id".into()),
            updated_at: "updated_at".into(),
            mapping: RenameMapping::legacy(),
        }
    }

    fn archive() -> MemoryTable {
        MemoryTable::new(["id", "updated_at", "valid_from", "valid_to", "scd_id"])
            .with_row(["1", "t", "t", "", "h"])
    }

    #[tokio::test]
    async fn test_postgres_run_brackets_each_table() {
        let a = spec("a");
        let b = spec("b");
        let mut session = MemorySession::new(Backend::Postgres, "db")
            .with_table(&a.target, archive())
            .with_table(&b.target, archive());
        let mut files = RecordingFiles::default();
        let orchestrator = Orchestrator::new(Backend::Postgres.capability(), "snapshots");

        let mut ctx = RunContext::new(Backend::Postgres, &mut files, RunFlags::default())
            .with_session(&mut session);
        orchestrator.run(&mut ctx, &[a, b]).await.unwrap();
        let report = ctx.into_report();

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.backups().count(), 2);
        assert_eq!(report.definitions().count(), 2);
        assert!(report.results.iter().all(|r| r.stage == TableStage::Done));

        let statements = session.statements();
        assert_eq!(statements.len(), 2 * (1 + 1 + 3 + 1));
        assert_eq!(statements[0], "begin");
        assert!(statements[1].starts_with("create table"));
        assert_eq!(statements[5], "commit");
        assert_eq!(statements[6], "begin");
        assert_eq!(files.dirs, vec![PathBuf::from("snapshots")]);
        assert!(files.files.contains_key(Path::new("snapshots/a.sql")));
    }

    #[tokio::test]
    async fn test_backup_conflict_rolls_back_and_still_writes_file() {
        let a = spec("a");
        let mut session = MemorySession::new(Backend::Postgres, "db")
            .with_table(&a.target, archive())
            .with_table(
                &a.target.with_identifier("a_migration_backup"),
                MemoryTable::default(),
            );
        let mut files = RecordingFiles::default();
        let orchestrator = Orchestrator::new(Backend::Postgres.capability(), "snapshots");

        let mut ctx = RunContext::new(Backend::Postgres, &mut files, RunFlags::default())
            .with_session(&mut session);
        orchestrator.run(&mut ctx, &[a.clone()]).await.unwrap();
        let report = ctx.into_report();

        assert_eq!(report.status, RunStatus::CompletedWithErrors);
        assert_eq!(report.results[0].stage, TableStage::Done);
        assert!(report.results[0].backup.is_none());
        assert!(report.results[0].definition.is_some());
        assert_eq!(session.statements(), ["begin", "rollback"]);
        assert_eq!(session.table(&a.target).unwrap().columns[2], "valid_from");
    }

    #[tokio::test]
    async fn test_rename_failure_is_fatal_and_keeps_report() {
        let a = spec("a");
        let b = spec("b");
        let a_target = a.target.clone();
        let mut session = MemorySession::new(Backend::Postgres, "db")
            .with_table(&a.target, archive())
            .with_table(&b.target, archive())
            .fail_when("rename column \"scd_id\"");
        let mut files = RecordingFiles::default();
        let orchestrator = Orchestrator::new(Backend::Postgres.capability(), "snapshots");

        let mut ctx = RunContext::new(Backend::Postgres, &mut files, RunFlags::default())
            .with_session(&mut session);
        let err = orchestrator.run(&mut ctx, &[a, b]).await.unwrap_err();
        let report = ctx.into_report();

        assert!(matches!(err, MigrateError::RenameExecution { .. }));
        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.results.len(), 1);
        assert!(files.files.is_empty());

        // The backup and the renames that went through are committed.
        let statements = session.statements();
        assert_eq!(statements.last().map(String::as_str), Some("commit"));
        assert!(!statements.iter().any(|s| s == "rollback"));
        let backup = a_target.with_identifier("a_migration_backup");
        assert!(session.table(&backup).is_some());
        assert_eq!(
            report.backups().map(|b| b.full_name()).collect::<Vec<_>>(),
            vec![backup.full_name()]
        );
        assert_eq!(
            session.table(&a_target).unwrap().columns,
            ["id", "updated_at", "dbt_valid_from", "dbt_valid_to", "scd_id"]
        );
    }

    /// Session that loses every table created since `begin` when a failed
    /// transaction is committed, the way PostgreSQL does.
    struct AbortingSession {
        inner: MemorySession,
        failed: bool,
        discarded: Vec<TableReference>,
        created: Vec<TableReference>,
    }

    #[async_trait::async_trait]
    impl Session for AbortingSession {
        fn backend(&self) -> Backend {
            self.inner.backend()
        }

        fn default_database(&self) -> &str {
            self.inner.default_database()
        }

        async fn execute(&mut self, sql: &str) -> Result<u64> {
            let outcome = self.inner.execute(sql).await;
            if sql == "commit" && self.failed {
                self.discarded.append(&mut self.created);
            }
            outcome
        }

        async fn table_exists(&mut self, table: &TableReference) -> Result<bool> {
            if self.discarded.contains(table) {
                return Ok(false);
            }
            self.inner.table_exists(table).await
        }

        async fn copy_table(
            &mut self,
            source: &TableReference,
            target: &TableReference,
        ) -> Result<()> {
            self.inner.copy_table(source, target).await?;
            self.created.push(target.clone());
            Ok(())
        }

        async fn rename_column(
            &mut self,
            table: &TableReference,
            from: &str,
            to: &str,
        ) -> Result<()> {
            let outcome = self.inner.rename_column(table, from, to).await;
            self.failed |= outcome.is_err();
            outcome
        }
    }

    #[tokio::test]
    async fn test_rename_failure_drops_backup_discarded_by_server() {
        let a = spec("a");
        let mut session = AbortingSession {
            inner: MemorySession::new(Backend::Postgres, "db")
                .with_table(&a.target, archive())
                .fail_when("rename column \"valid_to\""),
            failed: false,
            discarded: Vec::new(),
            created: Vec::new(),
        };
        let mut files = RecordingFiles::default();
        let orchestrator = Orchestrator::new(Backend::Postgres.capability(), "snapshots");

        let mut ctx = RunContext::new(Backend::Postgres, &mut files, RunFlags::default())
            .with_session(&mut session);
        let err = orchestrator.run(&mut ctx, &[a]).await.unwrap_err();
        let report = ctx.into_report();

        assert!(matches!(err, MigrateError::RenameExecution { .. }));
        assert_eq!(session.inner.statements().last().map(String::as_str), Some("commit"));
        assert_eq!(report.backups().count(), 0);
        assert!(report.results[0].backup.is_none());
    }

    /// Fails `make_file` for chosen file names, or `make_directory`.
    #[derive(Default)]
    struct FailingFiles {
        inner: RecordingFiles,
        fail_files: Vec<&'static str>,
        fail_directory: bool,
    }

    impl FailingFiles {
        fn io_error(path: &Path) -> MigrateError {
            MigrateError::file_write(
                path,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            )
        }
    }

    impl FileSink for FailingFiles {
        fn make_file(&mut self, path: &Path, contents: &str) -> Result<bool> {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if self.fail_files.contains(&name) {
                return Err(Self::io_error(path));
            }
            self.inner.make_file(path, contents)
        }

        fn make_directory(&mut self, path: &Path) -> Result<()> {
            if self.fail_directory {
                return Err(Self::io_error(path));
            }
            self.inner.make_directory(path)
        }
    }

    #[tokio::test]
    async fn test_file_failure_is_recorded_and_run_continues() {
        let a = spec("a");
        let b = spec("b");
        let mut session = MemorySession::new(Backend::Postgres, "db")
            .with_table(&a.target, archive())
            .with_table(&b.target, archive());
        let mut files = FailingFiles {
            fail_files: vec!["a.sql"],
            ..FailingFiles::default()
        };
        let orchestrator = Orchestrator::new(Backend::Postgres.capability(), "snapshots");

        let mut ctx = RunContext::new(Backend::Postgres, &mut files, RunFlags::default())
            .with_session(&mut session);
        orchestrator.run(&mut ctx, &[a.clone(), b.clone()]).await.unwrap();
        let report = ctx.into_report();

        assert_eq!(report.status, RunStatus::CompletedWithErrors);
        assert!(report.results[0].errors[0].contains("a.sql"));
        assert!(report.results[0].definition.is_none());
        assert!(report.results[1].errors.is_empty());
        assert_eq!(report.backups().count(), 2);
        assert_eq!(
            report.definitions().map(|(_, p)| p.clone()).collect::<Vec<_>>(),
            vec![PathBuf::from("snapshots/b.sql")]
        );
        assert_eq!(session.table(&b.target).unwrap().columns[2], "dbt_valid_from");
        assert!(files.inner.files.contains_key(Path::new("snapshots/b.sql")));
    }

    #[tokio::test]
    async fn test_directory_failure_does_not_stop_run() {
        let a = spec("a");
        let mut session =
            MemorySession::new(Backend::Postgres, "db").with_table(&a.target, archive());
        let mut files = FailingFiles {
            fail_directory: true,
            ..FailingFiles::default()
        };
        let orchestrator = Orchestrator::new(Backend::Postgres.capability(), "snapshots");

        let mut ctx = RunContext::new(Backend::Postgres, &mut files, RunFlags::default())
            .with_session(&mut session);
        orchestrator.run(&mut ctx, &[a.clone()]).await.unwrap();
        let report = ctx.into_report();

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.results[0].stage, TableStage::Done);
        assert_eq!(report.backups().count(), 1);
        assert_eq!(session.table(&a.target).unwrap().columns[2], "dbt_valid_from");
        assert!(files.inner.dirs.is_empty());
        assert!(files.inner.files.contains_key(Path::new("snapshots/a.sql")));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_table() {
        let a = spec("a");
        let mut session =
            MemorySession::new(Backend::Postgres, "db").with_table(&a.target, archive());
        let mut files = RecordingFiles::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let orchestrator = Orchestrator::new(Backend::Postgres.capability(), "snapshots")
            .with_cancellation(cancel);

        let mut ctx = RunContext::new(Backend::Postgres, &mut files, RunFlags::default())
            .with_session(&mut session);
        let err = orchestrator.run(&mut ctx, &[a]).await.unwrap_err();

        assert!(matches!(err, MigrateError::Cancelled));
        assert_eq!(ctx.report.status, RunStatus::Cancelled);
        assert!(ctx.report.results.is_empty());
    }

    #[tokio::test]
    async fn test_no_backups_flag_skips_backup() {
        let a = spec("a");
        let mut session =
            MemorySession::new(Backend::Postgres, "db").with_table(&a.target, archive());
        let mut files = RecordingFiles::default();
        let orchestrator = Orchestrator::new(Backend::Postgres.capability(), "snapshots");
        let flags = RunFlags {
            backup: false,
            write_files: false,
            ..RunFlags::default()
        };

        let mut ctx = RunContext::new(Backend::Postgres, &mut files, flags)
            .with_session(&mut session);
        orchestrator.run(&mut ctx, &[a]).await.unwrap();
        let report = ctx.into_report();

        assert_eq!(report.backups().count(), 0);
        assert_eq!(report.results[0].stage, TableStage::Done);
        assert!(!session.statements().iter().any(|s| s.starts_with("create table")));
        assert!(files.dirs.is_empty());
    }

    #[tokio::test]
    async fn test_existing_file_is_not_recorded() {
        let a = spec("a");
        let mut session = MemorySession::new(Backend::Postgres, "db");
        let mut files = RecordingFiles::default();
        files
            .files
            .insert(PathBuf::from("snapshots/a.sql"), "hand written".into());
        let orchestrator = Orchestrator::new(Backend::Postgres.capability(), "snapshots");
        let flags = RunFlags {
            migrate_database: false,
            ..RunFlags::default()
        };

        let mut ctx = RunContext::new(Backend::Postgres, &mut files, flags)
            .with_session(&mut session);
        orchestrator.run(&mut ctx, &[a]).await.unwrap();
        let report = ctx.into_report();

        assert!(report.results[0].definition.is_none());
        assert_eq!(files.files[Path::new("snapshots/a.sql")], "hand written");
        assert!(session.statements().is_empty());
    }
}
