//! # archive-migrate
//!
//! Migrates legacy dbt archive tables to the snapshot column layout.
//!
//! For every table listed under `archive:` in `dbt_project.yml` the library
//! can:
//!
//! - **Back up** the table to `<table>_migration_backup`
//! - **Rename** `valid_from`, `valid_to` and `scd_id` to their `dbt_` names,
//!   in place or by rebuilding the table, depending on the warehouse
//! - **Write** a `{% snapshot %}` definition replacing the archive entry
//!
//! ## Example
//!
//! ```rust,no_run
//! use archive_migrate::{
//!     drivers, LocalFiles, MigrationPlanBuilder, Orchestrator, ProfilesConfig, ProjectConfig,
//!     RunContext, RunFlags,
//! };
//!
//! #[tokio::main]
//! async fn main() -> archive_migrate::Result<()> {
//!     let project = ProjectConfig::load(".")?;
//!     let profiles = ProfilesConfig::load(archive_migrate::config::default_profiles_dir())?;
//!     let resolved = profiles.resolve("warehouse", None)?;
//!     let capability = resolved.output.backend()?.capability();
//!
//!     let mut session = drivers::connect(&resolved.output, "migration").await?;
//!     let plan = MigrationPlanBuilder::new(&project, session.default_database(), capability);
//!     let mut files = LocalFiles::new();
//!     let orchestrator = Orchestrator::new(capability, project.snapshot_dir(".".as_ref())?);
//!
//!     let mut ctx = RunContext::new(capability.backend, &mut files, RunFlags::default())
//!         .with_session(&mut *session);
//!     orchestrator.run_plan(&mut ctx, &plan).await?;
//!     println!("{}", ctx.into_report().to_json()?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod files;
pub mod orchestrator;
pub mod pipeline;
pub mod plan;

// Re-exports for convenient access
pub use config::{OutputConfig, ProfilesConfig, ProjectConfig, ResolvedOutput, UniqueKey};
pub use crate::core::{
    Backend, Capability, Dialect, QuotePolicy, QuoteStyle, RenameMapping, Session, TableReference,
};
pub use drivers::{DialectImpl, MemorySession, MemoryTable};
pub use error::{MigrateError, Result};
pub use files::{FileSink, LocalFiles};
pub use orchestrator::{MigrationReport, MigrationResult, Orchestrator, RunContext, RunFlags, RunStatus};
pub use pipeline::{BackupCoordinator, DefinitionGenerator, RenameStrategy, TableStage};
pub use plan::{MigrationPlanBuilder, MigrationSpec};
