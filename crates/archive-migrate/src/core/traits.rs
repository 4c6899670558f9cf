//! Core traits for warehouse access.
//!
//! - [`Dialect`]: SQL syntax strategy for one warehouse
//! - [`Session`]: a live, borrowed connection the migration runs against
//!
//! # Design Patterns
//!
//! - **Strategy**: `Dialect` renders the same logical statement per warehouse
//! - **Template Method**: `Session` only requires `execute` and
//!   `table_exists`; the structured operations default to rendering SQL
//!   through the dialect and executing it

use async_trait::async_trait;

use super::capability::Backend;
use super::mapping::RenameMapping;
use super::relation::{QuoteStyle, TableReference};
use crate::drivers::DialectImpl;
use crate::error::{MigrateError, Result};

/// SQL syntax strategy for a warehouse.
pub trait Dialect: Send + Sync {
    /// Get the dialect name (e.g., "postgres", "bigquery").
    fn name(&self) -> &str;

    /// Quote character for identifiers.
    fn quote_style(&self) -> QuoteStyle;

    /// Quote an identifier.
    fn quote_ident(&self, name: &str) -> String {
        self.quote_style().quote(name)
    }

    /// `ALTER TABLE ... RENAME COLUMN`.
    ///
    /// The old name is quoted so it matches the archived column exactly; the
    /// new name is left bare so the warehouse applies its own case folding.
    fn build_rename_column(&self, table: &TableReference, from: &str, to: &str) -> String {
        format!(
            "alter table {} rename column {} to {}",
            table,
            self.quote_ident(from),
            to
        )
    }

    /// Full copy of `source` into a new table `target`.
    fn build_copy_table(&self, source: &TableReference, target: &TableReference) -> String {
        format!("create table {} as (select * from {})", target, source)
    }

    /// Materialize a `select` into `target`, replacing it if it exists.
    fn build_create_table_as(&self, target: &TableReference, select_sql: &str) -> String {
        format!("create or replace table {} as {}", target, select_sql)
    }

    /// A `select` over `table` that drops the mapped columns and re-adds
    /// them under their new names.
    ///
    /// # Errors
    ///
    /// Dialects without a star-exclusion syntax cannot express the
    /// projection and return a configuration error.
    fn build_projection_query(
        &self,
        _table: &TableReference,
        _mapping: &RenameMapping,
    ) -> Result<String> {
        Err(MigrateError::Config(format!(
            "the {} dialect cannot rebuild a table through a projection",
            self.name()
        )))
    }

    fn begin_transaction(&self) -> &'static str {
        "begin"
    }

    fn commit_transaction(&self) -> &'static str {
        "commit"
    }

    fn rollback_transaction(&self) -> &'static str {
        "rollback"
    }
}

/// A warehouse session borrowed for the whole run.
///
/// Implementations run one statement at a time; the orchestrator awaits each
/// call before issuing the next, and never shares a session between tasks.
#[async_trait]
pub trait Session: Send {
    /// Which warehouse this session talks to.
    fn backend(&self) -> Backend;

    /// Database (or project) used when the configuration omits one.
    fn default_database(&self) -> &str;

    /// Execute a single statement, returning the affected row count when the
    /// warehouse reports one.
    async fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Check whether a table exists at the given address.
    async fn table_exists(&mut self, table: &TableReference) -> Result<bool>;

    /// Dialect for this session's backend.
    fn dialect(&self) -> DialectImpl {
        self.backend().dialect()
    }

    /// Rename one column in place.
    async fn rename_column(&mut self, table: &TableReference, from: &str, to: &str) -> Result<()> {
        let sql = self.dialect().build_rename_column(table, from, to);
        self.execute(&sql).await?;
        Ok(())
    }

    /// Copy every row of `source` into a new table `target`.
    async fn copy_table(&mut self, source: &TableReference, target: &TableReference) -> Result<()> {
        let sql = self.dialect().build_copy_table(source, target);
        self.execute(&sql).await?;
        Ok(())
    }

    /// Materialize `select_sql` at `target`.
    async fn create_table(&mut self, target: &TableReference, select_sql: &str) -> Result<()> {
        let sql = self.dialect().build_create_table_as(target, select_sql);
        self.execute(&sql).await?;
        Ok(())
    }

    /// Rebuild `table` in place with the mapped columns renamed.
    async fn recreate_with_projection(
        &mut self,
        table: &TableReference,
        mapping: &RenameMapping,
    ) -> Result<()> {
        let select_sql = self.dialect().build_projection_query(table, mapping)?;
        self.create_table(table, &select_sql).await
    }

    async fn begin(&mut self) -> Result<()> {
        let sql = self.dialect().begin_transaction();
        self.execute(sql).await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let sql = self.dialect().commit_transaction();
        self.execute(sql).await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        let sql = self.dialect().rollback_transaction();
        self.execute(sql).await?;
        Ok(())
    }
}
