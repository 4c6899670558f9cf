//! In-process session that models tables as column lists and rows.
//!
//! Used by the library and CLI tests. Each structured operation renders the
//! same SQL a live session would send, records it, then applies the effect to
//! the modelled tables.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use crate::core::capability::Backend;
use crate::core::mapping::RenameMapping;
use crate::core::relation::TableReference;
use crate::core::traits::{Dialect, Session};
use crate::error::{MigrateError, Result};

/// A modelled table: ordered column names plus row values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl MemoryTable {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn with_row<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(values.into_iter().map(Into::into).collect());
        self
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one column, top to bottom.
    pub fn column_values(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }
}

/// Session backed by an in-memory table map keyed by unquoted full name.
#[derive(Debug)]
pub struct MemorySession {
    backend: Backend,
    database: String,
    tables: HashMap<String, MemoryTable>,
    statements: Vec<String>,
    fail_on: Vec<String>,
}

impl MemorySession {
    pub fn new(backend: Backend, default_database: impl Into<String>) -> Self {
        Self {
            backend,
            database: default_database.into(),
            tables: HashMap::new(),
            statements: Vec::new(),
            fail_on: Vec::new(),
        }
    }

    /// Seed a table.
    pub fn with_table(mut self, table: &TableReference, contents: MemoryTable) -> Self {
        self.tables.insert(table.full_name(), contents);
        self
    }

    /// Make any statement containing `fragment` fail.
    pub fn fail_when(mut self, fragment: impl Into<String>) -> Self {
        self.fail_on.push(fragment.into());
        self
    }

    pub fn table(&self, table: &TableReference) -> Option<&MemoryTable> {
        self.tables.get(&table.full_name())
    }

    /// Every statement issued so far, in order.
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    fn table_mut(&mut self, table: &TableReference) -> Result<&mut MemoryTable> {
        self.tables
            .get_mut(&table.full_name())
            .ok_or_else(|| MigrateError::Execution(format!("table {} does not exist", table)))
    }
}

#[async_trait]
impl Session for MemorySession {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn default_database(&self) -> &str {
        &self.database
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        debug!("Executing: {}", sql);
        self.statements.push(sql.to_string());
        if let Some(fragment) = self.fail_on.iter().find(|f| sql.contains(f.as_str())) {
            return Err(MigrateError::Execution(format!(
                "injected failure on '{}'",
                fragment
            )));
        }
        Ok(0)
    }

    async fn table_exists(&mut self, table: &TableReference) -> Result<bool> {
        Ok(self.tables.contains_key(&table.full_name()))
    }

    async fn rename_column(&mut self, table: &TableReference, from: &str, to: &str) -> Result<()> {
        let sql = self.dialect().build_rename_column(table, from, to);
        self.execute(&sql).await?;

        let contents = self.table_mut(table)?;
        let idx = contents.column_index(from).ok_or_else(|| {
            MigrateError::Execution(format!("column '{}' does not exist in {}", from, table))
        })?;
        if from != to && contents.column_index(to).is_some() {
            return Err(MigrateError::Execution(format!(
                "column '{}' already exists in {}",
                to, table
            )));
        }
        contents.columns[idx] = to.to_string();
        Ok(())
    }

    async fn copy_table(&mut self, source: &TableReference, target: &TableReference) -> Result<()> {
        let sql = self.dialect().build_copy_table(source, target);
        self.execute(&sql).await?;

        if self.tables.contains_key(&target.full_name()) {
            return Err(MigrateError::Execution(format!(
                "table {} already exists",
                target
            )));
        }
        let copy = self.table_mut(source)?.clone();
        self.tables.insert(target.full_name(), copy);
        Ok(())
    }

    async fn recreate_with_projection(
        &mut self,
        table: &TableReference,
        mapping: &RenameMapping,
    ) -> Result<()> {
        let select_sql = self.dialect().build_projection_query(table, mapping)?;
        self.create_table(table, &select_sql).await?;

        let contents = self.table_mut(table)?;
        let mut kept: Vec<usize> = Vec::new();
        let mut renamed: Vec<(usize, &str)> = Vec::new();
        for pair in mapping.pairs() {
            let idx = contents.column_index(&pair.from).ok_or_else(|| {
                MigrateError::Execution(format!(
                    "column '{}' does not exist in {}",
                    pair.from, table
                ))
            })?;
            renamed.push((idx, pair.to.as_str()));
        }
        for idx in 0..contents.columns.len() {
            if !renamed.iter().any(|(r, _)| *r == idx) {
                kept.push(idx);
            }
        }

        let order: Vec<usize> = kept
            .iter()
            .copied()
            .chain(renamed.iter().map(|(idx, _)| *idx))
            .collect();
        let columns = kept
            .iter()
            .map(|idx| contents.columns[*idx].clone())
            .chain(renamed.iter().map(|(_, to)| (*to).to_string()))
            .collect();
        let rows = contents
            .rows
            .iter()
            .map(|row| order.iter().map(|idx| row[*idx].clone()).collect())
            .collect();

        *contents = MemoryTable { columns, rows };
        Ok(())
    }
}
