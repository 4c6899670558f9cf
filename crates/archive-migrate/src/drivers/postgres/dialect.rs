//! PostgreSQL SQL dialect (Strategy pattern).
//!
//! Also used for Redshift, which accepts the same statements for renaming,
//! copying and transaction control.

use crate::core::relation::{QuoteStyle, TableReference};
use crate::core::traits::Dialect;

/// PostgreSQL dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Create a new PostgreSQL dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn quote_style(&self) -> QuoteStyle {
        QuoteStyle::Double
    }

    fn build_create_table_as(&self, target: &TableReference, select_sql: &str) -> String {
        // No CREATE OR REPLACE TABLE in PostgreSQL
        format!("create table {} as ({})", target, select_sql)
    }
}
