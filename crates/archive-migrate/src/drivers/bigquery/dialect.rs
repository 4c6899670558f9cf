//! BigQuery SQL dialect.
//!
//! BigQuery has no in-place column rename for these tables, so archives are
//! rebuilt through a `select * EXCEPT(...)` projection written back over the
//! same table.

use crate::core::mapping::RenameMapping;
use crate::core::relation::{QuoteStyle, TableReference};
use crate::core::traits::Dialect;
use crate::error::Result;

/// BigQuery dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct BigQueryDialect;

impl BigQueryDialect {
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for BigQueryDialect {
    fn name(&self) -> &str {
        "bigquery"
    }

    fn quote_style(&self) -> QuoteStyle {
        QuoteStyle::Backtick
    }

    fn build_projection_query(
        &self,
        table: &TableReference,
        mapping: &RenameMapping,
    ) -> Result<String> {
        let except = mapping
            .pairs()
            .iter()
            .map(|p| self.quote_ident(&p.from))
            .collect::<Vec<_>>()
            .join(", ");
        let renamed = mapping
            .pairs()
            .iter()
            .map(|p| format!("{} as {}", self.quote_ident(&p.from), p.to))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!("select * EXCEPT({}), {} from {}", except, renamed, table))
    }

    fn begin_transaction(&self) -> &'static str {
        "begin transaction"
    }

    fn commit_transaction(&self) -> &'static str {
        "commit transaction"
    }

    fn rollback_transaction(&self) -> &'static str {
        "rollback transaction"
    }
}
