//! Snowflake SQL dialect.

use crate::core::mapping::RenameMapping;
use crate::core::relation::{QuoteStyle, TableReference};
use crate::core::traits::Dialect;
use crate::error::Result;

/// Snowflake dialect implementation.
///
/// Unquoted identifiers fold to upper case in Snowflake, which is why
/// renames leave the new column name bare.
#[derive(Debug, Clone, Default)]
pub struct SnowflakeDialect;

impl SnowflakeDialect {
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for SnowflakeDialect {
    fn name(&self) -> &str {
        "snowflake"
    }

    fn quote_style(&self) -> QuoteStyle {
        QuoteStyle::Double
    }

    fn build_projection_query(
        &self,
        table: &TableReference,
        mapping: &RenameMapping,
    ) -> Result<String> {
        let excluded = mapping
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

        Ok(format!(
            "select * exclude ({}), {} from {}",
            excluded, renamed, table
        ))
    }
}
