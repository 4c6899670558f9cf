//! Column rename strategies.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use crate::core::mapping::RenameMapping;
use crate::core::relation::TableReference;
use crate::core::traits::Session;
use crate::error::{MigrateError, Result};

/// How the legacy columns of a table are renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenameStrategy {
    /// One `alter table ... rename column` per pair, in mapping order.
    AlterRename,
    /// Rebuild the table in place from a renaming `select`.
    ProjectionRecreate,
}

impl RenameStrategy {
    /// Apply the mapping to `table`.
    ///
    /// # Errors
    ///
    /// Any failure is a [`MigrateError::RenameExecution`]. For
    /// [`RenameStrategy::AlterRename`] it lists the renames that already went
    /// through; those are not undone.
    pub async fn apply<S>(
        &self,
        session: &mut S,
        table: &TableReference,
        mapping: &RenameMapping,
    ) -> Result<()>
    where
        S: Session + ?Sized,
    {
        match self {
            RenameStrategy::AlterRename => {
                let mut applied: Vec<String> = Vec::with_capacity(mapping.len());
                for pair in mapping.pairs() {
                    if let Err(e) = session.rename_column(table, &pair.from, &pair.to).await {
                        return Err(MigrateError::rename(
                            table.full_name(),
                            format!("{}: {}", pair, e),
                            &applied,
                        ));
                    }
                    info!("Renamed {} on {}", pair, table.full_name());
                    applied.push(pair.to_string());
                }
                Ok(())
            }
            RenameStrategy::ProjectionRecreate => {
                debug!(
                    "Rebuilding {} with {} renamed columns",
                    table.full_name(),
                    mapping.len()
                );
                session
                    .recreate_with_projection(table, mapping)
                    .await
                    .map_err(|e| MigrateError::rename(table.full_name(), e.to_string(), &[]))?;
                info!("Rebuilt {} with renamed columns", table.full_name());
                Ok(())
            }
        }
    }
}

impl fmt::Display for RenameStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenameStrategy::AlterRename => f.write_str("alter-rename"),
            RenameStrategy::ProjectionRecreate => f.write_str("projection-recreate"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::capability::Backend;
    use crate::drivers::{MemorySession, MemoryTable};

    fn legacy_table() -> MemoryTable {
        MemoryTable::new([
            "id",
            "name",
            "updated_at",
            "valid_from",
            "valid_to",
            "scd_id",
            "dbt_updated_at",
        ])
        .with_row(["1", "a", "t1", "t1", "", "h1", "t1"])
    }

    #[tokio::test]
    async fn test_alter_rename_keeps_other_columns() {
        let table = TableReference::new("db", "s", "orders");
        let mut session =
            MemorySession::new(Backend::Postgres, "db").with_table(&table, legacy_table());

        RenameStrategy::AlterRename
            .apply(&mut session, &table, &RenameMapping::legacy())
            .await
            .unwrap();

        assert_eq!(session.statements().len(), 3);
        assert_eq!(
            session.table(&table).unwrap().columns,
            [
                "id",
                "name",
                "updated_at",
                "dbt_valid_from",
                "dbt_valid_to",
                "dbt_scd_id",
                "dbt_updated_at"
            ]
        );
    }

    #[tokio::test]
    async fn test_alter_rename_snowflake_issues_four_statements() {
        let table = TableReference::new("DB", "S", "ORDERS");
        let mut session =
            MemorySession::new(Backend::Snowflake, "DB").with_table(&table, legacy_table());
        let mapping = Backend::Snowflake.capability().rename_mapping();

        RenameStrategy::AlterRename
            .apply(&mut session, &table, &mapping)
            .await
            .unwrap();

        assert_eq!(session.statements().len(), 4);
        assert!(session.statements()[3]
            .ends_with("rename column \"dbt_updated_at\" to dbt_updated_at"));
    }

    #[tokio::test]
    async fn test_alter_rename_partial_failure_reports_applied() {
        let table = TableReference::new("db", "s", "orders");
        let mut session = MemorySession::new(Backend::Postgres, "db")
            .with_table(&table, legacy_table())
            .fail_when("\"scd_id\"");

        let err = RenameStrategy::AlterRename
            .apply(&mut session, &table, &RenameMapping::legacy())
            .await
            .unwrap_err();

        match err {
            MigrateError::RenameExecution { table, applied, .. } => {
                assert_eq!(table, "db.s.orders");
                assert_eq!(
                    applied,
                    "valid_from -> dbt_valid_from, valid_to -> dbt_valid_to"
                );
            }
            other => panic!("unexpected error: {other}"),
        }
        let columns = &session.table(&table).unwrap().columns;
        assert!(columns.contains(&"dbt_valid_to".to_string()));
        assert!(columns.contains(&"scd_id".to_string()));
    }

    #[tokio::test]
    async fn test_projection_recreate_single_statement() {
        let table = TableReference::new("proj", "ds", "orders")
            .with_quoting(Default::default(), crate::core::relation::QuoteStyle::Backtick);
        let mut session =
            MemorySession::new(Backend::BigQuery, "proj").with_table(&table, legacy_table());

        RenameStrategy::ProjectionRecreate
            .apply(&mut session, &table, &RenameMapping::legacy())
            .await
            .unwrap();

        assert_eq!(
            session.statements(),
            ["create or replace table `proj`.`ds`.`orders` as select * EXCEPT(`valid_from`, `valid_to`, `scd_id`), `valid_from` as dbt_valid_from, `valid_to` as dbt_valid_to, `scd_id` as dbt_scd_id from `proj`.`ds`.`orders`"]
        );
        let t = session.table(&table).unwrap();
        assert_eq!(
            t.columns,
            [
                "id",
                "name",
                "updated_at",
                "dbt_updated_at",
                "dbt_valid_from",
                "dbt_valid_to",
                "dbt_scd_id"
            ]
        );
        assert_eq!(t.column_values("dbt_scd_id").unwrap(), ["h1"]);
    }

    #[tokio::test]
    async fn test_projection_failure_is_rename_error() {
        let table = TableReference::new("proj", "ds", "orders");
        let mut session = MemorySession::new(Backend::BigQuery, "proj")
            .with_table(&table, legacy_table())
            .fail_when("create or replace");

        let err = RenameStrategy::ProjectionRecreate
            .apply(&mut session, &table, &RenameMapping::legacy())
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::RenameExecution { .. }));
        assert!(err.to_string().contains("already applied: none"));
    }
}
