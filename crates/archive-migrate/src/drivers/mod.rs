//! Warehouse driver implementations.
//!
//! - [`postgres`]: PostgreSQL / Redshift dialect and live session
//! - [`snowflake`]: Snowflake dialect
//! - [`bigquery`]: BigQuery dialect
//! - [`memory`]: in-process session that models tables, for tests
//! - [`common`]: shared utilities (TLS)
//!
//! # Adding New Warehouses
//!
//! 1. Create a module under `drivers/` with a `Dialect` implementation
//! 2. Add a variant to [`Backend`] and its row in the capability table
//! 3. Add the dialect to [`DialectImpl`]
//! 4. If a session driver exists, wire it into [`connect`]

pub mod bigquery;
pub mod common;
pub mod memory;
pub mod postgres;
pub mod snowflake;

pub use bigquery::BigQueryDialect;
pub use common::{SslMode, TlsBuilder};
pub use memory::{MemorySession, MemoryTable};
pub use postgres::{PgSession, PostgresDialect};
pub use snowflake::SnowflakeDialect;

use tracing::info;

use crate::config::OutputConfig;
use crate::core::capability::Backend;
use crate::core::mapping::RenameMapping;
use crate::core::relation::{QuoteStyle, TableReference};
use crate::core::traits::{Dialect, Session};
use crate::error::{MigrateError, Result};

/// Enum-based static dispatch for dialects.
///
/// The compiler generates a match instead of vtable dispatch. Redshift
/// shares the PostgreSQL dialect.
#[derive(Debug, Clone)]
pub enum DialectImpl {
    Postgres(PostgresDialect),
    Snowflake(SnowflakeDialect),
    BigQuery(BigQueryDialect),
}

impl DialectImpl {
    /// Dialect for a backend.
    pub fn for_backend(backend: Backend) -> Self {
        match backend {
            Backend::Postgres | Backend::Redshift => DialectImpl::Postgres(PostgresDialect::new()),
            Backend::Snowflake => DialectImpl::Snowflake(SnowflakeDialect::new()),
            Backend::BigQuery => DialectImpl::BigQuery(BigQueryDialect::new()),
        }
    }
}

impl Dialect for DialectImpl {
    fn name(&self) -> &str {
        match self {
            DialectImpl::Postgres(d) => d.name(),
            DialectImpl::Snowflake(d) => d.name(),
            DialectImpl::BigQuery(d) => d.name(),
        }
    }

    fn quote_style(&self) -> QuoteStyle {
        match self {
            DialectImpl::Postgres(d) => d.quote_style(),
            DialectImpl::Snowflake(d) => d.quote_style(),
            DialectImpl::BigQuery(d) => d.quote_style(),
        }
    }

    fn build_rename_column(&self, table: &TableReference, from: &str, to: &str) -> String {
        match self {
            DialectImpl::Postgres(d) => d.build_rename_column(table, from, to),
            DialectImpl::Snowflake(d) => d.build_rename_column(table, from, to),
            DialectImpl::BigQuery(d) => d.build_rename_column(table, from, to),
        }
    }

    fn build_copy_table(&self, source: &TableReference, target: &TableReference) -> String {
        match self {
            DialectImpl::Postgres(d) => d.build_copy_table(source, target),
            DialectImpl::Snowflake(d) => d.build_copy_table(source, target),
            DialectImpl::BigQuery(d) => d.build_copy_table(source, target),
        }
    }

    fn build_create_table_as(&self, target: &TableReference, select_sql: &str) -> String {
        match self {
            DialectImpl::Postgres(d) => d.build_create_table_as(target, select_sql),
            DialectImpl::Snowflake(d) => d.build_create_table_as(target, select_sql),
            DialectImpl::BigQuery(d) => d.build_create_table_as(target, select_sql),
        }
    }

    fn build_projection_query(
        &self,
        table: &TableReference,
        mapping: &RenameMapping,
    ) -> Result<String> {
        match self {
            DialectImpl::Postgres(d) => d.build_projection_query(table, mapping),
            DialectImpl::Snowflake(d) => d.build_projection_query(table, mapping),
            DialectImpl::BigQuery(d) => d.build_projection_query(table, mapping),
        }
    }

    fn begin_transaction(&self) -> &'static str {
        match self {
            DialectImpl::Postgres(d) => d.begin_transaction(),
            DialectImpl::Snowflake(d) => d.begin_transaction(),
            DialectImpl::BigQuery(d) => d.begin_transaction(),
        }
    }

    fn commit_transaction(&self) -> &'static str {
        match self {
            DialectImpl::Postgres(d) => d.commit_transaction(),
            DialectImpl::Snowflake(d) => d.commit_transaction(),
            DialectImpl::BigQuery(d) => d.commit_transaction(),
        }
    }

    fn rollback_transaction(&self) -> &'static str {
        match self {
            DialectImpl::Postgres(d) => d.rollback_transaction(),
            DialectImpl::Snowflake(d) => d.rollback_transaction(),
            DialectImpl::BigQuery(d) => d.rollback_transaction(),
        }
    }
}

/// Open the named session for a profile output.
///
/// The session is released when the returned box is dropped.
///
/// # Errors
///
/// Returns a configuration error for backends without a compiled-in
/// session driver (Snowflake, BigQuery); embed the library and pass your own
/// [`Session`] for those.
pub async fn connect(output: &OutputConfig, name: &str) -> Result<Box<dyn Session>> {
    let backend = output.backend()?;
    match backend {
        Backend::Postgres | Backend::Redshift => {
            let session = PgSession::connect(output, backend, name).await?;
            info!(
                "Opened {} session '{}' (default database: {})",
                backend,
                name,
                session.default_database()
            );
            Ok(Box::new(session))
        }
        Backend::Snowflake | Backend::BigQuery => Err(MigrateError::Config(format!(
            "no session driver for '{}' is built into this binary; supported connections: postgres, redshift",
            backend
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_impl_for_backend() {
        let name = |b: Backend| DialectImpl::for_backend(b).name().to_string();
        assert_eq!(name(Backend::Postgres), "postgres");
        assert_eq!(name(Backend::Redshift), "postgres");
        assert_eq!(name(Backend::Snowflake), "snowflake");
        assert_eq!(name(Backend::BigQuery), "bigquery");
    }

    #[test]
    fn test_dialect_impl_dispatch() {
        let bq = DialectImpl::for_backend(Backend::BigQuery);
        assert_eq!(bq.quote_ident("t"), "`t`");
        assert!(bq
            .build_projection_query(&TableReference::new("p", "d", "t"), &RenameMapping::legacy())
            .is_ok());

        let pg = DialectImpl::for_backend(Backend::Redshift);
        assert_eq!(pg.quote_ident("t"), "\"t\"");
        assert!(pg
            .build_projection_query(&TableReference::new("d", "s", "t"), &RenameMapping::legacy())
            .is_err());
    }
}
