//! Static per-backend capability table.
//!
//! Everything backend-specific the migration needs to decide up front lives
//! here: which rename strategy runs, whether the table's migration is wrapped
//! in `begin`/`commit`, and how identifiers are quoted. Lookups are pure;
//! the same backend identifier always yields the same [`Capability`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::mapping::RenameMapping;
use super::relation::{QuotePolicy, QuoteStyle};
use crate::drivers::DialectImpl;
use crate::error::{MigrateError, Result};
use crate::pipeline::RenameStrategy;

/// Warehouses with a known migration path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Postgres,
    Redshift,
    Snowflake,
    #[serde(rename = "bigquery")]
    BigQuery,
}

/// Snowflake only carries `dbt_updated_at` through the rename when it is
/// listed explicitly; renaming it onto itself folds its case.
const SNOWFLAKE_EXTRA_RENAMES: &[(&str, &str)] = &[("dbt_updated_at", "dbt_updated_at")];

impl Backend {
    /// Every supported backend, in documentation order.
    pub const ALL: [Backend; 4] = [
        Backend::Postgres,
        Backend::Redshift,
        Backend::Snowflake,
        Backend::BigQuery,
    ];

    /// Parse a profile `type:` value.
    ///
    /// # Errors
    ///
    /// Unknown identifiers are a configuration error; there is no fallback
    /// backend.
    pub fn from_type(db_type: &str) -> Result<Self> {
        match db_type.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Backend::Postgres),
            "redshift" => Ok(Backend::Redshift),
            "snowflake" => Ok(Backend::Snowflake),
            "bigquery" => Ok(Backend::BigQuery),
            other => Err(MigrateError::Config(format!(
                "Unknown database type: '{}'. Supported types: postgres, redshift, snowflake, bigquery",
                other
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Postgres => "postgres",
            Backend::Redshift => "redshift",
            Backend::Snowflake => "snowflake",
            Backend::BigQuery => "bigquery",
        }
    }

    pub fn capability(&self) -> Capability {
        match self {
            Backend::Postgres | Backend::Redshift => Capability {
                backend: *self,
                rename_in_place: true,
                explicit_transactions: true,
                quote_style: QuoteStyle::Double,
                default_quoting: QuotePolicy::ALL,
                extra_renames: &[],
                max_identifier_bytes: if *self == Backend::Redshift { 127 } else { 63 },
            },
            Backend::Snowflake => Capability {
                backend: *self,
                rename_in_place: true,
                explicit_transactions: true,
                quote_style: QuoteStyle::Double,
                default_quoting: QuotePolicy::NONE,
                extra_renames: SNOWFLAKE_EXTRA_RENAMES,
                max_identifier_bytes: 255,
            },
            Backend::BigQuery => Capability {
                backend: *self,
                rename_in_place: false,
                explicit_transactions: false,
                quote_style: QuoteStyle::Backtick,
                default_quoting: QuotePolicy::ALL,
                extra_renames: &[],
                max_identifier_bytes: 1024,
            },
        }
    }

    /// SQL dialect used to render statements for this backend.
    pub fn dialect(&self) -> DialectImpl {
        DialectImpl::for_backend(*self)
    }
}

impl FromStr for Backend {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self> {
        Backend::from_type(s)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a backend can do, resolved once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    pub backend: Backend,
    /// `ALTER TABLE ... RENAME COLUMN` is available.
    pub rename_in_place: bool,
    /// Wrap each table's backup and rename in `begin` / `commit`.
    pub explicit_transactions: bool,
    pub quote_style: QuoteStyle,
    /// Quoting used when the project has no `quoting:` block.
    pub default_quoting: QuotePolicy,
    /// Renames appended to the legacy mapping for this backend.
    pub extra_renames: &'static [(&'static str, &'static str)],
    /// Longer identifiers are truncated (postgres) or rejected by the server.
    pub max_identifier_bytes: usize,
}

impl Capability {
    /// Look up a backend by profile `type:`.
    pub fn lookup(db_type: &str) -> Result<Self> {
        Ok(Backend::from_type(db_type)?.capability())
    }

    /// The rename strategy for this backend.
    pub fn strategy(&self) -> RenameStrategy {
        if self.rename_in_place {
            RenameStrategy::AlterRename
        } else {
            RenameStrategy::ProjectionRecreate
        }
    }

    /// Legacy renames plus any backend-specific extras.
    pub fn rename_mapping(&self) -> RenameMapping {
        self.extra_renames
            .iter()
            .fold(RenameMapping::legacy(), |mapping, (from, to)| {
                mapping.with_pair(*from, *to)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_type_aliases() {
        assert_eq!(Backend::from_type("postgres").unwrap(), Backend::Postgres);
        assert_eq!(Backend::from_type("PostgreSQL").unwrap(), Backend::Postgres);
        assert_eq!(Backend::from_type("pg").unwrap(), Backend::Postgres);
        assert_eq!(Backend::from_type("redshift").unwrap(), Backend::Redshift);
        assert_eq!(Backend::from_type("Snowflake").unwrap(), Backend::Snowflake);
        assert_eq!("bigquery".parse::<Backend>().unwrap(), Backend::BigQuery);
    }

    #[test]
    fn test_unknown_backend_is_config_error() {
        let err = Capability::lookup("oracle").unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
        assert!(err.to_string().contains("oracle"));
    }

    #[test]
    fn test_strategy_selection_is_stable() {
        for backend in Backend::ALL {
            let first = Capability::lookup(backend.name()).unwrap().strategy();
            let second = Capability::lookup(backend.name()).unwrap().strategy();
            assert_eq!(first, second, "strategy changed for {}", backend);
        }
    }

    #[test]
    fn test_strategy_per_backend() {
        assert_eq!(
            Backend::Postgres.capability().strategy(),
            RenameStrategy::AlterRename
        );
        assert_eq!(
            Backend::Redshift.capability().strategy(),
            RenameStrategy::AlterRename
        );
        assert_eq!(
            Backend::Snowflake.capability().strategy(),
            RenameStrategy::AlterRename
        );
        assert_eq!(
            Backend::BigQuery.capability().strategy(),
            RenameStrategy::ProjectionRecreate
        );
    }

    #[test]
    fn test_only_bigquery_skips_transactions() {
        for backend in Backend::ALL {
            let expected = backend != Backend::BigQuery;
            assert_eq!(backend.capability().explicit_transactions, expected);
        }
    }

    #[test]
    fn test_snowflake_mapping_has_identity_pair() {
        let mapping = Backend::Snowflake.capability().rename_mapping();
        assert_eq!(mapping.len(), 4);
        let last = mapping.pairs().last().unwrap();
        assert_eq!(last.from, "dbt_updated_at");
        assert_eq!(last.to, "dbt_updated_at");

        for backend in [Backend::Postgres, Backend::Redshift, Backend::BigQuery] {
            assert_eq!(backend.capability().rename_mapping(), RenameMapping::legacy());
        }
    }
}
