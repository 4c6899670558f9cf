//! Three-part table addresses with per-part quoting.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::identifier::{quote_backtick, quote_double};

/// Which parts of a table address are quoted when rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuotePolicy {
    pub database: bool,
    pub schema: bool,
    pub identifier: bool,
}

impl QuotePolicy {
    /// Quote every part.
    pub const ALL: QuotePolicy = QuotePolicy {
        database: true,
        schema: true,
        identifier: true,
    };

    /// Quote nothing; the warehouse folds case itself.
    pub const NONE: QuotePolicy = QuotePolicy {
        database: false,
        schema: false,
        identifier: false,
    };
}

impl Default for QuotePolicy {
    fn default() -> Self {
        QuotePolicy::ALL
    }
}

/// The quote character a warehouse uses for identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStyle {
    /// ANSI `"name"`.
    Double,
    /// BigQuery `` `name` ``.
    Backtick,
}

impl QuoteStyle {
    pub fn quote(&self, name: &str) -> String {
        match self {
            QuoteStyle::Double => quote_double(name),
            QuoteStyle::Backtick => quote_backtick(name),
        }
    }

    /// Quote `name` only when `enabled`.
    pub fn quote_if(&self, name: &str, enabled: bool) -> String {
        if enabled {
            self.quote(name)
        } else {
            name.to_string()
        }
    }
}

/// A `database.schema.identifier` table address.
///
/// References are never mutated: [`TableReference::with_identifier`] copies
/// the address with a new table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableReference {
    database: String,
    schema: String,
    identifier: String,
    policy: QuotePolicy,
    style: QuoteStyle,
}

impl TableReference {
    /// Create a reference that quotes every part with double quotes.
    pub fn new(
        database: impl Into<String>,
        schema: impl Into<String>,
        identifier: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            identifier: identifier.into(),
            policy: QuotePolicy::ALL,
            style: QuoteStyle::Double,
        }
    }

    /// Set the quoting rules used when rendering.
    pub fn with_quoting(mut self, policy: QuotePolicy, style: QuoteStyle) -> Self {
        self.policy = policy;
        self.style = style;
        self
    }

    /// Copy this address with a different table name.
    pub fn with_identifier(&self, identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..self.clone()
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn policy(&self) -> QuotePolicy {
        self.policy
    }

    pub fn style(&self) -> QuoteStyle {
        self.style
    }

    /// The three parts quoted per the policy, joined with `.`.
    pub fn render(&self) -> String {
        format!(
            "{}.{}.{}",
            self.style.quote_if(&self.database, self.policy.database),
            self.style.quote_if(&self.schema, self.policy.schema),
            self.style.quote_if(&self.identifier, self.policy.identifier)
        )
    }

    /// Unquoted `database.schema.identifier`, for logs and map keys.
    pub fn full_name(&self) -> String {
        format!("{}.{}.{}", self.database, self.schema, self.identifier)
    }
}

impl fmt::Display for TableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_quotes_every_part_by_default() {
        let table = TableReference::new("analytics", "snapshots", "orders_archive");
        assert_eq!(
            table.to_string(),
            "\"analytics\".\"snapshots\".\"orders_archive\""
        );
        assert_eq!(table.full_name(), "analytics.snapshots.orders_archive");
    }

    #[test]
    fn test_render_respects_policy_per_part() {
        let policy = QuotePolicy {
            database: false,
            schema: true,
            identifier: false,
        };
        let table = TableReference::new("RAW", "Archive", "ORDERS")
            .with_quoting(policy, QuoteStyle::Double);
        assert_eq!(table.render(), "RAW.\"Archive\".ORDERS");
    }

    #[test]
    fn test_render_backtick_style() {
        let table = TableReference::new("my-project", "dataset", "orders")
            .with_quoting(QuotePolicy::ALL, QuoteStyle::Backtick);
        assert_eq!(table.render(), "`my-project`.`dataset`.`orders`");
    }

    #[test]
    fn test_with_identifier_copies_address() {
        let policy = QuotePolicy::NONE;
        let table = TableReference::new("db", "s", "t").with_quoting(policy, QuoteStyle::Backtick);
        let renamed = table.with_identifier("t_migration_backup");

        assert_eq!(table.identifier(), "t");
        assert_eq!(renamed.identifier(), "t_migration_backup");
        assert_eq!(renamed.database(), "db");
        assert_eq!(renamed.schema(), "s");
        assert_eq!(renamed.policy(), policy);
        assert_eq!(renamed.style(), QuoteStyle::Backtick);
    }
}
