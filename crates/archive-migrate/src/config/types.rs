//! Configuration type definitions for the project and profiles files.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::capability::Backend;
use crate::core::relation::QuotePolicy;
use crate::error::{MigrateError, Result};

/// The parts of `dbt_project.yml` the migration reads.
///
/// Every other key in the file is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name.
    #[serde(default)]
    pub name: Option<String>,

    /// Profile to connect with when `--profile` is not given.
    #[serde(default)]
    pub profile: Option<String>,

    /// Legacy archive groups, in file order.
    #[serde(default)]
    pub archive: Vec<ArchiveGroup>,

    /// Where snapshot definitions are written; only the first entry is used.
    #[serde(
        rename = "snapshot-paths",
        alias = "archive-paths",
        default = "default_snapshot_paths"
    )]
    pub snapshot_paths: Vec<String>,

    /// Per-part quoting overrides.
    #[serde(default)]
    pub quoting: Option<QuotingConfig>,
}

/// One entry of the legacy `archive:` list.
///
/// Required fields are optional here so that a missing one is reported by
/// the planner with the field name rather than as a parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveGroup {
    #[serde(default)]
    pub source_database: Option<String>,
    #[serde(default)]
    pub source_schema: Option<String>,
    #[serde(default)]
    pub target_database: Option<String>,
    #[serde(default)]
    pub target_schema: Option<String>,
    #[serde(default)]
    pub tables: Vec<ArchiveTable>,
}

/// One archived table inside a group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveTable {
    #[serde(default)]
    pub source_table: Option<String>,
    #[serde(default)]
    pub target_table: Option<String>,
    #[serde(default)]
    pub unique_key: Option<UniqueKey>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// A single unique-key column or a composite key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UniqueKey {
    Single(String),
    Composite(Vec<String>),
}

impl UniqueKey {
    /// The key's column names.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            UniqueKey::Single(c) => vec![c.as_str()],
            UniqueKey::Composite(cs) => cs.iter().map(String::as_str).collect(),
        }
    }
}

impl fmt::Display for UniqueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniqueKey::Single(c) => f.write_str(c),
            UniqueKey::Composite(cs) => write!(f, "[{}]", cs.join(", ")),
        }
    }
}

/// The project's `quoting:` block. Unset parts keep the backend default.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QuotingConfig {
    #[serde(default)]
    pub database: Option<bool>,
    #[serde(default)]
    pub schema: Option<bool>,
    #[serde(default)]
    pub identifier: Option<bool>,
}

impl QuotingConfig {
    /// Overlay the configured flags on `base`.
    pub fn resolve(&self, base: QuotePolicy) -> QuotePolicy {
        QuotePolicy {
            database: self.database.unwrap_or(base.database),
            schema: self.schema.unwrap_or(base.schema),
            identifier: self.identifier.unwrap_or(base.identifier),
        }
    }
}

/// Contents of `profiles.yml`.
///
/// Top-level keys are profile names; a `config:` key holds global settings
/// and is skipped, so entries are parsed lazily on lookup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ProfilesConfig {
    pub(crate) entries: BTreeMap<String, serde_yaml::Value>,
}

/// A profile: its default target and the named outputs.
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub outputs: BTreeMap<String, OutputConfig>,
}

/// Connection settings for one profile output.
#[derive(Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Warehouse type (`postgres`, `redshift`, `snowflake`, `bigquery`).
    #[serde(rename = "type")]
    pub db_type: String,

    #[serde(default)]
    pub host: Option<String>,

    /// Default: 5432 (5439 for Redshift).
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub user: Option<String>,

    /// dbt's postgres and redshift profiles spell this `pass`.
    #[serde(default, alias = "pass")]
    pub password: Option<String>,

    /// Default database; BigQuery profiles call it `project`.
    #[serde(default, alias = "dbname", alias = "project")]
    pub database: Option<String>,

    #[serde(default, alias = "dataset")]
    pub schema: Option<String>,

    /// `disable`, `prefer`, `require`, `verify-ca` or `verify-full`.
    #[serde(default)]
    pub sslmode: Option<String>,
}

impl OutputConfig {
    pub fn backend(&self) -> Result<Backend> {
        Backend::from_type(&self.db_type)
    }

    /// The database used when an archive group omits one.
    pub fn default_database(&self) -> Result<&str> {
        self.database
            .as_deref()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| MigrateError::Config("output database is required".into()))
    }

    pub fn port_or_default(&self, backend: Backend) -> u16 {
        self.port.unwrap_or(match backend {
            Backend::Redshift => 5439,
            _ => 5432,
        })
    }
}

impl fmt::Debug for OutputConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputConfig")
            .field("db_type", &self.db_type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("sslmode", &self.sslmode)
            .finish()
    }
}

fn default_snapshot_paths() -> Vec<String> {
    vec!["snapshots".to_string()]
}
