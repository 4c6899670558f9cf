//! Live PostgreSQL / Redshift session over tokio-postgres.

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, Config as PgConfig, NoTls, SimpleQueryMessage};
use tracing::{debug, error};

use crate::config::OutputConfig;
use crate::core::capability::Backend;
use crate::core::relation::TableReference;
use crate::core::traits::Session;
use crate::drivers::common::TlsBuilder;
use crate::error::{MigrateError, Result};

/// A single PostgreSQL-protocol connection.
///
/// Statements go through the simple query protocol so that `begin` and
/// `commit` bracket the following statements on the same connection.
pub struct PgSession {
    client: Client,
    backend: Backend,
    database: String,
    connection: JoinHandle<()>,
}

impl PgSession {
    /// Connect using a profile output. `name` is reported to the server as
    /// the application name.
    pub async fn connect(output: &OutputConfig, backend: Backend, name: &str) -> Result<Self> {
        let database = output.default_database()?.to_string();
        let host = output
            .host
            .as_deref()
            .ok_or_else(|| MigrateError::Config("host is required".into()))?;
        let user = output
            .user
            .as_deref()
            .ok_or_else(|| MigrateError::Config("user is required".into()))?;

        let mut pg_config = PgConfig::new();
        pg_config
            .host(host)
            .port(output.port_or_default(backend))
            .user(user)
            .dbname(&database)
            .application_name(&format!("archive-migrate:{}", name));
        if let Some(ref password) = output.password {
            pg_config.password(password);
        }

        let tls = TlsBuilder::parse(output.sslmode.as_deref().unwrap_or("disable"))?.build()?;
        let (client, connection) = match tls {
            Some(connector) => {
                let (client, conn) = pg_config.connect(connector).await?;
                (client, tokio::spawn(drive(conn)))
            }
            None => {
                let (client, conn) = pg_config.connect(NoTls).await?;
                (client, tokio::spawn(drive(conn)))
            }
        };

        Ok(Self {
            client,
            backend,
            database,
            connection,
        })
    }
}

/// Poll the connection until it closes, logging abnormal termination.
async fn drive<F>(conn: F)
where
    F: std::future::Future<Output = std::result::Result<(), tokio_postgres::Error>>,
{
    if let Err(e) = conn.await {
        error!("Connection closed with error: {}", e);
    }
}

/// Name as the catalog stores it: unquoted identifiers fold to lower case.
fn catalog_name(name: &str, quoted: bool) -> String {
    if quoted {
        name.to_string()
    } else {
        name.to_lowercase()
    }
}

#[async_trait]
impl Session for PgSession {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn default_database(&self) -> &str {
        &self.database
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        debug!("Executing: {}", sql);
        let messages = self.client.simple_query(sql).await?;
        let affected = messages
            .iter()
            .map(|m| match m {
                SimpleQueryMessage::CommandComplete(n) => *n,
                _ => 0,
            })
            .sum();
        Ok(affected)
    }

    async fn table_exists(&mut self, table: &TableReference) -> Result<bool> {
        let policy = table.policy();
        let database = catalog_name(table.database(), policy.database);
        let schema = catalog_name(table.schema(), policy.schema);
        let name = catalog_name(table.identifier(), policy.identifier);

        let row = self
            .client
            .query_opt(
                "SELECT 1 FROM information_schema.tables \
                 WHERE table_catalog = $1 AND table_schema = $2 AND table_name = $3",
                &[&database, &schema, &name],
            )
            .await?;
        Ok(row.is_some())
    }
}

impl Drop for PgSession {
    fn drop(&mut self) {
        self.connection.abort();
    }
}
