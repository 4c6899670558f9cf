//! PostgreSQL driver (also serves Redshift).
//!
//! - [`PostgresDialect`]: SQL syntax strategy
//! - [`PgSession`]: live session over tokio-postgres

mod dialect;
mod session;

pub use dialect::PostgresDialect;
pub use session::PgSession;
