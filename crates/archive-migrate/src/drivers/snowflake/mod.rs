//! Snowflake driver.
//!
//! Only the dialect is compiled in; sessions are supplied by the caller
//! through the [`Session`](crate::core::Session) trait.

mod dialect;

pub use dialect::SnowflakeDialect;
