//! Utilities shared across drivers.
//!
//! - [`tls`]: TLS setup for PostgreSQL-protocol sessions

pub mod tls;

pub use tls::{SslMode, TlsBuilder};
