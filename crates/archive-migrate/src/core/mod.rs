//! Core abstractions for backend-agnostic archive migration.
//!
//! - [`identifier`]: identifier validation and quoting helpers
//! - [`relation`]: three-part table addresses with per-part quoting
//! - [`mapping`]: the legacy-to-snapshot column rename mapping
//! - [`capability`]: the static per-backend capability table
//! - [`traits`]: the `Dialect` and `Session` traits drivers implement
//!
//! The core module knows nothing about a particular warehouse; driver
//! modules (`drivers/postgres`, `drivers/bigquery`, ...) implement the traits
//! defined here.

pub mod capability;
pub mod identifier;
pub mod mapping;
pub mod relation;
pub mod traits;

pub use capability::{Backend, Capability};
pub use mapping::{ColumnRename, RenameMapping, LEGACY_RENAMES};
pub use relation::{QuotePolicy, QuoteStyle, TableReference};
pub use traits::{Dialect, Session};
