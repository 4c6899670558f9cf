//! Identifier validation and quoting shared by every dialect.
//!
//! Table and column names end up spliced into DDL (`ALTER TABLE ... RENAME`,
//! `CREATE TABLE ... AS`), where they cannot be bound as parameters. Every
//! name from the project configuration therefore goes through
//! [`validate_identifier`] when the plan is built, and every name written
//! into SQL goes through one of the quoting functions here.

use crate::error::{MigrateError, Result};

/// Maximum identifier length (conservative limit across warehouses).
/// - PostgreSQL / Redshift: 63 / 127 bytes
/// - Snowflake: 255 characters
/// - BigQuery: 1024 characters for tables
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier for security issues.
///
/// Rejects:
/// - Empty identifiers
/// - Identifiers containing null bytes (injection vector)
/// - Identifiers exceeding maximum length
///
/// # Errors
///
/// Returns `MigrateError::Config` for invalid identifiers with a descriptive message.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "SECURITY: Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote an identifier with ANSI double quotes.
///
/// Used by PostgreSQL, Redshift and Snowflake. Embedded double quotes are
/// doubled.
///
/// ```ignore
/// assert_eq!(quote_double("users"), "\"users\"");
/// assert_eq!(quote_double("table\"name"), "\"table\"\"name\"");
/// ```
pub fn quote_double(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote an identifier with BigQuery backticks.
///
/// BigQuery escapes with backslashes rather than by doubling, so both `\`
/// and `` ` `` are backslash-escaped.
pub fn quote_backtick(name: &str) -> String {
    format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
}

/// Render a string as a single-quoted literal for generated Jinja/SQL text.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}
