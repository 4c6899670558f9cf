//! Legacy-to-snapshot column rename mapping.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result};

/// Columns the legacy archive mechanism wrote, and their snapshot names.
pub const LEGACY_RENAMES: [(&str, &str); 3] = [
    ("valid_from", "dbt_valid_from"),
    ("valid_to", "dbt_valid_to"),
    ("scd_id", "dbt_scd_id"),
];

/// One `old -> new` column rename.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRename {
    pub from: String,
    pub to: String,
}

impl fmt::Display for ColumnRename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Ordered list of column renames applied to an archive table.
///
/// Order only affects the generated SQL; the renames are independent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameMapping {
    pairs: Vec<ColumnRename>,
}

impl RenameMapping {
    /// The three legacy renames every backend applies.
    pub fn legacy() -> Self {
        Self {
            pairs: LEGACY_RENAMES
                .iter()
                .map(|(from, to)| ColumnRename {
                    from: (*from).to_string(),
                    to: (*to).to_string(),
                })
                .collect(),
        }
    }

    /// Append a rename.
    pub fn with_pair(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.pairs.push(ColumnRename {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    pub fn pairs(&self) -> &[ColumnRename] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Check that no column is renamed twice and that none of the renamed
    /// columns is one of `reserved` (unique key, updated_at).
    pub fn validate(&self, reserved: &[&str]) -> Result<()> {
        let mut seen = HashSet::new();
        for pair in &self.pairs {
            if !seen.insert(pair.from.as_str()) {
                return Err(MigrateError::Config(format!(
                    "column '{}' is renamed more than once",
                    pair.from
                )));
            }
            if reserved.contains(&pair.from.as_str()) {
                return Err(MigrateError::Config(format!(
                    "column '{}' is both a legacy archive column and a unique_key/updated_at column",
                    pair.from
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_mapping_order() {
        let mapping = RenameMapping::legacy();
        let rendered: Vec<String> = mapping.pairs().iter().map(|p| p.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "valid_from -> dbt_valid_from",
                "valid_to -> dbt_valid_to",
                "scd_id -> dbt_scd_id",
            ]
        );
    }

    #[test]
    fn test_with_pair_appends() {
        let mapping = RenameMapping::legacy().with_pair("dbt_updated_at", "dbt_updated_at");
        assert_eq!(mapping.len(), 4);
        assert_eq!(
            mapping.pairs().last().map(|p| p.to_string()).as_deref(),
            Some("dbt_updated_at -> dbt_updated_at")
        );
    }

    #[test]
    fn test_validate_rejects_duplicate_source() {
        let mapping = RenameMapping::legacy().with_pair("valid_to", "something_else");
        let err = mapping.validate(&[]).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_validate_rejects_reserved_collision() {
        let mapping = RenameMapping::legacy();
        assert!(mapping.validate(&["id", "updated_at"]).is_ok());
        let err = mapping.validate(&["scd_id", "updated_at"]).unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
    }
}
