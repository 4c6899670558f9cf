//! Expansion of the project's `archive:` list into resolved work units.
//!
//! [`MigrationPlanBuilder::specs`] walks the groups lazily and yields one
//! [`MigrationSpec`] per table in file order. The first error stops the
//! walk; a group's missing schema is reported before any of its tables.

use std::collections::HashSet;

use serde::Serialize;

use crate::config::{ArchiveGroup, ArchiveTable, ProjectConfig, UniqueKey};
use crate::core::capability::Capability;
use crate::core::identifier::validate_identifier;
use crate::core::mapping::RenameMapping;
use crate::core::relation::{QuotePolicy, TableReference};
use crate::error::{MigrateError, Result};

/// One table's resolved migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationSpec {
    pub source: TableReference,
    pub target: TableReference,
    pub unique_key: UniqueKey,
    pub updated_at: String,
    pub mapping: RenameMapping,
}

/// Builds [`MigrationSpec`]s from project configuration.
pub struct MigrationPlanBuilder<'a> {
    project: &'a ProjectConfig,
    default_database: String,
    capability: Capability,
}

impl<'a> MigrationPlanBuilder<'a> {
    pub fn new(
        project: &'a ProjectConfig,
        default_database: impl Into<String>,
        capability: Capability,
    ) -> Self {
        Self {
            project,
            default_database: default_database.into(),
            capability,
        }
    }

    /// Quoting applied to every address: backend default, then the
    /// project's overrides.
    pub fn quote_policy(&self) -> QuotePolicy {
        match self.project.quoting {
            Some(ref quoting) => quoting.resolve(self.capability.default_quoting),
            None => self.capability.default_quoting,
        }
    }

    /// Lazily yield one spec per configured table.
    pub fn specs(&self) -> PlanIter<'_, 'a> {
        PlanIter {
            builder: self,
            group: 0,
            table: 0,
            current: None,
            seen: HashSet::new(),
            done: false,
        }
    }

    /// Resolve the whole plan, failing on the first error.
    pub fn build(&self) -> Result<Vec<MigrationSpec>> {
        self.specs().collect()
    }

    fn resolve_group(&self, index: usize, group: &ArchiveGroup) -> Result<ResolvedGroup> {
        let pick_database = |value: &Option<String>| -> String {
            value
                .clone()
                .unwrap_or_else(|| self.default_database.clone())
        };
        let require = |value: &Option<String>, field: &str| -> Result<String> {
            value.clone().ok_or_else(|| {
                MigrateError::Config(format!(
                    "archive group {}: {} is required",
                    index + 1,
                    field
                ))
            })
        };

        let resolved = ResolvedGroup {
            source_database: pick_database(&group.source_database),
            source_schema: require(&group.source_schema, "source_schema")?,
            target_database: pick_database(&group.target_database),
            target_schema: require(&group.target_schema, "target_schema")?,
        };
        for name in [
            &resolved.source_database,
            &resolved.source_schema,
            &resolved.target_database,
            &resolved.target_schema,
        ] {
            validate_identifier(name).map_err(|e| in_group(index, e))?;
        }
        Ok(resolved)
    }

    fn build_spec(
        &self,
        group_index: usize,
        group: &ResolvedGroup,
        table: &ArchiveTable,
    ) -> Result<MigrationSpec> {
        let require = |value: &Option<String>, field: &str| -> Result<String> {
            value.clone().ok_or_else(|| {
                MigrateError::Config(format!(
                    "archive group {}: table entry is missing {}",
                    group_index + 1,
                    field
                ))
            })
        };

        let source_table = require(&table.source_table, "source_table")?;
        let target_table = require(&table.target_table, "target_table")?;
        let updated_at = require(&table.updated_at, "updated_at")?;
        let unique_key = table.unique_key.clone().ok_or_else(|| {
            MigrateError::Config(format!(
                "archive group {}: table '{}' is missing unique_key",
                group_index + 1,
                target_table
            ))
        })?;

        for name in [&source_table, &target_table, &updated_at] {
            validate_identifier(name).map_err(|e| in_group(group_index, e))?;
        }
        if unique_key.columns().is_empty() {
            return Err(MigrateError::Config(format!(
                "archive group {}: table '{}' has an empty unique_key",
                group_index + 1,
                target_table
            )));
        }
        for column in unique_key.columns() {
            validate_identifier(column).map_err(|e| in_group(group_index, e))?;
        }

        let mapping = self.capability.rename_mapping();
        let mut reserved = unique_key.columns();
        reserved.push(&updated_at);
        mapping.validate(&reserved)?;

        let policy = self.quote_policy();
        let style = self.capability.quote_style;
        let source = TableReference::new(
            &group.source_database,
            &group.source_schema,
            &source_table,
        )
        .with_quoting(policy, style);
        let target = TableReference::new(
            &group.target_database,
            &group.target_schema,
            &target_table,
        )
        .with_quoting(policy, style);

        Ok(MigrationSpec {
            source,
            target,
            unique_key,
            updated_at,
            mapping,
        })
    }
}

fn in_group(index: usize, err: MigrateError) -> MigrateError {
    match err {
        MigrateError::Config(msg) => {
            MigrateError::Config(format!("archive group {}: {}", index + 1, msg))
        }
        other => other,
    }
}

struct ResolvedGroup {
    source_database: String,
    source_schema: String,
    target_database: String,
    target_schema: String,
}

/// Iterator returned by [`MigrationPlanBuilder::specs`].
pub struct PlanIter<'b, 'a> {
    builder: &'b MigrationPlanBuilder<'a>,
    group: usize,
    table: usize,
    current: Option<ResolvedGroup>,
    seen: HashSet<String>,
    done: bool,
}

impl Iterator for PlanIter<'_, '_> {
    type Item = Result<MigrationSpec>;

    fn next(&mut self) -> Option<Self::Item> {
        let builder = self.builder;
        while !self.done {
            let Some(group) = builder.project.archive.get(self.group) else {
                self.done = true;
                break;
            };

            if self.current.is_none() {
                match builder.resolve_group(self.group, group) {
                    Ok(resolved) => self.current = Some(resolved),
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                }
            }

            let Some(table) = group.tables.get(self.table) else {
                self.group += 1;
                self.table = 0;
                self.current = None;
                continue;
            };
            self.table += 1;

            let resolved = self.current.as_ref()?;
            let result = builder
                .build_spec(self.group, resolved, table)
                .and_then(|spec| {
                    if self.seen.insert(spec.target.full_name()) {
                        Ok(spec)
                    } else {
                        Err(MigrateError::Config(format!(
                            "target {} is configured more than once",
                            spec.target.full_name()
                        )))
                    }
                });
            if result.is_err() {
                self.done = true;
            }
            return Some(result);
        }
        None
    }
}
