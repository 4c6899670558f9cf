//! Snapshot definition rendering.

use crate::config::UniqueKey;
use crate::core::identifier::quote_literal;
use crate::plan::MigrationSpec;

/// Renders the snapshot block that replaces a legacy archive entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefinitionGenerator;

impl DefinitionGenerator {
    pub fn new() -> Self {
        Self
    }

    /// File name for the definition: `<target_table>.sql`.
    pub fn file_name(&self, spec: &MigrationSpec) -> String {
        format!("{}.sql", spec.target.identifier())
    }

    /// Definition text. Pure: the same spec always renders the same text.
    pub fn render(&self, spec: &MigrationSpec) -> String {
        let kwargs = [
            ("target_database", quote_literal(spec.target.database())),
            ("target_schema", quote_literal(spec.target.schema())),
            ("updated_at", quote_literal(&spec.updated_at)),
            ("strategy", quote_literal("timestamp")),
            ("unique_key", render_key(&spec.unique_key)),
        ]
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ");

        format!(
            "{{% snapshot {name} %}}\n    {{{{\n        config({kwargs})\n    }}}}\n    select * from {source}\n{{% endsnapshot %}}\n",
            name = spec.target.identifier(),
            kwargs = kwargs,
            source = spec.source.render(),
        )
    }
}

fn render_key(key: &UniqueKey) -> String {
    match key {
        UniqueKey::Single(column) => quote_literal(column),
        UniqueKey::Composite(columns) => format!(
            "[{}]",
            columns
                .iter()
                .map(|c| quote_literal(c))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}
