use tracing::{info, instrument};

use crate::database::Database;
use crate::descriptions::Descriptions;
use crate::error::StoreError;
use crate::introspect::TableInfo;

const HEADER: &str = "Here is the database schema you must use to answer the user's question:";

/// Merges live table metadata with curated descriptions into the grounding
/// text handed to SQL generation.
#[derive(Clone)]
pub struct SchemaContextProvider {
    db: Database,
    descriptions: Descriptions,
}

impl SchemaContextProvider {
    pub fn new(db: Database, descriptions: Descriptions) -> Self {
        Self { db, descriptions }
    }

    #[instrument(skip(self), fields(db = %self.db.path().display()))]
    pub fn describe_schema(&self) -> Result<String, StoreError> {
        let tables = self.db.tables()?;
        info!(tables = tables.len(), curated = self.descriptions.len(), "schema context built");
        Ok(render_schema(&tables, &self.descriptions))
    }
}

pub fn render_schema(tables: &[TableInfo], descriptions: &Descriptions) -> String {
    let mut out = vec![HEADER.to_string()];

    for table in tables {
        out.push(format!("\n--- Table: {} ---", table.name));
        if let Some(desc) = descriptions.table(&table.name) {
            out.push(format!("Description: {desc}"));
        }

        let col_defs: Vec<String> = table
            .columns
            .iter()
            .map(|col| {
                let mut line = format!("  {} ({})", col.name, col.type_label());
                if let Some(desc) = descriptions.column(&table.name, &col.name) {
                    line.push_str(" -- ");
                    line.push_str(desc);
                }
                line
            })
            .collect();
        out.push(format!("Columns:\n{}", col_defs.join("\n")));
    }

    out.join("\n")
}
