//! Curated business descriptions for tables and columns.
//!
//! File shape (YAML; a `.json` file with the same structure also loads):
//!
//! ```yaml
//! tables:
//!   - name: invoices
//!     description: One row per customer purchase.
//!     columns:
//!       - name: Total
//!         description: Invoice total in USD.
//! ```
//!
//! Entries for tables or columns that do not exist are ignored; missing
//! entries are simply omitted from the schema context.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::StoreError;

#[derive(Debug, Default, Deserialize)]
struct DescriptionsFile {
    #[serde(default)]
    tables: Vec<TableEntry>,
}

#[derive(Debug, Deserialize)]
struct TableEntry {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    columns: Vec<ColumnEntry>,
}

#[derive(Debug, Deserialize)]
struct ColumnEntry {
    name: String,
    description: String,
}

#[derive(Clone, Debug, Default)]
struct TableDescription {
    description: Option<String>,
    columns: HashMap<String, String>,
}

/// Lookup keyed by table name, then column name.
#[derive(Clone, Debug, Default)]
pub struct Descriptions {
    tables: HashMap<String, TableDescription>,
}

impl Descriptions {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_yaml(raw: &str) -> Result<Self, StoreError> {
        let file: DescriptionsFile = serde_yaml::from_str(raw)?;
        Ok(Self::from_file(file))
    }

    pub fn from_json(raw: &str) -> Result<Self, StoreError> {
        let file: DescriptionsFile = serde_json::from_str(raw)?;
        Ok(Self::from_file(file))
    }

    fn from_file(file: DescriptionsFile) -> Self {
        let tables = file
            .tables
            .into_iter()
            .map(|t| {
                let columns = t.columns.into_iter().map(|c| (c.name, c.description)).collect();
                (
                    t.name,
                    TableDescription {
                        description: t.description,
                        columns,
                    },
                )
            })
            .collect();
        Self { tables }
    }

    /// Load from disk, as JSON for a `.json` extension and YAML otherwise.
    /// A missing file yields an empty lookup.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no descriptions file, using live schema only");
                return Ok(Self::empty());
            }
            Err(e) => return Err(StoreError::Io(format!("{}: {e}", path.display()))),
        };
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let descriptions = if is_json {
            Self::from_json(&raw)?
        } else {
            Self::from_yaml(&raw)?
        };
        debug!(path = %path.display(), tables = descriptions.len(), "descriptions loaded");
        Ok(descriptions)
    }

    pub fn table(&self, table: &str) -> Option<&str> {
        self.tables.get(table)?.description.as_deref()
    }

    pub fn column(&self, table: &str, column: &str) -> Option<&str> {
        self.tables.get(table)?.columns.get(column).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
