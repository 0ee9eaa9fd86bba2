//! Live schema metadata read from `sqlite_master` and `pragma_table_info`.

use rusqlite::Connection;

use crate::error::StoreError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// Declared type as written in the CREATE statement; empty when untyped.
    pub decl_type: String,
    pub not_null: bool,
    /// 1-based position within the primary key, 0 when not part of it.
    pub pk_position: u32,
}

impl ColumnInfo {
    pub fn type_label(&self) -> &str {
        if self.decl_type.is_empty() {
            "ANY"
        } else {
            &self.decl_type
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableInfo {
    pub fn primary_key(&self) -> Vec<&str> {
        let mut pk: Vec<&ColumnInfo> = self.columns.iter().filter(|c| c.pk_position > 0).collect();
        pk.sort_by_key(|c| c.pk_position);
        pk.into_iter().map(|c| c.name.as_str()).collect()
    }

    /// Reconstructed CREATE TABLE statement, primary key as a table constraint.
    pub fn ddl(&self) -> String {
        let mut lines: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let mut line = format!("    {} {}", c.name, c.type_label());
                if c.not_null {
                    line.push_str(" NOT NULL");
                }
                line
            })
            .collect();
        let pk = self.primary_key();
        if !pk.is_empty() {
            lines.push(format!("    PRIMARY KEY ({})", pk.join(", ")));
        }
        format!("CREATE TABLE {} (\n{}\n)", self.name, lines.join(",\n"))
    }
}

/// User tables in name order. SQLite internals (`sqlite_%`) are excluded.
pub fn list_tables(conn: &Connection) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
         ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(names)
}

pub fn table_info(conn: &Connection, table: &str) -> Result<TableInfo, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid",
    )?;
    let columns = stmt
        .query_map([table], |row| {
            Ok(ColumnInfo {
                name: row.get(0)?,
                decl_type: row.get(1)?,
                not_null: row.get(2)?,
                pk_position: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    if columns.is_empty() {
        return Err(StoreError::NotFound(format!("table {table}")));
    }

    Ok(TableInfo {
        name: table.to_owned(),
        columns,
    })
}
