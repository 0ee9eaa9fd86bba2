use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use tracing::info;

use crate::error::StoreError;
use crate::introspect::{self, TableInfo};

/// Thread-safe SQLite connection wrapper around the analysed database.
/// Uses parking_lot::Mutex for synchronous access (rusqlite is not Sync).
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl Database {
    /// Open an existing database file. Never creates one: a wrong path is a
    /// configuration mistake, not a request for an empty database.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if !path.is_file() {
            return Err(StoreError::NotFound(format!(
                "database file {} (check database.path in settings or SHERLOCK_DB_PATH)",
                path.display()
            )));
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        info!(path = %path.display(), "database opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_owned(),
        })
    }

    /// Open an empty in-memory database (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
        })
    }

    /// Execute a closure with the database connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn list_tables(&self) -> Result<Vec<String>, StoreError> {
        self.with_conn(introspect::list_tables)
    }

    /// Every user table with its columns, in name order.
    pub fn tables(&self) -> Result<Vec<TableInfo>, StoreError> {
        self.with_conn(|conn| {
            introspect::list_tables(conn)?
                .into_iter()
                .map(|name| introspect::table_info(conn, &name))
                .collect()
        })
    }

    pub fn table_ddl(&self, table: &str) -> Result<String, StoreError> {
        self.with_conn(|conn| introspect::table_info(conn, table).map(|t| t.ddl()))
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            path: self.path.clone(),
        }
    }
}
