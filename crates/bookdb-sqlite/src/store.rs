use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use rusqlite::{params, Connection, OpenFlags, Params, Row};

use crate::{
    schema::{ColumnInfo, SchemaInfo},
    StoreError,
};

/// A single open SQLite database.
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open an existing database file. Fails if the file does not exist.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::configure(conn, Some(path.to_path_buf()))
    }

    /// Create a database file (and any missing parent directory) and open it.
    pub fn create(path: &Path) -> Result<Self, StoreError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::configure(conn, Some(path.to_path_buf()))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::configure(Connection::open_in_memory()?, None)
    }

    fn configure(conn: Connection, path: Option<PathBuf>) -> Result<Self, StoreError> {
        if path.is_some() {
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            tracing::trace!(journal_mode = %mode, "journal mode set");
        }
        tracing::debug!(path = ?path, "SQLite store opened");
        Ok(Self { conn, path })
    }

    /// Backing file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// User tables, sorted by name.
    pub fn list_tables(&self) -> Result<Vec<String>, StoreError> {
        self.query_rows(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
            [],
            |row| row.get(0),
        )
    }

    pub fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        let exists = self.conn.query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub fn drop_table(&self, table: &str) -> Result<(), StoreError> {
        self.conn
            .execute_batch(&format!("DROP TABLE {}", quote_ident(table)))?;
        tracing::debug!(table, "table dropped");
        Ok(())
    }

    /// Read table and column metadata for every user table.
    pub fn read_schema(&self) -> Result<SchemaInfo, StoreError> {
        let mut tables = BTreeMap::new();
        for table in self.list_tables()? {
            let columns = self.query_rows(
                "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid",
                params![table],
                |row| {
                    Ok(ColumnInfo {
                        name: row.get(0)?,
                        decl_type: row.get(1)?,
                        not_null: row.get::<_, i64>(2)? != 0,
                        primary_key: row.get::<_, i64>(3)? != 0,
                    })
                },
            )?;
            tables.insert(table, columns);
        }
        Ok(SchemaInfo::new(tables))
    }

    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<usize, StoreError> {
        Ok(self.conn.execute(sql, params)?)
    }

    pub fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        Ok(self.conn.execute_batch(sql)?)
    }

    pub fn query_rows<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<Vec<T>, StoreError>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, f)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn count_rows(&self, table: &str) -> Result<i64, StoreError> {
        let count = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// Quote an identifier for inclusion in DDL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
