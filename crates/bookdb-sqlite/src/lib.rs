//! SQLite store for bookdb.
//!
//! Wraps a single `rusqlite` connection with the handful of operations the
//! backend needs: open or create a file, enumerate and drop tables, snapshot
//! schema metadata, and run statements. Column codecs shared by the type
//! handlers live in [`codec`].

pub mod codec;
pub mod error;
pub mod file_check;
pub mod schema;
pub mod store;

pub use error::StoreError;
pub use file_check::{check_sqlite_file, SQLITE_HEADER, SQLITE_SUFFIX};
pub use schema::{ColumnInfo, SchemaInfo};
pub use store::SqliteStore;
