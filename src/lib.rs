//! Object-relational persistence for accounting books on SQLite.
//!
//! Each persisted object kind has a [`TypeHandler`](handler::TypeHandler)
//! that owns its tables. A [`Session`](session::Session) holds the open
//! database and the attached [`Book`](bookdb_core::Book), and dispatches
//! loads, commits, full rebuilds and queries to the handlers by type tag.

pub mod commit;
pub mod config;
pub mod filter;
pub mod handler;
pub mod handlers;
pub mod locator;
pub mod query;
pub mod session;
pub mod sync;

pub use handler::{HandlerRegistry, RegistryError, TypeHandler};
pub use handlers::standard_registry;
pub use locator::{Locator, LocatorError, SqliteTarget};
pub use query::{compile_query, CompiledQuery, NativeQuery};
pub use session::Session;
pub use sync::SyncReport;
