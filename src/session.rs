use std::{collections::BTreeMap, sync::Arc};

use bookdb_core::{BackendError, Book, ObjectKind};
use bookdb_sqlite::{SchemaInfo, SqliteStore};
use uuid::Uuid;

use crate::{
    handler::HandlerRegistry,
    locator::{Locator, SqliteTarget},
};

/// One open database plus the book attached to it.
///
/// The `loading` flag is set while objects are being reconstructed from
/// storage (initial load and query execution); commits are ignored while it
/// is set. `in_query` guards against a second query starting while one runs.
pub struct Session {
    pub(crate) registry: Arc<HandlerRegistry>,
    pub(crate) store: Option<SqliteStore>,
    schema: SchemaInfo,
    pub(crate) book: Option<Book>,
    pub(crate) loading: bool,
    pub(crate) in_query: bool,
    connections: BTreeMap<String, String>,
}

impl Session {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self {
            registry,
            store: None,
            schema: SchemaInfo::default(),
            book: None,
            loading: false,
            in_query: false,
            connections: BTreeMap::new(),
        }
    }

    /// Named connections available to `scheme://@name` locators.
    pub fn with_connections(mut self, connections: BTreeMap<String, String>) -> Self {
        self.connections = connections;
        self
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Open the database named by `locator`, creating it when allowed, and
    /// make sure every handler's tables exist.
    pub fn begin(&mut self, locator: &str, create_if_missing: bool) -> Result<(), BackendError> {
        let parsed = Locator::parse(locator)
            .map_err(|e| BackendError::NoSuchDatabase(e.to_string()))?;
        let store = match self.resolve(parsed)?.path() {
            None => SqliteStore::open_in_memory()?,
            Some(path) => match SqliteStore::open(&path) {
                Ok(store) => store,
                Err(e) if create_if_missing => {
                    tracing::debug!(path = %path.display(), error = %e, "open failed, creating database");
                    SqliteStore::create(&path).map_err(|e| {
                        tracing::error!(path = %path.display(), error = %e, "cannot create database");
                        BackendError::NoSuchDatabase(path.display().to_string())
                    })?
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "cannot open database");
                    return Err(BackendError::NoSuchDatabase(path.display().to_string()));
                }
            },
        };

        tracing::info!(locator, "session begin");
        self.connect(store);
        Ok(())
    }

    /// Open a private in-memory database.
    pub fn begin_in_memory(&mut self) -> Result<(), BackendError> {
        let store = SqliteStore::open_in_memory()?;
        self.connect(store);
        Ok(())
    }

    fn resolve(&self, locator: Locator) -> Result<SqliteTarget, BackendError> {
        match locator {
            Locator::Sqlite(target) => Ok(target),
            Locator::Named(name) => {
                let Some(target) = self.connections.get(&name) else {
                    return Err(BackendError::NoSuchDatabase(format!("@{}", name)));
                };
                match Locator::parse(target) {
                    Ok(Locator::Sqlite(target)) => Ok(target),
                    Ok(other) => Err(BackendError::NoSuchDatabase(format!(
                        "@{} resolves to {}",
                        name, other
                    ))),
                    Err(e) => Err(BackendError::NoSuchDatabase(e.to_string())),
                }
            }
            Locator::Unsupported { provider, target } => {
                tracing::warn!(provider = %provider, "unsupported database provider");
                Err(BackendError::NoSuchDatabase(format!("{}:{}", provider, target)))
            }
        }
    }

    fn connect(&mut self, store: SqliteStore) {
        if self.store.is_some() {
            self.end();
        }
        self.store = Some(store);
        if let Err(e) = self.refresh_schema() {
            tracing::error!(error = %e, "schema refresh failed");
        }
        self.create_all_tables();
        if let Err(e) = self.refresh_schema() {
            tracing::error!(error = %e, "schema refresh failed");
        }
    }

    /// Drop the schema cache and the connection. Safe to call at any time.
    pub fn end(&mut self) {
        self.schema = SchemaInfo::default();
        if let Some(store) = self.store.take() {
            tracing::info!(path = ?store.path(), "session end");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.store.is_some()
    }

    pub fn store(&self) -> Result<&SqliteStore, BackendError> {
        self.store.as_ref().ok_or(BackendError::NotConnected)
    }

    /// Re-read table and column metadata from the database.
    pub fn refresh_schema(&mut self) -> Result<(), BackendError> {
        let store = self.store.as_ref().ok_or(BackendError::NotConnected)?;
        self.schema = store.read_schema()?;
        tracing::debug!(tables = self.schema.len(), "schema refreshed");
        Ok(())
    }

    pub fn schema(&self) -> &SchemaInfo {
        &self.schema
    }

    /// Run every handler's `create_tables`. Failures are logged.
    pub(crate) fn create_all_tables(&self) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        self.registry.for_each(|tag, handler| {
            if let Err(e) = handler.create_tables(store) {
                tracing::error!(type_tag = tag, error = %e, "cannot create tables");
            }
        });
    }

    /// Read the whole database into a new book and attach it.
    ///
    /// The book record loads first so the other types find their roots.
    /// A database without a book record yields a book with fresh root
    /// accounts, which stay dirty until saved.
    pub fn load(&mut self) -> Result<&Book, BackendError> {
        if self.book.is_some() {
            return Err(BackendError::BookAlreadyAttached);
        }
        let store = self.store.as_ref().ok_or(BackendError::NotConnected)?;

        let mut book = Book::empty(Uuid::new_v4());
        book.suspend_events();
        self.loading = true;
        let result = load_book(&self.registry, store, &mut book);
        self.loading = false;
        book.resume_events();
        result?;

        book.init_roots();
        book.mark_saved();
        tracing::info!(objects = book.len(), "book loaded");
        Ok(self.book.insert(book))
    }

    pub fn attach(&mut self, book: Book) -> Result<(), BackendError> {
        if self.book.is_some() {
            return Err(BackendError::BookAlreadyAttached);
        }
        self.book = Some(book);
        Ok(())
    }

    pub fn detach(&mut self) -> Option<Book> {
        self.book.take()
    }

    pub fn book(&self) -> Option<&Book> {
        self.book.as_ref()
    }

    pub fn book_mut(&mut self) -> Option<&mut Book> {
        self.book.as_mut()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_querying(&self) -> bool {
        self.in_query
    }
}

fn load_book(
    registry: &HandlerRegistry,
    store: &SqliteStore,
    book: &mut Book,
) -> Result<(), BackendError> {
    let book_tag = ObjectKind::Book.type_tag();
    if let Some(handler) = registry.lookup(book_tag) {
        handler.initial_load(store, book)?;
    }

    let mut result = Ok(());
    registry.for_each(|tag, handler| {
        if tag == book_tag || result.is_err() {
            return;
        }
        tracing::debug!(type_tag = tag, "initial load");
        result = handler.initial_load(store, book);
    });
    result
}
