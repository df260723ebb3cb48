use std::{collections::HashMap, sync::{Arc, RwLock}};

use bookdb_core::{BackendError, Book, Instance, QueryExpression, BACKEND_VERSION};
use bookdb_sqlite::SqliteStore;
use thiserror::Error;
use uuid::Uuid;

use crate::query::{CompiledQuery, NativeQuery};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("handler for {type_tag} has version {found}, expected {expected}")]
    VersionMismatch {
        type_tag: String,
        found: u32,
        expected: u32,
    },
}

/// Persistence operations for one object kind.
///
/// Every operation is optional. The defaults mean "this type does not
/// support that operation" and are treated as no-ops by the backend, except
/// for [`commit`](TypeHandler::commit) where a missing implementation leaves
/// the object without a handler.
pub trait TypeHandler: Send + Sync {
    fn type_tag(&self) -> &str;

    fn version(&self) -> u32 {
        BACKEND_VERSION
    }

    /// Create this type's tables. Must succeed when they already exist.
    fn create_tables(&self, _store: &SqliteStore) -> Result<(), BackendError> {
        Ok(())
    }

    fn initial_load(&self, _store: &SqliteStore, _book: &mut Book) -> Result<(), BackendError> {
        Ok(())
    }

    /// Write (or delete, when destroying) one instance. `None` when this
    /// type cannot be committed.
    fn commit(
        &self,
        _store: &SqliteStore,
        _instance: &Instance,
    ) -> Option<Result<(), BackendError>> {
        None
    }

    /// Bring dependent rows in line with an instance that is not dirty.
    fn commit_children(&self, _store: &SqliteStore, _instance: &Instance) -> Result<(), BackendError> {
        Ok(())
    }

    fn compile_query(&self, _query: &QueryExpression) -> Option<NativeQuery> {
        None
    }

    /// Materialize the objects matched by `query` into `book`, returning
    /// their GUIDs.
    fn run_query(
        &self,
        _store: &SqliteStore,
        _book: &mut Book,
        _query: &CompiledQuery,
    ) -> Result<Vec<Uuid>, BackendError> {
        Ok(Vec::new())
    }

    /// Release a query compiled by this handler. Returns `false` when the
    /// handler leaves release to the generic path.
    fn free_query(&self, _query: &CompiledQuery) -> bool {
        false
    }
}

/// Handlers keyed by type tag. Built once at start-up and shared by every
/// session.
pub struct HandlerRegistry {
    handlers: Arc<RwLock<HashMap<String, Arc<dyn TypeHandler>>>>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry {
    pub fn new() -> HandlerRegistry {
        HandlerRegistry {
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Store a handler under its type tag, replacing any previous one.
    pub fn register(&self, handler: Arc<dyn TypeHandler>) -> Result<(), RegistryError> {
        let type_tag = handler.type_tag().to_string();
        if handler.version() != BACKEND_VERSION {
            return Err(RegistryError::VersionMismatch {
                type_tag,
                found: handler.version(),
                expected: BACKEND_VERSION,
            });
        }

        let mut lock = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        if lock.insert(type_tag.clone(), handler).is_some() {
            tracing::debug!(type_tag = %type_tag, "handler replaced");
        }
        Ok(())
    }

    /// Exact-tag lookup. `None` means the type is not persisted.
    pub fn lookup(&self, type_tag: &str) -> Option<Arc<dyn TypeHandler>> {
        let lock = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        lock.get(type_tag).cloned()
    }

    /// Invoke `f` once per registered handler, in type-tag order. The lock
    /// is not held while `f` runs.
    pub fn for_each<F: FnMut(&str, &Arc<dyn TypeHandler>)>(&self, mut f: F) {
        for (tag, handler) in self.snapshot() {
            f(&tag, &handler);
        }
    }

    pub fn type_tags(&self) -> Vec<String> {
        self.snapshot().into_iter().map(|(tag, _)| tag).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<(String, Arc<dyn TypeHandler>)> {
        let lock = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        let mut entries: Vec<_> = lock.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    struct Named(&'static str, u32);

    impl TypeHandler for Named {
        fn type_tag(&self) -> &str {
            self.0
        }

        fn version(&self) -> u32 {
            self.1
        }
    }

    #[test]
    fn lookup_returns_exact_handler_for_every_tag() {
        let registry = HandlerRegistry::new();
        let tags = ["Price", "Account", "Trans", "Budget"];
        let handlers: Vec<Arc<dyn TypeHandler>> = tags
            .iter()
            .map(|t| Arc::new(Named(*t, BACKEND_VERSION)) as Arc<dyn TypeHandler>)
            .collect();
        for h in &handlers {
            registry.register(h.clone()).unwrap();
        }

        for (tag, handler) in tags.iter().zip(&handlers) {
            let found = registry.lookup(tag).unwrap();
            assert!(Arc::ptr_eq(&found, handler));
        }
        assert!(registry.lookup("Lot").is_none());
    }

    #[test]
    fn for_each_visits_every_tag_once() {
        let registry = HandlerRegistry::new();
        for tag in ["Trans", "Account", "Price"] {
            registry.register(Arc::new(Named(tag, BACKEND_VERSION))).unwrap();
        }

        let mut seen: HashMap<String, usize> = HashMap::new();
        registry.for_each(|tag, handler| {
            assert_eq!(tag, handler.type_tag());
            *seen.entry(tag.to_string()).or_default() += 1;
        });
        assert_eq!(seen.len(), 3);
        assert!(seen.values().all(|&n| n == 1));
        assert_eq!(registry.type_tags(), vec!["Account", "Price", "Trans"]);
    }

    #[test]
    fn duplicate_registration_overwrites() {
        let registry = HandlerRegistry::new();
        let first: Arc<dyn TypeHandler> = Arc::new(Named("Account", BACKEND_VERSION));
        let second: Arc<dyn TypeHandler> = Arc::new(Named("Account", BACKEND_VERSION));
        registry.register(first).unwrap();
        registry.register(second.clone()).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(Arc::ptr_eq(&registry.lookup("Account").unwrap(), &second));
    }

    #[test]
    fn version_mismatch_is_rejected_at_registration() {
        let registry = HandlerRegistry::new();
        let err = registry
            .register(Arc::new(Named("Account", BACKEND_VERSION + 1)))
            .unwrap_err();
        assert!(matches!(err, RegistryError::VersionMismatch { .. }));
        assert!(registry.is_empty());
    }
}
