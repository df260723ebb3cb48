//! Built-in type handlers, one per persisted object kind.

use std::sync::Arc;

use bookdb_core::{BackendError, Instance};
use bookdb_sqlite::{codec::guid_to_str, SqliteStore};
use rusqlite::params;

use crate::{
    handler::{HandlerRegistry, RegistryError},
    query::CompiledQuery,
};

pub mod account;
pub mod book;
pub mod budget;
pub mod commodity;
pub mod price;
pub mod schedxaction;
pub mod slots;
pub mod transaction;

pub use account::AccountHandler;
pub use book::BookHandler;
pub use budget::BudgetHandler;
pub use commodity::CommodityHandler;
pub use price::PriceHandler;
pub use schedxaction::SchedXactionHandler;
pub use slots::SlotHandler;
pub use transaction::{TransactionHandler, TransactionQuery};

/// A registry holding every built-in handler.
pub fn standard_registry() -> Result<HandlerRegistry, RegistryError> {
    let registry = HandlerRegistry::new();
    registry.register(Arc::new(BookHandler))?;
    registry.register(Arc::new(CommodityHandler))?;
    registry.register(Arc::new(AccountHandler))?;
    registry.register(Arc::new(BudgetHandler))?;
    registry.register(Arc::new(PriceHandler))?;
    registry.register(Arc::new(TransactionHandler))?;
    registry.register(Arc::new(SlotHandler))?;
    registry.register(Arc::new(SchedXactionHandler))?;
    Ok(registry)
}

/// SQL text of a generic compiled query. Handlers without a native query
/// type only ever receive those.
pub(crate) fn generic_sql(query: &CompiledQuery) -> Result<&str, BackendError> {
    match query {
        CompiledQuery::Sql { sql, .. } => Ok(sql),
        CompiledQuery::Native { search_for, .. } => Err(BackendError::BadQuery(format!(
            "native query for {} sent to a generic handler",
            search_for
        ))),
    }
}

pub(crate) fn wrong_kind(handler: &str, instance: &Instance) -> BackendError {
    BackendError::Misconfigured(format!(
        "{} handler received a {} instance",
        handler,
        instance.type_tag()
    ))
}

/// Remove one object's row and its slots.
pub(crate) fn delete_object(
    store: &SqliteStore,
    table: &str,
    instance: &Instance,
) -> Result<(), BackendError> {
    let guid = instance.guid();
    store.execute(
        &format!("DELETE FROM {} WHERE guid = ?1", table),
        params![guid_to_str(&guid)],
    )?;
    slots::delete(store, &guid)?;
    tracing::debug!(table, guid = %guid, "row deleted");
    Ok(())
}
