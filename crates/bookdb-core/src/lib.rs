//! Core types for bookdb.
//!
//! This crate holds the in-memory object model persisted by the backend,
//! the structured query representation compiled into SQL, and the small
//! error vocabulary surfaced to callers.

pub mod backend;
pub mod models;
pub mod query;

// Re-export key types at crate root for convenience
pub use backend::{BackendError, ErrorCode, BACKEND_VERSION};
pub use models::book::{Book, Instance};
pub use models::{
    Account, AccountType, BookRecord, Budget, Commodity, Entity, ObjectKind, PeriodType, Price,
    Recurrence, ScheduledTransaction, SlotValue, Slots, Split, Transaction, SLOT_TYPE_TAG,
};
pub use query::{CompareOp, PredicateTerm, PredicateValue, QueryExpression};
