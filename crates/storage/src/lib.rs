//! Durable state for the bookstore services.
//!
//! Two collaborators live here: the per-replica [`CatalogStore`] that maps item
//! IDs to title, price and stock, and the append-only [`OrderLedger`] kept by
//! the order coordinator. Both come in an in-memory flavour for tests and a
//! file-backed flavour that persists before every write returns.

pub mod catalog;
pub mod error;
pub mod file;
pub mod ledger;
pub mod memory;

pub use catalog::{CatalogStore, UpdateOutcome};
pub use error::{Result, StorageError};
pub use file::{FileCatalogStore, FileOrderLedger};
pub use ledger::OrderLedger;
pub use memory::{InMemoryCatalogStore, InMemoryOrderLedger};
