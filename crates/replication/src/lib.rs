//! Catalog replication and purchase coordination.
//!
//! The order server drives purchases through a [`PurchaseCoordinator`]:
//! 1. Pick a catalog replica round-robin and read the item
//! 2. Reject missing or out-of-stock items
//! 3. Invalidate the frontend cache (best effort)
//! 4. Write the decremented stock back to the same replica
//! 5. Record the sale in the order ledger
//! 6. Fan the new stock out to every other replica (best effort)
//!
//! Catalog servers host a [`CatalogReplica`], which serves reads, applies
//! direct updates (fanning them out to peers) and accepts peer syncs through
//! its [`SyncReceiver`].

pub mod client;
pub mod coordinator;
pub mod error;
pub mod fanout;
pub mod notifier;
pub mod replica;
pub mod selector;
pub mod sync;

pub use client::{CatalogClient, HttpCatalogClient, InMemoryCatalogCluster};
pub use coordinator::{PurchaseCoordinator, PurchaseOptions, PurchaseReceipt, StockWriteMode};
pub use error::{ClientError, PurchaseError, ReplicaError, SelectorError};
pub use fanout::{FanOutReport, PeerFanOut};
pub use notifier::{CacheNotifier, CacheSink, HttpCacheSink, RecordingCacheSink};
pub use replica::{CatalogReplica, SearchHit};
pub use selector::{ReplicaEndpoint, ReplicaSelector};
pub use sync::SyncReceiver;
