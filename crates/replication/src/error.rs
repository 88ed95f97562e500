//! Replication error types.

use common::{ItemId, OrderId};
use storage::StorageError;
use thiserror::Error;

/// Errors returned by a [`CatalogClient`](crate::CatalogClient) or a
/// [`CacheSink`](crate::CacheSink) call.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The replica has no item with the requested ID.
    #[error("Item not found on replica")]
    NotFound,

    /// A compare-and-set write found a different stock level.
    #[error("Stock changed since it was read")]
    Conflict,

    /// The peer rejected the request because the sync marker was missing.
    #[error("Peer rejected request: sync marker missing")]
    Unauthorized,

    /// The call did not complete within its timeout.
    #[error("Request timed out")]
    Timeout,

    /// The remote endpoint could not be reached.
    #[error("Endpoint unreachable: {0}")]
    Unreachable(String),

    /// The remote endpoint answered with an unexpected status.
    #[error("Unexpected status {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("Invalid response body: {0}")]
    Decode(String),
}

impl ClientError {
    /// Returns true if the failure says nothing about the remote's state,
    /// only that it could not be talked to.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Timeout | ClientError::Unreachable(_))
    }
}

/// Configuration errors raised when building a replica selector.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    /// The replica list is empty.
    #[error("No catalog replicas configured")]
    NoReplicas,

    /// A replica address is blank.
    #[error("Replica address at position {0} is empty")]
    EmptyAddress(usize),
}

/// Errors that can occur during a purchase.
#[derive(Debug, Error)]
pub enum PurchaseError {
    /// The item does not exist on the selected replica.
    #[error("Book {0} not found")]
    NotFound(ItemId),

    /// The selected replica reports no stock left.
    #[error("Book {0} out of stock")]
    OutOfStock(ItemId),

    /// The selected replica could not be reached or failed the call.
    #[error("Catalog replica {replica} unavailable: {reason}")]
    UpstreamUnavailable { replica: String, reason: String },

    /// The selected replica did not answer within the call timeout.
    #[error("Catalog replica {replica} timed out")]
    UpstreamTimeout { replica: String },

    /// A compare-and-set decrement lost a race with another writer.
    #[error("Stock of book {item_id} changed concurrently (expected {expected})")]
    StockConflict { item_id: ItemId, expected: i64 },

    /// The stock was decremented but the order could not be recorded.
    #[error("Failed to record order {order_id}: {source}")]
    Persistence {
        order_id: OrderId,
        #[source]
        source: StorageError,
    },
}

impl PurchaseError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PurchaseError::NotFound(_) => "not_found",
            PurchaseError::OutOfStock(_) => "out_of_stock",
            PurchaseError::UpstreamUnavailable { .. } => "upstream_unavailable",
            PurchaseError::UpstreamTimeout { .. } => "upstream_timeout",
            PurchaseError::StockConflict { .. } => "stock_conflict",
            PurchaseError::Persistence { .. } => "persistence",
        }
    }
}

/// Errors raised by a catalog replica while serving reads, updates or syncs.
#[derive(Debug, Error)]
pub enum ReplicaError {
    /// No item with the given ID exists on this replica.
    #[error("Item {0} not found")]
    NotFound(ItemId),

    /// The update carried an expected-stock token that did not match.
    #[error("Stock of item {item_id} is {current_stock}, not the expected value")]
    StockConflict { item_id: ItemId, current_stock: i64 },

    /// A sync request arrived without the peer-sync marker.
    #[error("Sync request is missing the peer marker")]
    Unauthorized,

    /// The local store failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
