//! Shared types for the catalog replicas and the order coordinator.

pub mod headers;
pub mod ids;
pub mod price;
pub mod types;

pub use headers::{SERVICE_ID_HEADER, SYNC_MARKER_HEADER, SYNC_MARKER_VALUE, is_sync_marker};
pub use ids::{OrderId, OrderIdGenerator, format_timestamp};
pub use types::{
    CatalogItem, ItemId, ItemInfo, ItemPatch, Price, PurchaseOrder, SyncAck, SyncMessage,
    UpdateRequest, UpdateResponse,
};
