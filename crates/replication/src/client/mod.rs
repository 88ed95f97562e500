//! Clients for talking to catalog replicas.

pub mod http;
pub mod memory;

pub use http::HttpCatalogClient;
pub use memory::InMemoryCatalogCluster;

use async_trait::async_trait;
use common::{CatalogItem, ItemId, ItemInfo, SyncMessage, UpdateRequest};

use crate::error::ClientError;

/// Operations the coordinator and replicas perform against a catalog replica
/// identified by its address.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Reads an item. Returns `Ok(None)` if the replica does not know it.
    async fn fetch_item(&self, replica: &str, id: &ItemId) -> Result<Option<ItemInfo>, ClientError>;

    /// Writes an item on the replica as a peer-originated update, so the
    /// replica applies it locally without fanning it out again.
    async fn update_item(
        &self,
        replica: &str,
        id: &ItemId,
        request: &UpdateRequest,
    ) -> Result<CatalogItem, ClientError>;

    /// Delivers a sync message to a peer replica.
    async fn sync_item(&self, replica: &str, message: &SyncMessage) -> Result<(), ClientError>;
}
