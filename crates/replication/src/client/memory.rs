use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{CatalogItem, ItemId, ItemInfo, SyncMessage, UpdateRequest};
use storage::{CatalogStore, InMemoryCatalogStore, UpdateOutcome};
use tokio::sync::RwLock;

use super::CatalogClient;
use crate::error::ClientError;

#[derive(Debug, Default)]
struct ClusterState {
    replicas: HashMap<String, InMemoryCatalogStore>,
    unreachable: HashSet<String>,
    latency: HashMap<String, Duration>,
    syncs_received: HashMap<String, usize>,
}

/// A set of in-process catalog replicas addressed by name, for testing.
///
/// Each address maps to its own [`InMemoryCatalogStore`]. Addresses can be
/// made unreachable or slow to exercise the coordinator's failure paths.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalogCluster {
    state: Arc<RwLock<ClusterState>>,
}

impl InMemoryCatalogCluster {
    /// Creates an empty cluster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a replica under `address`, returning the store backing it.
    pub async fn add_replica(
        &self,
        address: impl Into<String>,
        items: impl IntoIterator<Item = CatalogItem>,
    ) -> InMemoryCatalogStore {
        let store = InMemoryCatalogStore::with_items(items);
        self.state
            .write()
            .await
            .replicas
            .insert(address.into(), store.clone());
        store
    }

    /// Makes calls to `address` fail as if the host were down.
    pub async fn set_unreachable(&self, address: &str, unreachable: bool) {
        let mut state = self.state.write().await;
        if unreachable {
            state.unreachable.insert(address.to_string());
        } else {
            state.unreachable.remove(address);
        }
    }

    /// Delays every call to `address` by `latency`.
    pub async fn set_latency(&self, address: &str, latency: Duration) {
        self.state
            .write()
            .await
            .latency
            .insert(address.to_string(), latency);
    }

    /// Returns the number of sync messages `address` has applied.
    pub async fn syncs_received(&self, address: &str) -> usize {
        self.state
            .read()
            .await
            .syncs_received
            .get(address)
            .copied()
            .unwrap_or(0)
    }

    async fn replica(&self, address: &str) -> Result<InMemoryCatalogStore, ClientError> {
        let (store, latency) = {
            let state = self.state.read().await;
            if state.unreachable.contains(address) {
                return Err(ClientError::Unreachable(format!("{address} is down")));
            }
            let store = state
                .replicas
                .get(address)
                .cloned()
                .ok_or_else(|| ClientError::Unreachable(format!("unknown replica {address}")))?;
            (store, state.latency.get(address).copied())
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(store)
    }
}

fn storage_failure(err: storage::StorageError) -> ClientError {
    ClientError::Status {
        status: 500,
        message: err.to_string(),
    }
}

#[async_trait]
impl CatalogClient for InMemoryCatalogCluster {
    async fn fetch_item(&self, replica: &str, id: &ItemId) -> Result<Option<ItemInfo>, ClientError> {
        let store = self.replica(replica).await?;
        let item = store.get(id).await.map_err(storage_failure)?;
        Ok(item.map(|i| i.info()))
    }

    async fn update_item(
        &self,
        replica: &str,
        id: &ItemId,
        request: &UpdateRequest,
    ) -> Result<CatalogItem, ClientError> {
        let store = self.replica(replica).await?;
        match store.update(id, request).await.map_err(storage_failure)? {
            UpdateOutcome::Applied(item) => Ok(item),
            UpdateOutcome::NotFound => Err(ClientError::NotFound),
            UpdateOutcome::Conflict { .. } => Err(ClientError::Conflict),
        }
    }

    async fn sync_item(&self, replica: &str, message: &SyncMessage) -> Result<(), ClientError> {
        let store = self.replica(replica).await?;
        let request = UpdateRequest::blind(message.patch.clone());
        match store
            .update(&message.item_id, &request)
            .await
            .map_err(storage_failure)?
        {
            UpdateOutcome::NotFound => Err(ClientError::NotFound),
            _ => {
                *self
                    .state
                    .write()
                    .await
                    .syncs_received
                    .entry(replica.to_string())
                    .or_default() += 1;
                Ok(())
            }
        }
    }
}
