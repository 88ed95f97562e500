//! A catalog replica: local reads, direct updates and peer syncs.

use std::sync::Arc;
use std::time::Duration;

use common::{
    CatalogItem, ItemId, ItemInfo, SyncAck, SyncMessage, UpdateRequest, is_sync_marker,
};
use serde::Serialize;
use storage::{CatalogStore, UpdateOutcome};

use crate::client::CatalogClient;
use crate::error::ReplicaError;
use crate::fanout::PeerFanOut;
use crate::notifier::{CacheNotifier, CacheSink};
use crate::sync::SyncReceiver;

/// One entry of a topic search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub id: ItemId,
    pub title: String,
}

/// The catalog service hosted by each replica.
///
/// Direct updates (no peer marker) invalidate the frontend cache and are
/// fanned out to every peer. Updates carrying the marker come from the order
/// coordinator or another replica and are applied locally only.
pub struct CatalogReplica<S, C, K> {
    store: Arc<S>,
    receiver: SyncReceiver<S>,
    peers: Vec<String>,
    fanout: PeerFanOut<C>,
    notifier: CacheNotifier<K>,
}

impl<S, C, K> CatalogReplica<S, C, K>
where
    S: CatalogStore,
    C: CatalogClient,
    K: CacheSink,
{
    /// Creates a replica serving `store` with the given peer addresses.
    pub fn new(
        store: Arc<S>,
        peers: Vec<String>,
        client: C,
        sink: K,
        call_timeout: Duration,
        fanout_concurrency: usize,
    ) -> Self {
        Self {
            receiver: SyncReceiver::new(Arc::clone(&store)),
            store,
            peers,
            fanout: PeerFanOut::new(Arc::new(client), call_timeout, fanout_concurrency),
            notifier: CacheNotifier::new(sink, call_timeout),
        }
    }

    /// Returns the public view of an item.
    pub async fn info(&self, id: &ItemId) -> Result<ItemInfo, ReplicaError> {
        self.store
            .get(id)
            .await?
            .map(|item| item.info())
            .ok_or_else(|| ReplicaError::NotFound(id.clone()))
    }

    /// Returns the items filed under `topic`.
    pub async fn search(&self, topic: &str) -> Result<Vec<SearchHit>, ReplicaError> {
        let items = self.store.search(topic).await?;
        Ok(items
            .into_iter()
            .map(|item| SearchHit {
                id: item.id,
                title: item.title,
            })
            .collect())
    }

    /// Applies an update to the local store.
    ///
    /// Unless the request carries the peer marker, the frontend cache is
    /// invalidated and the change is pushed to every peer once persisted.
    #[tracing::instrument(skip(self, id, request, marker), fields(item_id = %id))]
    pub async fn update(
        &self,
        id: &ItemId,
        request: &UpdateRequest,
        marker: Option<&str>,
    ) -> Result<CatalogItem, ReplicaError> {
        let from_peer = is_sync_marker(marker);

        let item = match self.store.update(id, request).await? {
            UpdateOutcome::Applied(item) => item,
            UpdateOutcome::NotFound => return Err(ReplicaError::NotFound(id.clone())),
            UpdateOutcome::Conflict { current_stock } => {
                tracing::info!(
                    current_stock,
                    expected = ?request.expected_stock,
                    "conditional update rejected"
                );
                return Err(ReplicaError::StockConflict {
                    item_id: id.clone(),
                    current_stock,
                });
            }
        };
        tracing::info!(stock = item.stock, price = %item.price, from_peer, "item updated");

        if !from_peer && !request.patch.is_empty() {
            self.notifier.notify(id).await;
            let message = SyncMessage::new(id.clone(), request.patch.clone());
            self.fanout.broadcast(&self.peers, &message).await;
        }

        Ok(item)
    }

    /// Applies a peer's sync message.
    pub async fn sync_update(
        &self,
        marker: Option<&str>,
        message: &SyncMessage,
    ) -> Result<SyncAck, ReplicaError> {
        self.receiver.on_sync_update(marker, message).await
    }

    /// Returns every item held by this replica.
    pub async fn items(&self) -> Result<Vec<CatalogItem>, ReplicaError> {
        Ok(self.store.list().await?)
    }

    /// Returns the configured peer addresses.
    pub fn peers(&self) -> &[String] {
        &self.peers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryCatalogCluster;
    use crate::notifier::RecordingCacheSink;
    use common::{ItemPatch, SYNC_MARKER_VALUE};
    use rust_decimal::Decimal;
    use storage::InMemoryCatalogStore;

    struct Harness {
        replica: CatalogReplica<InMemoryCatalogStore, InMemoryCatalogCluster, RecordingCacheSink>,
        local: InMemoryCatalogStore,
        peer_b: InMemoryCatalogStore,
        peer_c: InMemoryCatalogStore,
        cluster: InMemoryCatalogCluster,
        sink: RecordingCacheSink,
    }

    fn items() -> Vec<CatalogItem> {
        vec![
            CatalogItem::new("B1", "science fiction", "Dune", Decimal::from(15), 2),
            CatalogItem::new("B2", "history", "SPQR", Decimal::from(22), 4),
        ]
    }

    async fn setup() -> Harness {
        let cluster = InMemoryCatalogCluster::new();
        let peer_b = cluster.add_replica("b", items()).await;
        let peer_c = cluster.add_replica("c", items()).await;
        let local = InMemoryCatalogStore::with_items(items());
        let sink = RecordingCacheSink::new();

        let replica = CatalogReplica::new(
            Arc::new(local.clone()),
            vec!["b".to_string(), "c".to_string()],
            cluster.clone(),
            sink.clone(),
            Duration::from_millis(200),
            4,
        );

        Harness {
            replica,
            local,
            peer_b,
            peer_c,
            cluster,
            sink,
        }
    }

    #[tokio::test]
    async fn info_and_search() {
        let h = setup().await;

        let info = h.replica.info(&ItemId::new("B1")).await.unwrap();
        assert_eq!(info.title, "Dune");
        assert_eq!(info.quantity, 2);

        let hits = h.replica.search("History").await.unwrap();
        assert_eq!(
            hits,
            vec![SearchHit {
                id: ItemId::new("B2"),
                title: "SPQR".to_string()
            }]
        );

        let missing = h.replica.info(&ItemId::new("B9")).await;
        assert!(matches!(missing, Err(ReplicaError::NotFound(_))));
    }

    #[tokio::test]
    async fn direct_update_fans_out_and_invalidates() {
        let h = setup().await;

        let item = h
            .replica
            .update(
                &ItemId::new("B1"),
                &UpdateRequest::blind(ItemPatch::stock(9)),
                None,
            )
            .await
            .unwrap();
        assert_eq!(item.stock, 9);

        assert_eq!(h.local.stock_of("B1").await, Some(9));
        assert_eq!(h.peer_b.stock_of("B1").await, Some(9));
        assert_eq!(h.peer_c.stock_of("B1").await, Some(9));
        assert_eq!(h.sink.invalidated().await, vec![ItemId::new("B1")]);
    }

    #[tokio::test]
    async fn marked_update_stays_local() {
        let h = setup().await;

        h.replica
            .update(
                &ItemId::new("B1"),
                &UpdateRequest::blind(ItemPatch::stock(1)),
                Some(SYNC_MARKER_VALUE),
            )
            .await
            .unwrap();

        assert_eq!(h.local.stock_of("B1").await, Some(1));
        assert_eq!(h.peer_b.stock_of("B1").await, Some(2));
        assert_eq!(h.cluster.syncs_received("b").await, 0);
        assert!(h.sink.invalidated().await.is_empty());
    }

    #[tokio::test]
    async fn direct_update_survives_unreachable_peer() {
        let h = setup().await;
        h.cluster.set_unreachable("b", true).await;

        h.replica
            .update(
                &ItemId::new("B1"),
                &UpdateRequest::blind(ItemPatch::stock(0)),
                None,
            )
            .await
            .unwrap();

        assert_eq!(h.peer_b.stock_of("B1").await, Some(2));
        assert_eq!(h.peer_c.stock_of("B1").await, Some(0));
    }

    #[tokio::test]
    async fn stale_token_is_a_conflict() {
        let h = setup().await;

        let result = h
            .replica
            .update(
                &ItemId::new("B1"),
                &UpdateRequest::compare_and_set_stock(5, 4),
                Some(SYNC_MARKER_VALUE),
            )
            .await;
        assert!(matches!(
            result,
            Err(ReplicaError::StockConflict {
                current_stock: 2,
                ..
            })
        ));
        assert_eq!(h.local.stock_of("B1").await, Some(2));
    }

    #[tokio::test]
    async fn update_of_unknown_item() {
        let h = setup().await;
        let result = h
            .replica
            .update(
                &ItemId::new("B9"),
                &UpdateRequest::blind(ItemPatch::stock(1)),
                None,
            )
            .await;
        assert!(matches!(result, Err(ReplicaError::NotFound(_))));
        assert!(h.sink.invalidated().await.is_empty());
    }
}
