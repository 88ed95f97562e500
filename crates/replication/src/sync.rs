//! Receiving side of peer replication.

use std::sync::Arc;

use common::{SyncAck, SyncMessage, UpdateRequest, is_sync_marker};
use storage::{CatalogStore, UpdateOutcome};

use crate::error::ReplicaError;

/// Applies sync messages pushed by peer replicas to the local store.
///
/// Messages carry absolute values, so a duplicate delivery is harmless.
/// They carry no version either: when two messages for the same item arrive
/// out of order, whichever is applied last wins.
pub struct SyncReceiver<S> {
    store: Arc<S>,
}

impl<S> Clone for SyncReceiver<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: CatalogStore> SyncReceiver<S> {
    /// Creates a receiver writing into `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Applies a peer's sync message after checking the peer marker.
    ///
    /// Without a valid marker nothing is read or written.
    #[tracing::instrument(skip(self, marker, message), fields(item_id = %message.item_id))]
    pub async fn on_sync_update(
        &self,
        marker: Option<&str>,
        message: &SyncMessage,
    ) -> Result<SyncAck, ReplicaError> {
        if !is_sync_marker(marker) {
            metrics::counter!("sync_updates_rejected_total", "reason" => "unauthorized")
                .increment(1);
            tracing::warn!("sync update rejected: missing peer marker");
            return Err(ReplicaError::Unauthorized);
        }

        if message.patch.is_empty() {
            return match self.store.get(&message.item_id).await? {
                Some(_) => Ok(ack(message)),
                None => Err(ReplicaError::NotFound(message.item_id.clone())),
            };
        }

        let request = UpdateRequest::blind(message.patch.clone());
        match self.store.update(&message.item_id, &request).await? {
            UpdateOutcome::NotFound => {
                metrics::counter!("sync_updates_rejected_total", "reason" => "not_found")
                    .increment(1);
                tracing::warn!("sync update for unknown item");
                Err(ReplicaError::NotFound(message.item_id.clone()))
            }
            UpdateOutcome::Applied(item) => {
                metrics::counter!("sync_updates_applied_total").increment(1);
                tracing::info!(stock = item.stock, price = %item.price, "sync update applied");
                Ok(ack(message))
            }
            UpdateOutcome::Conflict { current_stock } => Err(ReplicaError::StockConflict {
                item_id: message.item_id.clone(),
                current_stock,
            }),
        }
    }
}

fn ack(message: &SyncMessage) -> SyncAck {
    SyncAck {
        ack: true,
        item_id: message.item_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{CatalogItem, ItemId, ItemPatch, SYNC_MARKER_VALUE};
    use rust_decimal::Decimal;
    use storage::InMemoryCatalogStore;

    fn receiver() -> (SyncReceiver<InMemoryCatalogStore>, InMemoryCatalogStore) {
        let store = InMemoryCatalogStore::with_items([CatalogItem::new(
            "B1",
            "science fiction",
            "Dune",
            Decimal::from(15),
            2,
        )]);
        (SyncReceiver::new(Arc::new(store.clone())), store)
    }

    fn stock(n: i64) -> SyncMessage {
        SyncMessage::new(ItemId::new("B1"), ItemPatch::stock(n))
    }

    #[tokio::test]
    async fn missing_marker_is_rejected_without_mutation() {
        let (receiver, store) = receiver();

        let result = receiver.on_sync_update(None, &stock(0)).await;
        assert!(matches!(result, Err(ReplicaError::Unauthorized)));

        let result = receiver.on_sync_update(Some("client"), &stock(0)).await;
        assert!(matches!(result, Err(ReplicaError::Unauthorized)));

        assert_eq!(store.stock_of("B1").await, Some(2));
    }

    #[tokio::test]
    async fn applies_stock_and_price() {
        let (receiver, store) = receiver();
        let message = SyncMessage::new(
            ItemId::new("B1"),
            ItemPatch {
                price: Some(Decimal::from(18)),
                stock: Some(5),
            },
        );

        let ack = receiver
            .on_sync_update(Some(SYNC_MARKER_VALUE), &message)
            .await
            .unwrap();
        assert!(ack.ack);
        assert_eq!(ack.item_id, ItemId::new("B1"));

        let item = store.get(&ItemId::new("B1")).await.unwrap().unwrap();
        assert_eq!(item.stock, 5);
        assert_eq!(item.price, Decimal::from(18));
    }

    #[tokio::test]
    async fn duplicate_delivery_is_idempotent() {
        let (receiver, store) = receiver();
        for _ in 0..2 {
            receiver
                .on_sync_update(Some(SYNC_MARKER_VALUE), &stock(1))
                .await
                .unwrap();
        }
        assert_eq!(store.stock_of("B1").await, Some(1));
    }

    #[tokio::test]
    async fn reordered_delivery_keeps_last_applied() {
        let (receiver, store) = receiver();

        // The newer state (0) overtakes the older one (1) in transit
        receiver
            .on_sync_update(Some(SYNC_MARKER_VALUE), &stock(0))
            .await
            .unwrap();
        receiver
            .on_sync_update(Some(SYNC_MARKER_VALUE), &stock(1))
            .await
            .unwrap();

        assert_eq!(store.stock_of("B1").await, Some(1));
    }

    #[tokio::test]
    async fn unknown_item_is_not_found() {
        let (receiver, _) = receiver();
        let message = SyncMessage::new(ItemId::new("B9"), ItemPatch::stock(1));

        let result = receiver
            .on_sync_update(Some(SYNC_MARKER_VALUE), &message)
            .await;
        assert!(matches!(result, Err(ReplicaError::NotFound(_))));
    }

    #[tokio::test]
    async fn empty_patch_is_acknowledged() {
        let (receiver, store) = receiver();
        let message = SyncMessage::new(ItemId::new("B1"), ItemPatch::default());

        receiver
            .on_sync_update(Some(SYNC_MARKER_VALUE), &message)
            .await
            .unwrap();
        assert_eq!(store.stock_of("B1").await, Some(2));
    }

    #[tokio::test]
    async fn storage_failure_surfaces() {
        let (receiver, store) = receiver();
        store.set_fail_on_write(true);

        let result = receiver
            .on_sync_update(Some(SYNC_MARKER_VALUE), &stock(0))
            .await;
        assert!(matches!(result, Err(ReplicaError::Storage(_))));
    }
}
