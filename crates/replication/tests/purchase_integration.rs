//! Integration tests for purchase coordination across in-memory replicas.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{CatalogItem, ItemId, ItemInfo, SyncMessage, UpdateRequest};
use replication::{
    CatalogClient, ClientError, InMemoryCatalogCluster, PurchaseCoordinator, PurchaseError,
    PurchaseOptions, RecordingCacheSink, ReplicaSelector, StockWriteMode,
};
use rust_decimal::Decimal;
use storage::{InMemoryCatalogStore, InMemoryOrderLedger, OrderLedger};
use tokio::sync::Barrier;

const REPLICA: &str = "http://catalog-1";

/// Holds every read until `parties` reads have completed, so concurrent
/// purchases all observe the same pre-decrement stock.
struct ReadBarrierClient {
    inner: InMemoryCatalogCluster,
    barrier: Barrier,
}

#[async_trait]
impl CatalogClient for ReadBarrierClient {
    async fn fetch_item(&self, replica: &str, id: &ItemId) -> Result<Option<ItemInfo>, ClientError> {
        let info = self.inner.fetch_item(replica, id).await;
        self.barrier.wait().await;
        info
    }

    async fn update_item(
        &self,
        replica: &str,
        id: &ItemId,
        request: &UpdateRequest,
    ) -> Result<CatalogItem, ClientError> {
        self.inner.update_item(replica, id, request).await
    }

    async fn sync_item(&self, replica: &str, message: &SyncMessage) -> Result<(), ClientError> {
        self.inner.sync_item(replica, message).await
    }
}

struct RaceHarness {
    coordinator: PurchaseCoordinator<ReadBarrierClient, InMemoryOrderLedger, RecordingCacheSink>,
    store: InMemoryCatalogStore,
    ledger: InMemoryOrderLedger,
}

async fn race_harness(stock: i64, mode: StockWriteMode) -> RaceHarness {
    let cluster = InMemoryCatalogCluster::new();
    let store = cluster
        .add_replica(
            REPLICA,
            [CatalogItem::new("B1", "science fiction", "Dune", Decimal::from(15), stock)],
        )
        .await;
    let ledger = InMemoryOrderLedger::new();

    let coordinator = PurchaseCoordinator::new(
        ReplicaSelector::new([REPLICA]).unwrap(),
        ReadBarrierClient {
            inner: cluster,
            barrier: Barrier::new(2),
        },
        ledger.clone(),
        RecordingCacheSink::new(),
        PurchaseOptions {
            instance: "order-race".to_string(),
            call_timeout: Duration::from_secs(5),
            fanout_concurrency: 1,
            write_mode: mode,
        },
    );

    RaceHarness {
        coordinator,
        store,
        ledger,
    }
}

#[tokio::test]
async fn test_blind_decrement_loses_update_under_concurrent_purchases() {
    let h = race_harness(1, StockWriteMode::Blind).await;
    let id = ItemId::new("B1");

    let (first, second) = tokio::join!(h.coordinator.purchase(&id), h.coordinator.purchase(&id));

    // Both purchases read stock 1 and both wrote 0: the single copy is sold twice.
    let first = first.unwrap();
    let second = second.unwrap();
    assert_ne!(first.order_id, second.order_id);
    assert_eq!(h.store.stock_of("B1").await, Some(0));
    assert_eq!(h.ledger.order_count().await, 2);
}

#[tokio::test]
async fn test_compare_and_set_allows_at_most_one_winner() {
    let h = race_harness(1, StockWriteMode::CompareAndSet).await;
    let id = ItemId::new("B1");

    let (first, second) = tokio::join!(h.coordinator.purchase(&id), h.coordinator.purchase(&id));

    let outcomes = [first, second];
    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    let conflicts = outcomes
        .iter()
        .filter(|r| matches!(r, Err(PurchaseError::StockConflict { expected: 1, .. })))
        .count();
    assert_eq!(wins, 1);
    assert_eq!(conflicts, 1);
    assert_eq!(h.store.stock_of("B1").await, Some(0));
    assert_eq!(h.ledger.order_count().await, 1);
}

#[tokio::test]
async fn test_replicas_converge_after_sequential_purchases() {
    let cluster = InMemoryCatalogCluster::new();
    let item = CatalogItem::new("B1", "science fiction", "Dune", Decimal::from(15), 5);
    let replicas = ["http://catalog-1", "http://catalog-2", "http://catalog-3"];
    let mut stores = Vec::new();
    for replica in replicas {
        stores.push(cluster.add_replica(replica, [item.clone()]).await);
    }
    let ledger = InMemoryOrderLedger::new();

    let coordinator = PurchaseCoordinator::new(
        ReplicaSelector::new(replicas).unwrap(),
        cluster,
        ledger.clone(),
        RecordingCacheSink::new(),
        PurchaseOptions::default(),
    );

    let id = ItemId::new("B1");
    for _ in 0..5 {
        coordinator.purchase(&id).await.unwrap();
    }
    let result = coordinator.purchase(&id).await;
    assert!(matches!(result, Err(PurchaseError::OutOfStock(_))));

    for store in &stores {
        assert_eq!(store.stock_of("B1").await, Some(0));
    }
    let orders = ledger.list().await.unwrap();
    assert_eq!(orders.len(), 5);
    let ids: std::collections::HashSet<_> = orders.iter().map(|o| o.order_id.clone()).collect();
    assert_eq!(ids.len(), 5);
}

#[tokio::test]
async fn test_stale_replica_stays_stale_until_next_write() {
    let cluster = InMemoryCatalogCluster::new();
    let item = CatalogItem::new("B1", "science fiction", "Dune", Decimal::from(15), 3);
    let replicas = ["http://catalog-1", "http://catalog-2"];
    let first = cluster.add_replica(replicas[0], [item.clone()]).await;
    let second = cluster.add_replica(replicas[1], [item]).await;

    let coordinator = PurchaseCoordinator::new(
        ReplicaSelector::new(replicas).unwrap(),
        cluster.clone(),
        InMemoryOrderLedger::new(),
        RecordingCacheSink::new(),
        PurchaseOptions::default(),
    );
    let id = ItemId::new("B1");

    // Peer down during the first fan-out: it misses the update
    cluster.set_unreachable(replicas[1], true).await;
    coordinator.purchase(&id).await.unwrap();
    assert_eq!(first.stock_of("B1").await, Some(2));
    assert_eq!(second.stock_of("B1").await, Some(3));

    // Back up: the next purchase reads its stale stock and overwrites the first replica
    cluster.set_unreachable(replicas[1], false).await;
    coordinator.purchase(&id).await.unwrap();
    assert_eq!(second.stock_of("B1").await, Some(2));
    assert_eq!(first.stock_of("B1").await, Some(2));
}

#[tokio::test]
async fn test_shared_coordinator_across_tasks() {
    let cluster = InMemoryCatalogCluster::new();
    let item = CatalogItem::new("B1", "science fiction", "Dune", Decimal::from(15), 100);
    cluster.add_replica(REPLICA, [item]).await;
    let ledger = InMemoryOrderLedger::new();

    let coordinator = Arc::new(PurchaseCoordinator::new(
        ReplicaSelector::new([REPLICA]).unwrap(),
        cluster,
        ledger.clone(),
        RecordingCacheSink::new(),
        PurchaseOptions::default(),
    ));

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.purchase(&ItemId::new("B1")).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(ledger.order_count().await, 10);
}
