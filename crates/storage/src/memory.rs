use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{CatalogItem, ItemId, PurchaseOrder, UpdateRequest};
use tokio::sync::RwLock;

use crate::catalog::{CatalogStore, UpdateOutcome, apply_update};
use crate::ledger::OrderLedger;
use crate::{Result, StorageError};

/// In-memory catalog store.
///
/// Clones share the same underlying map, so a test can keep a handle to a
/// store after handing it to a replica.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalogStore {
    items: Arc<RwLock<BTreeMap<ItemId, CatalogItem>>>,
    fail_on_write: Arc<AtomicBool>,
}

impl InMemoryCatalogStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with the given items.
    pub fn with_items(items: impl IntoIterator<Item = CatalogItem>) -> Self {
        let map = items.into_iter().map(|i| (i.id.clone(), i)).collect();
        Self {
            items: Arc::new(RwLock::new(map)),
            fail_on_write: Arc::default(),
        }
    }

    /// Makes every subsequent write fail until reset.
    pub fn set_fail_on_write(&self, fail: bool) {
        self.fail_on_write.store(fail, Ordering::SeqCst);
    }

    /// Returns the current stock of an item, if present.
    pub async fn stock_of(&self, id: &str) -> Option<i64> {
        self.items.read().await.get(&ItemId::new(id)).map(|i| i.stock)
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_on_write.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn get(&self, id: &ItemId) -> Result<Option<CatalogItem>> {
        Ok(self.items.read().await.get(id).cloned())
    }

    async fn set(&self, item: CatalogItem) -> Result<()> {
        self.check_writable()?;
        self.items.write().await.insert(item.id.clone(), item);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<CatalogItem>> {
        Ok(self.items.read().await.values().cloned().collect())
    }

    async fn update(&self, id: &ItemId, request: &UpdateRequest) -> Result<UpdateOutcome> {
        self.check_writable()?;
        let mut items = self.items.write().await;
        Ok(apply_update(&mut items, id, request))
    }
}

/// In-memory order ledger for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderLedger {
    orders: Arc<RwLock<Vec<PurchaseOrder>>>,
    fail_on_append: Arc<AtomicBool>,
}

impl InMemoryOrderLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the ledger to reject appends.
    pub fn set_fail_on_append(&self, fail: bool) {
        self.fail_on_append.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of recorded orders.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }
}

#[async_trait]
impl OrderLedger for InMemoryOrderLedger {
    async fn append(&self, order: &PurchaseOrder) -> Result<()> {
        if self.fail_on_append.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("ledger rejected append".to_string()));
        }
        self.orders.write().await.push(order.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<PurchaseOrder>> {
        Ok(self.orders.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{ItemPatch, OrderId};
    use rust_decimal::Decimal;

    fn store() -> InMemoryCatalogStore {
        InMemoryCatalogStore::with_items([
            CatalogItem::new("1", "distributed systems", "DDIA", Decimal::from(40), 3),
            CatalogItem::new("2", "undergraduate school", "Cooking for the Impatient", Decimal::from(25), 0),
        ])
    }

    fn order(id: &str) -> PurchaseOrder {
        PurchaseOrder {
            order_id: OrderId::new(id),
            book_id: ItemId::new("1"),
            title: "DDIA".to_string(),
            quantity: 1,
            total_price: Decimal::from(40),
            timestamp: "2024-03-01 12:00:00".to_string(),
        }
    }

    #[tokio::test]
    async fn get_and_list() {
        let store = store();
        let item = store.get(&ItemId::new("1")).await.unwrap().unwrap();
        assert_eq!(item.title, "DDIA");
        assert!(store.get(&ItemId::new("42")).await.unwrap().is_none());
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = store();
        let handle = store.clone();
        store
            .update(&ItemId::new("1"), &UpdateRequest::blind(ItemPatch::stock(1)))
            .await
            .unwrap();
        assert_eq!(handle.stock_of("1").await, Some(1));
    }

    #[tokio::test]
    async fn failing_writes_leave_state_untouched() {
        let store = store();
        store.set_fail_on_write(true);

        let result = store
            .update(&ItemId::new("1"), &UpdateRequest::blind(ItemPatch::stock(0)))
            .await;
        assert!(matches!(result, Err(StorageError::Unavailable(_))));
        assert_eq!(store.stock_of("1").await, Some(3));

        store.set_fail_on_write(false);
        store
            .update(&ItemId::new("1"), &UpdateRequest::blind(ItemPatch::stock(0)))
            .await
            .unwrap();
        assert_eq!(store.stock_of("1").await, Some(0));
    }

    #[tokio::test]
    async fn search_matches_topic() {
        let store = store();
        let found = store.search("Distributed Systems").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, ItemId::new("1"));
        assert!(store.search("poetry").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ledger_appends_in_order() {
        let ledger = InMemoryOrderLedger::new();
        ledger.append(&order("a")).await.unwrap();
        ledger.append(&order("b")).await.unwrap();

        let orders = ledger.list().await.unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].order_id, OrderId::new("a"));
        assert_eq!(orders[1].order_id, OrderId::new("b"));
    }

    #[tokio::test]
    async fn ledger_failure_records_nothing() {
        let ledger = InMemoryOrderLedger::new();
        ledger.set_fail_on_append(true);
        assert!(ledger.append(&order("a")).await.is_err());
        assert_eq!(ledger.order_count().await, 0);
    }
}
