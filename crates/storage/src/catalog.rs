use std::collections::BTreeMap;

use async_trait::async_trait;
use common::{CatalogItem, ItemId, UpdateRequest};

use crate::Result;

/// Outcome of an update against a catalog store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The update was applied and persisted; carries the new item state.
    Applied(CatalogItem),
    /// No item with the given ID exists.
    NotFound,
    /// The request carried an expected-stock token that did not match.
    Conflict { current_stock: i64 },
}

/// Per-replica key-value store of catalog items.
///
/// Writes are persisted before the returned future resolves. Implementations
/// must make [`CatalogStore::update`] atomic with respect to other writes on
/// the same store, so the expected-stock check and the write cannot interleave
/// with another local update.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Returns the item with the given ID, if any.
    async fn get(&self, id: &ItemId) -> Result<Option<CatalogItem>>;

    /// Inserts or replaces an item.
    async fn set(&self, item: CatalogItem) -> Result<()>;

    /// Returns every item ordered by ID.
    async fn list(&self) -> Result<Vec<CatalogItem>>;

    /// Applies a (possibly conditional) update to an existing item.
    async fn update(&self, id: &ItemId, request: &UpdateRequest) -> Result<UpdateOutcome>;

    /// Returns the items whose topic matches case-insensitively.
    async fn search(&self, topic: &str) -> Result<Vec<CatalogItem>> {
        let items = self.list().await?;
        Ok(items.into_iter().filter(|i| i.has_topic(topic)).collect())
    }
}

/// Applies an update to a working copy of the item map.
///
/// Returns the outcome without touching `items` unless the update applies.
pub(crate) fn apply_update(
    items: &mut BTreeMap<ItemId, CatalogItem>,
    id: &ItemId,
    request: &UpdateRequest,
) -> UpdateOutcome {
    let Some(item) = items.get_mut(id) else {
        return UpdateOutcome::NotFound;
    };

    if let Some(expected) = request.expected_stock
        && item.stock != expected
    {
        return UpdateOutcome::Conflict {
            current_stock: item.stock,
        };
    }

    item.apply(&request.patch);
    UpdateOutcome::Applied(item.clone())
}
